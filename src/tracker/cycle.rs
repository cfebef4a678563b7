//! One capture-and-classify cycle over the whole card grid.
//!
//! Each cycle captures the grid's bounding rectangle once, crops every cell,
//! waits for the cell to be stable, then checks flip brightness and the gold
//! strip. A cell turns gold when its count beats both the threshold and its
//! previous best; every improvement is sent to the overlay.

use std::sync::Arc;

use crate::capture::{crop, rows_below_with_alpha, ScreenRegionSource};
use crate::grid::{
    bounding_rect, cell_rect, relative_rect, CellCoordinate, GridConfig, GridConfigProvider,
    GridLayout, GridState,
};
use crate::tracker::classifier::{count_gold_pixels, is_flipped, GoldMatcher};
use crate::tracker::config::DetectionConfig;
use crate::tracker::render::{CellRenderer, RenderRequest};
use crate::tracker::stability::StabilityGate;

/// What happened during one cycle.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CycleReport {
    /// False when the grid capture failed and the cycle was skipped
    pub captured: bool,
    /// Cells that passed the stability gate
    pub stable_cells: usize,
    /// Cells whose best gold count improved this cycle
    pub improved: Vec<CellCoordinate>,
}

/// Tracker state for one session, driven one cycle at a time.
pub struct TrackerLoop {
    source: Box<dyn ScreenRegionSource>,
    renderer: Arc<dyn CellRenderer>,
    layout: Arc<dyn GridConfigProvider>,
    detection: DetectionConfig,
    matcher: GoldMatcher,
    gate: StabilityGate,
    state: GridState,
    /// Grid the per-cell state was built for
    cards: GridConfig,
    capture_failures: u32,
}

impl TrackerLoop {
    pub fn new(
        source: Box<dyn ScreenRegionSource>,
        renderer: Arc<dyn CellRenderer>,
        layout: Arc<dyn GridConfigProvider>,
        detection: DetectionConfig,
    ) -> Self {
        let GridLayout { config, .. } = layout.snapshot();
        Self {
            source,
            renderer,
            layout,
            matcher: GoldMatcher::from_config(&detection),
            gate: Self::new_gate(&detection, &config),
            state: GridState::new(config.rows, config.cols),
            cards: config,
            detection,
            capture_failures: 0,
        }
    }

    fn new_gate(detection: &DetectionConfig, config: &GridConfig) -> StabilityGate {
        StabilityGate::new(
            config.rows,
            config.cols,
            detection.stability_diff_threshold,
            detection.stable_frames_required,
        )
    }

    pub fn state(&self) -> &GridState {
        &self.state
    }

    #[cfg(test)]
    pub fn gate(&self) -> &StabilityGate {
        &self.gate
    }

    /// Consecutive cycles whose capture failed.
    pub fn capture_failures(&self) -> u32 {
        self.capture_failures
    }

    /// Rebuilds per-cell state when the cards changed since the last cycle.
    ///
    /// Gold counts from one resolution preset mean nothing under another, so
    /// any change other than gaps or margins starts over.
    fn sync_grid(&mut self, config: &GridConfig) {
        if self.cards.same_cards(config) {
            return;
        }
        log::info!(
            "Grid changed to {}x{} cells of {}x{}, clearing card memory",
            config.rows,
            config.cols,
            config.cell_w,
            config.cell_h
        );
        self.gate = Self::new_gate(&self.detection, config);
        self.state = GridState::new(config.rows, config.cols);
        self.cards = config.clone();
        self.renderer.clear_all();
    }

    /// Runs one cycle. Never fails: capture problems skip the cycle.
    pub fn run_cycle(&mut self) -> CycleReport {
        let mut report = CycleReport::default();
        let GridLayout { config, origin } = self.layout.snapshot();
        self.sync_grid(&config);

        let bounds = bounding_rect(&config, origin);
        let frame = match self.source.capture(bounds) {
            Ok(frame) => {
                if self.capture_failures > 0 {
                    log::info!(
                        "Capture recovered after {} failed cycles",
                        self.capture_failures
                    );
                }
                self.capture_failures = 0;
                frame
            }
            Err(e) => {
                self.capture_failures = self.capture_failures.saturating_add(1);
                if self.capture_failures == 1 {
                    log::warn!("Grid capture failed, skipping cycle: {}", e);
                } else {
                    log::debug!("Grid capture failed ({}x): {}", self.capture_failures, e);
                }
                return report;
            }
        };
        report.captured = true;

        for cell in config.cells() {
            let rect = relative_rect(cell_rect(cell, &config, origin), &bounds);
            let Some(card) = crop(&frame, &rect) else {
                log::debug!("Cell {} lies outside the captured region", cell);
                continue;
            };

            if !self.gate.update(cell, &card) {
                continue;
            }
            report.stable_cells += 1;

            if !is_flipped(&card, self.detection.brightness_threshold) {
                self.state.observe_face_down(cell);
                continue;
            }

            let gold = count_gold_pixels(
                &card,
                config.scan_y_start,
                config.scan_y_end,
                &self.matcher,
            );
            if gold <= config.gold_threshold {
                self.state.observe_flipped(cell);
                continue;
            }
            let previous = self.state.best_gold(cell);
            if !self.state.record_gold(cell, gold) {
                continue;
            }

            log::info!(
                "Gold card at {}: {} gold pixels (previous best {})",
                cell,
                gold,
                previous
            );
            report.improved.push(cell);

            // Only the part below the scan strip is drawn
            if let Some(image) = rows_below_with_alpha(&card, config.scan_y_end, config.overlay_alpha)
            {
                self.renderer.render_cell(RenderRequest {
                    cell,
                    image,
                    y_offset: config.scan_y_end,
                });
            }
        }

        report
    }

    /// Forgets all cards and asks the overlay to clear its annotations.
    pub fn reset(&mut self) {
        self.gate.reset();
        self.state.reset();
        self.renderer.clear_all();
        log::info!("Card memory reset");
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::capture::{CaptureError, PixelBuffer};
    use crate::grid::state::CardStatus;
    use crate::grid::{CellRect, ScreenPoint};
    use crate::tracker::render::tests::RecordingRenderer;
    use image::{ImageBuffer, Rgb};
    use std::collections::VecDeque;
    use std::sync::Mutex;

    pub(crate) const GOLD: [u8; 3] = [193, 126, 37];
    pub(crate) const GREY: [u8; 3] = [100, 100, 100];

    /// 1x2 grid of 16x26 cards with a 4-row scan strip at 10..14.
    pub(crate) fn small_config() -> GridConfig {
        GridConfig {
            rows: 1,
            cols: 2,
            cell_w: 20,
            cell_h: 30,
            padding_x: 2,
            padding_y: 2,
            gap_x: 0,
            gap_y: 0,
            start_x: 0,
            start_y: 0,
            scan_y_start: 10,
            scan_y_end: 14,
            gold_threshold: 10,
            overlay_alpha: 230,
        }
    }

    pub(crate) fn small_layout() -> GridLayout {
        GridLayout {
            config: small_config(),
            origin: ScreenPoint::new(0, 0),
        }
    }

    /// How a card is painted in a synthetic frame.
    #[derive(Clone, Copy, Debug)]
    pub(crate) enum Look {
        FaceDown,
        /// Flipped card with this many gold pixels at the start of the strip
        Gold(u32),
    }

    /// Paints a frame covering the layout's bounding rectangle.
    pub(crate) fn frame(layout: &GridLayout, looks: &[Look]) -> PixelBuffer {
        let config = &layout.config;
        let bounds = bounding_rect(config, layout.origin);
        let mut img: PixelBuffer = ImageBuffer::new(bounds.width, bounds.height);
        for (cell, look) in config.cells().zip(looks) {
            let rect = relative_rect(cell_rect(cell, config, layout.origin), &bounds);
            for y in 0..rect.height {
                for x in 0..rect.width {
                    let color = match look {
                        Look::FaceDown => [4, 0, 1],
                        Look::Gold(n) => {
                            let in_strip = y >= config.scan_y_start && y < config.scan_y_end;
                            let strip_index = (y.saturating_sub(config.scan_y_start)) * rect.width + x;
                            if in_strip && strip_index < *n { GOLD } else { GREY }
                        }
                    };
                    img.put_pixel(rect.left as u32 + x, rect.top as u32 + y, Rgb(color));
                }
            }
        }
        img
    }

    /// Source that replays queued results, repeating the last frame when empty.
    pub(crate) struct ScriptedSource {
        pub queue: Arc<Mutex<VecDeque<Result<PixelBuffer, CaptureError>>>>,
        pub requests: Arc<Mutex<Vec<CellRect>>>,
        last: Option<PixelBuffer>,
    }

    impl ScriptedSource {
        pub(crate) fn new() -> Self {
            Self {
                queue: Arc::new(Mutex::new(VecDeque::new())),
                requests: Arc::new(Mutex::new(Vec::new())),
                last: None,
            }
        }
    }

    impl ScreenRegionSource for ScriptedSource {
        fn capture(&mut self, rect: CellRect) -> Result<PixelBuffer, CaptureError> {
            self.requests.lock().unwrap().push(rect);
            match self.queue.lock().unwrap().pop_front() {
                Some(Ok(frame)) => {
                    self.last = Some(frame.clone());
                    Ok(frame)
                }
                Some(Err(e)) => Err(e),
                None => self.last.clone().ok_or(CaptureError::Unsupported),
            }
        }
    }

    struct Harness {
        tracker: TrackerLoop,
        renderer: Arc<RecordingRenderer>,
        queue: Arc<Mutex<VecDeque<Result<PixelBuffer, CaptureError>>>>,
        requests: Arc<Mutex<Vec<CellRect>>>,
    }

    impl Harness {
        fn new(layout: GridLayout) -> Self {
            let source = ScriptedSource::new();
            let queue = source.queue.clone();
            let requests = source.requests.clone();
            let renderer = Arc::new(RecordingRenderer::default());
            let tracker = TrackerLoop::new(
                Box::new(source),
                renderer.clone(),
                Arc::new(layout),
                DetectionConfig::default(),
            );
            Self {
                tracker,
                renderer,
                queue,
                requests,
            }
        }

        /// Queues the same frame `times` times and runs that many cycles.
        fn feed(&mut self, frame: &PixelBuffer, times: usize) -> Vec<CycleReport> {
            (0..times)
                .map(|_| {
                    self.queue.lock().unwrap().push_back(Ok(frame.clone()));
                    self.tracker.run_cycle()
                })
                .collect()
        }
    }

    const A: CellCoordinate = CellCoordinate { row: 0, col: 0 };
    const B: CellCoordinate = CellCoordinate { row: 0, col: 1 };

    #[test]
    fn test_captures_bounding_rect_once_per_cycle() {
        let layout = small_layout();
        let mut h = Harness::new(layout.clone());
        h.feed(&frame(&layout, &[Look::FaceDown, Look::FaceDown]), 3);

        let requests = h.requests.lock().unwrap();
        assert_eq!(requests.len(), 3);
        assert_eq!(requests[0], CellRect::new(2, 2, 36, 26));
    }

    #[test]
    fn test_face_down_cards_are_never_marked() {
        let layout = small_layout();
        let mut h = Harness::new(layout.clone());
        let reports = h.feed(&frame(&layout, &[Look::FaceDown, Look::FaceDown]), 5);

        assert!(reports.iter().all(|r| r.captured && r.improved.is_empty()));
        assert_eq!(h.tracker.state().status(A), CardStatus::FaceDown);
        assert!(h.renderer.renders().is_empty());
    }

    #[test]
    fn test_gold_card_is_marked_once_stable() {
        let layout = small_layout();
        let mut h = Harness::new(layout.clone());
        let reports = h.feed(&frame(&layout, &[Look::Gold(30), Look::FaceDown]), 3);

        assert!(reports[0].improved.is_empty(), "first frame is never stable");
        assert!(reports[1].improved.is_empty(), "one matching frame is not enough");
        assert_eq!(reports[2].improved, vec![A]);
        assert_eq!(reports[2].stable_cells, 2);

        assert_eq!(h.tracker.state().status(A), CardStatus::Gold);
        assert_eq!(h.tracker.state().best_gold(A), 30);
        assert_eq!(h.tracker.state().status(B), CardStatus::FaceDown);

        let renders = h.renderer.renders();
        assert_eq!(renders.len(), 1);
        assert_eq!(renders[0].cell, A);
        assert_eq!(renders[0].y_offset, 14);
        // Card rows 14..26 below the strip
        assert_eq!(renders[0].image.dimensions(), (16, 12));
        assert!(renders[0].image.pixels().all(|p| p[3] == 230));
        assert_eq!(renders[0].image.get_pixel(0, 0).0, [100, 100, 100, 230]);
    }

    #[test]
    fn test_unchanged_gold_card_is_not_rendered_again() {
        let layout = small_layout();
        let mut h = Harness::new(layout.clone());
        h.feed(&frame(&layout, &[Look::Gold(30), Look::FaceDown]), 10);
        assert_eq!(h.renderer.renders().len(), 1);
    }

    #[test]
    fn test_best_score_never_decreases() {
        let layout = small_layout();
        let mut h = Harness::new(layout.clone());
        let mut best = Vec::new();
        for n in [30, 20, 12, 45, 40, 64] {
            h.feed(&frame(&layout, &[Look::Gold(n), Look::FaceDown]), 3);
            best.push(h.tracker.state().best_gold(A));
        }

        assert_eq!(best, vec![30, 30, 30, 45, 45, 64]);
        assert!(best.windows(2).all(|w| w[0] <= w[1]));
        let rendered: Vec<_> = h.renderer.renders().iter().map(|r| r.cell).collect();
        assert_eq!(rendered, vec![A, A, A]);
    }

    #[test]
    fn test_gold_threshold_is_strict() {
        let layout = small_layout();
        let mut h = Harness::new(layout.clone());
        h.feed(&frame(&layout, &[Look::Gold(10), Look::Gold(11)]), 3);

        assert_eq!(h.tracker.state().status(A), CardStatus::Unknown);
        assert_eq!(h.tracker.state().best_gold(A), 0);
        assert_eq!(h.tracker.state().status(B), CardStatus::Gold);
        assert_eq!(h.tracker.state().best_gold(B), 11);
    }

    #[test]
    fn test_animating_card_is_never_classified() {
        let layout = small_layout();
        let mut h = Harness::new(layout.clone());
        let dark = frame(&layout, &[Look::FaceDown, Look::FaceDown]);
        let bright = frame(&layout, &[Look::Gold(64), Look::Gold(64)]);
        for _ in 0..5 {
            h.feed(&dark, 1);
            h.feed(&bright, 1);
        }
        assert_eq!(h.tracker.state().gold_cells(), 0);
        assert!(h.renderer.renders().is_empty());
    }

    #[test]
    fn test_capture_failure_skips_cycle() {
        let layout = small_layout();
        let mut h = Harness::new(layout.clone());
        let gold = frame(&layout, &[Look::Gold(30), Look::FaceDown]);
        h.feed(&gold, 2);

        h.queue.lock().unwrap().push_back(Err(CaptureError::Platform("gone".to_string())));
        let report = h.tracker.run_cycle();
        assert!(!report.captured);
        assert_eq!(h.tracker.capture_failures(), 1);
        assert_eq!(h.tracker.state().gold_cells(), 0);

        // The gate still compares against the last good frame
        let reports = h.feed(&gold, 1);
        assert_eq!(reports[0].improved, vec![A]);
        assert_eq!(h.tracker.capture_failures(), 0);
    }

    #[test]
    fn test_cells_outside_capture_are_skipped() {
        let layout = small_layout();
        let mut h = Harness::new(layout.clone());
        let full = frame(&layout, &[Look::Gold(30), Look::Gold(30)]);
        // Only the first card fits in an 18px wide capture
        let partial = image::imageops::crop_imm(&full, 0, 0, 18, full.height()).to_image();
        let reports = h.feed(&partial, 3);

        assert_eq!(reports[2].improved, vec![A]);
        assert!(h.tracker.gate().record(B).is_none());
        assert_eq!(h.tracker.state().status(B), CardStatus::Unknown);
    }

    #[test]
    fn test_reset_clears_state_and_overlay() {
        let layout = small_layout();
        let mut h = Harness::new(layout.clone());
        let gold = frame(&layout, &[Look::Gold(30), Look::Gold(40)]);
        h.feed(&gold, 3);
        assert_eq!(h.tracker.state().gold_cells(), 2);

        h.tracker.reset();
        assert_eq!(h.tracker.state().gold_cells(), 0);
        assert_eq!(h.tracker.state().best_gold(A), 0);
        assert!(h.tracker.gate().record(A).is_none());
        assert_eq!(h.renderer.clears(), 1);

        h.tracker.reset();
        assert_eq!(h.tracker.state().gold_cells(), 0);
        assert!(h.tracker.gate().record(B).is_none());
        assert_eq!(h.renderer.clears(), 2);

        // Same card is detected again from scratch, at its old score
        let reports = h.feed(&gold, 3);
        assert_eq!(reports[2].improved, vec![A, B]);
        assert_eq!(h.tracker.state().best_gold(B), 40);
    }

    #[test]
    fn test_grid_reshape_rebuilds_state() {
        let layout = small_layout();
        let shared = crate::grid::SharedLayout::new(layout.clone());
        let source = ScriptedSource::new();
        let queue = source.queue.clone();
        let renderer = Arc::new(RecordingRenderer::default());
        let mut tracker = TrackerLoop::new(
            Box::new(source),
            renderer.clone(),
            Arc::new(shared.clone()),
            DetectionConfig::default(),
        );

        for _ in 0..3 {
            queue
                .lock()
                .unwrap()
                .push_back(Ok(frame(&layout, &[Look::Gold(30), Look::FaceDown])));
            tracker.run_cycle();
        }
        assert_eq!(tracker.state().gold_cells(), 1);

        let mut wider = small_config();
        wider.cols = 3;
        shared.set_config(wider);
        tracker.run_cycle();

        assert_eq!(tracker.state().dimensions(), (1, 3));
        assert_eq!(tracker.state().gold_cells(), 0);
        assert_eq!(renderer.clears(), 1);
    }

    #[test]
    fn test_preset_change_clears_card_memory() {
        let layout = small_layout();
        let shared = crate::grid::SharedLayout::new(layout.clone());
        let source = ScriptedSource::new();
        let queue = source.queue.clone();
        let renderer = Arc::new(RecordingRenderer::default());
        let mut tracker = TrackerLoop::new(
            Box::new(source),
            renderer.clone(),
            Arc::new(shared.clone()),
            DetectionConfig::default(),
        );

        let gold = frame(&layout, &[Look::Gold(30), Look::FaceDown]);
        for _ in 0..3 {
            queue.lock().unwrap().push_back(Ok(gold.clone()));
            tracker.run_cycle();
        }
        assert_eq!(tracker.state().best_gold(A), 30);

        // Gap edits keep the cards
        let mut gapped = small_config();
        gapped.gap_x = 3;
        shared.set_config(gapped);
        tracker.run_cycle();
        assert_eq!(tracker.state().best_gold(A), 30);
        assert_eq!(renderer.clears(), 0);

        // Same shape, different resolution: old counts no longer apply
        let mut larger = small_config();
        larger.cell_w = 24;
        larger.cell_h = 34;
        larger.gold_threshold = 40;
        shared.set_config(larger);
        tracker.run_cycle();
        assert_eq!(tracker.state().dimensions(), (1, 2));
        assert_eq!(tracker.state().best_gold(A), 0);
        assert_eq!(tracker.state().gold_cells(), 0);
        assert!(tracker.gate().record(A).is_none());
        assert_eq!(renderer.clears(), 1);
    }
}
