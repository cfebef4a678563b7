//! Card grid geometry.
//!
//! Maps a cell coordinate to its padded rectangle in absolute screen space,
//! and to a rectangle relative to a captured super-region.

use thiserror::Error;

/// Errors raised when a grid configuration violates its invariants.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GeometryError {
    #[error("grid must contain at least one cell (rows={rows}, cols={cols})")]
    EmptyGrid { rows: usize, cols: usize },

    #[error("padding {padding} must be less than half of the cell pitch {pitch}")]
    PaddingTooLarge { padding: u32, pitch: u32 },

    #[error("scan strip {start}..{end} must be non-empty and lie within card height {card_h}")]
    ScanStripOutOfCell { start: u32, end: u32, card_h: u32 },

    #[error("a {rows}x{cols} grid of this cell size is wider or taller than {max} pixels")]
    GridTooLarge { rows: usize, cols: usize, max: u32 },
}

/// Largest grid width or height accepted, in physical pixels.
pub const MAX_GRID_EXTENT: u32 = 1 << 16;

/// Zero-indexed position of a slot in the card grid.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CellCoordinate {
    pub row: usize,
    pub col: usize,
}

impl CellCoordinate {
    pub fn new(row: usize, col: usize) -> Self {
        Self { row, col }
    }

    /// Row-major arena index for a grid with `cols` columns.
    pub fn index(&self, cols: usize) -> usize {
        self.row * cols + self.col
    }
}

impl std::fmt::Display for CellCoordinate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({}, {})", self.row, self.col)
    }
}

/// A point in physical screen pixels.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ScreenPoint {
    pub x: i32,
    pub y: i32,
}

impl ScreenPoint {
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

/// Axis-aligned rectangle, either in absolute screen space or relative to a capture.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CellRect {
    pub top: i32,
    pub left: i32,
    pub width: u32,
    pub height: u32,
}

impl CellRect {
    pub fn new(left: i32, top: i32, width: u32, height: u32) -> Self {
        Self { top, left, width, height }
    }

    /// Exclusive right edge.
    pub fn right(&self) -> i64 {
        self.left as i64 + self.width as i64
    }

    /// Exclusive bottom edge.
    pub fn bottom(&self) -> i64 {
        self.top as i64 + self.height as i64
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// True when this (capture-relative) rectangle lies inside a `width` x `height` buffer.
    pub fn fits_within(&self, width: u32, height: u32) -> bool {
        self.left >= 0
            && self.top >= 0
            && self.right() <= width as i64
            && self.bottom() <= height as i64
    }

    /// Smallest rectangle covering both.
    pub fn union(&self, other: &CellRect) -> CellRect {
        let left = self.left.min(other.left);
        let top = self.top.min(other.top);
        let right = self.right().max(other.right());
        let bottom = self.bottom().max(other.bottom());
        CellRect {
            top,
            left,
            width: (right - left as i64) as u32,
            height: (bottom - top as i64) as u32,
        }
    }
}

/// Grid geometry and detection thresholds for one tracking session.
#[derive(Clone, Debug, PartialEq)]
pub struct GridConfig {
    pub rows: usize,
    pub cols: usize,
    /// Cell pitch (actual card size including padding)
    pub cell_w: u32,
    pub cell_h: u32,
    pub padding_x: u32,
    pub padding_y: u32,
    pub gap_x: u32,
    pub gap_y: u32,
    /// Offset of the grid's top-left corner from the overlay origin
    pub start_x: i32,
    pub start_y: i32,
    /// Scan strip rows, relative to the padded card top
    pub scan_y_start: u32,
    pub scan_y_end: u32,
    /// A flipped card is gold when its strip holds more than this many gold pixels
    pub gold_threshold: u32,
    pub overlay_alpha: u8,
}

impl GridConfig {
    /// Checks the grid invariants.
    pub fn validate(&self) -> Result<(), GeometryError> {
        if self.rows == 0 || self.cols == 0 {
            return Err(GeometryError::EmptyGrid {
                rows: self.rows,
                cols: self.cols,
            });
        }
        // padding * 2 >= pitch, without overflowing on large config values
        if self.padding_x >= self.cell_w.div_ceil(2) {
            return Err(GeometryError::PaddingTooLarge {
                padding: self.padding_x,
                pitch: self.cell_w,
            });
        }
        if self.padding_y >= self.cell_h.div_ceil(2) {
            return Err(GeometryError::PaddingTooLarge {
                padding: self.padding_y,
                pitch: self.cell_h,
            });
        }
        if self.scan_y_start >= self.scan_y_end || self.scan_y_end > self.card_h() {
            return Err(GeometryError::ScanStripOutOfCell {
                start: self.scan_y_start,
                end: self.scan_y_end,
                card_h: self.card_h(),
            });
        }
        match self.checked_grid_size() {
            Some((w, h)) if w <= MAX_GRID_EXTENT && h <= MAX_GRID_EXTENT => Ok(()),
            _ => Err(GeometryError::GridTooLarge {
                rows: self.rows,
                cols: self.cols,
                max: MAX_GRID_EXTENT,
            }),
        }
    }

    /// Visible card width after padding.
    pub fn card_w(&self) -> u32 {
        self.cell_w.saturating_sub(self.padding_x.saturating_mul(2))
    }

    /// Visible card height after padding.
    pub fn card_h(&self) -> u32 {
        self.cell_h.saturating_sub(self.padding_y.saturating_mul(2))
    }

    /// All cell coordinates in row-major order.
    pub fn cells(&self) -> impl Iterator<Item = CellCoordinate> + '_ {
        (0..self.rows).flat_map(move |row| (0..self.cols).map(move |col| CellCoordinate { row, col }))
    }

    fn checked_grid_size(&self) -> Option<(u32, u32)> {
        Some((
            checked_extent(self.cols, self.cell_w, self.gap_x)?,
            checked_extent(self.rows, self.cell_h, self.gap_y)?,
        ))
    }

    /// Width and height of the card grid itself, without margins.
    ///
    /// Saturates for grids that `validate` rejects.
    pub fn grid_size(&self) -> (u32, u32) {
        self.checked_grid_size().unwrap_or((u32::MAX, u32::MAX))
    }

    /// Recomputes the grid offset as a fraction of the grid size on each side.
    pub fn apply_margin(&mut self, margin_ratio: f32) {
        let margin_ratio = margin_ratio.clamp(0.0, 1.0);
        let (grid_w, grid_h) = self.grid_size();
        self.start_x = (grid_w as f32 * margin_ratio) as i32;
        self.start_y = (grid_h as f32 * margin_ratio) as i32;
    }

    /// Overlay size needed to show the grid with its margins.
    pub fn window_size(&self) -> (u32, u32) {
        let (grid_w, grid_h) = self.grid_size();
        (
            grid_w.saturating_add((self.start_x.max(0) as u32).saturating_mul(2)),
            grid_h.saturating_add((self.start_y.max(0) as u32).saturating_mul(2)),
        )
    }

    /// True when both describe the same cards: grid shape, card size, scan
    /// strip and gold threshold. Gaps, margins and overlay alpha may differ.
    pub fn same_cards(&self, other: &GridConfig) -> bool {
        (self.rows, self.cols) == (other.rows, other.cols)
            && (self.cell_w, self.cell_h) == (other.cell_w, other.cell_h)
            && (self.padding_x, self.padding_y) == (other.padding_x, other.padding_y)
            && (self.scan_y_start, self.scan_y_end) == (other.scan_y_start, other.scan_y_end)
            && self.gold_threshold == other.gold_threshold
    }

    /// Top-left of a cell's pitch box (before padding), relative to the overlay origin.
    pub fn cell_origin(&self, cell: CellCoordinate) -> (i32, i32) {
        (
            self.start_x + cell.col as i32 * (self.cell_w + self.gap_x) as i32,
            self.start_y + cell.row as i32 * (self.cell_h + self.gap_y) as i32,
        )
    }
}

/// `count` cells of `pitch` pixels separated by `gap`, or None on overflow.
fn checked_extent(count: usize, pitch: u32, gap: u32) -> Option<u32> {
    let count = u32::try_from(count).ok()?;
    let gaps = count.saturating_sub(1).checked_mul(gap)?;
    count.checked_mul(pitch)?.checked_add(gaps)
}

/// Absolute screen rectangle of a cell's visible (padded) card area.
pub fn cell_rect(cell: CellCoordinate, config: &GridConfig, origin: ScreenPoint) -> CellRect {
    let (cell_x, cell_y) = config.cell_origin(cell);
    CellRect {
        left: origin.x + cell_x + config.padding_x as i32,
        top: origin.y + cell_y + config.padding_y as i32,
        width: config.card_w(),
        height: config.card_h(),
    }
}

/// Re-expresses `rect` relative to the top-left corner of `capture`.
pub fn relative_rect(rect: CellRect, capture: &CellRect) -> CellRect {
    CellRect {
        left: rect.left - capture.left,
        top: rect.top - capture.top,
        width: rect.width,
        height: rect.height,
    }
}

/// Rectangle covering every cell of the grid, for a single capture per cycle.
pub fn bounding_rect(config: &GridConfig, origin: ScreenPoint) -> CellRect {
    let first = cell_rect(CellCoordinate::new(0, 0), config, origin);
    let last = cell_rect(
        CellCoordinate::new(config.rows.saturating_sub(1), config.cols.saturating_sub(1)),
        config,
        origin,
    );
    first.union(&last)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// FHD preset on a 3x6 grid with a 5% margin.
    pub(crate) fn fhd_config() -> GridConfig {
        let mut config = GridConfig {
            rows: 3,
            cols: 6,
            cell_w: 151,
            cell_h: 232,
            padding_x: 7,
            padding_y: 7,
            gap_x: 0,
            gap_y: 0,
            start_x: 0,
            start_y: 0,
            scan_y_start: 168,
            scan_y_end: 179,
            gold_threshold: 10,
            overlay_alpha: 230,
        };
        config.apply_margin(0.05);
        config
    }

    #[test]
    fn test_first_cell_rect_matches_fhd_layout() {
        let config = fhd_config();
        let origin = ScreenPoint::new(100, 40);
        let rect = cell_rect(CellCoordinate::new(0, 0), &config, origin);

        assert_eq!(rect.left, 100 + config.start_x + 7);
        assert_eq!(rect.top, 40 + config.start_y + 7);
        assert_eq!(rect.width, 137);
        assert_eq!(rect.height, 218);
    }

    #[test]
    fn test_margin_is_five_percent_of_grid() {
        let config = fhd_config();
        // 6 * 151 = 906, 3 * 232 = 696
        assert_eq!(config.grid_size(), (906, 696));
        assert_eq!(config.start_x, 45);
        assert_eq!(config.start_y, 34);
        assert_eq!(config.window_size(), (996, 764));
    }

    #[test]
    fn test_cell_pitch_includes_gap() {
        let mut config = fhd_config();
        config.gap_x = 4;
        config.gap_y = 3;
        let origin = ScreenPoint::default();
        let a = cell_rect(CellCoordinate::new(1, 2), &config, origin);
        let b = cell_rect(CellCoordinate::new(0, 0), &config, origin);

        assert_eq!(a.left - b.left, 2 * (151 + 4));
        assert_eq!(a.top - b.top, 232 + 3);
    }

    fn overlaps(a: &CellRect, b: &CellRect) -> bool {
        (a.left as i64) < b.right()
            && (b.left as i64) < a.right()
            && (a.top as i64) < b.bottom()
            && (b.top as i64) < a.bottom()
    }

    #[test]
    fn test_cell_rects_are_deterministic_and_disjoint() {
        for gap in [0, 5] {
            let mut config = fhd_config();
            config.gap_x = gap;
            config.gap_y = gap;
            let origin = ScreenPoint::new(-300, 12);
            let rects: Vec<_> = config
                .cells()
                .map(|cell| cell_rect(cell, &config, origin))
                .collect();

            for (i, cell) in config.cells().enumerate() {
                assert_eq!(rects[i], cell_rect(cell, &config, origin));
            }
            for i in 0..rects.len() {
                for j in (i + 1)..rects.len() {
                    assert!(
                        !overlaps(&rects[i], &rects[j]),
                        "cells {} and {} overlap with gap {}",
                        i,
                        j,
                        gap
                    );
                }
            }
        }
    }

    #[test]
    fn test_relative_rect_subtracts_capture_origin() {
        let capture = CellRect::new(50, 60, 500, 500);
        let rect = CellRect::new(70, 95, 10, 20);
        let rel = relative_rect(rect, &capture);

        assert_eq!(rel, CellRect::new(20, 35, 10, 20));
        assert!(rel.fits_within(500, 500));
        assert!(!CellRect::new(-1, 0, 10, 10).fits_within(500, 500));
        assert!(!CellRect::new(495, 0, 10, 10).fits_within(500, 500));
    }

    #[test]
    fn test_bounding_rect_covers_all_cells() {
        let config = fhd_config();
        let origin = ScreenPoint::new(10, 20);
        let bounds = bounding_rect(&config, origin);

        for cell in config.cells() {
            let rel = relative_rect(cell_rect(cell, &config, origin), &bounds);
            assert!(rel.fits_within(bounds.width, bounds.height), "cell {} outside", cell);
        }
        // Last card ends at 5 * 151 + 7 + 137 from the first padded left edge
        assert_eq!(bounds.width, 5 * 151 + 137);
        assert_eq!(bounds.height, 2 * 232 + 218);
    }

    #[test]
    fn test_validate_rejects_broken_invariants() {
        assert!(fhd_config().validate().is_ok());

        let mut config = fhd_config();
        config.rows = 0;
        assert!(matches!(config.validate(), Err(GeometryError::EmptyGrid { .. })));

        let mut config = fhd_config();
        config.padding_x = 76;
        assert!(matches!(config.validate(), Err(GeometryError::PaddingTooLarge { .. })));

        let mut config = fhd_config();
        config.scan_y_end = 219;
        assert!(matches!(config.validate(), Err(GeometryError::ScanStripOutOfCell { .. })));
    }

    #[test]
    fn test_validate_handles_huge_values_without_overflow() {
        let mut config = fhd_config();
        config.padding_x = 3_000_000_000;
        assert_eq!(
            config.validate(),
            Err(GeometryError::PaddingTooLarge {
                padding: 3_000_000_000,
                pitch: 151
            })
        );

        // Odd pitch: 2 * 75 < 151 is fine, 2 * 76 is not
        let mut config = fhd_config();
        config.padding_x = 75;
        assert!(config.validate().is_ok());
        config.padding_x = 76;
        assert!(config.validate().is_err());

        let mut config = fhd_config();
        config.cell_w = u32::MAX;
        assert!(matches!(config.validate(), Err(GeometryError::GridTooLarge { .. })));
        assert_eq!(config.grid_size().0, u32::MAX);
        assert_eq!(config.window_size().0, u32::MAX);

        let mut config = fhd_config();
        config.gap_y = u32::MAX / 2;
        assert!(matches!(config.validate(), Err(GeometryError::GridTooLarge { .. })));

        let mut config = fhd_config();
        config.cols = usize::MAX;
        assert!(matches!(config.validate(), Err(GeometryError::GridTooLarge { .. })));
    }

    #[test]
    fn test_same_cards_ignores_gaps_only() {
        let config = fhd_config();
        let mut gapped = config.clone();
        gapped.gap_x = 4;
        gapped.apply_margin(0.05);
        assert!(config.same_cards(&gapped));

        let mut resized = config.clone();
        resized.cell_w = 202;
        assert!(!config.same_cards(&resized));

        let mut stricter = config.clone();
        stricter.gold_threshold = 18;
        assert!(!config.same_cards(&stricter));
    }
}
