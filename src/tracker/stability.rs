//! Frame stability gate.
//!
//! A card is only classified after its image has stopped changing, so frames
//! captured mid flip animation never reach the classifier.

use crate::capture::PixelBuffer;
use crate::grid::CellCoordinate;

/// Mean absolute difference below which two frames count as unchanged.
pub const STABLE_DIFF_THRESHOLD: f32 = 5.0;

/// Consecutive unchanged frames needed before a cell is trusted.
pub const STABLE_FRAMES_REQUIRED: u32 = 2;

/// Last frame seen for a cell and how many consecutive frames matched it.
#[derive(Clone, Debug)]
pub struct StabilityRecord {
    pub last: PixelBuffer,
    pub stable_frames: u32,
}

/// Mean absolute per-channel difference of two equally sized buffers.
///
/// Returns infinity for empty or mismatched buffers.
pub fn mean_abs_diff(a: &PixelBuffer, b: &PixelBuffer) -> f32 {
    let (a, b) = (a.as_raw(), b.as_raw());
    if a.is_empty() || a.len() != b.len() {
        return f32::INFINITY;
    }
    let total: u64 = a
        .iter()
        .zip(b.iter())
        .map(|(&x, &y)| x.abs_diff(y) as u64)
        .sum();
    (total as f64 / a.len() as f64) as f32
}

/// Per-cell change detector over consecutive captures.
#[derive(Clone, Debug)]
pub struct StabilityGate {
    cols: usize,
    records: Vec<Option<StabilityRecord>>,
    diff_threshold: f32,
    frames_required: u32,
}

impl StabilityGate {
    pub fn new(
        rows: usize,
        cols: usize,
        diff_threshold: f32,
        frames_required: u32,
    ) -> Self {
        Self {
            cols,
            records: vec![None; rows * cols],
            diff_threshold,
            frames_required,
        }
    }

    fn slot(&self, cell: CellCoordinate) -> Option<usize> {
        let index = cell.index(self.cols);
        (cell.col < self.cols && index < self.records.len()).then_some(index)
    }

    #[cfg(test)]
    pub fn record(&self, cell: CellCoordinate) -> Option<&StabilityRecord> {
        self.slot(cell).and_then(|i| self.records[i].as_ref())
    }

    /// Feeds the latest frame for a cell and reports whether the cell is stable.
    ///
    /// The frame always replaces the stored one, so each comparison is against
    /// the immediately preceding capture.
    pub fn update(&mut self, cell: CellCoordinate, frame: &PixelBuffer) -> bool {
        let Some(index) = self.slot(cell) else {
            return false;
        };

        let Some(record) = self.records[index].as_mut() else {
            self.records[index] = Some(StabilityRecord {
                last: frame.clone(),
                stable_frames: 0,
            });
            return false;
        };

        if record.last.dimensions() != frame.dimensions() {
            record.last = frame.clone();
            record.stable_frames = 0;
            return false;
        }

        if mean_abs_diff(&record.last, frame) < self.diff_threshold {
            record.stable_frames = record.stable_frames.saturating_add(1);
        } else {
            record.stable_frames = 0;
        }
        // Same shape, so the existing allocation is reused
        record.last.copy_from_slice(frame.as_raw());

        record.stable_frames >= self.frames_required
    }

    /// Drops every record.
    pub fn reset(&mut self) {
        self.records.iter_mut().for_each(|r| *r = None);
    }
}
