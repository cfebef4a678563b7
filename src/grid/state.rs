//! Per-cell card state.
//!
//! A fixed-size arena indexed by (row, col). Entries are created lazily the
//! first time a cell is classified and cleared together on reset.

use super::geometry::CellCoordinate;

/// What the tracker last concluded about a card slot.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum CardStatus {
    /// Seen but not judged face down or gold
    #[default]
    Unknown,
    /// Latest stable frame was dark
    FaceDown,
    /// Flipped and carrying enough gold pixels; terminal until reset
    Gold,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CardState {
    pub status: CardStatus,
    /// Highest gold pixel count seen this session
    pub best_gold: u32,
}

/// Card states for every cell of a rows x cols grid.
#[derive(Clone, Debug)]
pub struct GridState {
    rows: usize,
    cols: usize,
    cells: Vec<Option<CardState>>,
}

impl GridState {
    pub fn new(rows: usize, cols: usize) -> Self {
        Self {
            rows,
            cols,
            cells: vec![None; rows * cols],
        }
    }

    #[cfg(test)]
    pub fn dimensions(&self) -> (usize, usize) {
        (self.rows, self.cols)
    }

    fn slot(&self, cell: CellCoordinate) -> Option<usize> {
        (cell.row < self.rows && cell.col < self.cols).then(|| cell.index(self.cols))
    }

    pub fn get(&self, cell: CellCoordinate) -> Option<&CardState> {
        self.slot(cell).and_then(|i| self.cells[i].as_ref())
    }

    #[cfg(test)]
    pub fn status(&self, cell: CellCoordinate) -> CardStatus {
        self.get(cell).map(|s| s.status).unwrap_or_default()
    }

    pub fn best_gold(&self, cell: CellCoordinate) -> u32 {
        self.get(cell).map(|s| s.best_gold).unwrap_or(0)
    }

    fn entry(&mut self, cell: CellCoordinate) -> Option<&mut CardState> {
        let i = self.slot(cell)?;
        Some(self.cells[i].get_or_insert_with(CardState::default))
    }

    /// Records a stable dark frame. Gold cells keep their status.
    pub fn observe_face_down(&mut self, cell: CellCoordinate) {
        if let Some(state) = self.entry(cell) {
            if state.status != CardStatus::Gold {
                state.status = CardStatus::FaceDown;
            }
        }
    }

    /// Records a flipped card whose gold count did not qualify.
    pub fn observe_flipped(&mut self, cell: CellCoordinate) {
        if let Some(state) = self.entry(cell) {
            if state.status == CardStatus::FaceDown {
                state.status = CardStatus::Unknown;
            }
        }
    }

    /// Raises the cell's best gold count and marks it gold.
    ///
    /// Returns false (and changes nothing) unless `count` beats the recorded best.
    pub fn record_gold(&mut self, cell: CellCoordinate, count: u32) -> bool {
        let Some(state) = self.entry(cell) else {
            return false;
        };
        if count <= state.best_gold {
            return false;
        }
        state.best_gold = count;
        state.status = CardStatus::Gold;
        true
    }

    /// Number of cells currently marked gold.
    pub fn gold_cells(&self) -> usize {
        self.cells
            .iter()
            .flatten()
            .filter(|s| s.status == CardStatus::Gold)
            .count()
    }

    /// Forgets every cell.
    pub fn reset(&mut self) {
        self.cells.iter_mut().for_each(|c| *c = None);
    }
}
