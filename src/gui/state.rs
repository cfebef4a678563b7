//! GUI application state management.
//!
//! Tracks user input values and tracker status for display.

use crate::tracker::StatsSnapshot;

/// Tracker status for display in GUI.
#[derive(Clone, Debug, Default, PartialEq)]
pub enum TrackerStatus {
    /// Not tracking; the overlay can be moved
    #[default]
    Stopped,
    /// Tracking; the overlay is locked and click-through
    Running,
    /// Last action failed
    Error(String),
}

impl TrackerStatus {
    /// Get display text for current status.
    pub fn status_text(&self, stats: &StatsSnapshot) -> String {
        match self {
            Self::Stopped => "Stopped - Overlay Movable".to_string(),
            Self::Running => format!(
                "Running - Overlay LOCKED | {} gold | {} cycles | {} ms",
                stats.gold_cells, stats.cycles, stats.last_cycle_ms
            ),
            Self::Error(msg) => format!("Error: {}", msg),
        }
    }

    pub fn is_running(&self) -> bool {
        matches!(self, Self::Running)
    }
}

/// GUI application state.
#[derive(Debug)]
pub struct GuiState {
    /// Selected resolution preset.
    pub preset: String,
    /// Gap values being edited (applied with "Apply Gaps").
    pub gap_x: u32,
    pub gap_y: u32,
    /// Overlay is click-through while locked.
    pub locked: bool,
    pub status: TrackerStatus,
    /// Latest counters from the tracker.
    pub stats: StatsSnapshot,
}

impl GuiState {
    pub fn new(preset: String, gap_x: u32, gap_y: u32) -> Self {
        Self {
            preset,
            gap_x,
            gap_y,
            locked: false,
            status: TrackerStatus::Stopped,
            stats: StatsSnapshot::default(),
        }
    }

    pub fn status_text(&self) -> String {
        self.status.status_text(&self.stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_text_includes_counters_while_running() {
        let mut state = GuiState::new("FHD".to_string(), 0, 0);
        assert_eq!(state.status_text(), "Stopped - Overlay Movable");

        state.status = TrackerStatus::Running;
        state.stats = StatsSnapshot {
            cycles: 120,
            last_cycle_ms: 14,
            gold_cells: 2,
            capture_failures: 0,
        };
        assert_eq!(state.status_text(), "Running - Overlay LOCKED | 2 gold | 120 cycles | 14 ms");
        assert!(state.status.is_running());

        state.status = TrackerStatus::Error("no screen".to_string());
        assert_eq!(state.status_text(), "Error: no screen");
    }
}
