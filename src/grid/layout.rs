//! Grid layout shared between the UI and the tracker worker.
//!
//! The UI owns the geometry (preset, gaps, overlay position) and publishes it
//! here; the tracker takes one snapshot at the start of every cycle.

use std::sync::{Arc, Mutex};

use super::geometry::{GridConfig, ScreenPoint};

/// Grid configuration plus the overlay's physical screen position.
#[derive(Clone, Debug, PartialEq)]
pub struct GridLayout {
    pub config: GridConfig,
    pub origin: ScreenPoint,
}

/// Supplies the grid layout to use for the next cycle.
pub trait GridConfigProvider: Send + Sync {
    fn snapshot(&self) -> GridLayout;
}

impl GridConfigProvider for GridLayout {
    fn snapshot(&self) -> GridLayout {
        self.clone()
    }
}

/// Mutex-backed layout the UI thread can update while tracking runs.
#[derive(Clone, Debug)]
pub struct SharedLayout {
    inner: Arc<Mutex<GridLayout>>,
}

impl SharedLayout {
    pub fn new(layout: GridLayout) -> Self {
        Self {
            inner: Arc::new(Mutex::new(layout)),
        }
    }

    /// Replaces the grid configuration, keeping the origin.
    pub fn set_config(&self, config: GridConfig) {
        let mut layout = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        layout.config = config;
    }

    /// Moves the grid origin. Returns true if it changed.
    pub fn set_origin(&self, origin: ScreenPoint) -> bool {
        let mut layout = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        let changed = layout.origin != origin;
        layout.origin = origin;
        changed
    }
}

impl GridConfigProvider for SharedLayout {
    fn snapshot(&self) -> GridLayout {
        self.inner.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }
}
