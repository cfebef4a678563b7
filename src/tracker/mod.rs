//! Gold card tracking.
//!
//! Watches the card grid, waits for each card to settle, and reports cards
//! whose gold indicator beats their previous best to the overlay.
//!
//! ## Module Structure
//!
//! - `config`: resolution presets and thresholds loaded from config.json
//! - `classifier`: flip brightness and gold pixel counting
//! - `stability`: per-cell frame stability gate
//! - `render`: render requests and the overlay command queue
//! - `cycle`: one capture-and-classify pass over the grid
//! - `runner`: background worker with start/stop/reset

pub mod classifier;
pub mod config;
pub mod cycle;
pub mod render;
pub mod runner;
pub mod stability;

pub use config::{init_config, TrackerConfig};
pub use cycle::TrackerLoop;
pub use render::{create_overlay_queue, OverlayCommand, OverlaySender};
pub use runner::{StatsSnapshot, TrackerHandle};
