//! Card grid model.
//!
//! This module provides:
//! - Cell geometry (`cell_rect`, `relative_rect`, `bounding_rect`)
//! - Per-cell card state (`GridState`)
//! - The layout the UI shares with the tracker (`SharedLayout`)

pub mod geometry;
pub mod layout;
pub mod state;

pub use geometry::{
    bounding_rect, cell_rect, relative_rect, CellCoordinate, CellRect, GeometryError, GridConfig,
    ScreenPoint,
};
pub use layout::{GridConfigProvider, GridLayout, SharedLayout};
pub use state::GridState;
