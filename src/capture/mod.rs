//! Screen region capture.
//!
//! This module provides:
//! - RGB pixel buffers and cropping helpers (`PixelBuffer`, `crop`)
//! - The capture provider interface (`ScreenRegionSource`, `CaptureError`)
//! - A deadline wrapper for blocking captures (`TimeoutSource`)
//! - The platform backend (`platform_source`)

pub mod buffer;
pub mod screen;
pub mod source;

pub use buffer::{crop, rows_below_with_alpha, PixelBuffer};
pub use screen::platform_source;
pub use source::{CaptureError, ScreenRegionSource, TimeoutSource};
