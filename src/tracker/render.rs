//! Render requests passed from the tracker thread to the overlay.
//!
//! Uses a std::sync::mpsc channel: the tracker worker queues commands and the
//! UI thread drains them on its next frame, so tracking never waits on drawing.

use image::RgbaImage;
use std::sync::mpsc::{channel, Receiver, Sender};

use crate::grid::CellCoordinate;

/// Annotation for one cell: the card image below the scan strip.
#[derive(Clone, Debug)]
pub struct RenderRequest {
    pub cell: CellCoordinate,
    /// Cropped card rows tagged with the overlay alpha
    pub image: RgbaImage,
    /// Rows from the padded card top to where `image` starts
    pub y_offset: u32,
}

/// Receives annotations from the tracker. Calls must not block.
pub trait CellRenderer: Send + Sync {
    /// Shows or replaces the annotation of one cell.
    fn render_cell(&self, request: RenderRequest);

    /// Removes every annotation.
    fn clear_all(&self);
}

/// A queued overlay update.
#[derive(Clone, Debug)]
pub enum OverlayCommand {
    Render(RenderRequest),
    ClearAll,
}

/// `CellRenderer` that queues commands for the UI thread.
pub struct OverlaySender {
    sender: Sender<OverlayCommand>,
    notify: Box<dyn Fn() + Send + Sync>,
}

impl OverlaySender {
    /// `notify` runs after every queued command, e.g. to wake the UI.
    pub fn new(sender: Sender<OverlayCommand>, notify: impl Fn() + Send + Sync + 'static) -> Self {
        Self {
            sender,
            notify: Box::new(notify),
        }
    }

    fn send(&self, command: OverlayCommand) {
        // A closed channel means the overlay is gone; nothing left to draw on
        if self.sender.send(command).is_ok() {
            (self.notify)();
        }
    }
}

impl CellRenderer for OverlaySender {
    fn render_cell(&self, request: RenderRequest) {
        self.send(OverlayCommand::Render(request));
    }

    fn clear_all(&self) {
        self.send(OverlayCommand::ClearAll);
    }
}

/// Creates the overlay command queue.
pub fn create_overlay_queue() -> (Sender<OverlayCommand>, Receiver<OverlayCommand>) {
    channel()
}
