//! Screen region sources and the capture timeout wrapper.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use thiserror::Error;

use super::buffer::PixelBuffer;
use crate::grid::CellRect;

/// Why a region could not be captured. Never fatal to the tracker.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CaptureError {
    #[error("region {0:?} lies outside the capturable screen")]
    OutOfBounds(CellRect),

    #[error("region {0:?} is empty")]
    EmptyRegion(CellRect),

    #[error("platform capture failed: {0}")]
    Platform(String),

    #[error("capture did not complete within {0:?}")]
    Timeout(Duration),

    #[error("previous capture is still in progress")]
    Busy,

    #[error("capture thread is gone")]
    Disconnected,

    #[error("screen capture is not supported on this platform")]
    Unsupported,
}

/// Provides the pixels currently shown in a screen rectangle.
pub trait ScreenRegionSource: Send {
    fn capture(&mut self, rect: CellRect) -> Result<PixelBuffer, CaptureError>;
}

impl<S: ScreenRegionSource + ?Sized> ScreenRegionSource for Box<S> {
    fn capture(&mut self, rect: CellRect) -> Result<PixelBuffer, CaptureError> {
        (**self).capture(rect)
    }
}

struct CaptureRequest {
    rect: CellRect,
    reply: Sender<Result<PixelBuffer, CaptureError>>,
}

/// Runs captures of an inner source on a dedicated thread with a deadline.
///
/// A capture that misses the deadline reports `Timeout`; until it finally
/// returns, further requests fail fast with `Busy` instead of queueing.
pub struct TimeoutSource {
    requests: Sender<CaptureRequest>,
    in_flight: Arc<AtomicBool>,
    timeout: Duration,
}

impl TimeoutSource {
    pub fn new<S: ScreenRegionSource + 'static>(mut inner: S, timeout: Duration) -> Self {
        let (requests, receiver) = mpsc::channel::<CaptureRequest>();
        let in_flight = Arc::new(AtomicBool::new(false));
        let worker_flag = in_flight.clone();

        let spawned = thread::Builder::new()
            .name("screen-capture".to_string())
            .spawn(move || {
                // Exits once the owning TimeoutSource drops its sender
                while let Ok(request) = receiver.recv() {
                    let result = inner.capture(request.rect);
                    worker_flag.store(false, Ordering::SeqCst);
                    let _ = request.reply.send(result);
                }
                log::debug!("Capture thread finished");
            });
        // Without a thread every request reports Disconnected
        if let Err(e) = spawned {
            log::error!("Failed to spawn capture thread: {}", e);
        }

        Self {
            requests,
            in_flight,
            timeout,
        }
    }
}

impl ScreenRegionSource for TimeoutSource {
    fn capture(&mut self, rect: CellRect) -> Result<PixelBuffer, CaptureError> {
        if self.in_flight.swap(true, Ordering::SeqCst) {
            return Err(CaptureError::Busy);
        }

        let (reply, response) = mpsc::channel();
        if self.requests.send(CaptureRequest { rect, reply }).is_err() {
            self.in_flight.store(false, Ordering::SeqCst);
            return Err(CaptureError::Disconnected);
        }

        match response.recv_timeout(self.timeout) {
            Ok(result) => result,
            Err(RecvTimeoutError::Timeout) => Err(CaptureError::Timeout(self.timeout)),
            Err(RecvTimeoutError::Disconnected) => {
                self.in_flight.store(false, Ordering::SeqCst);
                Err(CaptureError::Disconnected)
            }
        }
    }
}
