//! Camera device capabilities.
//!
//! A session never talks to hardware directly; it is handed a
//! [`CameraDevice`] at construction. The noop camera exists so the crate (and
//! binary) run anywhere without a media stack, and doubles as an observable
//! test device.

use crate::capture::types::{CaptureError, StreamHandle};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Capability to open and close a camera stream.
pub trait CameraDevice: Send {
    /// Open a stream. Fails when permission is denied or no device exists.
    fn open(&mut self) -> Result<StreamHandle, CaptureError>;

    /// Close a previously opened stream.
    fn close(&mut self, handle: StreamHandle) -> Result<(), CaptureError>;

    /// Whether the platform has granted camera access.
    fn check_permission(&self) -> bool {
        true
    }
}

/// Shared view of how many streams a device currently has open.
#[derive(Debug, Clone, Default)]
pub struct StreamMonitor {
    open: Arc<AtomicUsize>,
}

impl StreamMonitor {
    /// Number of streams currently open.
    pub fn open_streams(&self) -> usize {
        self.open.load(Ordering::SeqCst)
    }

    /// Whether any stream is open.
    pub fn is_streaming(&self) -> bool {
        self.open_streams() > 0
    }
}

/// A camera that opens streams but never produces frames.
pub struct NoopCamera {
    monitor: StreamMonitor,
    fail_close: bool,
}

impl NoopCamera {
    /// Create a new noop camera.
    pub fn new() -> Self {
        Self {
            monitor: StreamMonitor::default(),
            fail_close: false,
        }
    }

    /// Make every `close` fail, simulating a stuck device.
    pub fn with_failing_close(mut self) -> Self {
        self.fail_close = true;
        self
    }

    /// Get a monitor observing this camera's open streams.
    pub fn monitor(&self) -> StreamMonitor {
        self.monitor.clone()
    }
}

impl Default for NoopCamera {
    fn default() -> Self {
        Self::new()
    }
}

impl CameraDevice for NoopCamera {
    fn open(&mut self) -> Result<StreamHandle, CaptureError> {
        self.monitor.open.fetch_add(1, Ordering::SeqCst);
        Ok(StreamHandle::new())
    }

    fn close(&mut self, handle: StreamHandle) -> Result<(), CaptureError> {
        if self.fail_close {
            return Err(CaptureError::CloseFailed(format!(
                "device did not release stream {}",
                handle.id()
            )));
        }
        self.monitor.open.fetch_sub(1, Ordering::SeqCst);
        Ok(())
    }
}

/// A camera that can never be opened.
pub struct UnavailableCamera {
    reason: CaptureError,
}

impl UnavailableCamera {
    /// The user refused camera access.
    pub fn permission_denied() -> Self {
        Self {
            reason: CaptureError::PermissionDenied,
        }
    }

    /// No camera is attached.
    pub fn no_device() -> Self {
        Self {
            reason: CaptureError::NoDevice,
        }
    }
}

impl CameraDevice for UnavailableCamera {
    fn open(&mut self) -> Result<StreamHandle, CaptureError> {
        Err(self.reason.clone())
    }

    fn close(&mut self, _handle: StreamHandle) -> Result<(), CaptureError> {
        Ok(())
    }

    fn check_permission(&self) -> bool {
        self.reason != CaptureError::PermissionDenied
    }
}
