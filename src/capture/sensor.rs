//! Scoped ownership of the session's camera stream.

use crate::capture::device::CameraDevice;
use crate::capture::types::{CaptureError, CaptureState, StreamHandle};
use tracing::{debug, error, info, warn};

/// Exclusive owner of one camera stream for the lifetime of a session.
///
/// `release` is idempotent and also runs on drop, so a stream can never
/// outlive the `SensorCapture` that opened it.
pub struct SensorCapture {
    device: Box<dyn CameraDevice>,
    stream: Option<StreamHandle>,
    state: CaptureState,
}

impl SensorCapture {
    /// Create a capture around a camera device. Nothing is opened yet.
    pub fn new(device: Box<dyn CameraDevice>) -> Self {
        Self {
            device,
            stream: None,
            state: CaptureState::Idle,
        }
    }

    /// Try to open the camera stream.
    ///
    /// A failure leaves the capture in [`CaptureState::Unavailable`]; callers
    /// are expected to continue without video rather than abort.
    pub fn acquire(&mut self) -> Result<(), CaptureError> {
        if self.stream.is_some() {
            return Err(CaptureError::AlreadyAcquired);
        }

        if !self.device.check_permission() {
            warn!("Camera permission not granted, continuing without video");
            self.state = CaptureState::Unavailable;
            return Err(CaptureError::PermissionDenied);
        }

        match self.device.open() {
            Ok(handle) => {
                info!(stream = %handle.id(), "Camera stream acquired");
                self.stream = Some(handle);
                self.state = CaptureState::Streaming;
                Ok(())
            }
            Err(e) => {
                warn!("Camera unavailable, continuing without video: {}", e);
                self.state = CaptureState::Unavailable;
                Err(e)
            }
        }
    }

    /// Close the stream if one is held.
    ///
    /// Safe to call any number of times, including after a failed `acquire`.
    /// The handle is given up even when the device fails to close it, so a
    /// failure is reported exactly once.
    pub fn release(&mut self) -> Result<(), CaptureError> {
        let Some(handle) = self.stream.take() else {
            if self.state != CaptureState::Released {
                debug!("Camera release with no open stream");
            }
            self.state = CaptureState::Released;
            return Ok(());
        };

        let id = handle.id();
        self.state = CaptureState::Released;
        match self.device.close(handle) {
            Ok(()) => {
                info!(stream = %id, "Camera stream released");
                Ok(())
            }
            Err(e) => {
                error!(stream = %id, "Camera stream could not be released: {}", e);
                Err(e)
            }
        }
    }

    /// Whether a stream is currently held.
    pub fn is_streaming(&self) -> bool {
        self.stream.is_some()
    }

    /// Whether the session lost the video channel at acquisition.
    pub fn is_degraded(&self) -> bool {
        self.state == CaptureState::Unavailable
    }

    pub fn state(&self) -> CaptureState {
        self.state
    }
}

impl Drop for SensorCapture {
    fn drop(&mut self) {
        if self.stream.is_some() {
            let _ = self.release();
        }
    }
}
