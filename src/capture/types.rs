//! Camera stream handles and capture errors.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Opaque handle to an open camera stream.
///
/// Deliberately not `Clone`: exactly one owner may close a stream.
#[derive(Debug, PartialEq, Eq)]
pub struct StreamHandle {
    id: Uuid,
}

impl StreamHandle {
    pub fn new() -> Self {
        Self { id: Uuid::new_v4() }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }
}

impl Default for StreamHandle {
    fn default() -> Self {
        Self::new()
    }
}

/// Lifecycle of the capture resource within one session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CaptureState {
    /// Nothing acquired yet
    Idle,
    /// Stream open and owned by the session
    Streaming,
    /// Acquisition failed; session runs without video
    Unavailable,
    /// Stream closed (or never opened) and no longer usable
    Released,
}

/// Errors that can occur while acquiring or releasing the camera.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CaptureError {
    #[error("camera permission denied")]
    PermissionDenied,

    #[error("no camera device found")]
    NoDevice,

    #[error("camera stream is already acquired")]
    AlreadyAcquired,

    #[error("failed to close camera stream: {0}")]
    CloseFailed(String),
}
