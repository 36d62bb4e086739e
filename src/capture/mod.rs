//! Camera capture for proctored sessions.
//!
//! This module owns the exclusive camera stream a session holds while it is
//! active. Real frame analysis is out of scope; devices only need to open and
//! close a stream so the session can guarantee release on every exit path.

pub mod device;
pub mod sensor;
pub mod types;

// Re-export commonly used types
pub use device::{CameraDevice, NoopCamera, StreamMonitor, UnavailableCamera};
pub use sensor::SensorCapture;
pub use types::{CaptureError, CaptureState, StreamHandle};
