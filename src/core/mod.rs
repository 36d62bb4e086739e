//! Core session engine.
//!
//! This module contains:
//! - The countdown and time sources
//! - Keystroke recording and timing analysis
//! - Integrity alert sampling
//! - Exam definitions
//! - The session state machine and the submission it produces

pub mod alerts;
pub mod clock;
pub mod exam;
pub mod keystroke;
pub mod session;
pub mod submission;

// Re-export commonly used types
pub use alerts::{
    AlertEvent, AlertGenerator, CatalogDetector, ScriptedDetector, SessionSignals,
    SignalDetector, ALERT_CATALOG,
};
pub use clock::{format_remaining, Clock, ClockEvent, ManualClock, SessionClock, SystemClock};
pub use exam::{ExamDefinition, ExamError, Question, LOW_TIME_WARNING};
pub use keystroke::{KeystrokeEvent, KeystrokeRecorder, KeystrokeTiming};
pub use session::{
    ExamSession, SessionBuilder, SessionError, SessionEvent, SessionSettings, SessionState,
    SubmitOutcome,
};
pub use submission::{JsonFileSink, MemorySink, PersistError, Submission, SubmissionSink};
