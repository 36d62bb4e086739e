//! Exam Proctor - timed exam sessions with integrity monitoring.
//!
//! This library runs a single student's timed exam: it counts down, holds the
//! camera stream, records keystroke timing, samples integrity alerts, and on
//! submit or expiry assembles one immutable [`Submission`]. A separate,
//! stateless scorer turns aggregated signals into an instructor-facing risk
//! classification.
//!
//! # Monitoring Guarantees
//!
//! - **Timing only**: keystrokes are recorded as timestamps, never key content
//! - **Bounded retention**: the last 20 keystrokes and every alert reason
//! - **No stray streams**: every path out of a session releases the camera
//! - **Transparency**: all monitoring is counted in an auditable log
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                         Exam Session                         │
//! ├──────────────────────────────────────────────────────────────┤
//! │  ┌─────────────┐   ┌─────────────┐   ┌─────────────┐         │
//! │  │   Session   │   │   Alert     │   │  Keystroke  │         │
//! │  │    Clock    │   │  Generator  │   │  Recorder   │         │
//! │  └─────────────┘   └─────────────┘   └─────────────┘         │
//! │         │                 │                 │                │
//! │         ▼                 ▼                 ▼                │
//! │  ┌──────────────────────────────────────────────────┐       │
//! │  │        ExamSession (submission assembler)         │◀─ Sensor
//! │  └──────────────────────────────────────────────────┘   Capture
//! │         │                                   │                │
//! │         ▼                                   ▼                │
//! │  ┌─────────────┐                     ┌─────────────┐         │
//! │  │ Submission  │                     │   Audit     │         │
//! │  │    Sink     │                     │    Log      │         │
//! │  └─────────────┘                     └─────────────┘         │
//! └──────────────────────────────────────────────────────────────┘
//!
//!   offline:  StudentSignalReport ──▶ RiskScoringEngine ──▶ status
//! ```
//!
//! # Example
//!
//! ```no_run
//! use exam_proctor::{core, identity::{Identity, Role}};
//!
//! let student = Identity::new("stu1", Role::Student, "Student alice");
//! let (mut session, events) =
//!     core::SessionBuilder::new(core::ExamDefinition::sample(), student)
//!         .build()
//!         .expect("student identity");
//!
//! session.start();
//! session.edit_answer(1, "Encapsulation, inheritance, polymorphism").ok();
//! session.submit().ok();
//!
//! for event in events.try_iter() {
//!     println!("{event:?}");
//! }
//! ```

pub mod audit;
pub mod capture;
pub mod config;
pub mod core;
pub mod identity;
pub mod risk;
pub mod runner;

// Re-export key types at crate root for convenience
pub use audit::{AuditLog, AuditStats, SharedAuditLog};
pub use capture::{CameraDevice, CaptureError, SensorCapture};
pub use config::{Config, ConfigError};
pub use core::{
    ExamDefinition, ExamSession, SessionBuilder, SessionError, SessionEvent, SessionState,
    Submission,
};
pub use identity::{AuthError, Identity, IdentityProvider, Role};
pub use risk::{RiskScoringEngine, RiskStatus, StudentSignalReport};
pub use runner::{Command, RunOutcome, SessionRunner};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Monitoring notice shown to the student before a session starts.
pub const MONITORING_NOTICE: &str = r#"
╔══════════════════════════════════════════════════════════════════╗
║              EXAM PROCTOR - MONITORING NOTICE                    ║
╠══════════════════════════════════════════════════════════════════╣
║                                                                  ║
║  This exam is timed and monitored for academic integrity.        ║
║                                                                  ║
║  ✓ WHAT IS MONITORED:                                            ║
║    • Your camera stream, for the duration of the exam            ║
║    • When you type (timing of the last 20 keystrokes only)       ║
║    • Integrity alerts raised during the session                  ║
║                                                                  ║
║  ✗ WHAT IS NEVER RECORDED:                                       ║
║    • Which keys you press                                        ║
║    • Camera frames or audio                                      ║
║    • Anything after the exam is submitted                        ║
║                                                                  ║
║  The exam submits automatically when time runs out. Your         ║
║  answers, keystroke timing and alerts form your submission.      ║
║                                                                  ║
║  You can review monitoring counts anytime with:                  ║
║    exam-proctor notice                                           ║
║                                                                  ║
╚══════════════════════════════════════════════════════════════════╝
"#;
