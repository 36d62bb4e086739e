//! Single-threaded driver for one exam session.
//!
//! The runner owns the session and interleaves presentation commands with
//! timer polls on one thread, so every mutation happens inside a single
//! callback.

use crate::audit::SharedAuditLog;
use crate::core::{ExamSession, KeystrokeTiming, SessionState, Submission};
use crossbeam_channel::{Receiver, RecvTimeoutError};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Requests from the presentation layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    EditAnswer { question_id: u32, text: String },
    Keystroke,
    Submit,
    Abort { reason: String },
}

/// How a run ended.
#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub state: SessionState,
    pub submission: Option<Submission>,
    /// Timing of the retained keystroke history
    pub keystroke_timing: KeystrokeTiming,
    /// Set when teardown could not release a resource
    pub integrity_fault: Option<String>,
}

pub struct SessionRunner {
    session: ExamSession,
    commands: Receiver<Command>,
    poll_interval: Duration,
    running: Arc<AtomicBool>,
    audit: Option<SharedAuditLog>,
}

impl SessionRunner {
    pub fn new(session: ExamSession, commands: Receiver<Command>, poll_interval: Duration) -> Self {
        Self {
            session,
            commands,
            poll_interval: poll_interval.max(Duration::from_millis(1)),
            running: Arc::new(AtomicBool::new(true)),
            audit: None,
        }
    }

    pub fn with_audit(mut self, audit: SharedAuditLog) -> Self {
        self.audit = Some(audit);
        self
    }

    /// Clearing this flag aborts the session at the next poll.
    pub fn running_flag(&self) -> Arc<AtomicBool> {
        self.running.clone()
    }

    pub fn session(&self) -> &ExamSession {
        &self.session
    }

    /// Start the session and drive it until it reaches a terminal state.
    pub fn run(mut self) -> RunOutcome {
        self.session.start();

        while !self.session.state().is_terminal() {
            if !self.running.load(Ordering::SeqCst) {
                info!("Interrupted, aborting session");
                self.abort("interrupted");
                break;
            }

            match self.commands.recv_timeout(self.poll_interval) {
                Ok(command) => self.handle(command),
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => {
                    warn!("Command channel closed, aborting session");
                    self.abort("presentation disconnected");
                    break;
                }
            }

            if let Err(e) = self.session.poll() {
                debug!("Poll finished with error: {}", e);
            }
        }

        RunOutcome {
            state: self.session.state(),
            submission: self.session.submission().cloned(),
            keystroke_timing: self.session.keystrokes().timing(),
            integrity_fault: self.session.integrity_fault().map(str::to_string),
        }
    }

    fn handle(&mut self, command: Command) {
        match command {
            Command::EditAnswer { question_id, text } => {
                match self.session.edit_answer(question_id, text) {
                    Ok(()) => {
                        if let Some(audit) = &self.audit {
                            audit.record_answer_edit();
                        }
                    }
                    Err(e) => debug!("Edit not applied: {}", e),
                }
            }
            Command::Keystroke => {
                self.session.record_keystroke();
                if let Some(audit) = &self.audit {
                    audit.record_keystroke();
                }
            }
            Command::Submit => match self.session.submit() {
                Ok(outcome) => debug!("Submit request: {:?}", outcome),
                Err(e) => debug!("Submitted with error: {}", e),
            },
            Command::Abort { reason } => self.abort(&reason),
        }
    }

    fn abort(&mut self, reason: &str) {
        if let Err(e) = self.session.abort(reason) {
            debug!("Aborted with error: {}", e);
        }
    }
}
