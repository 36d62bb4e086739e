//! The immutable record a session produces, and where it goes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use tracing::info;

/// Everything a finished session hands to persistence.
///
/// Built once by the session at finalization; there are no setters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Submission {
    exam_id: String,
    student_id: String,
    answers: BTreeMap<u32, String>,
    keystroke_pattern: Vec<DateTime<Utc>>,
    alerts: Vec<String>,
    time_spent_seconds: u64,
}

impl Submission {
    pub(crate) fn assemble(
        exam_id: String,
        student_id: String,
        answers: BTreeMap<u32, String>,
        keystroke_pattern: Vec<DateTime<Utc>>,
        alerts: Vec<String>,
        time_spent_seconds: u64,
    ) -> Self {
        Self {
            exam_id,
            student_id,
            answers,
            keystroke_pattern,
            alerts,
            time_spent_seconds,
        }
    }

    pub fn exam_id(&self) -> &str {
        &self.exam_id
    }

    pub fn student_id(&self) -> &str {
        &self.student_id
    }

    /// Answers keyed by question id.
    pub fn answers(&self) -> &BTreeMap<u32, String> {
        &self.answers
    }

    /// Retained keystroke timestamps, oldest first.
    pub fn keystroke_pattern(&self) -> &[DateTime<Utc>] {
        &self.keystroke_pattern
    }

    /// Every alert reason raised during the session, oldest first.
    pub fn alerts(&self) -> &[String] {
        &self.alerts
    }

    pub fn time_spent_seconds(&self) -> u64 {
        self.time_spent_seconds
    }
}

/// Persistence failures. These never affect the session's outcome.
#[derive(Debug, thiserror::Error)]
pub enum PersistError {
    #[error("failed to write submission: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to serialize submission: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("submission rejected: {0}")]
    Rejected(String),
}

/// Receives the submission once a session is submitted.
pub trait SubmissionSink: Send {
    fn persist(&mut self, submission: &Submission) -> Result<(), PersistError>;
}

/// Writes each submission to its own pretty-printed JSON file.
#[derive(Debug, Clone)]
pub struct JsonFileSink {
    dir: PathBuf,
    written: Vec<PathBuf>,
}

impl JsonFileSink {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            written: Vec::new(),
        }
    }

    /// Files written so far.
    pub fn written(&self) -> &[PathBuf] {
        &self.written
    }
}

impl SubmissionSink for JsonFileSink {
    fn persist(&mut self, submission: &Submission) -> Result<(), PersistError> {
        std::fs::create_dir_all(&self.dir)?;

        let path = self.dir.join(format!(
            "submission_{}_{}_{}.json",
            submission.exam_id(),
            submission.student_id(),
            Utc::now().format("%Y%m%d_%H%M%S")
        ));
        let json = serde_json::to_string_pretty(submission)?;
        std::fs::write(&path, json)?;

        info!("Submission written to {:?}", path);
        self.written.push(path);
        Ok(())
    }
}

/// Keeps submissions in memory. Clones share the same store.
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    store: Arc<Mutex<Vec<Submission>>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Everything persisted so far.
    pub fn submissions(&self) -> Vec<Submission> {
        self.store
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }
}

impl SubmissionSink for MemorySink {
    fn persist(&mut self, submission: &Submission) -> Result<(), PersistError> {
        self.store
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(submission.clone());
        Ok(())
    }
}
