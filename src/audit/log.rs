//! Monitoring audit log.
//!
//! Counts what the proctor observed across runs so the student can see
//! exactly how much monitoring took place. Only counts are kept; no answer
//! text, key content or video is stored here.

use crate::core::{SessionEvent, SessionState};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::warn;

/// Monitoring counters for the current run.
#[derive(Debug)]
pub struct AuditLog {
    /// Keystrokes recorded
    keystrokes: AtomicU64,
    /// Answer edits accepted
    answer_edits: AtomicU64,
    /// Integrity alerts raised
    alerts_raised: AtomicU64,
    /// Sessions submitted
    submissions: AtomicU64,
    /// Sessions aborted
    aborts: AtomicU64,
    started_at: DateTime<Utc>,
    persist_path: Option<PathBuf>,
}

impl AuditLog {
    pub fn new() -> Self {
        Self {
            keystrokes: AtomicU64::new(0),
            answer_edits: AtomicU64::new(0),
            alerts_raised: AtomicU64::new(0),
            submissions: AtomicU64::new(0),
            aborts: AtomicU64::new(0),
            started_at: Utc::now(),
            persist_path: None,
        }
    }

    /// Create a log that continues from, and saves back to, `path`.
    pub fn with_persistence(path: PathBuf) -> Self {
        let mut log = Self::new();
        log.persist_path = Some(path);

        if let Err(e) = log.load() {
            warn!("Could not load previous audit counts: {}", e);
        }

        log
    }

    pub fn record_keystroke(&self) {
        self.keystrokes.fetch_add(1, Ordering::Relaxed);
    }

    /// An accepted answer edit also counts as a keystroke.
    pub fn record_answer_edit(&self) {
        self.answer_edits.fetch_add(1, Ordering::Relaxed);
        self.record_keystroke();
    }

    pub fn record_alert(&self) {
        self.alerts_raised.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_submission(&self) {
        self.submissions.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_abort(&self) {
        self.aborts.fetch_add(1, Ordering::Relaxed);
    }

    /// Update counters from a session event.
    pub fn observe(&self, event: &SessionEvent) {
        match event {
            SessionEvent::Alert(_) => self.record_alert(),
            SessionEvent::Submitted { .. } => self.record_submission(),
            SessionEvent::StateChanged {
                to: SessionState::Aborted,
                ..
            } => self.record_abort(),
            _ => {}
        }
    }

    pub fn stats(&self) -> AuditStats {
        AuditStats {
            keystrokes: self.keystrokes.load(Ordering::Relaxed),
            answer_edits: self.answer_edits.load(Ordering::Relaxed),
            alerts_raised: self.alerts_raised.load(Ordering::Relaxed),
            submissions: self.submissions.load(Ordering::Relaxed),
            aborts: self.aborts.load(Ordering::Relaxed),
            started_at: self.started_at,
            duration_secs: (Utc::now() - self.started_at).num_seconds().max(0) as u64,
        }
    }

    /// Human-readable summary for the student.
    pub fn summary(&self) -> String {
        let stats = self.stats();
        format!(
            "Monitoring Summary:\n\
             - Keystrokes timed: {}\n\
             - Answer edits: {}\n\
             - Integrity alerts raised: {}\n\
             - Sessions submitted: {}\n\
             - Sessions aborted: {}\n\
             - Run duration: {} seconds\n\
             \n\
             Retention:\n\
             - Keystroke timing only, never key content\n\
             - Camera frames are not recorded",
            stats.keystrokes,
            stats.answer_edits,
            stats.alerts_raised,
            stats.submissions,
            stats.aborts,
            stats.duration_secs
        )
    }

    /// Write cumulative counts to disk.
    pub fn save(&self) -> Result<(), std::io::Error> {
        if let Some(ref path) = self.persist_path {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }

            let stats = self.stats();
            let persisted = PersistedCounts {
                keystrokes: stats.keystrokes,
                answer_edits: stats.answer_edits,
                alerts_raised: stats.alerts_raised,
                submissions: stats.submissions,
                aborts: stats.aborts,
                last_updated: Utc::now(),
            };

            let json = serde_json::to_string_pretty(&persisted).map_err(std::io::Error::other)?;
            std::fs::write(path, json)?;
        }
        Ok(())
    }

    fn load(&mut self) -> Result<(), std::io::Error> {
        if let Some(ref path) = self.persist_path {
            if path.exists() {
                let content = std::fs::read_to_string(path)?;
                let persisted: PersistedCounts =
                    serde_json::from_str(&content).map_err(std::io::Error::other)?;

                self.keystrokes.store(persisted.keystrokes, Ordering::Relaxed);
                self.answer_edits
                    .store(persisted.answer_edits, Ordering::Relaxed);
                self.alerts_raised
                    .store(persisted.alerts_raised, Ordering::Relaxed);
                self.submissions
                    .store(persisted.submissions, Ordering::Relaxed);
                self.aborts.store(persisted.aborts, Ordering::Relaxed);
            }
        }
        Ok(())
    }
}

impl Default for AuditLog {
    fn default() -> Self {
        Self::new()
    }
}

/// Snapshot of the audit counters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditStats {
    pub keystrokes: u64,
    pub answer_edits: u64,
    pub alerts_raised: u64,
    pub submissions: u64,
    pub aborts: u64,
    pub started_at: DateTime<Utc>,
    pub duration_secs: u64,
}

#[derive(Debug, Serialize, Deserialize)]
struct PersistedCounts {
    keystrokes: u64,
    answer_edits: u64,
    alerts_raised: u64,
    submissions: u64,
    aborts: u64,
    last_updated: DateTime<Utc>,
}

/// Audit log shared between the runner and the presentation thread.
pub type SharedAuditLog = Arc<AuditLog>;
