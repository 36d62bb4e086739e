//! The exam session state machine.
//!
//! ```text
//! NotStarted ──start──▶ Active ──submit / expiry──▶ Finalizing ──▶ Submitted
//!                          │
//!                          └──abort / teardown──▶ Aborted
//! ```
//!
//! A session owns its countdown, camera stream, keystroke history and alert
//! sampler. Every path into a terminal state cancels both timers and releases
//! the camera before returning. Presentation updates go out over a channel
//! returned by [`SessionBuilder::build`].

use crate::capture::{CameraDevice, NoopCamera, SensorCapture};
use crate::core::alerts::{
    AlertEvent, AlertGenerator, ScriptedDetector, SessionSignals, SignalDetector,
    DEFAULT_ALERT_INTERVAL, DEFAULT_VISIBLE_ALERTS,
};
use crate::core::clock::{Clock, ClockEvent, SessionClock, SystemClock};
use crate::core::exam::{ExamDefinition, LOW_TIME_WARNING};
use crate::core::keystroke::{KeystrokeRecorder, DEFAULT_KEYSTROKE_CAPACITY};
use crate::core::submission::{MemorySink, Submission, SubmissionSink};
use crate::identity::Identity;
use crossbeam_channel::{unbounded, Receiver, Sender};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

/// Where a session is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    NotStarted,
    Active,
    Finalizing,
    Submitted,
    Aborted,
}

impl SessionState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, SessionState::Submitted | SessionState::Aborted)
    }
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            SessionState::NotStarted => "not started",
            SessionState::Active => "active",
            SessionState::Finalizing => "finalizing",
            SessionState::Submitted => "submitted",
            SessionState::Aborted => "aborted",
        };
        write!(f, "{name}")
    }
}

/// Updates for the presentation layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SessionEvent {
    StateChanged {
        from: SessionState,
        to: SessionState,
    },
    Tick {
        remaining_secs: u64,
    },
    Alert(AlertEvent),
    EditRejected {
        question_id: u32,
        reason: String,
    },
    Expired,
    Submitted {
        time_spent_seconds: u64,
    },
    ResourceLeak {
        detail: String,
    },
}

/// Result of a submit request that did not fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// This request produced the submission
    Submitted,
    /// The session had already reached a terminal state; nothing changed
    AlreadyFinished,
    /// The session has not started; nothing changed
    NotActive,
}

/// Session errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SessionError {
    #[error("only students can sit an exam")]
    NotAStudent,

    #[error("session is not active (currently {0})")]
    NotActive(SessionState),

    #[error("unknown question {0}")]
    UnknownQuestion(u32),

    #[error("answer to question {question_id} is {length} characters, limit is {max}")]
    InvalidAnswerLength {
        question_id: u32,
        length: usize,
        max: usize,
    },

    #[error("session resources were not released: {0}")]
    ResourceLeak(String),

    #[error("invalid session settings: {0}")]
    InvalidSettings(String),
}

/// Tunables for a session's monitoring channels.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionSettings {
    /// Cadence of the alert sampler
    pub alert_interval: Duration,
    /// Alerts kept visible for display
    pub visible_alerts: usize,
    /// Keystrokes retained for the submission
    pub keystroke_capacity: usize,
}

impl SessionSettings {
    /// Histories may shrink below their defaults but never grow past them.
    pub fn validate(&self) -> Result<(), SessionError> {
        if self.alert_interval.is_zero() {
            return Err(SessionError::InvalidSettings(
                "alert_interval must be positive".to_string(),
            ));
        }
        if !(1..=DEFAULT_VISIBLE_ALERTS).contains(&self.visible_alerts) {
            return Err(SessionError::InvalidSettings(format!(
                "visible_alerts must be between 1 and {}, got {}",
                DEFAULT_VISIBLE_ALERTS, self.visible_alerts
            )));
        }
        if !(1..=DEFAULT_KEYSTROKE_CAPACITY).contains(&self.keystroke_capacity) {
            return Err(SessionError::InvalidSettings(format!(
                "keystroke_capacity must be between 1 and {}, got {}",
                DEFAULT_KEYSTROKE_CAPACITY, self.keystroke_capacity
            )));
        }
        Ok(())
    }
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            alert_interval: DEFAULT_ALERT_INTERVAL,
            visible_alerts: DEFAULT_VISIBLE_ALERTS,
            keystroke_capacity: DEFAULT_KEYSTROKE_CAPACITY,
        }
    }
}

/// Assembles a session from its capabilities.
pub struct SessionBuilder {
    exam: ExamDefinition,
    identity: Identity,
    clock: Arc<dyn Clock>,
    camera: Box<dyn CameraDevice>,
    detector: Box<dyn SignalDetector>,
    sink: Box<dyn SubmissionSink>,
    settings: SessionSettings,
}

impl SessionBuilder {
    /// Start from the system clock, a noop camera, a silent detector and an
    /// in-memory sink.
    pub fn new(exam: ExamDefinition, identity: Identity) -> Self {
        Self {
            exam,
            identity,
            clock: Arc::new(SystemClock),
            camera: Box::new(NoopCamera::new()),
            detector: Box::new(ScriptedDetector::silent()),
            sink: Box::new(MemorySink::new()),
            settings: SessionSettings::default(),
        }
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn camera(mut self, camera: impl CameraDevice + 'static) -> Self {
        self.camera = Box::new(camera);
        self
    }

    pub fn detector(mut self, detector: impl SignalDetector + 'static) -> Self {
        self.detector = Box::new(detector);
        self
    }

    pub fn sink(mut self, sink: impl SubmissionSink + 'static) -> Self {
        self.sink = Box::new(sink);
        self
    }

    pub fn settings(mut self, settings: SessionSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Build the session and the receiver for its presentation events.
    pub fn build(self) -> Result<(ExamSession, Receiver<SessionEvent>), SessionError> {
        if !self.identity.is_student() {
            return Err(SessionError::NotAStudent);
        }
        self.settings.validate()?;

        let (events, receiver) = unbounded();
        let session = ExamSession {
            alerts: AlertGenerator::new(
                self.detector,
                self.settings.alert_interval,
                self.settings.visible_alerts,
            ),
            keystrokes: KeystrokeRecorder::new(self.settings.keystroke_capacity),
            sensor: SensorCapture::new(self.camera),
            countdown: SessionClock::new(),
            exam: self.exam,
            identity: self.identity,
            answers: BTreeMap::new(),
            state: SessionState::NotStarted,
            clock: self.clock,
            sink: self.sink,
            events,
            submission: None,
            integrity_fault: None,
        };
        Ok((session, receiver))
    }
}

/// One student's timed attempt at an exam.
pub struct ExamSession {
    exam: ExamDefinition,
    identity: Identity,
    answers: BTreeMap<u32, String>,
    state: SessionState,
    clock: Arc<dyn Clock>,
    countdown: SessionClock,
    sensor: SensorCapture,
    keystrokes: KeystrokeRecorder,
    alerts: AlertGenerator,
    sink: Box<dyn SubmissionSink>,
    events: Sender<SessionEvent>,
    submission: Option<Submission>,
    integrity_fault: Option<String>,
}

impl ExamSession {
    /// Enter `Active`: start the countdown, open the camera, start sampling.
    ///
    /// A camera failure is not fatal; it is raised once as an alert and the
    /// session continues without video. Calling this twice does nothing.
    pub fn start(&mut self) {
        if self.state != SessionState::NotStarted {
            debug!("Ignoring start in state {}", self.state);
            return;
        }

        let now = self.clock.now();
        self.transition(SessionState::Active);
        self.countdown.start(self.exam.duration, now);

        if let Err(e) = self.sensor.acquire() {
            let alert = self
                .alerts
                .raise(format!("Camera unavailable: {e}"), self.clock.wall());
            self.emit(SessionEvent::Alert(alert));
        }

        self.alerts.start(now);
        info!(
            exam = %self.exam.id,
            student = %self.identity.id,
            "Session started ({}s)",
            self.exam.duration.as_secs()
        );
    }

    /// Advance both timers to the current time.
    ///
    /// On expiry the session is submitted before this returns.
    pub fn poll(&mut self) -> Result<(), SessionError> {
        if self.state != SessionState::Active {
            return Ok(());
        }

        let now = self.clock.now();
        for event in self.countdown.poll(now) {
            match event {
                ClockEvent::Tick { remaining_secs } => {
                    self.emit(SessionEvent::Tick { remaining_secs });
                }
                ClockEvent::Expired => {
                    info!("Exam time expired, submitting");
                    self.emit(SessionEvent::Expired);
                    return self.finalize();
                }
            }
        }

        let signals = self.signals(now);
        if let Some(alert) = self.alerts.poll(now, self.clock.wall(), &signals) {
            warn!(sequence = alert.sequence, "Integrity alert: {}", alert.reason);
            self.emit(SessionEvent::Alert(alert));
        }
        Ok(())
    }

    /// Replace the answer to a question.
    ///
    /// Edits over the question's limit are rejected and never stored.
    pub fn edit_answer(
        &mut self,
        question_id: u32,
        text: impl Into<String>,
    ) -> Result<(), SessionError> {
        if self.state != SessionState::Active {
            return Err(SessionError::NotActive(self.state));
        }

        let text = text.into();
        let checked = match self.exam.question(question_id) {
            None => Err(SessionError::UnknownQuestion(question_id)),
            Some(q) if !q.accepts(&text) => Err(SessionError::InvalidAnswerLength {
                question_id,
                length: text.chars().count(),
                max: q.max_length,
            }),
            Some(_) => Ok(()),
        };

        if let Err(e) = checked {
            warn!("Rejected edit: {}", e);
            self.emit(SessionEvent::EditRejected {
                question_id,
                reason: e.to_string(),
            });
            return Err(e);
        }

        self.keystrokes.record(self.clock.wall());
        self.answers.insert(question_id, text);
        Ok(())
    }

    /// Record an input action without changing any answer.
    pub fn record_keystroke(&mut self) {
        if self.state == SessionState::Active {
            self.keystrokes.record(self.clock.wall());
        }
    }

    /// Submit the session.
    ///
    /// Repeated or premature requests are absorbed and reported through the
    /// outcome. An error means the submission was made but a resource could
    /// not be released.
    pub fn submit(&mut self) -> Result<SubmitOutcome, SessionError> {
        match self.state {
            SessionState::Active => {
                self.finalize()?;
                Ok(SubmitOutcome::Submitted)
            }
            SessionState::Submitted | SessionState::Aborted => {
                debug!("Duplicate submission ignored ({})", self.state);
                Ok(SubmitOutcome::AlreadyFinished)
            }
            SessionState::NotStarted | SessionState::Finalizing => {
                debug!("Submission ignored ({})", self.state);
                Ok(SubmitOutcome::NotActive)
            }
        }
    }

    /// Tear the session down without a submission.
    pub fn abort(&mut self, reason: &str) -> Result<(), SessionError> {
        if self.state.is_terminal() {
            return Ok(());
        }

        info!("Aborting session: {}", reason);
        let released = self.release_resources();
        self.transition(SessionState::Aborted);
        released
    }

    fn finalize(&mut self) -> Result<(), SessionError> {
        let now = self.clock.now();
        self.transition(SessionState::Finalizing);

        let submission = Submission::assemble(
            self.exam.id.clone(),
            self.identity.id.clone(),
            self.answers.clone(),
            self.keystrokes.timestamps(),
            self.alerts
                .history()
                .iter()
                .map(|a| a.reason.clone())
                .collect(),
            self.countdown.elapsed(now).as_secs(),
        );

        let released = self.release_resources();
        self.transition(SessionState::Submitted);

        if let Err(e) = self.sink.persist(&submission) {
            error!("Failed to persist submission: {}", e);
        }

        let time_spent_seconds = submission.time_spent_seconds();
        self.submission = Some(submission);
        self.emit(SessionEvent::Submitted { time_spent_seconds });
        info!("Session submitted after {}s", time_spent_seconds);

        released
    }

    /// Cancel both timers and close the camera. Runs on every terminal path.
    fn release_resources(&mut self) -> Result<(), SessionError> {
        self.countdown.cancel();
        self.alerts.cancel();

        let Err(e) = self.sensor.release() else {
            return Ok(());
        };

        let detail = e.to_string();
        error!("Resource leak on session teardown: {}", detail);
        self.integrity_fault = Some(detail.clone());
        self.emit(SessionEvent::ResourceLeak {
            detail: detail.clone(),
        });
        Err(SessionError::ResourceLeak(detail))
    }

    fn transition(&mut self, to: SessionState) {
        let from = self.state;
        self.state = to;
        debug!("Session state: {} -> {}", from, to);
        self.emit(SessionEvent::StateChanged { from, to });
    }

    fn emit(&self, event: SessionEvent) {
        if self.events.send(event).is_err() {
            debug!("No presentation listening for session events");
        }
    }

    fn signals(&self, now: Instant) -> SessionSignals {
        SessionSignals {
            elapsed: self.countdown.elapsed(now),
            camera_available: self.sensor.is_streaming(),
            keystrokes_recorded: self.keystrokes.total_recorded(),
            answered_questions: self.answered_questions(),
            alerts_raised: self.alerts.history().len(),
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn exam(&self) -> &ExamDefinition {
        &self.exam
    }

    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    pub fn answer(&self, question_id: u32) -> Option<&str> {
        self.answers.get(&question_id).map(String::as_str)
    }

    /// Questions with a non-empty answer.
    pub fn answered_questions(&self) -> usize {
        self.answers.values().filter(|a| !a.trim().is_empty()).count()
    }

    pub fn remaining(&self) -> Duration {
        if self.state == SessionState::NotStarted {
            return self.exam.duration;
        }
        self.countdown.remaining(self.clock.now())
    }

    /// Whether the countdown is inside the final warning window.
    pub fn is_low_on_time(&self) -> bool {
        self.state == SessionState::Active && self.remaining() < LOW_TIME_WARNING
    }

    /// The most recent alerts for display.
    pub fn visible_alerts(&self) -> &[AlertEvent] {
        self.alerts.visible()
    }

    pub fn alert_history(&self) -> &[AlertEvent] {
        self.alerts.history()
    }

    pub fn keystrokes(&self) -> &KeystrokeRecorder {
        &self.keystrokes
    }

    /// Whether the session is running without its video channel.
    pub fn is_degraded(&self) -> bool {
        self.sensor.is_degraded()
    }

    pub fn is_streaming(&self) -> bool {
        self.sensor.is_streaming()
    }

    /// Whether either timer can still fire.
    pub fn timers_running(&self) -> bool {
        self.countdown.is_running() || self.alerts.is_running()
    }

    pub fn submission(&self) -> Option<&Submission> {
        self.submission.as_ref()
    }

    /// Set when teardown could not release a resource.
    pub fn integrity_fault(&self) -> Option<&str> {
        self.integrity_fault.as_deref()
    }
}

impl Drop for ExamSession {
    fn drop(&mut self) {
        // An unstarted session holds nothing and never ran
        if self.state != SessionState::NotStarted && !self.state.is_terminal() {
            let _ = self.abort("session dropped");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::UnavailableCamera;
    use crate::core::clock::ManualClock;
    use crate::identity::Role;

    fn student() -> Identity {
        Identity::new("stu1", Role::Student, "Student alice")
    }

    fn drain(rx: &Receiver<SessionEvent>) -> Vec<SessionEvent> {
        rx.try_iter().collect()
    }

    #[test]
    fn test_instructor_cannot_sit_exam() {
        let identity = Identity::new("ins1", Role::Instructor, "Instructor bob");
        let result = SessionBuilder::new(ExamDefinition::sample(), identity).build();
        assert!(matches!(result, Err(SessionError::NotAStudent)));
    }

    #[test]
    fn test_start_enters_active() {
        let (mut session, rx) = SessionBuilder::new(ExamDefinition::sample(), student())
            .build()
            .unwrap();
        assert_eq!(session.state(), SessionState::NotStarted);

        session.start();
        assert_eq!(session.state(), SessionState::Active);
        assert!(session.is_streaming());
        assert!(session.timers_running());

        let events = drain(&rx);
        assert_eq!(
            events[0],
            SessionEvent::StateChanged {
                from: SessionState::NotStarted,
                to: SessionState::Active
            }
        );
    }

    #[test]
    fn test_edit_rejected_when_too_long() {
        let (mut session, rx) = SessionBuilder::new(ExamDefinition::sample(), student())
            .build()
            .unwrap();
        session.start();
        drain(&rx);

        let too_long = "x".repeat(401);
        let err = session.edit_answer(2, too_long).unwrap_err();
        assert_eq!(
            err,
            SessionError::InvalidAnswerLength {
                question_id: 2,
                length: 401,
                max: 400
            }
        );
        assert!(session.answer(2).is_none());
        assert!(matches!(
            drain(&rx).last(),
            Some(SessionEvent::EditRejected { question_id: 2, .. })
        ));
    }

    #[test]
    fn test_edit_unknown_question() {
        let (mut session, _rx) = SessionBuilder::new(ExamDefinition::sample(), student())
            .build()
            .unwrap();
        session.start();
        assert_eq!(
            session.edit_answer(42, "hi"),
            Err(SessionError::UnknownQuestion(42))
        );
    }

    #[test]
    fn test_edit_before_start_rejected() {
        let (mut session, _rx) = SessionBuilder::new(ExamDefinition::sample(), student())
            .build()
            .unwrap();
        assert_eq!(
            session.edit_answer(1, "early"),
            Err(SessionError::NotActive(SessionState::NotStarted))
        );
    }

    #[test]
    fn test_edits_record_keystrokes() {
        let (mut session, _rx) = SessionBuilder::new(ExamDefinition::sample(), student())
            .build()
            .unwrap();
        session.start();
        session.edit_answer(1, "a").unwrap();
        session.edit_answer(1, "ab").unwrap();
        session.record_keystroke();

        assert_eq!(session.keystrokes().len(), 3);
        assert_eq!(session.answer(1), Some("ab"));
        assert_eq!(session.answered_questions(), 1);
    }

    #[test]
    fn test_submit_before_start_is_noop() {
        let (mut session, _rx) = SessionBuilder::new(ExamDefinition::sample(), student())
            .build()
            .unwrap();
        assert_eq!(session.submit(), Ok(SubmitOutcome::NotActive));
        assert_eq!(session.state(), SessionState::NotStarted);
        assert!(session.submission().is_none());
    }

    #[test]
    fn test_degraded_mode_raises_single_alert() {
        let (mut session, rx) = SessionBuilder::new(ExamDefinition::sample(), student())
            .camera(UnavailableCamera::permission_denied())
            .build()
            .unwrap();
        session.start();

        assert_eq!(session.state(), SessionState::Active);
        assert!(session.is_degraded());
        assert_eq!(session.alert_history().len(), 1);
        assert!(session.alert_history()[0]
            .reason
            .starts_with("Camera unavailable"));

        let alerts = drain(&rx)
            .into_iter()
            .filter(|e| matches!(e, SessionEvent::Alert(_)))
            .count();
        assert_eq!(alerts, 1);
    }

    #[test]
    fn test_low_time_warning() {
        let clock = ManualClock::new();
        let (mut session, _rx) = SessionBuilder::new(ExamDefinition::sample(), student())
            .clock(Arc::new(clock.clone()))
            .build()
            .unwrap();
        session.start();
        assert!(!session.is_low_on_time());

        clock.advance(Duration::from_secs(3400));
        session.poll().unwrap();
        assert!(session.is_low_on_time());
        assert_eq!(session.remaining(), Duration::from_secs(200));
    }

    #[test]
    fn test_drop_aborts_and_releases() {
        let camera = NoopCamera::new();
        let monitor = camera.monitor();
        let (mut session, rx) = SessionBuilder::new(ExamDefinition::sample(), student())
            .camera(camera)
            .build()
            .unwrap();
        session.start();
        assert!(monitor.is_streaming());

        drop(session);
        assert!(!monitor.is_streaming());
        assert!(drain(&rx).contains(&SessionEvent::StateChanged {
            from: SessionState::Active,
            to: SessionState::Aborted
        }));
    }

    #[test]
    fn test_drop_before_start_is_silent() {
        let (session, rx) = SessionBuilder::new(ExamDefinition::sample(), student())
            .build()
            .unwrap();

        drop(session);
        assert!(drain(&rx).is_empty());
    }

    #[test]
    fn test_oversized_histories_rejected() {
        let settings = SessionSettings {
            keystroke_capacity: DEFAULT_KEYSTROKE_CAPACITY + 1,
            ..Default::default()
        };
        let result = SessionBuilder::new(ExamDefinition::sample(), student())
            .settings(settings)
            .build();
        assert!(matches!(result, Err(SessionError::InvalidSettings(_))));

        let settings = SessionSettings {
            visible_alerts: 0,
            ..Default::default()
        };
        let result = SessionBuilder::new(ExamDefinition::sample(), student())
            .settings(settings)
            .build();
        assert!(matches!(result, Err(SessionError::InvalidSettings(_))));

        let settings = SessionSettings {
            keystroke_capacity: 5,
            visible_alerts: 1,
            ..Default::default()
        };
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_event_serialization() {
        let event = SessionEvent::Tick { remaining_secs: 42 };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "tick");
        assert_eq!(json["remaining_secs"], 42);
    }
}
