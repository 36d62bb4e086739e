//! Integration tests driving whole exam sessions on a manual clock.

use crossbeam_channel::Receiver;
use exam_proctor::capture::{NoopCamera, StreamMonitor, UnavailableCamera};
use exam_proctor::core::{
    Clock, ExamDefinition, ExamSession, ManualClock, MemorySink, PersistError, ScriptedDetector,
    SessionBuilder, SessionError, SessionEvent, SessionSettings, SessionState, SubmitOutcome,
    Submission, SubmissionSink,
};
use exam_proctor::identity::{Identity, Role};
use std::sync::Arc;
use std::time::Duration;

struct Harness {
    clock: ManualClock,
    monitor: StreamMonitor,
    sink: MemorySink,
    session: ExamSession,
    events: Receiver<SessionEvent>,
}

fn student() -> Identity {
    Identity::new("stu42", Role::Student, "Student alice")
}

fn exam(duration_secs: u64) -> ExamDefinition {
    ExamDefinition {
        duration: Duration::from_secs(duration_secs),
        ..ExamDefinition::sample()
    }
}

fn settings(alert_interval_secs: u64) -> SessionSettings {
    SessionSettings {
        alert_interval: Duration::from_secs(alert_interval_secs),
        ..Default::default()
    }
}

fn harness_with(duration_secs: u64, detector: ScriptedDetector, camera: NoopCamera) -> Harness {
    let clock = ManualClock::new();
    let monitor = camera.monitor();
    let sink = MemorySink::new();
    let (session, events) = SessionBuilder::new(exam(duration_secs), student())
        .clock(Arc::new(clock.clone()))
        .camera(camera)
        .detector(detector)
        .sink(sink.clone())
        .settings(settings(1))
        .build()
        .unwrap();

    Harness {
        clock,
        monitor,
        sink,
        session,
        events,
    }
}

fn harness(duration_secs: u64) -> Harness {
    harness_with(duration_secs, ScriptedDetector::silent(), NoopCamera::new())
}

impl Harness {
    fn advance(&mut self, by: Duration) {
        self.clock.advance(by);
        let _ = self.session.poll();
    }

    fn drain(&self) -> Vec<SessionEvent> {
        self.events.try_iter().collect()
    }
}

fn count(events: &[SessionEvent], pred: impl Fn(&SessionEvent) -> bool) -> usize {
    events.iter().filter(|e| pred(e)).count()
}

#[test]
fn test_expiry_produces_exactly_one_submission() {
    for duration in [0, 1, 2, 7, 30] {
        let mut h = harness(duration);
        h.session.start();

        let mut events = Vec::new();
        for _ in 0..((duration + 5) * 4) {
            h.advance(Duration::from_millis(250));
            events.extend(h.drain());
        }
        events.extend(h.drain());

        assert_eq!(count(&events, |e| matches!(e, SessionEvent::Expired)), 1);
        assert_eq!(
            count(&events, |e| matches!(e, SessionEvent::Submitted { .. })),
            1
        );
        assert_eq!(h.session.state(), SessionState::Submitted);

        let submissions = h.sink.submissions();
        assert_eq!(submissions.len(), 1);
        assert_eq!(submissions[0].time_spent_seconds(), duration);
    }
}

#[test]
fn test_ticks_count_down_once_per_second() {
    let mut h = harness(5);
    h.session.start();

    let mut ticks = Vec::new();
    for _ in 0..10 {
        h.advance(Duration::from_secs(1));
        for event in h.drain() {
            if let SessionEvent::Tick { remaining_secs } = event {
                ticks.push(remaining_secs);
            }
        }
    }

    assert_eq!(ticks, vec![4, 3, 2, 1, 0]);
}

#[test]
fn test_expiry_tick_precedes_expired() {
    let mut h = harness(1);
    h.session.start();
    h.drain();

    h.advance(Duration::from_secs(1));
    let events = h.drain();
    let tick = events
        .iter()
        .position(|e| *e == SessionEvent::Tick { remaining_secs: 0 })
        .unwrap();
    let expired = events
        .iter()
        .position(|e| *e == SessionEvent::Expired)
        .unwrap();
    assert!(tick < expired);
}

#[test]
fn test_keystroke_history_bounded_fifo() {
    let mut h = harness(600);
    h.session.start();

    let mut walls = Vec::new();
    for i in 0..50 {
        h.clock.advance(Duration::from_secs(1));
        walls.push(h.clock.wall());
        h.session.edit_answer(1, "x".repeat(i + 1)).unwrap();
        assert!(h.session.keystrokes().len() <= 20);
    }
    assert_eq!(h.session.keystrokes().total_recorded(), 50);

    h.session.submit().unwrap();
    let submission = h.session.submission().unwrap();
    assert_eq!(submission.keystroke_pattern(), &walls[30..]);
}

#[test]
fn test_visible_alerts_bounded_full_history_submitted() {
    let script: Vec<Option<String>> = (0..10).map(|i| Some(format!("reason {i}"))).collect();
    let mut h = harness_with(600, ScriptedDetector::new(script), NoopCamera::new());
    h.session.start();

    for _ in 0..10 {
        h.advance(Duration::from_secs(1));
        assert!(h.session.visible_alerts().len() <= 3);
    }
    assert_eq!(h.session.alert_history().len(), 10);

    h.session.submit().unwrap();
    let submission = h.session.submission().unwrap();
    assert_eq!(submission.alerts().len(), 10);
    assert_eq!(submission.alerts()[0], "reason 0");
    assert_eq!(submission.alerts()[9], "reason 9");
}

#[test]
fn test_alerts_forwarded_exactly_once() {
    let script = vec![Some("a"), None, Some("b"), Some("c")];
    let mut h = harness_with(600, ScriptedDetector::new(script), NoopCamera::new());
    h.session.start();

    let mut forwarded = Vec::new();
    for _ in 0..8 {
        // Several polls inside the same cycle must not repeat an alert
        h.advance(Duration::from_millis(500));
        h.advance(Duration::from_millis(0));
        h.advance(Duration::from_millis(500));
        for event in h.drain() {
            if let SessionEvent::Alert(alert) = event {
                forwarded.push(alert);
            }
        }
    }

    let reasons: Vec<&str> = forwarded.iter().map(|a| a.reason.as_str()).collect();
    assert_eq!(reasons, vec!["a", "b", "c"]);
    let sequences: Vec<u64> = forwarded.iter().map(|a| a.sequence).collect();
    assert_eq!(sequences, vec![0, 1, 2]);
}

#[test]
fn test_camera_failure_degrades_and_release_is_safe() {
    let clock = ManualClock::new();
    let (mut session, events) = SessionBuilder::new(exam(60), student())
        .clock(Arc::new(clock.clone()))
        .camera(UnavailableCamera::no_device())
        .build()
        .unwrap();
    session.start();

    assert_eq!(session.state(), SessionState::Active);
    assert!(session.is_degraded());
    let alerts: Vec<SessionEvent> = events
        .try_iter()
        .filter(|e| matches!(e, SessionEvent::Alert(_)))
        .collect();
    assert_eq!(alerts.len(), 1);

    // Release after a failed acquire, twice
    assert_eq!(session.abort("test"), Ok(()));
    assert_eq!(session.abort("again"), Ok(()));
    assert_eq!(session.state(), SessionState::Aborted);
    assert!(session.integrity_fault().is_none());
}

#[test]
fn test_duplicate_submit_is_noop() {
    let mut h = harness(600);
    h.session.start();
    h.session.edit_answer(2, "Pure functions and immutability").unwrap();

    assert_eq!(h.session.submit(), Ok(SubmitOutcome::Submitted));
    let first = h.session.submission().cloned().unwrap();
    h.drain();

    h.advance(Duration::from_secs(3));
    assert_eq!(h.session.submit(), Ok(SubmitOutcome::AlreadyFinished));

    assert_eq!(h.session.submission(), Some(&first));
    assert_eq!(h.sink.submissions().len(), 1);
    assert!(h.drain().is_empty());
}

#[test]
fn test_submit_after_abort_is_noop() {
    let mut h = harness(600);
    h.session.start();
    h.session.abort("navigated away").unwrap();

    assert_eq!(h.session.submit(), Ok(SubmitOutcome::AlreadyFinished));
    assert!(h.session.submission().is_none());
    assert!(h.sink.submissions().is_empty());
}

#[test]
fn test_terminal_states_release_everything() {
    type Finish = fn(&mut Harness);
    let paths: [(Finish, SessionState); 3] = [
        (
            |h| {
                h.session.submit().unwrap();
            },
            SessionState::Submitted,
        ),
        (
            |h| {
                h.session.abort("logout").unwrap();
            },
            SessionState::Aborted,
        ),
        (|h| h.advance(Duration::from_secs(120)), SessionState::Submitted),
    ];

    for (finish, expected) in paths {
        let script: Vec<Option<&str>> = vec![Some("late alert"); 100];
        let mut h = harness_with(60, ScriptedDetector::new(script), NoopCamera::new());
        h.session.start();
        assert!(h.monitor.is_streaming());

        h.advance(Duration::from_millis(1500));
        finish(&mut h);

        assert_eq!(h.session.state(), expected);
        assert!(!h.monitor.is_streaming());
        assert!(!h.session.timers_running());

        h.drain();
        for _ in 0..10 {
            h.advance(Duration::from_secs(5));
        }
        assert!(h.drain().is_empty());
    }
}

#[test]
fn test_drop_releases_camera() {
    let h = harness(60);
    let monitor = h.monitor.clone();
    let Harness {
        mut session,
        events,
        ..
    } = h;
    session.start();
    assert!(monitor.is_streaming());

    drop(session);
    assert!(!monitor.is_streaming());
    assert!(events.try_iter().any(|e| e
        == SessionEvent::StateChanged {
            from: SessionState::Active,
            to: SessionState::Aborted,
        }));
}

#[test]
fn test_release_failure_surfaces_leak() {
    let mut h = harness_with(
        600,
        ScriptedDetector::silent(),
        NoopCamera::new().with_failing_close(),
    );
    h.session.start();
    h.session.edit_answer(3, "Elastic scaling, vendor lock-in").unwrap();

    let result = h.session.submit();
    assert!(matches!(result, Err(SessionError::ResourceLeak(_))));

    // The submission is still made exactly once
    assert_eq!(h.session.state(), SessionState::Submitted);
    assert_eq!(h.sink.submissions().len(), 1);
    assert!(h.session.integrity_fault().is_some());
    assert!(!h.session.timers_running());
    assert!(h
        .drain()
        .iter()
        .any(|e| matches!(e, SessionEvent::ResourceLeak { .. })));

    assert_eq!(h.session.submit(), Ok(SubmitOutcome::AlreadyFinished));
}

struct RejectingSink;

impl SubmissionSink for RejectingSink {
    fn persist(&mut self, _submission: &Submission) -> Result<(), PersistError> {
        Err(PersistError::Rejected("storage offline".to_string()))
    }
}

#[test]
fn test_persistence_failure_does_not_block_submission() {
    let (mut session, _events) = SessionBuilder::new(exam(60), student())
        .sink(RejectingSink)
        .build()
        .unwrap();
    session.start();

    assert_eq!(session.submit(), Ok(SubmitOutcome::Submitted));
    assert_eq!(session.state(), SessionState::Submitted);
    assert!(session.submission().is_some());
}

#[test]
fn test_rejected_edit_never_reaches_submission() {
    let mut h = harness(600);
    h.session.start();
    h.session.edit_answer(1, "short").unwrap();

    let result = h.session.edit_answer(1, "y".repeat(501));
    assert!(matches!(
        result,
        Err(SessionError::InvalidAnswerLength { max: 500, .. })
    ));

    h.session.submit().unwrap();
    let submission = h.session.submission().unwrap();
    assert_eq!(submission.answers().get(&1).map(String::as_str), Some("short"));
}
