//! Demonstration of a complete proctored exam session.
//!
//! This example shows how to:
//! 1. Authenticate a student
//! 2. Build a session with a seeded alert detector
//! 3. Drive it with scripted commands through the runner
//! 4. Inspect the submission and score a finished report
//!
//! Run with: cargo run --example session_demo

use std::thread;
use std::time::Duration;

use crossbeam_channel::unbounded;
use exam_proctor::{
    capture::NoopCamera,
    core::{
        format_remaining, CatalogDetector, ExamDefinition, MemorySink, SessionBuilder,
        SessionEvent, SessionSettings,
    },
    identity::{Credentials, IdentityProvider, MockIdentityProvider, Role},
    risk::{RiskScoringEngine, SignalCounts},
    runner::{Command, SessionRunner},
    MONITORING_NOTICE,
};

fn main() {
    println!("Exam Proctor - Session Demo");
    println!("===========================");
    println!("{MONITORING_NOTICE}");

    let identity = match MockIdentityProvider
        .authenticate(&Credentials::new("alice", "demo"), Role::Student)
    {
        Ok(identity) => identity,
        Err(e) => {
            eprintln!("Login failed: {e}");
            return;
        }
    };
    println!("Logged in as {} ({})", identity.name, identity.id);

    // A short exam so the demo finishes quickly
    let exam = ExamDefinition {
        duration: Duration::from_secs(6),
        ..ExamDefinition::sample()
    };
    let sink = MemorySink::new();
    let settings = SessionSettings {
        alert_interval: Duration::from_secs(1),
        ..Default::default()
    };

    let (session, events) = match SessionBuilder::new(exam, identity)
        .camera(NoopCamera::new())
        .detector(CatalogDetector::with_seed(7, 0.4))
        .sink(sink.clone())
        .settings(settings)
        .build()
    {
        Ok(built) => built,
        Err(e) => {
            eprintln!("Could not create session: {e}");
            return;
        }
    };

    let printer = thread::spawn(move || {
        for event in events {
            match event {
                SessionEvent::Tick { remaining_secs } => {
                    println!("  [{}]", format_remaining(remaining_secs))
                }
                SessionEvent::Alert(alert) => println!("  ALERT #{}: {}", alert.sequence, alert.reason),
                SessionEvent::StateChanged { from, to } => println!("  state: {from} -> {to}"),
                other => println!("  {other:?}"),
            }
        }
    });

    let (commands, command_rx) = unbounded();
    let script = thread::spawn(move || {
        let answers = [
            (1, "Objects bundle state with behaviour: encapsulation, inheritance, polymorphism."),
            (2, "Procedural code sequences steps; functional code composes pure functions."),
        ];
        for (question_id, text) in answers {
            thread::sleep(Duration::from_millis(1500));
            let _ = commands.send(Command::EditAnswer {
                question_id,
                text: text.to_string(),
            });
        }
        // Leave question 3 unanswered and let the clock run out
        thread::sleep(Duration::from_secs(10));
        drop(commands);
    });

    println!();
    println!("Running session...");
    let outcome = SessionRunner::new(session, command_rx, Duration::from_millis(50)).run();
    let _ = printer.join();
    let _ = script.join();

    println!();
    println!("Final state: {}", outcome.state);
    println!(
        "Typing rate: {:.2} keys/s ({} pauses)",
        outcome.keystroke_timing.typing_rate, outcome.keystroke_timing.pause_count
    );
    if let Some(submission) = sink.submissions().first() {
        println!("Answers submitted: {}", submission.answers().len());
        println!("Keystrokes retained: {}", submission.keystroke_pattern().len());
        println!("Alerts raised: {}", submission.alerts().len());
        println!("Time spent: {}s", submission.time_spent_seconds());

        // Score the session as a reporting pipeline would
        let engine = RiskScoringEngine::default();
        let counts = SignalCounts::new(20.0, 0, submission.alerts().len() as u32);
        let assessment = engine.assess(&counts);
        println!();
        println!(
            "Risk score: {} ({})",
            assessment.overall_risk_score, assessment.status
        );
    }
}
