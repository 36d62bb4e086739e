//! Integrity alerts sampled on their own cadence.
//!
//! The generator asks a pluggable [`SignalDetector`] for at most one reason
//! per cycle. Detection policy lives entirely in the detector; the generator
//! only owns the cadence, sequencing and history.

use chrono::{DateTime, Utc};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::time::{Duration, Instant};

/// Default sampling cadence.
pub const DEFAULT_ALERT_INTERVAL: Duration = Duration::from_secs(5);

/// Default number of alerts kept visible for display.
pub const DEFAULT_VISIBLE_ALERTS: usize = 3;

/// Reasons the catalog detector can raise. The first two need video.
pub const ALERT_CATALOG: [&str; 4] = [
    "Multiple faces detected in frame",
    "Looking away from screen detected",
    "Suspicious tab switching behavior",
    "Audio detected from external source",
];

const VIDEO_REASONS: usize = 2;

/// An integrity alert raised during a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlertEvent {
    /// Position in the session's alert history, starting at 0
    pub sequence: u64,
    /// Human-readable reason
    pub reason: String,
    /// When the alert was raised
    pub raised_at: DateTime<Utc>,
}

/// What a detector can see when it is sampled.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionSignals {
    /// Time since the session started
    pub elapsed: Duration,
    /// Whether the video channel is live
    pub camera_available: bool,
    /// Keystrokes recorded so far, including evicted ones
    pub keystrokes_recorded: u64,
    /// Questions with a non-empty answer
    pub answered_questions: usize,
    /// Alerts already raised
    pub alerts_raised: usize,
}

/// Produces zero or one alert reason from the current signals.
pub trait SignalDetector: Send {
    fn detect(&mut self, signals: &SessionSignals) -> Option<String>;
}

/// Replays a fixed script of decisions, one per cycle, then stays quiet.
#[derive(Debug, Clone, Default)]
pub struct ScriptedDetector {
    script: VecDeque<Option<String>>,
    samples: usize,
}

impl ScriptedDetector {
    pub fn new<I, S>(script: I) -> Self
    where
        I: IntoIterator<Item = Option<S>>,
        S: Into<String>,
    {
        Self {
            script: script.into_iter().map(|r| r.map(Into::into)).collect(),
            samples: 0,
        }
    }

    /// A detector that never raises anything.
    pub fn silent() -> Self {
        Self::default()
    }

    /// How many times the detector has been consulted.
    pub fn samples(&self) -> usize {
        self.samples
    }
}

impl SignalDetector for ScriptedDetector {
    fn detect(&mut self, _signals: &SessionSignals) -> Option<String> {
        self.samples += 1;
        self.script.pop_front().flatten()
    }
}

/// Raises a catalog reason with a fixed probability per cycle.
///
/// Seeded construction makes the sequence reproducible.
pub struct CatalogDetector {
    rng: StdRng,
    probability: f64,
}

impl CatalogDetector {
    pub fn with_seed(seed: u64, probability: f64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
            probability: probability.clamp(0.0, 1.0),
        }
    }

    pub fn from_entropy(probability: f64) -> Self {
        Self {
            rng: StdRng::from_entropy(),
            probability: probability.clamp(0.0, 1.0),
        }
    }
}

impl SignalDetector for CatalogDetector {
    fn detect(&mut self, signals: &SessionSignals) -> Option<String> {
        if !self.rng.gen_bool(self.probability) {
            return None;
        }
        // Without video only the non-camera reasons make sense
        let candidates = if signals.camera_available {
            &ALERT_CATALOG[..]
        } else {
            &ALERT_CATALOG[VIDEO_REASONS..]
        };
        let idx = self.rng.gen_range(0..candidates.len());
        Some(candidates[idx].to_string())
    }
}

/// Samples a detector on a fixed cadence and keeps the alert history.
pub struct AlertGenerator {
    interval: Duration,
    visible_capacity: usize,
    detector: Box<dyn SignalDetector>,
    next_sample: Option<Instant>,
    history: Vec<AlertEvent>,
}

impl AlertGenerator {
    pub fn new(detector: Box<dyn SignalDetector>, interval: Duration, visible: usize) -> Self {
        Self {
            // A zero interval would sample on every poll forever
            interval: interval.max(Duration::from_millis(1)),
            visible_capacity: visible,
            detector,
            next_sample: None,
            history: Vec::new(),
        }
    }

    /// Schedule the first cycle one interval after `now`.
    pub fn start(&mut self, now: Instant) {
        if self.next_sample.is_none() {
            self.next_sample = Some(now + self.interval);
        }
    }

    /// Stop sampling. History is kept.
    pub fn cancel(&mut self) {
        self.next_sample = None;
    }

    pub fn is_running(&self) -> bool {
        self.next_sample.is_some()
    }

    /// Run the detector if a cycle is due.
    ///
    /// Missed cycles are skipped rather than replayed: one sample per due
    /// poll. The returned alert is new and has not been returned before.
    pub fn poll(
        &mut self,
        now: Instant,
        wall: DateTime<Utc>,
        signals: &SessionSignals,
    ) -> Option<AlertEvent> {
        let due = self.next_sample?;
        if now < due {
            return None;
        }

        let mut next = due + self.interval;
        while next <= now {
            next += self.interval;
        }
        self.next_sample = Some(next);

        let reason = self.detector.detect(signals)?;
        Some(self.raise(reason, wall))
    }

    /// Append an alert directly, bypassing the detector.
    pub fn raise(&mut self, reason: impl Into<String>, wall: DateTime<Utc>) -> AlertEvent {
        let alert = AlertEvent {
            sequence: self.history.len() as u64,
            reason: reason.into(),
            raised_at: wall,
        };
        self.history.push(alert.clone());
        alert
    }

    /// The most recent alerts, bounded for display.
    pub fn visible(&self) -> &[AlertEvent] {
        let start = self.history.len().saturating_sub(self.visible_capacity);
        &self.history[start..]
    }

    /// Every alert raised this session, oldest first.
    pub fn history(&self) -> &[AlertEvent] {
        &self.history
    }
}
