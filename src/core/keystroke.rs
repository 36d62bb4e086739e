//! Bounded retention of keystroke timing evidence.
//!
//! Only timing is recorded, never key content. The recorder does no
//! classification; [`KeystrokeTiming`] is a descriptive summary of what was
//! retained, for whoever analyses the submission later.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use statrs::statistics::Statistics;
use std::collections::VecDeque;

/// Default number of keystrokes kept.
pub const DEFAULT_KEYSTROKE_CAPACITY: usize = 20;

/// Threshold for considering a gap as a "pause" (in milliseconds).
const PAUSE_THRESHOLD_MS: f64 = 500.0;

/// Intervals shorter than this count toward the burst index (in milliseconds).
const BURST_THRESHOLD_MS: f64 = 100.0;

/// A single input action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeystrokeEvent {
    /// When the input happened
    pub timestamp: DateTime<Utc>,
}

impl KeystrokeEvent {
    pub fn new(timestamp: DateTime<Utc>) -> Self {
        Self { timestamp }
    }
}

/// Ring buffer of the most recent keystrokes.
#[derive(Debug, Clone)]
pub struct KeystrokeRecorder {
    capacity: usize,
    events: VecDeque<KeystrokeEvent>,
    total_recorded: u64,
}

impl KeystrokeRecorder {
    /// Create a recorder keeping at most `capacity` events (minimum 1).
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            events: VecDeque::with_capacity(capacity),
            total_recorded: 0,
        }
    }

    /// Append a keystroke, evicting the oldest one when full.
    pub fn record(&mut self, timestamp: DateTime<Utc>) {
        if self.events.len() == self.capacity {
            self.events.pop_front();
        }
        self.events.push_back(KeystrokeEvent::new(timestamp));
        self.total_recorded += 1;
    }

    /// Retained events, oldest first.
    pub fn events(&self) -> impl Iterator<Item = &KeystrokeEvent> {
        self.events.iter()
    }

    /// Retained timestamps, oldest first.
    pub fn timestamps(&self) -> Vec<DateTime<Utc>> {
        self.events.iter().map(|e| e.timestamp).collect()
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Every keystroke ever recorded, including evicted ones.
    pub fn total_recorded(&self) -> u64 {
        self.total_recorded
    }

    /// Summarise the timing of the retained history.
    pub fn timing(&self) -> KeystrokeTiming {
        let events: Vec<KeystrokeEvent> = self.events.iter().copied().collect();
        compute_timing(&events)
    }
}

impl Default for KeystrokeRecorder {
    fn default() -> Self {
        Self::new(DEFAULT_KEYSTROKE_CAPACITY)
    }
}

/// Descriptive timing statistics over retained keystrokes.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct KeystrokeTiming {
    /// Keystrokes per second across the retained span
    pub typing_rate: f64,
    /// Mean inter-key interval in milliseconds
    pub mean_interval_ms: f64,
    /// Population standard deviation of inter-key intervals
    pub interval_std_dev_ms: f64,
    /// Share of intervals under 100ms (0-1)
    pub burst_index: f64,
    /// Number of intervals over 500ms
    pub pause_count: u32,
}

fn compute_timing(events: &[KeystrokeEvent]) -> KeystrokeTiming {
    if events.len() < 2 {
        return KeystrokeTiming::default();
    }

    let intervals: Vec<f64> = events
        .windows(2)
        .map(|pair| (pair[1].timestamp - pair[0].timestamp).num_milliseconds() as f64)
        .collect();

    let span_secs = intervals.iter().sum::<f64>() / 1000.0;
    let typing_rate = if span_secs > 0.0 {
        events.len() as f64 / span_secs
    } else {
        0.0
    };

    let burst_count = intervals.iter().filter(|&&i| i < BURST_THRESHOLD_MS).count();
    let pause_count = intervals
        .iter()
        .filter(|&&i| i > PAUSE_THRESHOLD_MS)
        .count() as u32;

    let interval_std_dev_ms = if intervals.len() < 2 {
        0.0
    } else {
        intervals.iter().population_std_dev()
    };

    KeystrokeTiming {
        typing_rate,
        mean_interval_ms: intervals.iter().mean(),
        interval_std_dev_ms,
        burst_index: burst_count as f64 / intervals.len() as f64,
        pause_count,
    }
}
