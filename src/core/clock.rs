//! Time sources and the session countdown.
//!
//! Sessions read time through a [`Clock`] so the countdown can be driven by a
//! [`ManualClock`] in tests. Remaining time is always measured against a fixed
//! deadline: a late poll coalesces missed seconds into one tick instead of
//! drifting.

use chrono::{DateTime, Utc};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

/// Source of monotonic and wall-clock time.
pub trait Clock: Send + Sync {
    /// Monotonic instant used for deadlines and cadences.
    fn now(&self) -> Instant;

    /// Wall-clock time used to timestamp evidence.
    fn wall(&self) -> DateTime<Utc>;
}

/// The real system clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }

    fn wall(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A clock that only moves when told to. Clones share the same time.
#[derive(Debug, Clone)]
pub struct ManualClock {
    base: Instant,
    base_wall: DateTime<Utc>,
    offset: Arc<Mutex<Duration>>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self {
            base: Instant::now(),
            base_wall: Utc::now(),
            offset: Arc::new(Mutex::new(Duration::ZERO)),
        }
    }

    /// Move time forward.
    pub fn advance(&self, by: Duration) {
        let mut offset = self.offset.lock().unwrap_or_else(|e| e.into_inner());
        *offset += by;
    }

    /// Time elapsed since the clock was created.
    pub fn elapsed(&self) -> Duration {
        *self.offset.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        self.base + self.elapsed()
    }

    fn wall(&self) -> DateTime<Utc> {
        let offset = chrono::Duration::from_std(self.elapsed()).unwrap_or(chrono::Duration::zero());
        self.base_wall + offset
    }
}

/// Something the countdown reports while polled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClockEvent {
    /// Whole seconds remaining changed
    Tick { remaining_secs: u64 },
    /// The deadline passed; emitted once
    Expired,
}

/// Countdown toward a fixed deadline.
#[derive(Debug, Default)]
pub struct SessionClock {
    duration: Duration,
    started_at: Option<Instant>,
    last_reported: Option<u64>,
    expired: bool,
    cancelled: bool,
}

impl SessionClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Begin counting down `duration` from `now`. Restarting is ignored.
    pub fn start(&mut self, duration: Duration, now: Instant) {
        if self.started_at.is_some() {
            return;
        }
        self.duration = duration;
        self.started_at = Some(now);
        self.last_reported = Some(ceil_secs(duration));
    }

    /// Report what changed since the last poll.
    ///
    /// At most one tick is returned per poll, carrying the current remaining
    /// time. When the deadline is reached a final `Tick { 0 }` is followed by
    /// the single `Expired`, after which the clock is silent.
    pub fn poll(&mut self, now: Instant) -> Vec<ClockEvent> {
        if !self.is_running() {
            return Vec::new();
        }

        let remaining = ceil_secs(self.remaining(now));
        let mut events = Vec::new();

        if self.last_reported.map_or(true, |last| remaining < last) {
            events.push(ClockEvent::Tick {
                remaining_secs: remaining,
            });
            self.last_reported = Some(remaining);
        }

        if remaining == 0 {
            self.expired = true;
            events.push(ClockEvent::Expired);
        }

        events
    }

    /// Stop all future ticks and expiry.
    pub fn cancel(&mut self) {
        self.cancelled = true;
    }

    /// Whether the clock will still report events.
    pub fn is_running(&self) -> bool {
        self.started_at.is_some() && !self.expired && !self.cancelled
    }

    pub fn has_expired(&self) -> bool {
        self.expired
    }

    /// Time left before the deadline, never negative.
    pub fn remaining(&self, now: Instant) -> Duration {
        self.duration.saturating_sub(self.elapsed(now))
    }

    /// Time since start, capped at the configured duration.
    pub fn elapsed(&self, now: Instant) -> Duration {
        match self.started_at {
            Some(start) => now.saturating_duration_since(start).min(self.duration),
            None => Duration::ZERO,
        }
    }

    pub fn duration(&self) -> Duration {
        self.duration
    }
}

/// Whole seconds, rounding any fraction up.
fn ceil_secs(d: Duration) -> u64 {
    d.as_secs() + u64::from(d.subsec_nanos() > 0)
}

/// Render seconds as `H:MM:SS`.
pub fn format_remaining(secs: u64) -> String {
    let hours = secs / 3600;
    let minutes = (secs % 3600) / 60;
    let seconds = secs % 60;
    format!("{hours}:{minutes:02}:{seconds:02}")
}
