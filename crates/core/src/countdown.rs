//! Countdown engine
//!
//! `remaining()` is a pure function of the authority's start time and
//! duration. `Countdown` layers the local one-second ticking on top of it;
//! whoever owns the scheduling primitive calls `tick()`.

use chrono::Utc;

use crate::models::Phase;

/// Seconds left at `now_ms` for a run that started at `start_time_ms`
pub fn remaining(start_time_ms: i64, duration_seconds: u64, now_ms: i64) -> u64 {
    let elapsed_ms = now_ms.saturating_sub(start_time_ms).max(0);
    let elapsed_secs = (elapsed_ms / 1000) as u64;
    duration_seconds.saturating_sub(elapsed_secs)
}

/// Source of wall-clock time in epoch milliseconds
pub trait Clock: Send + Sync {
    fn now_ms(&self) -> i64;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_ms(&self) -> i64 {
        Utc::now().timestamp_millis()
    }
}

/// Clock pinned to a fixed instant
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub i64);

impl Clock for FixedClock {
    fn now_ms(&self) -> i64 {
        self.0
    }
}

/// Raised once when a running countdown reaches zero
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Expired;

#[derive(Debug, Clone, Default)]
pub struct Countdown {
    remaining: u64,
    running: bool,
    /// Start time of the current activation
    activation: Option<i64>,
    expired: bool,
}

impl Countdown {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn remaining(&self) -> u64 {
        self.remaining
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Whether the current activation already raised `Expired`
    pub fn has_expired(&self) -> bool {
        self.expired
    }

    /// Recompute from the authority's baseline. Never accumulates.
    pub fn rebase(&mut self, phase: Phase, start_time_ms: i64, duration_seconds: u64, now_ms: i64) {
        match phase {
            Phase::Active => {
                let fresh = !self.running || self.activation != Some(start_time_ms);
                self.remaining = if start_time_ms > 0 {
                    remaining(start_time_ms, duration_seconds, now_ms)
                } else {
                    duration_seconds
                };
                self.running = true;
                self.activation = Some(start_time_ms);
                if fresh {
                    self.expired = false;
                }
            }
            Phase::Paused => {
                self.running = false;
                self.activation = None;
            }
            Phase::Waiting | Phase::Voting | Phase::Ended => {
                self.running = false;
                self.activation = None;
                self.remaining = duration_seconds;
            }
        }
    }

    /// Advance the displayed value by one second
    pub fn tick(&mut self) -> Option<Expired> {
        if !self.running || self.expired {
            return None;
        }
        self.remaining = self.remaining.saturating_sub(1);
        if self.remaining == 0 {
            self.expired = true;
            return Some(Expired);
        }
        None
    }

    /// `mm:ss` rendering of the remaining time
    pub fn format(&self) -> String {
        format!("{:02}:{:02}", self.remaining / 60, self.remaining % 60)
    }
}
