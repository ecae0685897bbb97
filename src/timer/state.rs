//! Countdown timer state
//!
//! Pure bookkeeping for a single countdown run. Active time is tracked as a
//! baseline accumulated over earlier running windows plus the time since the
//! current running anchor, so pausing never counts against the countdown.

use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::time::Instant;

/// Lifecycle of the countdown
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimerStatus {
    /// No countdown has been started, or it was stopped
    Idle,
    /// Counting down
    Running,
    /// Started but frozen
    Paused,
    /// Reached zero and fired its completion
    Completed,
}

impl Default for TimerStatus {
    fn default() -> Self {
        Self::Idle
    }
}

#[derive(Debug, Clone, Default)]
pub struct TimerState {
    pub status: TimerStatus,
    /// Requested duration
    pub duration: Duration,
    /// Active time accumulated before the current running window
    pub active_baseline: Duration,
    /// Start of the current running window, `None` unless running
    pub running_anchor: Option<Instant>,
}

impl TimerState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn begin(&mut self, duration: Duration, now: Instant) {
        *self = Self {
            status: TimerStatus::Running,
            duration,
            active_baseline: Duration::ZERO,
            running_anchor: Some(now),
        };
    }

    /// Running or paused; a completed or idle countdown is not live.
    pub fn is_live(&self) -> bool {
        matches!(self.status, TimerStatus::Running | TimerStatus::Paused)
    }

    pub fn elapsed_at(&self, now: Instant) -> Duration {
        match (self.status, self.running_anchor) {
            (TimerStatus::Running, Some(anchor)) => self
                .active_baseline
                .saturating_add(now.saturating_duration_since(anchor)),
            (TimerStatus::Paused, _) => self.active_baseline,
            _ => Duration::ZERO,
        }
    }

    pub fn remaining_at(&self, now: Instant) -> Duration {
        if !self.is_live() {
            return Duration::ZERO;
        }
        self.duration.saturating_sub(self.elapsed_at(now))
    }

    pub fn pause(&mut self, now: Instant) -> bool {
        if self.status != TimerStatus::Running {
            return false;
        }
        self.active_baseline = self.elapsed_at(now);
        self.running_anchor = None;
        self.status = TimerStatus::Paused;
        true
    }

    pub fn resume(&mut self, now: Instant) -> bool {
        if self.status != TimerStatus::Paused {
            return false;
        }
        self.running_anchor = Some(now);
        self.status = TimerStatus::Running;
        true
    }

    pub fn complete(&mut self) {
        self.active_baseline = self.duration;
        self.running_anchor = None;
        self.status = TimerStatus::Completed;
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

/// Format seconds as `MM:SS` for countdown displays
pub fn format_clock(seconds: f64) -> String {
    let total = if seconds.is_finite() && seconds > 0.0 {
        seconds.floor() as u64
    } else {
        0
    };
    format!("{:02}:{:02}", total / 60, total % 60)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pause_is_time_neutral() {
        let t0 = Instant::now();
        let mut state = TimerState::new();
        state.begin(Duration::from_secs(30), t0);

        // 4s running, 10s paused, 6s running again
        assert!(state.pause(t0 + Duration::from_secs(4)));
        assert_eq!(state.remaining_at(t0 + Duration::from_secs(14)), Duration::from_secs(26));
        assert!(state.resume(t0 + Duration::from_secs(14)));

        let now = t0 + Duration::from_secs(20);
        assert_eq!(state.elapsed_at(now), Duration::from_secs(10));
        assert_eq!(state.remaining_at(now), Duration::from_secs(20));
    }

    #[test]
    fn test_remaining_never_negative() {
        let t0 = Instant::now();
        let mut state = TimerState::new();
        state.begin(Duration::from_secs(2), t0);
        assert_eq!(state.remaining_at(t0 + Duration::from_secs(5)), Duration::ZERO);
    }

    #[test]
    fn test_idle_queries_are_zero() {
        let state = TimerState::new();
        let now = Instant::now();
        assert_eq!(state.remaining_at(now), Duration::ZERO);
        assert_eq!(state.elapsed_at(now), Duration::ZERO);
    }

    #[test]
    fn test_pause_resume_only_from_matching_status() {
        let t0 = Instant::now();
        let mut state = TimerState::new();
        assert!(!state.pause(t0));
        state.begin(Duration::from_secs(5), t0);
        assert!(!state.resume(t0));
        assert!(state.pause(t0));
        assert!(!state.pause(t0));
    }

    #[test]
    fn test_format_clock() {
        assert_eq!(format_clock(0.0), "00:00");
        assert_eq!(format_clock(59.9), "00:59");
        assert_eq!(format_clock(120.0), "02:00");
        assert_eq!(format_clock(-3.0), "00:00");
    }
}
