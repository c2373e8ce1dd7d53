use chrono::{DateTime, Duration, Utc};

use exam_core::Clock;

/// Outcome of a single timer tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerTick {
    /// Time still remains; carries the remaining whole seconds.
    Running(u32),
    /// The deadline has just passed. Raised exactly once per timer.
    Expired,
    /// Stopped or already expired; the tick is a no-op.
    Idle,
}

/// Single authoritative countdown for one attempt.
///
/// Remaining time is always recomputed from a wall-clock deadline fixed at
/// start, never from a tick count, so a throttled or suspended host can delay
/// the *observation* of expiry but can never extend the exam.
#[derive(Debug, Clone)]
pub struct CountdownTimer {
    total_seconds: u32,
    deadline: DateTime<Utc>,
    expiry_raised: bool,
    stopped: bool,
}

impl CountdownTimer {
    /// Start a countdown of `total_seconds` from the clock's current time.
    #[must_use]
    pub fn start(clock: &Clock, total_seconds: u32) -> Self {
        Self {
            total_seconds,
            deadline: clock.now() + Duration::seconds(i64::from(total_seconds)),
            expiry_raised: false,
            stopped: false,
        }
    }

    /// Rebuild a countdown from a persisted deadline (crash recovery).
    ///
    /// A deadline already in the past is fine: the first tick raises
    /// `Expired` and the forced submission proceeds as usual.
    #[must_use]
    pub fn resume(deadline: DateTime<Utc>, total_seconds: u32) -> Self {
        Self {
            total_seconds,
            deadline,
            expiry_raised: false,
            stopped: false,
        }
    }

    #[must_use]
    pub fn total_seconds(&self) -> u32 {
        self.total_seconds
    }

    #[must_use]
    pub fn deadline(&self) -> DateTime<Utc> {
        self.deadline
    }

    /// Whole seconds until the deadline, clamped at zero.
    #[must_use]
    pub fn remaining(&self, clock: &Clock) -> u32 {
        let secs = (self.deadline - clock.now()).num_seconds();
        u32::try_from(secs).unwrap_or(0)
    }

    /// Whether the deadline has passed.
    #[must_use]
    pub fn is_expired(&self, clock: &Clock) -> bool {
        self.remaining(clock) == 0
    }

    /// Advance the timer by re-reading the clock.
    ///
    /// Returns `Expired` exactly once when the deadline is reached; every
    /// tick after that (or after `stop`) returns `Idle`.
    pub fn tick(&mut self, clock: &Clock) -> TimerTick {
        if self.stopped || self.expiry_raised {
            return TimerTick::Idle;
        }
        let remaining = self.remaining(clock);
        if remaining == 0 {
            self.expiry_raised = true;
            TimerTick::Expired
        } else {
            TimerTick::Running(remaining)
        }
    }

    /// Stop the countdown; later ticks are no-ops. Used once the attempt has
    /// been submitted.
    pub fn stop(&mut self) {
        self.stopped = true;
    }
}
