use std::sync::Arc;
use std::sync::atomic::{AtomicI64, Ordering};

use chrono::{DateTime, Duration, Utc};

/// A simple clock abstraction for deterministic time in services and tests.
#[derive(Debug, Clone, Default)]
pub enum Clock {
    #[default]
    Default,
    Fixed(DateTime<Utc>),
    Shared(Arc<SharedClock>),
}

/// A clock source shared between several `Clock` handles, advanced from one
/// place while every holder observes the same time.
#[derive(Debug)]
pub struct SharedClock {
    epoch: DateTime<Utc>,
    offset_ms: AtomicI64,
}

impl SharedClock {
    /// Creates a shared source starting at the given timestamp.
    #[must_use]
    pub fn starting_at(epoch: DateTime<Utc>) -> Arc<Self> {
        Arc::new(Self {
            epoch,
            offset_ms: AtomicI64::new(0),
        })
    }

    #[must_use]
    pub fn now(&self) -> DateTime<Utc> {
        self.epoch + Duration::milliseconds(self.offset_ms.load(Ordering::SeqCst))
    }

    /// Advance every clock handle that shares this source.
    pub fn advance(&self, delta: Duration) {
        self.offset_ms
            .fetch_add(delta.num_milliseconds(), Ordering::SeqCst);
    }
}

impl Clock {
    /// Returns a clock that uses the current system time.
    #[must_use]
    pub fn default_clock() -> Self {
        Self::Default
    }

    /// Returns a clock fixed at the given timestamp.
    #[must_use]
    pub fn fixed(at: DateTime<Utc>) -> Self {
        Self::Fixed(at)
    }

    /// Returns a clock handle over a shared source.
    #[must_use]
    pub fn shared(source: Arc<SharedClock>) -> Self {
        Self::Shared(source)
    }

    /// Returns the current time according to the clock.
    #[must_use]
    pub fn now(&self) -> DateTime<Utc> {
        match self {
            Clock::Default => Utc::now(),
            Clock::Fixed(t) => *t,
            Clock::Shared(source) => source.now(),
        }
    }

    /// Advance a fixed or shared clock by the given duration.
    ///
    /// Has no effect on `Clock::Default`.
    pub fn advance(&mut self, delta: Duration) {
        match self {
            Clock::Default => {}
            Clock::Fixed(t) => *t += delta,
            Clock::Shared(source) => source.advance(delta),
        }
    }
}

/// Deterministic timestamp for tests and examples (2023-11-14T22:13:20Z).
pub const FIXED_TEST_TIMESTAMP: i64 = 1_700_000_000;

/// Returns a deterministic `DateTime<Utc>` for tests and doc examples.
///
/// # Panics
///
/// Panics if the fixed timestamp cannot be represented.
#[must_use]
pub fn fixed_now() -> DateTime<Utc> {
    DateTime::<Utc>::from_timestamp(FIXED_TEST_TIMESTAMP, 0)
        .expect("fixed timestamp should be valid")
}

/// Returns a `Clock` fixed at the deterministic test timestamp.
#[must_use]
pub fn fixed_clock() -> Clock {
    Clock::fixed(fixed_now())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixed_clock_advances() {
        let mut clock = fixed_clock();
        let before = clock.now();
        clock.advance(Duration::seconds(5));
        assert_eq!(clock.now() - before, Duration::seconds(5));
    }

    #[test]
    fn shared_clock_is_visible_to_all_handles() {
        let source = SharedClock::starting_at(fixed_now());
        let a = Clock::shared(Arc::clone(&source));
        let b = Clock::shared(Arc::clone(&source));

        source.advance(Duration::seconds(30));

        assert_eq!(a.now(), b.now());
        assert_eq!(a.now() - fixed_now(), Duration::seconds(30));
    }
}
