//! Wall-clock source.
//!
//! Every "what time is it" question in the scheduler and the status API goes
//! through a [`Clock`], so tests can drive the firing loop across minutes and
//! midnight without sleeping.

use std::sync::Arc;

use chrono::{DateTime, Utc};

/// Source of the current instant.
pub trait Clock: Send + Sync {
    /// Returns the current instant in UTC.
    fn now(&self) -> DateTime<Utc>;
}

/// Clock backed by the operating system.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl SystemClock {
    /// Creates a new `SystemClock` wrapped in an Arc.
    #[must_use]
    pub fn arc() -> Arc<dyn Clock> {
        Arc::new(Self)
    }
}

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

#[cfg(test)]
pub(crate) use manual::ManualClock;

#[cfg(test)]
mod manual {
    use chrono::{DateTime, Utc};
    use parking_lot::RwLock;

    use super::Clock;

    /// Clock whose time is set explicitly.
    #[derive(Debug)]
    pub(crate) struct ManualClock {
        now: RwLock<DateTime<Utc>>,
    }

    impl ManualClock {
        pub(crate) fn new(now: DateTime<Utc>) -> Self {
            Self {
                now: RwLock::new(now),
            }
        }

        /// Moves the clock to `now`.
        pub(crate) fn set(&self, now: DateTime<Utc>) {
            *self.now.write() = now;
        }

        /// Moves the clock forward by `delta`.
        pub(crate) fn advance(&self, delta: chrono::Duration) {
            let mut now = self.now.write();
            *now += delta;
        }
    }

    impl Clock for ManualClock {
        fn now(&self) -> DateTime<Utc> {
            *self.now.read()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn manual_clock_advances() {
        let start = Utc.with_ymd_and_hms(2025, 3, 1, 11, 59, 0).unwrap();
        let clock = ManualClock::new(start);
        clock.advance(chrono::Duration::minutes(2));
        assert_eq!(
            clock.now(),
            Utc.with_ymd_and_hms(2025, 3, 1, 12, 1, 0).unwrap()
        );
    }

    #[test]
    fn system_clock_is_monotonic_enough() {
        let clock = SystemClock;
        let a = clock.now();
        let b = clock.now();
        assert!(b >= a);
    }
}
