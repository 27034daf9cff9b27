//! Wall clock abstraction.
//!
//! Every time-dependent component takes a [`Clock`] so its logic is pure
//! given `now`. Production code uses [`SystemClock`]; tests pin or
//! advance time with [`ManualClock`].

use std::sync::{Arc, RwLock};

use chrono::{DateTime, NaiveDate, Utc};

/// Supplies the current instant.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;

    /// Calendar day of `now()`, rendered the way instance dates are keyed.
    fn today(&self) -> NaiveDate {
        self.now().date_naive()
    }
}

/// The real wall clock.
#[derive(Debug, Clone, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A clock that only moves when told to. Cheaply cloneable; clones share
/// the same underlying instant.
#[derive(Debug, Clone)]
pub struct ManualClock {
    now: Arc<RwLock<DateTime<Utc>>>,
}

impl ManualClock {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            now: Arc::new(RwLock::new(now)),
        }
    }

    pub fn set(&self, now: DateTime<Utc>) {
        *self.now.write().expect("clock lock poisoned") = now;
    }

    pub fn advance(&self, delta: chrono::Duration) {
        let mut guard = self.now.write().expect("clock lock poisoned");
        *guard += delta;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.read().expect("clock lock poisoned")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn manual_clock_advances() {
        let clock = ManualClock::new(Utc.with_ymd_and_hms(2026, 3, 1, 9, 0, 0).unwrap());
        let shared = clock.clone();
        clock.advance(chrono::Duration::minutes(10));
        assert_eq!(
            shared.now(),
            Utc.with_ymd_and_hms(2026, 3, 1, 9, 10, 0).unwrap()
        );
    }

    #[test]
    fn today_is_date_of_now() {
        let clock = ManualClock::new(Utc.with_ymd_and_hms(2026, 3, 1, 23, 59, 0).unwrap());
        assert_eq!(clock.today(), NaiveDate::from_ymd_opt(2026, 3, 1).unwrap());
    }
}
