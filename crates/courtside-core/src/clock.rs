//! Wall-clock sources.
//!
//! Everything time-dependent in the core takes `now` as an argument; the
//! [`Clock`] trait is the single place where "now" comes from.

use std::sync::{Arc, Mutex};

use chrono::{DateTime, Duration, Utc};

pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Real wall time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A settable clock shared between clones. Used by tests and replays.
#[derive(Debug, Clone)]
pub struct ManualClock {
    inner: Arc<Mutex<DateTime<Utc>>>,
}

impl ManualClock {
    pub fn new(at: DateTime<Utc>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(at)),
        }
    }

    pub fn set(&self, at: DateTime<Utc>) {
        let mut guard = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        *guard = at;
    }

    pub fn advance_secs(&self, secs: i64) {
        let mut guard = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        *guard += Duration::seconds(secs);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn manual_clock_advances_all_clones() {
        let t0 = Utc::now();
        let clock = ManualClock::new(t0);
        let other = clock.clone();
        clock.advance_secs(5);
        assert_eq!(other.now(), t0 + Duration::seconds(5));
    }
}
