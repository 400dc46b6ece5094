//! Injected time source.
//!
//! Replaces any ambient "now" lookups with an explicit service value so the
//! Liveness Monitor's threshold logic is deterministically testable.

use chrono::{DateTime, Utc};

/// A source of the current time.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// The real wall clock.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A clock that returns a fixed, externally-advanced instant. For tests.
#[derive(Debug, Clone)]
pub struct FixedClock {
    now: std::sync::Arc<std::sync::atomic::AtomicI64>,
}

impl FixedClock {
    pub fn new(at: DateTime<Utc>) -> Self {
        Self {
            now: std::sync::Arc::new(std::sync::atomic::AtomicI64::new(at.timestamp_millis())),
        }
    }

    pub fn advance(&self, duration: chrono::Duration) {
        self.now
            .fetch_add(duration.num_milliseconds(), std::sync::atomic::Ordering::SeqCst);
    }

    pub fn set(&self, at: DateTime<Utc>) {
        self.now
            .store(at.timestamp_millis(), std::sync::atomic::Ordering::SeqCst);
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        let millis = self.now.load(std::sync::atomic::Ordering::SeqCst);
        DateTime::from_timestamp_millis(millis).unwrap_or_else(Utc::now)
    }
}
