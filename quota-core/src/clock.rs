use std::sync::Arc;
use std::time::{Duration, SystemTime};

/// A monotonic-safe source of wall-clock instants.
///
/// Algorithms never read `SystemTime::now()` directly — they go through
/// whatever `Clock` they were constructed with, so tests can drive time
/// deterministically instead of sleeping (spec §9 "process-wide clock").
pub trait Clock: Send + Sync + std::fmt::Debug {
    fn now(&self) -> SystemTime;
}

/// The real wall clock. Used by every production algorithm/store.
#[derive(Debug, Clone, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> SystemTime {
        SystemTime::now()
    }
}

/// A clock tests can pin and advance explicitly, instead of sleeping on
/// the real one. Shared via `Arc` so a single instance can be handed to
/// both the algorithm under test and the assertions around it.
#[derive(Debug, Clone)]
pub struct TestClock {
    inner: Arc<parking_lot::Mutex<SystemTime>>,
}

impl TestClock {
    pub fn new(start: SystemTime) -> Self {
        Self {
            inner: Arc::new(parking_lot::Mutex::new(start)),
        }
    }

    pub fn advance(&self, by: Duration) {
        let mut guard = self.inner.lock();
        *guard += by;
    }

    pub fn set(&self, at: SystemTime) {
        *self.inner.lock() = at;
    }
}

impl Clock for TestClock {
    fn now(&self) -> SystemTime {
        *self.inner.lock()
    }
}
