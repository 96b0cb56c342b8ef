//! Test doubles for [`crate::clock::Clock`] and [`crate::subject::Subject`],
//! gated behind the `test-support` feature: reference implementations good
//! enough for this crate's own tests, and re-exported for
//! `oak-runtime`/`oak` to reuse rather than each inventing their own.

use crate::clock::Clock;
use crate::error::OakError;
use crate::subject::Subject;
use async_trait::async_trait;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::Notify;

/// A [`Clock`] advanced by explicit calls to [`TestClock::advance`] rather
/// than wall-clock time, for deterministic timer tests.
#[derive(Clone)]
pub struct TestClock {
    now: Arc<Mutex<Duration>>,
    notify: Arc<Notify>,
}

impl TestClock {
    /// Construct a clock starting at `Duration::ZERO`.
    pub fn new() -> Self {
        Self {
            now: Arc::new(Mutex::new(Duration::ZERO)),
            notify: Arc::new(Notify::new()),
        }
    }

    /// Move the clock forward by `by`, waking any pending `sleep` calls
    /// whose deadline has now elapsed.
    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock().unwrap();
        *now += by;
        drop(now);
        self.notify.notify_waiters();
    }

    /// The clock's current reading.
    pub fn now(&self) -> Duration {
        *self.now.lock().unwrap()
    }
}

impl Default for TestClock {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Clock for TestClock {
    async fn sleep(&self, duration: Duration, _tolerance: Option<Duration>) {
        let deadline = self.now() + duration;
        while self.now() < deadline {
            self.notify.notified().await;
        }
    }
}

/// A [`Subject`] that records every value it receives, for assertions.
pub struct VecSubject<T> {
    values: Mutex<Vec<T>>,
}

impl<T> VecSubject<T> {
    /// Construct an empty recorder.
    pub fn new() -> Self {
        Self {
            values: Mutex::new(Vec::new()),
        }
    }

    /// A snapshot of every value received so far, in order.
    pub fn snapshot(&self) -> Vec<T>
    where
        T: Clone,
    {
        self.values.lock().unwrap().clone()
    }

    /// Number of values received so far.
    pub fn len(&self) -> usize {
        self.values.lock().unwrap().len()
    }

    /// True if nothing has been received yet.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<T> Default for VecSubject<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl<T: Send + Sync + 'static> Subject<T> for VecSubject<T> {
    async fn send(&self, value: T) -> Result<(), OakError> {
        self.values.lock().unwrap().push(value);
        Ok(())
    }
}
