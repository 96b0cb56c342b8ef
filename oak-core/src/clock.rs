//! The Clock protocol — an injectable source of delays.
//!
//! `DelayedOperation`/`DelayedEmitEvent` effects sleep before running; tests
//! substitute a [`Clock`] that can be advanced deterministically instead of
//! waiting on real wall-clock time (see `oak-core::test_support::TestClock`).

use async_trait::async_trait;
use std::time::Duration;

/// An abstract source of delays.
///
/// `tolerance` is advisory slack the implementation is free to use for
/// coalescing timers; it never shortens the minimum delay. The default
/// [`SystemClock`] ignores it (`tokio::time::sleep` has no concept of
/// tolerance); it exists so implementations that can batch timers (common on
/// mobile/embedded targets, per the Swift original this crate is modeled on)
/// have a place to plug in without changing the effect algebra.
#[async_trait]
pub trait Clock: Send + Sync {
    /// Suspend the calling task for at least `duration`.
    async fn sleep(&self, duration: Duration, tolerance: Option<Duration>);
}

/// The default [`Clock`], backed by `tokio::time::sleep`.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

#[async_trait]
impl Clock for SystemClock {
    async fn sleep(&self, duration: Duration, _tolerance: Option<Duration>) {
        tokio::time::sleep(duration).await;
    }
}
