//! The Storage protocol — an abstract read/write cell for transducer state.
//!
//! All reads and writes happen inside the run loop's isolation domain; the
//! run loop is the sole writer for the lifetime of a run. Concurrent
//! external mutation of a `Storage` while a run is live is undefined
//! behavior of this contract and must not be attempted — see the type-level
//! docs below for why the internal lock is not a concurrency-control
//! mechanism.

use async_trait::async_trait;
use tokio::sync::RwLock;

/// A minimal read/write cell for transducer state, reachable through a
/// shared (non-exclusive) reference so it composes with `Arc`.
///
/// Implementations: [`LocalCell`] (state owned by the run), [`SharedCell`]
/// (a "path-into-host" pointer into a cell the caller owns), and
/// [`WatchedCell`] (an externally observable cell for systems that want to
/// subscribe to state changes).
#[async_trait]
pub trait Storage<S>: Send + Sync {
    /// Read the current value by cloning it out from behind the lock.
    async fn get(&self) -> S
    where
        S: Clone;

    /// Replace the current value.
    async fn set(&self, value: S);

    /// Mutate the current value in place via a closure, avoiding the clone
    /// `get`/`set` would otherwise require. This is the operation the run
    /// loop actually uses on every `update` call.
    async fn with_mut<R>(&self, f: impl FnOnce(&mut S) -> R + Send) -> R
    where
        R: Send;
}

/// State owned outright by the run; the common case when the caller has no
/// need to observe or share state with anything outside the transducer.
///
/// Uses `tokio::sync::RwLock` rather than a bare `RefCell` so the cell stays
/// `Send + Sync` and can be wrapped in an `Arc` and hooked up to a
/// `WatchedCell`-style observer without unsafe code. The run loop is always
/// the sole writer, so this lock is never actually contended — it exists for
/// the `Send + Sync` bound, not for concurrency control.
pub struct LocalCell<S> {
    inner: RwLock<S>,
}

impl<S> LocalCell<S> {
    /// Wrap an owned initial value.
    pub fn new(value: S) -> Self {
        Self {
            inner: RwLock::new(value),
        }
    }
}

#[async_trait]
impl<S: Send + Sync> Storage<S> for LocalCell<S> {
    async fn get(&self) -> S
    where
        S: Clone,
    {
        self.inner.read().await.clone()
    }

    async fn set(&self, value: S) {
        *self.inner.write().await = value;
    }

    async fn with_mut<R>(&self, f: impl FnOnce(&mut S) -> R + Send) -> R
    where
        R: Send,
    {
        f(&mut self.inner.write().await)
    }
}

/// A "path-into-host" pointer into a cell the caller owns. Several
/// [`SharedCell`] handles may point at the same underlying state; the run
/// loop treats whichever one it was given exactly like a [`LocalCell`].
pub struct SharedCell<S> {
    inner: std::sync::Arc<RwLock<S>>,
}

impl<S> SharedCell<S> {
    /// Wrap an existing shared cell.
    pub fn new(inner: std::sync::Arc<RwLock<S>>) -> Self {
        Self { inner }
    }

    /// Allocate a fresh shared cell and return a handle to it.
    pub fn with_value(value: S) -> Self {
        Self::new(std::sync::Arc::new(RwLock::new(value)))
    }

    /// Clone out another handle pointing at the same underlying cell.
    pub fn handle(&self) -> Self
    where
        S: Send + Sync,
    {
        Self {
            inner: self.inner.clone(),
        }
    }
}

#[async_trait]
impl<S: Send + Sync> Storage<S> for SharedCell<S> {
    async fn get(&self) -> S
    where
        S: Clone,
    {
        self.inner.read().await.clone()
    }

    async fn set(&self, value: S) {
        *self.inner.write().await = value;
    }

    async fn with_mut<R>(&self, f: impl FnOnce(&mut S) -> R + Send) -> R
    where
        R: Send,
    {
        f(&mut self.inner.write().await)
    }
}

/// An externally observable cell: every `set`/`with_mut` publishes the new
/// value on a `tokio::sync::watch` channel, so other tasks can subscribe to
/// state changes without touching the run loop's isolation domain.
pub struct WatchedCell<S> {
    inner: RwLock<S>,
    tx: tokio::sync::watch::Sender<()>,
}

impl<S: Clone> WatchedCell<S> {
    /// Wrap an owned initial value, returning the cell and a receiver that
    /// wakes (with no payload — subscribers re-read via [`WatchedCell::get`])
    /// on every write.
    pub fn new(value: S) -> (Self, tokio::sync::watch::Receiver<()>) {
        let (tx, rx) = tokio::sync::watch::channel(());
        (
            Self {
                inner: RwLock::new(value),
                tx,
            },
            rx,
        )
    }
}

#[async_trait]
impl<S: Send + Sync> Storage<S> for WatchedCell<S> {
    async fn get(&self) -> S
    where
        S: Clone,
    {
        self.inner.read().await.clone()
    }

    async fn set(&self, value: S) {
        *self.inner.write().await = value;
        let _ = self.tx.send(());
    }

    async fn with_mut<R>(&self, f: impl FnOnce(&mut S) -> R + Send) -> R
    where
        R: Send,
    {
        let result = f(&mut self.inner.write().await);
        let _ = self.tx.send(());
        result
    }
}
