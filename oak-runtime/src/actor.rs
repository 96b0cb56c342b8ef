//! `ActorHandle` — binds a transducer run's lifetime to an external owner.
//!
//! Grounded on `lexe-tokio`'s `try_join_tasks_and_shutdown`/`LxTask`
//! supervisor-task pattern: the run itself is driven by a spawned task so a
//! panicking completion handler can never poison the handle's `Drop` impl,
//! and dropping the handle always tears the run down rather than leaking it.

use crate::run_with_storage;
use oak_core::{OakError, Proxy, Storage, Subject, Transducer};
use std::sync::Arc;
use tokio::task::JoinHandle;

/// A thin owner-bound wrapper around a transducer run.
///
/// `ActorHandle` holds the [`Proxy`] (for `cancel`/`input`) and the
/// `tokio::spawn`ed supervisor task driving [`crate::run_with_storage`]. It
/// does not buffer events itself — producers talk to the proxy directly
/// through [`ActorHandle::input`] or by keeping their own clone of the
/// `Proxy` passed to [`ActorHandle::spawn`].
///
/// Dropping an `ActorHandle` cancels the run (idempotent — a run that has
/// already finished is unaffected) and detaches the supervisor task; the
/// completion handler, if one hasn't fired yet, still runs to completion on
/// its own task rather than being aborted mid-callback.
pub struct ActorHandle<Event> {
    proxy: Proxy<Event>,
    supervisor: JoinHandle<()>,
}

impl<Event: Send + 'static> ActorHandle<Event> {
    /// Spawn `transducer` against `storage`, bound to `proxy`, as a
    /// supervised task. `on_complete` is invoked exactly once, from the
    /// supervisor task, with the run's final result.
    pub fn spawn<T, S>(
        transducer: T,
        storage: S,
        proxy: Proxy<Event>,
        env: T::Env,
        subject: impl Subject<T::Output> + Send + Sync + 'static,
        on_complete: impl FnOnce(Result<T::Output, OakError>) + Send + 'static,
    ) -> Self
    where
        T: Transducer<Event = Event> + Send + 'static,
        S: Storage<T::State> + Send + Sync + 'static,
    {
        let owned_proxy = proxy.clone();
        let supervisor = tokio::spawn(async move {
            let result = run_with_storage(transducer, storage, owned_proxy, env, subject).await;
            if let Err(error) = &result {
                tracing::debug!(%error, "actor run ended with an error");
            }
            on_complete(result);
        });

        Self { proxy, supervisor }
    }

    /// As [`ActorHandle::spawn`], but owns its state outright via a fresh
    /// [`oak_core::LocalCell`] rather than a caller-supplied [`Storage`].
    pub fn spawn_owned<T>(
        transducer: T,
        initial_state: T::State,
        proxy: Proxy<Event>,
        env: T::Env,
        subject: impl Subject<T::Output> + Send + Sync + 'static,
        on_complete: impl FnOnce(Result<T::Output, OakError>) + Send + 'static,
    ) -> Self
    where
        T: Transducer<Event = Event> + Send + 'static,
    {
        let storage = oak_core::LocalCell::new(initial_state);
        Self::spawn(transducer, storage, proxy, env, subject, on_complete)
    }

    /// This actor's proxy identity.
    pub fn proxy_id(&self) -> oak_core::ProxyId {
        self.proxy.id()
    }

    /// A cloneable send-only handle for feeding events into the run.
    pub fn input(&self) -> oak_core::Input<Event> {
        self.proxy.input()
    }

    /// Forcibly cancel the run. Idempotent — cancelling twice, or
    /// cancelling a run that has already finished, is a no-op beyond the
    /// first call.
    pub fn cancel(&self) {
        self.proxy.cancel();
    }

    /// As [`ActorHandle::cancel`], but attributes the cancellation to
    /// `error` (surfaced as the cause of the `Cancelled` the completion
    /// handler observes).
    pub fn cancel_because(&self, error: OakError) {
        self.proxy.cancel_because(error);
    }

    /// True once the supervisor task (and therefore the run) has finished.
    pub fn is_finished(&self) -> bool {
        self.supervisor.is_finished()
    }
}

impl<Event> Drop for ActorHandle<Event> {
    fn drop(&mut self) {
        self.cancel();
    }
}
