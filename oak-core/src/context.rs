//! `Context` — the per-run registry of managed (`Operation`) tasks.
//!
//! Grounded on `neuron-orch-kit`'s runner bookkeeping (a map from a logical
//! id to a handle, checked before spawning a replacement) and on
//! `lexe-tokio`'s task supervision style (`AbortHandle` plus a
//! `CancellationToken` so a task can be torn down both forcibly and
//! cooperatively).

use crate::error::OakError;
use crate::id::{TaskId, TaskUid};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::Notify;
use tokio::task::AbortHandle;
use tokio_util::sync::CancellationToken;

struct TaskEntry {
    uid: TaskUid,
    abort: Option<AbortHandle>,
    cancel: CancellationToken,
}

struct Inner {
    next_uid: AtomicU64,
    next_synthetic: AtomicU64,
    tasks: Mutex<HashMap<TaskId, TaskEntry>>,
    fatal: Mutex<Option<OakError>>,
    fatal_notify: Notify,
}

/// The task registry a run carries for its whole lifetime.
///
/// Cheap to clone (an `Arc` underneath); every [`crate::effect::Effect::Operation`]
/// closure gets a clone through `EffectArgs::context`, and the run loop
/// keeps one to implement `Cancel`/`CancelAll` and to tear everything down
/// when the run itself ends.
#[derive(Clone)]
pub struct Context {
    inner: Arc<Inner>,
}

impl Default for Context {
    fn default() -> Self {
        Self::new()
    }
}

impl Context {
    /// Build an empty registry.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Inner {
                next_uid: AtomicU64::new(0),
                next_synthetic: AtomicU64::new(0),
                tasks: Mutex::new(HashMap::new()),
                fatal: Mutex::new(None),
                fatal_notify: Notify::new(),
            }),
        }
    }

    /// Mint a `uid` distinguishing this task instance from any future task
    /// that reuses the same `TaskId`. Must be minted before
    /// [`Context::register`] and held by the task body so its eventual
    /// self-removal can be checked against the registry's current
    /// occupant — see [`Context::remove_completed`].
    pub fn fresh_uid(&self) -> TaskUid {
        TaskUid::new(self.inner.next_uid.fetch_add(1, Ordering::Relaxed))
    }

    /// Mint a synthetic [`TaskId`] for an `Operation` that didn't specify
    /// one explicitly.
    pub fn fresh_id(&self) -> TaskId {
        TaskId::Synthetic(self.inner.next_synthetic.fetch_add(1, Ordering::Relaxed))
    }

    /// Register a newly spawned task, replacing (and cancelling) whatever
    /// task currently occupies `id`, if any.
    ///
    /// `abort` is `None` for a system-isolated ([`crate::effect::EffectExec::OnSystem`])
    /// task: nothing was spawned for it to abort, so cancellation for those
    /// is cooperative only, through `cancel`.
    pub fn register(
        &self,
        id: TaskId,
        uid: TaskUid,
        abort: Option<AbortHandle>,
        cancel: CancellationToken,
    ) {
        let previous = {
            let mut tasks = self.inner.tasks.lock().unwrap();
            tasks.insert(
                id.clone(),
                TaskEntry {
                    uid,
                    abort,
                    cancel,
                },
            )
        };
        if let Some(previous) = previous {
            tracing::debug!(task_id = %id, "replacing managed task, cancelling predecessor");
            previous.cancel.cancel();
            if let Some(abort) = previous.abort {
                abort.abort();
            }
        }
    }

    /// Remove `id` from the registry, but only if its current occupant's
    /// `uid` still matches `uid`. A task's own "I'm done, remove me" call
    /// races against a replacement registered under the same id while the
    /// removal was in flight; this gate makes sure a late self-removal from
    /// the *old* task can never evict its *replacement*.
    pub fn remove_completed(&self, id: &TaskId, uid: TaskUid) -> bool {
        let mut tasks = self.inner.tasks.lock().unwrap();
        if tasks.get(id).map(|entry| entry.uid) == Some(uid) {
            tasks.remove(id);
            true
        } else {
            false
        }
    }

    /// Cancel and remove a single task. A no-op, returning `false`, if `id`
    /// isn't currently registered.
    pub fn cancel_by_id(&self, id: &TaskId) -> bool {
        let entry = self.inner.tasks.lock().unwrap().remove(id);
        match entry {
            Some(entry) => {
                entry.cancel.cancel();
                if let Some(abort) = entry.abort {
                    abort.abort();
                }
                true
            }
            None => false,
        }
    }

    /// Cancel and remove every registered task.
    pub fn cancel_all(&self) {
        let entries: Vec<TaskEntry> = {
            let mut tasks = self.inner.tasks.lock().unwrap();
            tasks.drain().map(|(_, entry)| entry).collect()
        };
        for entry in entries {
            entry.cancel.cancel();
            if let Some(abort) = entry.abort {
                abort.abort();
            }
        }
    }

    /// Number of currently registered tasks. Exposed for tests and
    /// diagnostics, not part of the effect algebra itself.
    pub fn len(&self) -> usize {
        self.inner.tasks.lock().unwrap().len()
    }

    /// True if no tasks are registered.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Report a fatal operation failure. Only the first call wins; later
    /// calls are dropped silently, since the run is already on its way
    /// down. A bare cancellation (`error.is_cancellation()`) should not be
    /// reported here — operation bodies swallow those.
    pub fn terminate(&self, error: OakError) {
        let mut fatal = self.inner.fatal.lock().unwrap();
        if fatal.is_none() {
            *fatal = Some(error);
            drop(fatal);
            self.inner.fatal_notify.notify_waiters();
        }
    }

    /// Suspend until a task calls [`Context::terminate`], then return the
    /// error it reported. Meant to be selected against by the run loop
    /// alongside proxy/cancellation events.
    pub async fn wait_for_termination(&self) -> OakError {
        loop {
            {
                let mut fatal = self.inner.fatal.lock().unwrap();
                if let Some(error) = fatal.take() {
                    return error;
                }
            }
            self.inner.fatal_notify.notified().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dummy_token() -> CancellationToken {
        CancellationToken::new()
    }

    #[test]
    fn registering_under_a_live_id_cancels_the_previous_token_exactly_once() {
        let context = Context::new();
        let id: TaskId = "t".into();

        let first_token = dummy_token();
        context.register(id.clone(), context.fresh_uid(), None, first_token.clone());
        assert!(!first_token.is_cancelled());

        let second_token = dummy_token();
        context.register(id.clone(), context.fresh_uid(), None, second_token.clone());

        assert!(first_token.is_cancelled(), "predecessor must be cancelled on replace");
        assert!(!second_token.is_cancelled());
        assert_eq!(context.len(), 1);
    }

    #[test]
    fn late_self_removal_does_not_clobber_a_replacement() {
        let context = Context::new();
        let id: TaskId = "t".into();

        let old_uid = context.fresh_uid();
        context.register(id.clone(), old_uid, None, dummy_token());

        let new_uid = context.fresh_uid();
        context.register(id.clone(), new_uid, None, dummy_token());

        // The old task's completion races in after its replacement; its
        // self-removal must be a no-op.
        assert!(!context.remove_completed(&id, old_uid));
        assert_eq!(context.len(), 1);

        assert!(context.remove_completed(&id, new_uid));
        assert!(context.is_empty());
    }

    #[test]
    fn cancel_by_id_is_a_no_op_when_absent() {
        let context = Context::new();
        assert!(!context.cancel_by_id(&"missing".into()));
    }

    #[tokio::test]
    async fn only_the_first_terminate_call_is_observed() {
        let context = Context::new();
        context.terminate(OakError::cancelled());
        context.terminate(OakError::Other(Box::new(std::io::Error::new(
            std::io::ErrorKind::Other,
            "second, ignored",
        ))));

        let observed = context.wait_for_termination().await;
        assert!(observed.is_cancellation());
    }
}
