//! Opaque identifiers used for proxy identity and managed-task bookkeeping.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

static PROXY_SEQUENCE: AtomicU64 = AtomicU64::new(0);

/// Stable, unique identity of a [`crate::proxy::Proxy`] for its whole lifetime.
///
/// Used for equality, diagnostics, and as the `tracing` span field that
/// correlates all log output belonging to one run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ProxyId(u64);

impl ProxyId {
    /// Mint a fresh, never-before-used proxy id.
    pub fn fresh() -> Self {
        Self(PROXY_SEQUENCE.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for ProxyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "proxy-{}", self.0)
    }
}

/// Client-supplied or synthesized tag identifying a managed task within a
/// [`crate::context::Context`].
///
/// Two tasks registered under the same `TaskId` replace one another (the
/// newer registration cancels the older task first). Clients pass their own
/// `TaskId` when they want replace-on-register semantics (e.g. "the timer
/// task", re-armed on every tick); when a client omits one, the context
/// mints a synthetic id via [`crate::context::Context::fresh_id`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TaskId {
    /// A caller-chosen tag, opaque to Oak beyond equality and hashing.
    Named(String),
    /// A context-minted id, used when an effect omits an explicit one.
    Synthetic(u64),
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TaskId::Named(name) => write!(f, "{name}"),
            TaskId::Synthetic(n) => write!(f, "#{n}"),
        }
    }
}

impl From<&str> for TaskId {
    fn from(s: &str) -> Self {
        TaskId::Named(s.to_owned())
    }
}

impl From<String> for TaskId {
    fn from(s: String) -> Self {
        TaskId::Named(s)
    }
}

/// Distinguishes successive tasks that happen to share a [`TaskId`] so that
/// a task's late, racing self-removal cannot clobber a replacement task
/// registered under the same id in the meantime.
///
/// `uid`s are minted by [`crate::context::Context::fresh_uid`] and are never
/// reused within one run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TaskUid(u64);

impl TaskUid {
    pub(crate) fn new(value: u64) -> Self {
        Self(value)
    }
}

impl fmt::Display for TaskUid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "uid-{}", self.0)
    }
}
