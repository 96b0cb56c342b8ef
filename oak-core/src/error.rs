//! The Oak error taxonomy.
//!
//! Oak has exactly one protocol boundary — the run loop — so its taxonomy
//! collapses to a single `#[non_exhaustive]` enum rather than one error type
//! per subsystem, grouping five tiers: programmer errors, producer errors,
//! cancellation, operation failures, and subject failures.

use crate::id::TaskId;
use thiserror::Error;

/// Errors surfaced by [`crate::run`]/[`crate::run_with_storage`] (defined in
/// `oak-runtime`, re-exported here since every variant lives on this type).
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum OakError {
    /// A [`crate::proxy::Proxy`] was bound to a second run. Proxies are
    /// single-use: once bound, reuse is a programmer error.
    #[error("proxy already bound to a run")]
    ProxyAlreadyInUse,

    /// The run ended without ever producing an output — the initial state
    /// was terminal and no `initial_output` was supplied.
    #[error("no output produced")]
    NoOutputProduced,

    /// The run was cancelled: by `Proxy::cancel`, by the owning task being
    /// cancelled, or by the last `Proxy`/`Input` handle being dropped.
    /// Carries the triggering error when cancellation was not bare (e.g. an
    /// operation failure routed through `Context::terminate`).
    #[error("run cancelled{}", .cause.as_ref().map(|c| format!(": {c}")).unwrap_or_default())]
    Cancelled {
        /// The error that triggered cancellation, if any.
        #[source]
        cause: Option<Box<OakError>>,
    },

    /// The buffered proxy dropped an event. Since the policy is "drop
    /// oldest, accept newest", this is only raised when the proxy cannot
    /// accept an event at all (for example, a zero-capacity buffer).
    #[error("dropped event: {0}")]
    DroppedEvent(String),

    /// An `Input::send` arrived after the proxy's stream had already
    /// finished (terminal state reached, or explicit `finish`/`cancel`).
    #[error("send after terminate")]
    SendAfterTerminate,

    /// The last handle to a proxy was dropped while its run was still
    /// live. Equivalent to an explicit `cancel` with this error.
    #[error("proxy deinitialized")]
    ProxyDeinitialized,

    /// A managed [`crate::effect::Effect::Operation`] task returned a
    /// non-cancellation error; the task id identifies which one.
    #[error("operation {id} failed: {source}")]
    OperationFailed {
        /// The task id of the failing operation.
        id: TaskId,
        /// The underlying failure.
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// A [`crate::subject::Subject::send`] call failed.
    #[error("subject send failed: {0}")]
    SubjectFailed(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// Catch-all for errors that don't fit another variant.
    #[error("{0}")]
    Other(#[from] Box<dyn std::error::Error + Send + Sync>),
}

impl OakError {
    /// Wrap `self` as the cause of a [`OakError::Cancelled`].
    pub fn into_cancelled(self) -> OakError {
        OakError::Cancelled {
            cause: Some(Box::new(self)),
        }
    }

    /// A bare cancellation with no underlying cause (proxy cancelled with
    /// no error, or cooperative host-task cancellation).
    pub fn cancelled() -> OakError {
        OakError::Cancelled { cause: None }
    }

    /// True if this is (or wraps) a cancellation, as opposed to a hard
    /// failure. Operation task bodies use this to decide whether to
    /// swallow an error silently (benign cooperative cancellation) or
    /// route it through `Context::terminate`.
    pub fn is_cancellation(&self) -> bool {
        matches!(self, OakError::Cancelled { .. })
    }
}
