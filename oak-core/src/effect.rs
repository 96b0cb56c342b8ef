//! Effect system — side-effects declared by `update` for the run loop to
//! execute after a cycle completes.
//!
//! An `Effect` is NOT executed by `update` itself — the run loop decides
//! when and how (see `oak-runtime::run`). This is the composability
//! mechanism the whole crate is built around: `update` stays a pure,
//! synchronous function; all suspension, task spawning, and timers live in
//! the effect a call to `update` returns.

use crate::clock::Clock;
use crate::context::Context;
use crate::error::OakError;
use crate::id::TaskId;
use crate::proxy::Input;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

/// A boxed, `Send` future, the shape every effect closure's body is
/// type-erased into.
pub type EffectFuture<Event> = Pin<Box<dyn Future<Output = Result<Vec<Event>, OakError>> + Send>>;

/// Everything an effect closure needs to do its work: the shared
/// environment, a handle to re-inject events, and the task registry.
///
/// The closure signature is `(Env, Input, Context) -> async Result<Vec<Event>>`
/// — no isolator argument, because which isolation domain a closure runs on
/// is a property of how the run loop *schedules* it ([`EffectExec`]), not
/// something the closure body needs to inspect.
pub struct EffectArgs<Event, Env> {
    /// The shared environment supplied to `run`.
    pub env: Arc<Env>,
    /// A send-only handle for feeding events back into the run.
    pub input: Input<Event>,
    /// The run's managed-task registry.
    pub context: Context,
}

impl<Event, Env> Clone for EffectArgs<Event, Env> {
    fn clone(&self) -> Self {
        Self {
            env: self.env.clone(),
            input: self.input.clone(),
            context: self.context.clone(),
        }
    }
}

/// The closure type underlying `Action` and `Operation` effects.
pub type EffectFn<Event, Env> =
    Arc<dyn Fn(EffectArgs<Event, Env>) -> EffectFuture<Event> + Send + Sync>;

/// Which isolation domain an `Action`/`Operation` closure runs on.
///
/// Rust cannot express "the same executor as the caller" as a trait bound
/// without a custom executor abstraction (out of scope here), so the two
/// variants are enforced by *how* the run loop schedules the closure rather
/// than by the closure's own type:
///
/// - [`EffectExec::OnSystem`] — polled inline, on the run loop's own task.
///   Safe for closures that capture non-`Send` pieces of `Env` or that need
///   to observe state changes synchronously with the loop, because nothing
///   else ever polls concurrently with them.
/// - [`EffectExec::OnExecutor`] — spawned with `tokio::spawn`, so the
///   closure and everything it captures must be `Send + 'static`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EffectExec {
    /// Runs inline, serialized with the run loop itself.
    OnSystem,
    /// Runs on its own spawned task.
    OnExecutor,
}

/// Optional scheduling hint passed through to the underlying executor when
/// an `Operation` is spawned with [`EffectExec::OnExecutor`]. Informational
/// only — the run loop's own event ordering is unaffected by it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum OakTaskPriority {
    /// Run sooner, scheduler permitting.
    High,
    /// Default scheduling.
    Normal,
    /// Run later, scheduler permitting.
    Low,
}

/// A declarative description of work to perform after `update` returns.
///
/// `#[non_exhaustive]`-equivalent in spirit (new variants may be added in a
/// minor release); constructed exclusively through the associated
/// functions below, never by matching on the enum for construction.
pub enum Effect<Event, Env> {
    /// Runs inline in the current cycle; may suspend, but the contract is
    /// that it must not suspend indefinitely. Returns zero, one, or many
    /// events to feed back into the current cycle before the next proxy
    /// event is drawn.
    Action {
        /// Isolation domain the closure executes on.
        exec: EffectExec,
        /// The closure itself.
        f: EffectFn<Event, Env>,
    },

    /// Spawns a long-running managed task. Registered with the
    /// [`Context`] under `id` (or a freshly minted one); returns no events
    /// synchronously — any events it wants to raise go through
    /// `EffectArgs::input`.
    Operation {
        /// Explicit task id, or `None` to let the context mint one.
        id: Option<TaskId>,
        /// Scheduling hint, honored only for [`EffectExec::OnExecutor`].
        priority: Option<OakTaskPriority>,
        /// Isolation domain the closure executes on.
        exec: EffectExec,
        /// The task body.
        f: EffectFn<Event, Env>,
    },

    /// As [`Effect::Operation`], but the task first sleeps for `duration`
    /// (via `clock`) before running `f`.
    DelayedOperation {
        /// Explicit task id, or `None` to let the context mint one.
        id: Option<TaskId>,
        /// Minimum delay before `f` runs.
        duration: Duration,
        /// Advisory scheduling slack; see [`Clock::sleep`].
        tolerance: Option<Duration>,
        /// The clock to sleep against (injectable for deterministic tests).
        clock: Arc<dyn Clock>,
        /// Scheduling hint, honored only for [`EffectExec::OnExecutor`].
        priority: Option<OakTaskPriority>,
        /// Isolation domain the closure executes on.
        exec: EffectExec,
        /// The task body.
        f: EffectFn<Event, Env>,
    },

    /// Returns `event` synchronously, to be processed before the next
    /// proxy event is drawn.
    EmitEvent(Event),

    /// Equivalent to a [`Effect::DelayedOperation`] whose body simply sends
    /// `event` back through the proxy after the delay elapses.
    DelayedEmitEvent {
        /// Explicit task id, or `None` to let the context mint one.
        id: Option<TaskId>,
        /// The event to send once the delay elapses.
        event: Event,
        /// Minimum delay before `event` is sent.
        duration: Duration,
        /// Advisory scheduling slack; see [`Clock::sleep`].
        tolerance: Option<Duration>,
        /// The clock to sleep against.
        clock: Arc<dyn Clock>,
    },

    /// Cancels a single managed task; a no-op if `id` isn't registered.
    Cancel(TaskId),

    /// Cancels every managed task.
    CancelAll,

    /// Runs each effect in order, concatenating their emitted events.
    /// Associative: `sequence([a, sequence([b, c])])` behaves identically
    /// to `sequence([a, b, c])` — same event order, same task
    /// registrations, because execution just iterates the flattened list
    /// either way.
    Sequence(Vec<Effect<Event, Env>>),
}

impl<Event, Env> fmt::Debug for Effect<Event, Env> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Effect::Action { exec, .. } => f.debug_struct("Action").field("exec", exec).finish(),
            Effect::Operation { id, exec, .. } => f
                .debug_struct("Operation")
                .field("id", id)
                .field("exec", exec)
                .finish(),
            Effect::DelayedOperation {
                id,
                duration,
                exec,
                ..
            } => f
                .debug_struct("DelayedOperation")
                .field("id", id)
                .field("duration", duration)
                .field("exec", exec)
                .finish(),
            Effect::EmitEvent(_) => f.debug_tuple("EmitEvent").field(&"..").finish(),
            Effect::DelayedEmitEvent { id, duration, .. } => f
                .debug_struct("DelayedEmitEvent")
                .field("id", id)
                .field("duration", duration)
                .finish(),
            Effect::Cancel(id) => f.debug_tuple("Cancel").field(id).finish(),
            Effect::CancelAll => write!(f, "CancelAll"),
            Effect::Sequence(effects) => f.debug_tuple("Sequence").field(effects).finish(),
        }
    }
}

impl<Event, Env> Effect<Event, Env>
where
    Event: Send + 'static,
    Env: Send + Sync + 'static,
{
    /// Build a system-isolated action from an async closure.
    pub fn action<F, Fut>(f: F) -> Self
    where
        F: Fn(EffectArgs<Event, Env>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Vec<Event>, OakError>> + Send + 'static,
    {
        Effect::Action {
            exec: EffectExec::OnSystem,
            f: Arc::new(move |args| Box::pin(f(args))),
        }
    }

    /// As [`Effect::action`], but scheduled on its own executor via
    /// `tokio::spawn` rather than inline with the run loop.
    pub fn action_on_executor<F, Fut>(f: F) -> Self
    where
        F: Fn(EffectArgs<Event, Env>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Vec<Event>, OakError>> + Send + 'static,
    {
        Effect::Action {
            exec: EffectExec::OnExecutor,
            f: Arc::new(move |args| Box::pin(f(args))),
        }
    }

    /// Spawn a managed task with a context-minted id.
    pub fn operation<F, Fut>(f: F) -> Self
    where
        F: Fn(EffectArgs<Event, Env>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Vec<Event>, OakError>> + Send + 'static,
    {
        Self::operation_with(None, None, EffectExec::OnExecutor, f)
    }

    /// Spawn a managed task under an explicit, replace-on-register id.
    pub fn operation_with_id<F, Fut>(id: impl Into<TaskId>, f: F) -> Self
    where
        F: Fn(EffectArgs<Event, Env>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Vec<Event>, OakError>> + Send + 'static,
    {
        Self::operation_with(Some(id.into()), None, EffectExec::OnExecutor, f)
    }

    /// Full-control `Operation` constructor.
    pub fn operation_with<F, Fut>(
        id: Option<TaskId>,
        priority: Option<OakTaskPriority>,
        exec: EffectExec,
        f: F,
    ) -> Self
    where
        F: Fn(EffectArgs<Event, Env>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Vec<Event>, OakError>> + Send + 'static,
    {
        Effect::Operation {
            id,
            priority,
            exec,
            f: Arc::new(move |args| Box::pin(f(args))),
        }
    }

    /// Spawn a managed task that first sleeps for `duration`.
    pub fn delayed_operation<F, Fut>(
        id: Option<TaskId>,
        duration: Duration,
        tolerance: Option<Duration>,
        clock: Arc<dyn Clock>,
        f: F,
    ) -> Self
    where
        F: Fn(EffectArgs<Event, Env>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Vec<Event>, OakError>> + Send + 'static,
    {
        Self::delayed_operation_with(id, duration, tolerance, clock, None, EffectExec::OnExecutor, f)
    }

    /// Full-control `DelayedOperation` constructor.
    #[allow(clippy::too_many_arguments)]
    pub fn delayed_operation_with<F, Fut>(
        id: Option<TaskId>,
        duration: Duration,
        tolerance: Option<Duration>,
        clock: Arc<dyn Clock>,
        priority: Option<OakTaskPriority>,
        exec: EffectExec,
        f: F,
    ) -> Self
    where
        F: Fn(EffectArgs<Event, Env>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Vec<Event>, OakError>> + Send + 'static,
    {
        Effect::DelayedOperation {
            id,
            duration,
            tolerance,
            clock,
            priority,
            exec,
            f: Arc::new(move |args| Box::pin(f(args))),
        }
    }

    /// Emit `event` synchronously, in-cycle.
    pub fn event(event: Event) -> Self {
        Effect::EmitEvent(event)
    }

    /// Emit `event` after `duration` elapses, via a managed delayed task.
    pub fn event_after(event: Event, duration: Duration, clock: Arc<dyn Clock>) -> Self {
        Effect::DelayedEmitEvent {
            id: None,
            event,
            duration,
            tolerance: None,
            clock,
        }
    }

    /// Emit `event` after `duration`, registered under an explicit id (so a
    /// later `event_after`/`cancel_task` with the same id can re-arm or
    /// cancel it).
    pub fn event_after_with_id(
        id: impl Into<TaskId>,
        event: Event,
        duration: Duration,
        tolerance: Option<Duration>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Effect::DelayedEmitEvent {
            id: Some(id.into()),
            event,
            duration,
            tolerance,
            clock,
        }
    }

    /// Cancel a single managed task.
    pub fn cancel_task(id: impl Into<TaskId>) -> Self {
        Effect::Cancel(id.into())
    }

    /// Cancel every managed task.
    pub fn cancel_all_tasks() -> Self {
        Effect::CancelAll
    }

    /// Run a fixed list of effects in order, concatenating their events.
    pub fn sequence(effects: impl IntoIterator<Item = Effect<Event, Env>>) -> Self {
        Effect::Sequence(effects.into_iter().collect())
    }
}
