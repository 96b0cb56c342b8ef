//! Effect interpretation: turns one [`Effect`] into either synchronous
//! events (`Action`, `EmitEvent`, `Sequence` of those) or a managed
//! background task registered with the run's [`Context`]
//! (`Operation`, `DelayedOperation`, `DelayedEmitEvent`).

use futures::stream::FuturesUnordered;
use oak_core::effect::{Effect, EffectArgs, EffectExec, EffectFn, OakTaskPriority};
use oak_core::{Clock, Context, Input, OakError, TaskId};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// A type-erased future driving one system-isolated managed task, polled by
/// the run loop's own `FuturesUnordered` rather than spawned separately.
pub type InlineFuture = Pin<Box<dyn Future<Output = ()> + Send>>;

/// Execute `effect`, returning whatever events it produced synchronously.
///
/// `Operation`/`DelayedOperation`/`DelayedEmitEvent` never appear in the
/// returned `Vec` — their events, if any, arrive later through `input`.
pub async fn execute_effect<Event, Env>(
    effect: Effect<Event, Env>,
    env: &Arc<Env>,
    input: &Input<Event>,
    context: &Context,
    inline_ops: &mut FuturesUnordered<InlineFuture>,
) -> Result<Vec<Event>, OakError>
where
    Event: Send + 'static,
    Env: Send + Sync + 'static,
{
    match effect {
        Effect::Action { exec, f } => execute_action(exec, f, env, input, context).await,

        Effect::Operation {
            id,
            priority,
            exec,
            f,
        } => {
            spawn_operation(id, priority, exec, None, f, env, input, context, inline_ops);
            Ok(Vec::new())
        }

        Effect::DelayedOperation {
            id,
            duration,
            tolerance,
            clock,
            priority,
            exec,
            f,
        } => {
            spawn_operation(
                id,
                priority,
                exec,
                Some((duration, tolerance, clock)),
                f,
                env,
                input,
                context,
                inline_ops,
            );
            Ok(Vec::new())
        }

        Effect::EmitEvent(event) => Ok(vec![event]),

        Effect::DelayedEmitEvent {
            id,
            event,
            duration,
            tolerance,
            clock,
        } => {
            spawn_delayed_emit(id, event, duration, tolerance, clock, input, context);
            Ok(Vec::new())
        }

        Effect::Cancel(id) => {
            context.cancel_by_id(&id);
            Ok(Vec::new())
        }

        Effect::CancelAll => {
            context.cancel_all();
            Ok(Vec::new())
        }

        Effect::Sequence(effects) => {
            let mut all = Vec::new();
            for inner in effects {
                let mut events =
                    Box::pin(execute_effect(inner, env, input, context, inline_ops)).await?;
                all.append(&mut events);
            }
            Ok(all)
        }
    }
}

async fn execute_action<Event, Env>(
    exec: EffectExec,
    f: EffectFn<Event, Env>,
    env: &Arc<Env>,
    input: &Input<Event>,
    context: &Context,
) -> Result<Vec<Event>, OakError>
where
    Event: Send + 'static,
    Env: Send + Sync + 'static,
{
    let args = EffectArgs {
        env: env.clone(),
        input: input.clone(),
        context: context.clone(),
    };
    match exec {
        EffectExec::OnSystem => f(args).await,
        EffectExec::OnExecutor => tokio::spawn(f(args))
            .await
            .map_err(|join_err| OakError::Other(Box::new(join_err)))?,
    }
}

#[allow(clippy::too_many_arguments)]
fn spawn_operation<Event, Env>(
    id: Option<TaskId>,
    priority: Option<OakTaskPriority>,
    exec: EffectExec,
    delay: Option<(Duration, Option<Duration>, Arc<dyn Clock>)>,
    f: EffectFn<Event, Env>,
    env: &Arc<Env>,
    input: &Input<Event>,
    context: &Context,
    inline_ops: &mut FuturesUnordered<InlineFuture>,
) where
    Event: Send + 'static,
    Env: Send + Sync + 'static,
{
    let id = id.unwrap_or_else(|| context.fresh_id());
    let uid = context.fresh_uid();
    let cancel = CancellationToken::new();
    let cancel_child = cancel.clone();

    if let Some(priority) = priority {
        if exec == EffectExec::OnExecutor {
            tracing::debug!(task_id = %id, ?priority, "scheduling hint for spawned operation");
        } else {
            tracing::debug!(
                task_id = %id,
                ?priority,
                "scheduling hint ignored, operation runs inline on-system"
            );
        }
    }

    let args = EffectArgs {
        env: env.clone(),
        input: input.clone(),
        context: context.clone(),
    };
    let forward = input.clone();
    let ctx = context.clone();
    let task_id = id.clone();

    let body = Box::pin(async move {
        if let Some((duration, tolerance, clock)) = delay {
            tokio::select! {
                _ = cancel_child.cancelled() => {
                    ctx.remove_completed(&task_id, uid);
                    return;
                }
                _ = clock.sleep(duration, tolerance) => {}
            }
        }

        let outcome = tokio::select! {
            _ = cancel_child.cancelled() => {
                ctx.remove_completed(&task_id, uid);
                return;
            }
            outcome = f(args) => outcome,
        };

        match outcome {
            Ok(events) => {
                for event in events {
                    if forward.send(event).await.is_err() {
                        break;
                    }
                }
            }
            Err(error) if error.is_cancellation() => {
                tracing::debug!(task_id = %task_id, "managed task cancelled");
            }
            Err(error) => {
                tracing::debug!(task_id = %task_id, error = %error, "managed task failed");
                ctx.terminate(OakError::OperationFailed {
                    id: task_id.clone(),
                    source: Box::new(error),
                });
            }
        }

        ctx.remove_completed(&task_id, uid);
    });

    match exec {
        EffectExec::OnExecutor => {
            let handle = tokio::spawn(body);
            context.register(id, uid, Some(handle.abort_handle()), cancel);
        }
        EffectExec::OnSystem => {
            inline_ops.push(body);
            context.register(id, uid, None, cancel);
        }
    }
}

fn spawn_delayed_emit<Event>(
    id: Option<TaskId>,
    event: Event,
    duration: Duration,
    tolerance: Option<Duration>,
    clock: Arc<dyn Clock>,
    input: &Input<Event>,
    context: &Context,
) where
    Event: Send + 'static,
{
    let id = id.unwrap_or_else(|| context.fresh_id());
    let uid = context.fresh_uid();
    let cancel = CancellationToken::new();
    let cancel_child = cancel.clone();
    let forward = input.clone();
    let ctx = context.clone();
    let task_id = id.clone();

    let body = async move {
        tokio::select! {
            _ = cancel_child.cancelled() => {}
            _ = clock.sleep(duration, tolerance) => {
                let _ = forward.send(event).await;
            }
        }
        ctx.remove_completed(&task_id, uid);
    };

    let handle = tokio::spawn(body);
    context.register(id, uid, Some(handle.abort_handle()), cancel);
}
