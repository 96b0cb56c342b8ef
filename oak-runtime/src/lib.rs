//! # oak-runtime — the run loop that executes Oak's effect algebra
//!
//! `oak-core` defines *what* an [`Effect`] means; this crate defines *when*
//! it runs. [`run`] and [`run_with_storage`] are the only two entry points:
//! both drive a [`Transducer`] against a bound [`Proxy`], deliver every
//! cycle's output through a [`Subject`], and execute whatever effect
//! `update` returns — inline for `Action`, as a managed background task for
//! `Operation`/`DelayedOperation`, and so on.
//!
//! The loop itself is the closest analog in the crate to
//! `neuron-orch-kit::runner`'s effect-interpretation loop: pop one unit of
//! work, run it, act on what it asks for, repeat until the stream ends, a
//! fatal error is reported, or the transducer reaches a terminal state.
//!
//! [`ActorHandle`] wraps a run so its lifetime can be tied to an external
//! owner, in the spirit of a supervised-task pattern.

mod actor;
mod effect_exec;

pub use actor::ActorHandle;
pub use effect_exec::execute_effect;

use effect_exec::InlineFuture;
use futures::stream::FuturesUnordered;
use futures::StreamExt;
use oak_core::proxy::ProxyConsumer;
use oak_core::{Context, Input, OakError, Proxy, Storage, Subject, Transducer};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

/// Convenience alias: an `Effect` scoped to a particular [`Transducer`]'s
/// `Event`/`Env` types.
pub type TransducerEffect<T> =
    oak_core::Effect<<T as Transducer>::Event, <T as Transducer>::Env>;

/// Run `transducer` to completion against `proxy`, storing state in a
/// fresh, owned cell.
///
/// `proxy` should be a clone the caller made for this purpose — the caller
/// keeps its own handle to feed events and to `finish`/`cancel` the run.
/// Dropping every external handle cancels the run; see [`Proxy`]'s own
/// docs for the mechanics.
pub async fn run<T>(
    transducer: T,
    initial_state: T::State,
    proxy: Proxy<T::Event>,
    env: T::Env,
    subject: impl Subject<T::Output> + Send + Sync + 'static,
) -> Result<T::Output, OakError>
where
    T: Transducer,
{
    let storage = oak_core::LocalCell::new(initial_state);
    run_with_storage(transducer, storage, proxy, env, subject).await
}

/// As [`run`], but state lives in a caller-supplied [`Storage`] cell rather
/// than one this function owns outright — the `SharedCell`/`WatchedCell`
/// path for state a host wants to read or observe independently of the
/// run.
pub async fn run_with_storage<T, S>(
    transducer: T,
    storage: S,
    proxy: Proxy<T::Event>,
    env: T::Env,
    subject: impl Subject<T::Output> + Send + Sync + 'static,
) -> Result<T::Output, OakError>
where
    T: Transducer,
    S: Storage<T::State>,
{
    let proxy_id = proxy.id();
    let span = tracing::info_span!("oak_run", proxy = %proxy_id);
    run_loop(transducer, storage, proxy, Arc::new(env), subject)
        .instrument(span)
        .await
}

async fn run_loop<T, S>(
    transducer: T,
    storage: S,
    proxy: Proxy<T::Event>,
    env: Arc<T::Env>,
    subject: impl Subject<T::Output> + Send + Sync + 'static,
) -> Result<T::Output, OakError>
where
    T: Transducer,
    S: Storage<T::State>,
{
    let mut consumer = proxy.bind()?;
    let cancel = proxy.cancellation();
    let context = Context::new();
    let input = proxy.input();
    let mut inline_ops: FuturesUnordered<InlineFuture> = FuturesUnordered::new();

    let result = run_cycles(
        &transducer,
        &storage,
        &mut consumer,
        &proxy,
        &cancel,
        &context,
        &env,
        &input,
        &subject,
        &mut inline_ops,
    )
    .await;

    context.cancel_all();
    result
}

#[allow(clippy::too_many_arguments)]
async fn run_cycles<T, S>(
    transducer: &T,
    storage: &S,
    consumer: &mut ProxyConsumer<T::Event>,
    proxy: &Proxy<T::Event>,
    cancel: &CancellationToken,
    context: &Context,
    env: &Arc<T::Env>,
    input: &Input<T::Event>,
    subject: &(impl Subject<T::Output> + Send + Sync + 'static),
    inline_ops: &mut FuturesUnordered<InlineFuture>,
) -> Result<T::Output, OakError>
where
    T: Transducer,
    S: Storage<T::State>,
{
    let mut pending: std::collections::VecDeque<T::Event> = std::collections::VecDeque::new();
    let mut last_output: Option<T::Output> = None;
    let mut terminal = storage.with_mut(|state| transducer.is_terminal(state)).await;

    let initial_output = storage
        .with_mut(|state| transducer.initial_output(state))
        .await;
    if let Some(output) = initial_output {
        subject.send(output.clone()).await?;
        last_output = Some(output);
    }

    if terminal {
        if cancel.is_cancelled() {
            return Err(proxy.take_cancel_cause());
        }
        return last_output.ok_or(OakError::NoOutputProduced);
    }

    'outer: loop {
        if terminal {
            if cancel.is_cancelled() {
                return Err(proxy.take_cancel_cause());
            }
            return last_output.ok_or(OakError::NoOutputProduced);
        }

        let event;
        let mut ack = None;

        if let Some(next_event) = pending.pop_front() {
            event = next_event;
        } else {
            tokio::select! {
                biased;

                _ = cancel.cancelled() => return Err(proxy.take_cancel_cause()),

                error = context.wait_for_termination() => {
                    proxy.finish();
                    return Err(error);
                }

                next = consumer.next() => match next {
                    None => return last_output.ok_or(OakError::NoOutputProduced),
                    Some((next_event, next_ack)) => {
                        event = next_event;
                        ack = next_ack;
                    }
                },

                Some(()) = inline_ops.next(), if !inline_ops.is_empty() => {
                    continue 'outer;
                }
            }
        }

        tracing::trace!("processing event");

        let (output, effect, reached_terminal) = storage
            .with_mut(|state| {
                let outcome = transducer.update(state, event);
                let is_terminal = transducer.is_terminal(state);
                (outcome.output, outcome.effect, is_terminal)
            })
            .await;

        subject.send(output.clone()).await?;
        last_output = Some(output);
        if let Some(ack) = ack.take() {
            let _ = ack.send(());
        }

        terminal = reached_terminal;
        if terminal {
            // Stop accepting new events now, rather than only once the loop
            // returns: a suspending-proxy producer blocked in `Input::send`
            // must observe `SendAfterTerminate` rather than hang waiting for
            // an acknowledgement that will never come.
            proxy.finish();
        }

        if let Some(effect) = effect {
            let emitted = effect_exec::execute_effect(effect, env, input, context, inline_ops).await?;
            if terminal {
                if !emitted.is_empty() {
                    tracing::debug!(
                        count = emitted.len(),
                        "discarding events emitted by the terminal cycle's effect"
                    );
                }
                // The effect just awaited may have raced with an external
                // `cancel`/`cancel_because` — re-check before declaring
                // success, so cancellation during the terminal cycle's own
                // effect still surfaces as `Err(Cancelled)` rather than
                // being silently outrun by the `Ok(output)` return.
                if cancel.is_cancelled() {
                    return Err(proxy.take_cancel_cause());
                }
                return last_output.ok_or(OakError::NoOutputProduced);
            }
            pending.extend(emitted);
        }
    }
}
