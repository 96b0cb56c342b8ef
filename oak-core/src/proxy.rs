//! The Proxy protocol — event ingress for a run, in its two flavors.
//!
//! A [`Proxy`] is single-use: [`Proxy::bind`] hands the run loop the
//! consuming half and is only ever called once per proxy (a second call
//! returns [`OakError::ProxyAlreadyInUse`]). Dropping every external handle
//! to a bound proxy cancels its run — see the `Drop` impl below.

use crate::error::OakError;
use crate::id::ProxyId;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::{mpsc, oneshot, Notify};
use tokio_util::sync::CancellationToken;

/// Default capacity of a buffered proxy when none is specified.
pub const DEFAULT_BUFFER_CAPACITY: usize = 8;

/// A bounded ring buffer with a drop-oldest-on-overflow policy: pushing past
/// capacity silently evicts the oldest queued event rather than blocking the
/// producer or rejecting the new one.
///
/// Exposed publicly only because [`ProxyConsumer::Buffered`] needs to name
/// it; not meant to be constructed outside [`Proxy::buffered`].
pub struct RingQueue<Event> {
    capacity: usize,
    queue: Mutex<VecDeque<Event>>,
    notify: Notify,
    closed: AtomicBool,
    len: AtomicUsize,
}

impl<Event> RingQueue<Event> {
    fn new(capacity: usize) -> Self {
        Self {
            capacity,
            queue: Mutex::new(VecDeque::new()),
            notify: Notify::new(),
            closed: AtomicBool::new(false),
            len: AtomicUsize::new(0),
        }
    }

    /// Push `event`. `Ok(Some(evicted))` means the oldest queued event was
    /// silently dropped to make room and `event` itself was accepted;
    /// `Ok(None)` means `event` was accepted with no eviction. `Err(event)`
    /// means `event` itself could not be accepted at all — the only way
    /// that happens is a zero-capacity buffer, where there is no "oldest"
    /// slot to evict in its place.
    fn push(&self, event: Event) -> Result<Option<Event>, Event> {
        if self.capacity == 0 {
            return Err(event);
        }
        let mut queue = self.queue.lock().unwrap();
        let evicted = if queue.len() >= self.capacity {
            queue.pop_front()
        } else {
            None
        };
        queue.push_back(event);
        self.len.store(queue.len(), Ordering::Relaxed);
        drop(queue);
        self.notify.notify_one();
        Ok(evicted)
    }

    async fn pop(&self) -> Option<Event> {
        loop {
            {
                let mut queue = self.queue.lock().unwrap();
                if let Some(event) = queue.pop_front() {
                    self.len.store(queue.len(), Ordering::Relaxed);
                    return Some(event);
                }
                if self.closed.load(Ordering::Acquire) {
                    return None;
                }
            }
            self.notify.notified().await;
        }
    }

    fn close(&self) {
        self.closed.store(true, Ordering::Release);
        self.notify.notify_waiters();
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }
}

enum InputInner<Event> {
    Buffered(Arc<RingQueue<Event>>),
    Suspending {
        tx: mpsc::Sender<(Event, oneshot::Sender<()>)>,
        closed: Arc<AtomicBool>,
    },
}

/// A cloneable handle for feeding events into a bound run.
///
/// Managed task bodies get one of these through `EffectArgs::input` to raise
/// events without going back through the host's [`Proxy`] handle.
pub struct Input<Event> {
    inner: Arc<InputInner<Event>>,
}

impl<Event> Clone for Input<Event> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<Event: Send + 'static> Input<Event> {
    /// Feed `event` into the run.
    ///
    /// On a buffered proxy, returns as soon as the event is enqueued
    /// (possibly evicting the oldest queued event). On a suspending proxy,
    /// suspends until `update` has run for this event and its output has
    /// been fully accepted by the run's `Subject`.
    pub async fn send(&self, event: Event) -> Result<(), OakError> {
        match &*self.inner {
            InputInner::Buffered(queue) => {
                if queue.is_closed() {
                    return Err(OakError::SendAfterTerminate);
                }
                match queue.push(event) {
                    Ok(Some(dropped)) => {
                        tracing::debug!("buffered proxy at capacity, dropped oldest event");
                        drop(dropped);
                        Ok(())
                    }
                    Ok(None) => Ok(()),
                    Err(_rejected) => Err(OakError::DroppedEvent(
                        "buffered proxy has zero capacity, cannot accept any event".to_owned(),
                    )),
                }
            }
            InputInner::Suspending { tx, closed } => {
                if closed.load(Ordering::Acquire) {
                    return Err(OakError::SendAfterTerminate);
                }
                let (ack_tx, ack_rx) = oneshot::channel();
                tx.send((event, ack_tx))
                    .await
                    .map_err(|_| OakError::SendAfterTerminate)?;
                ack_rx.await.map_err(|_| OakError::SendAfterTerminate)
            }
        }
    }
}

/// The run loop's consuming half of a proxy, handed over by [`Proxy::bind`].
///
/// Each yielded item carries an optional acknowledgement sender: `Some` on a
/// suspending proxy (the run loop must signal it once the event's output has
/// been delivered, to release `Input::send`'s suspension), `None` on a
/// buffered proxy (nothing is waiting).
pub enum ProxyConsumer<Event> {
    /// The receiving half of a buffered proxy's ring queue.
    Buffered(Arc<RingQueue<Event>>),
    /// The receiving half of a suspending proxy's rendezvous channel.
    Suspending(mpsc::Receiver<(Event, oneshot::Sender<()>)>),
}

impl<Event> ProxyConsumer<Event> {
    /// Pull the next event, if any, along with its acknowledgement sender
    /// on a suspending proxy. Resolves to `None` once the proxy is
    /// finished/cancelled and fully drained.
    pub async fn next(&mut self) -> Option<(Event, Option<oneshot::Sender<()>>)> {
        match self {
            ProxyConsumer::Buffered(queue) => queue.pop().await.map(|event| (event, None)),
            ProxyConsumer::Suspending(rx) => rx.recv().await.map(|(event, ack)| (event, Some(ack))),
        }
    }
}

struct ProxyCore<Event> {
    id: ProxyId,
    bound: AtomicBool,
    cancel_token: CancellationToken,
    cancel_cause: Mutex<Option<OakError>>,
    input: Input<Event>,
    consumer: Mutex<Option<ProxyConsumer<Event>>>,
    buffered_closed: Option<Arc<RingQueue<Event>>>,
    suspending_closed: Option<Arc<AtomicBool>>,
}

/// Event ingress for a run, in one of two modes:
///
/// - [`Proxy::buffered`] — fire-and-forget, bounded, drop-oldest on
///   overflow. Good for UI-driven input where the producer must never
///   block.
/// - [`Proxy::suspending`] — rendezvous: `Input::send` doesn't return until
///   `update` has consumed the event and the resulting output has been
///   fully accepted by the run's `Subject`. Gives a producer true
///   backpressure at the cost of suspending on every send.
///
/// A `Proxy` is single-use: binding it to a second run returns
/// [`OakError::ProxyAlreadyInUse`]. Dropping every clone of a bound proxy
/// while its run is still live cancels the run with
/// [`OakError::ProxyDeinitialized`].
pub struct Proxy<Event> {
    core: Arc<ProxyCore<Event>>,
}

impl<Event> Clone for Proxy<Event> {
    fn clone(&self) -> Self {
        Self {
            core: self.core.clone(),
        }
    }
}

impl<Event: Send + 'static> Proxy<Event> {
    /// Build a buffered proxy with the default capacity
    /// ([`DEFAULT_BUFFER_CAPACITY`]).
    pub fn buffered_default() -> Self {
        Self::buffered(DEFAULT_BUFFER_CAPACITY)
    }

    /// Build a buffered proxy with an explicit capacity. Capacity zero is
    /// legal but every event sent to it is immediately dropped.
    pub fn buffered(capacity: usize) -> Self {
        let queue = Arc::new(RingQueue::new(capacity));
        let core = ProxyCore {
            id: ProxyId::fresh(),
            bound: AtomicBool::new(false),
            cancel_token: CancellationToken::new(),
            cancel_cause: Mutex::new(None),
            input: Input {
                inner: Arc::new(InputInner::Buffered(queue.clone())),
            },
            consumer: Mutex::new(Some(ProxyConsumer::Buffered(queue.clone()))),
            buffered_closed: Some(queue),
            suspending_closed: None,
        };
        Self {
            core: Arc::new(core),
        }
    }

    /// Build a suspending (rendezvous) proxy.
    pub fn suspending() -> Self {
        let (tx, rx) = mpsc::channel(1);
        let closed = Arc::new(AtomicBool::new(false));
        let core = ProxyCore {
            id: ProxyId::fresh(),
            bound: AtomicBool::new(false),
            cancel_token: CancellationToken::new(),
            cancel_cause: Mutex::new(None),
            input: Input {
                inner: Arc::new(InputInner::Suspending {
                    tx,
                    closed: closed.clone(),
                }),
            },
            consumer: Mutex::new(Some(ProxyConsumer::Suspending(rx))),
            buffered_closed: None,
            suspending_closed: Some(closed),
        };
        Self {
            core: Arc::new(core),
        }
    }

    /// This proxy's stable identity.
    pub fn id(&self) -> ProxyId {
        self.core.id
    }

    /// Feed `event` into the run this proxy is (or will be) bound to.
    /// Equivalent to cloning [`Proxy::input`] and calling `send` on it.
    pub async fn send(&self, event: Event) -> Result<(), OakError> {
        self.core.input.send(event).await
    }

    /// A cloneable send-only handle equivalent to what managed tasks
    /// receive through `EffectArgs::input`.
    pub fn input(&self) -> Input<Event> {
        self.core.input.clone()
    }

    /// Gracefully end the event stream: once drained, the run loop sees
    /// end-of-stream and completes normally rather than treating this as a
    /// cancellation.
    pub fn finish(&self) {
        if let Some(queue) = &self.core.buffered_closed {
            queue.close();
        }
        if let Some(closed) = &self.core.suspending_closed {
            closed.store(true, Ordering::Release);
        }
    }

    /// Cancel the run immediately with a bare [`OakError::cancelled`] (no
    /// underlying cause). Idempotent — a second call has no further effect.
    pub fn cancel(&self) {
        self.finish();
        self.core.cancel_token.cancel();
    }

    /// Cancel the run immediately, attributing it to `error`. The run
    /// surfaces `error` as the cause of an [`OakError::Cancelled`] (see
    /// [`OakError::into_cancelled`]) rather than replacing it outright —
    /// cancellation is still cancellation, but the original error remains
    /// inspectable via `source()`. Idempotent: only the first call's error
    /// is kept if `cancel`/`cancel_because` race.
    pub fn cancel_because(&self, error: OakError) {
        self.finish();
        {
            let mut cause = self.core.cancel_cause.lock().unwrap();
            if cause.is_none() {
                *cause = Some(error);
            }
        }
        self.core.cancel_token.cancel();
    }

    /// A token the run loop selects against to learn about
    /// [`Proxy::cancel`]/[`Proxy::cancel_because`] and drop-triggered
    /// cancellation.
    pub fn cancellation(&self) -> CancellationToken {
        self.core.cancel_token.clone()
    }

    /// Take whatever error was attributed to this proxy's cancellation,
    /// wrapped as the cause of an [`OakError::Cancelled`]. Falls back to a
    /// bare [`OakError::cancelled`] if `cancellation()`'s token fired
    /// without a recorded cause (shouldn't happen through this type's own
    /// API, but guards against a token shared/cancelled by other means).
    /// Meant to be called at most once per run, right after observing
    /// `cancellation()` fire.
    pub fn take_cancel_cause(&self) -> OakError {
        match self.core.cancel_cause.lock().unwrap().take() {
            Some(cause) => cause.into_cancelled(),
            None => OakError::cancelled(),
        }
    }

    /// Bind this proxy to a run, consuming its receiving half. Returns
    /// [`OakError::ProxyAlreadyInUse`] if already bound.
    pub fn bind(&self) -> Result<ProxyConsumer<Event>, OakError> {
        if self.core.bound.swap(true, Ordering::AcqRel) {
            return Err(OakError::ProxyAlreadyInUse);
        }
        self.core
            .consumer
            .lock()
            .unwrap()
            .take()
            .ok_or(OakError::ProxyAlreadyInUse)
    }
}

impl<Event> Drop for Proxy<Event> {
    fn drop(&mut self) {
        // Two references remain before this drop completes: this one, and
        // the run loop's own clone (the `Proxy` it was handed by value at
        // `run`/`run_with_storage` call time, held for the run's whole
        // duration). If this is the last external handle, only the run
        // loop's will be left afterward — that's the signal to cancel.
        if Arc::strong_count(&self.core) == 2 {
            // Can't call `cancel_because` here: it's only defined where
            // `Event: Send + 'static`, a bound `Drop` can't add beyond what
            // the struct itself requires. Inline the same three steps.
            if let Some(queue) = &self.core.buffered_closed {
                queue.close();
            }
            if let Some(closed) = &self.core.suspending_closed {
                closed.store(true, Ordering::Release);
            }
            let mut cause = self.core.cancel_cause.lock().unwrap();
            if cause.is_none() {
                *cause = Some(OakError::ProxyDeinitialized);
            }
            drop(cause);
            self.core.cancel_token.cancel();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn binding_twice_is_proxy_already_in_use() {
        let proxy = Proxy::<i32>::buffered_default();
        assert!(proxy.bind().is_ok());
        assert!(matches!(proxy.bind(), Err(OakError::ProxyAlreadyInUse)));
    }

    #[tokio::test]
    async fn zero_capacity_buffer_drops_the_send_itself() {
        let proxy = Proxy::<i32>::buffered(0);
        let input = proxy.input();
        let result = input.send(1).await;
        assert!(matches!(result, Err(OakError::DroppedEvent(_))));
    }

    #[tokio::test]
    async fn overflow_at_capacity_drops_the_oldest_and_keeps_the_newest() {
        let proxy = Proxy::<i32>::buffered(2);
        let mut consumer = proxy.bind().unwrap();
        let input = proxy.input();

        input.send(1).await.unwrap();
        input.send(2).await.unwrap();
        input.send(3).await.unwrap(); // queue was [1, 2]; 1 is dropped, 3 accepted

        let (first, _) = consumer.next().await.unwrap();
        let (second, _) = consumer.next().await.unwrap();
        assert_eq!(first, 2);
        assert_eq!(second, 3);
    }

    #[tokio::test]
    async fn send_after_finish_is_rejected_on_both_modes() {
        let buffered = Proxy::<i32>::buffered_default();
        buffered.finish();
        assert!(matches!(
            buffered.input().send(1).await,
            Err(OakError::SendAfterTerminate)
        ));

        let suspending = Proxy::<i32>::suspending();
        let mut consumer = suspending.bind().unwrap();
        suspending.finish();
        assert!(consumer.next().await.is_none());
        assert!(matches!(
            suspending.input().send(1).await,
            Err(OakError::SendAfterTerminate)
        ));
    }

    #[tokio::test]
    async fn cancel_closes_the_stream_immediately() {
        let proxy = Proxy::<i32>::buffered_default();
        let mut consumer = proxy.bind().unwrap();
        proxy.cancel();
        assert!(consumer.next().await.is_none());
    }

    #[tokio::test]
    async fn bare_cancel_surfaces_as_cancellation_with_no_cause() {
        let proxy = Proxy::<i32>::buffered_default();
        proxy.cancel();
        let error = proxy.take_cancel_cause();
        assert!(error.is_cancellation());
        assert_eq!(error.to_string(), "run cancelled");
    }

    #[tokio::test]
    async fn cancel_because_surfaces_the_given_error_as_the_cancellation_cause() {
        let proxy = Proxy::<i32>::buffered_default();
        proxy.cancel_because(OakError::SendAfterTerminate);
        let error = proxy.take_cancel_cause();
        assert!(error.is_cancellation());
        assert!(error.to_string().contains("send after terminate"));
    }

    #[tokio::test]
    async fn only_the_first_cancel_because_call_wins_the_cause() {
        let proxy = Proxy::<i32>::buffered_default();
        proxy.cancel_because(OakError::SendAfterTerminate);
        proxy.cancel_because(OakError::ProxyAlreadyInUse);
        let error = proxy.take_cancel_cause();
        assert!(error.to_string().contains("send after terminate"));
    }

    #[tokio::test]
    async fn dropping_the_last_proxy_handle_cancels_with_proxy_deinitialized() {
        let proxy = Proxy::<i32>::buffered_default();
        let proxy_for_loop = proxy.clone();
        let mut consumer = proxy_for_loop.bind().unwrap();

        drop(proxy);

        assert!(consumer.next().await.is_none());
        let error = proxy_for_loop.take_cancel_cause();
        assert!(error.is_cancellation());
        assert!(error.to_string().contains("proxy deinitialized"));
    }
}
