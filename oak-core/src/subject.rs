//! The Subject protocol — a one-way, suspending output sink.

use crate::error::OakError;
use async_trait::async_trait;
use std::marker::PhantomData;
use std::sync::Arc;
use tokio::sync::mpsc;

/// A one-way asynchronous sink for output values.
///
/// `send` must not return before the consumer has fully accepted the value —
/// this suspension is what gives the suspending [`crate::proxy::Proxy`] its
/// backpressure story: `Input::send` on that proxy suspends until `update`
/// has run *and* the resulting output's `Subject::send` has completed.
#[async_trait]
pub trait Subject<T>: Send + Sync {
    /// Deliver `value` to the consumer, suspending until accepted.
    async fn send(&self, value: T) -> Result<(), OakError>;
}

/// A sink that discards every value immediately. The default subject for
/// transducers whose `Output` is `()`.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopSubject<T> {
    _marker: PhantomData<fn(T)>,
}

impl<T> NoopSubject<T> {
    /// Construct a no-op subject.
    pub fn new() -> Self {
        Self {
            _marker: PhantomData,
        }
    }
}

#[async_trait]
impl<T: Send + Sync + 'static> Subject<T> for NoopSubject<T> {
    async fn send(&self, _value: T) -> Result<(), OakError> {
        Ok(())
    }
}

/// A subject backed by a `tokio::sync::mpsc::Sender`.
///
/// `send` suspends on the channel's own backpressure, so a bounded channel
/// here gives a concrete, end-to-end way to observe the suspending proxy's
/// "fully consumed" guarantee: the consumer task reading from the paired
/// `Receiver` controls exactly when `send` returns.
pub struct ChannelSubject<T> {
    tx: mpsc::Sender<T>,
}

impl<T> ChannelSubject<T> {
    /// Wrap an existing sender.
    pub fn new(tx: mpsc::Sender<T>) -> Self {
        Self { tx }
    }

    /// Create a channel and its paired subject in one call.
    pub fn channel(buffer: usize) -> (Self, mpsc::Receiver<T>) {
        let (tx, rx) = mpsc::channel(buffer);
        (Self::new(tx), rx)
    }
}

impl<T> Clone for ChannelSubject<T> {
    fn clone(&self) -> Self {
        Self {
            tx: self.tx.clone(),
        }
    }
}

#[async_trait]
impl<T: Send + Sync + 'static> Subject<T> for ChannelSubject<T> {
    async fn send(&self, value: T) -> Result<(), OakError> {
        self.tx
            .send(value)
            .await
            .map_err(|_| OakError::SubjectFailed("subject channel closed".into()))
    }
}

#[async_trait]
impl<T, S> Subject<T> for Arc<S>
where
    T: Send + Sync + 'static,
    S: Subject<T> + ?Sized,
{
    async fn send(&self, value: T) -> Result<(), OakError> {
        (**self).send(value).await
    }
}
