//! Typed queues shared between producers, workers and consumers.
//!
//! Both the job queue and the result queue are multi-producer multi-consumer
//! [`async_channel`]s: every worker holds a clone of the same receiver, so an
//! idle worker picks up the next job without any lock around the queue. The
//! sending side is wrapped so that a closed queue maps onto
//! [`PoolError::ClosedQueue`], and the receiving side is exposed as an
//! `Unpin` [`Stream`].

use crate::{Outcome, PoolError, Result};
use core::{
    fmt,
    pin::Pin,
    task::{Context, Poll},
};
use futures::Stream;

/// Creates a bounded queue. `capacity` must be non-zero.
pub(crate) fn bounded<T>(capacity: usize) -> (QueueSender<T>, QueueStream<T>) {
    let (tx, rx) = async_channel::bounded(capacity);
    (QueueSender { inner: tx }, QueueStream::new(rx))
}

/// Creates an unbounded queue, used for side channels that must never block
/// the sender.
pub(crate) fn unbounded<T>() -> (QueueSender<T>, QueueStream<T>) {
    let (tx, rx) = async_channel::unbounded();
    (QueueSender { inner: tx }, QueueStream::new(rx))
}

/// Sending half of a queue.
pub(crate) struct QueueSender<T> {
    inner: async_channel::Sender<T>,
}

impl<T> Clone for QueueSender<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<T> QueueSender<T> {
    /// Enqueues `item`, waiting while the queue is full.
    ///
    /// # Errors
    ///
    /// Returns [`PoolError::ClosedQueue`] if the queue is closed, including
    /// when it gets closed while this call is waiting for capacity.
    pub(crate) async fn send(&self, item: T) -> Result<()> {
        self.inner
            .send(item)
            .await
            .map_err(|_| PoolError::ClosedQueue)
    }

    /// Enqueues without waiting. Fails if the queue is closed or full.
    pub(crate) fn try_send(&self, item: T) -> Result<()> {
        self.inner.try_send(item).map_err(|_| PoolError::ClosedQueue)
    }

    /// Closes the queue for every sender and receiver. Items already queued
    /// can still be received. Returns `true` if this call closed it.
    pub(crate) fn close(&self) -> bool {
        self.inner.close()
    }

    pub(crate) fn is_closed(&self) -> bool {
        self.inner.is_closed()
    }
}

/// Receiving half of a queue, usable as a [`Stream`].
///
/// Clones share the same queue: each item is delivered to exactly one of
/// them. The stream ends once the queue is closed and empty.
///
/// The receiver is boxed so the stream is `Unpin` and works with
/// [`StreamExt::next`](futures::StreamExt::next) without pinning.
pub struct QueueStream<T> {
    inner: Pin<Box<async_channel::Receiver<T>>>,
}

impl<T> Clone for QueueStream<T> {
    fn clone(&self) -> Self {
        Self::new(async_channel::Receiver::clone(&self.inner))
    }
}

impl<T> fmt::Debug for QueueStream<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueueStream")
            .field("len", &self.len())
            .field("closed", &self.is_closed())
            .finish_non_exhaustive()
    }
}

impl<T> QueueStream<T> {
    fn new(inner: async_channel::Receiver<T>) -> Self {
        Self {
            inner: Box::pin(inner),
        }
    }

    /// Waits for the next item. Returns `None` once the queue is closed and
    /// drained.
    pub async fn recv(&self) -> Option<T> {
        self.inner.recv().await.ok()
    }

    /// Number of items currently buffered.
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    /// `true` once the queue has been closed. Buffered items may remain.
    pub fn is_closed(&self) -> bool {
        self.inner.is_closed()
    }
}

impl<T> Stream for QueueStream<T> {
    type Item = T;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.get_mut().inner.as_mut().poll_next(cx)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

/// The aggregated output of a [`WorkerPool`](crate::WorkerPool).
pub type ResultStream<O, E> = QueueStream<Outcome<O, E>>;
