//! A counting barrier that runs one terminal action when the last of N
//! parties reports completion.
//!
//! This is the fan-in primitive: the pool hands one arrival to every worker
//! and closes the result stream from the terminal action, so the stream ends
//! exactly when the last worker is gone.

use core::fmt;
use parking_lot::Mutex;
use portable_atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

type Action = Box<dyn FnOnce() + Send>;

/// Releases exactly once, after `parties` arrivals.
pub struct CompletionBarrier {
    remaining: AtomicUsize,
    on_complete: Mutex<Option<Action>>,
    released: CancellationToken,
}

impl CompletionBarrier {
    /// Creates a barrier expecting `parties` arrivals.
    ///
    /// `on_complete` runs on the thread of the last arrival, before
    /// [`wait`](Self::wait) returns for anyone. With zero parties it runs
    /// immediately.
    pub fn new(parties: usize, on_complete: impl FnOnce() + Send + 'static) -> Self {
        let barrier = Self {
            remaining: AtomicUsize::new(parties),
            on_complete: Mutex::new(Some(Box::new(on_complete))),
            released: CancellationToken::new(),
        };
        if parties == 0 {
            barrier.release();
        }
        barrier
    }

    /// Records one arrival. Returns `true` for the arrival that released the
    /// barrier.
    ///
    /// Arrivals beyond `parties` are ignored.
    pub fn arrive(&self) -> bool {
        let previous = self
            .remaining
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| n.checked_sub(1));

        match previous {
            Ok(1) => {
                self.release();
                true
            }
            Ok(_) => false,
            Err(_) => {
                #[cfg(feature = "tracing")]
                tracing::warn!("Arrival at an already released barrier ignored");
                false
            }
        }
    }

    /// Returns a guard that arrives when dropped, including during unwinding
    /// or when the owning task is dropped by a runtime shutdown.
    pub fn arrival(self: &Arc<Self>) -> Arrival {
        Arrival {
            barrier: Some(Arc::clone(self)),
        }
    }

    /// Parties that have not arrived yet.
    pub fn remaining(&self) -> usize {
        self.remaining.load(Ordering::Acquire)
    }

    pub fn is_released(&self) -> bool {
        self.released.is_cancelled()
    }

    /// Resolves once the terminal action has run.
    pub async fn wait(&self) {
        self.released.cancelled().await;
    }

    fn release(&self) {
        if let Some(action) = self.on_complete.lock().take() {
            action();
        }
        self.released.cancel();
    }
}

impl fmt::Debug for CompletionBarrier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompletionBarrier")
            .field("remaining", &self.remaining())
            .field("released", &self.is_released())
            .finish()
    }
}

/// One party's pending arrival at a [`CompletionBarrier`].
#[must_use = "dropping the guard arrives at the barrier immediately"]
pub struct Arrival {
    barrier: Option<Arc<CompletionBarrier>>,
}

impl Arrival {
    /// Arrives now. Returns `true` if this released the barrier.
    pub fn arrive(mut self) -> bool {
        self.barrier.take().is_some_and(|b| b.arrive())
    }
}

impl Drop for Arrival {
    fn drop(&mut self) {
        if let Some(barrier) = self.barrier.take() {
            barrier.arrive();
        }
    }
}
