//! Error types for the worker pool.
//!
//! Two families of errors exist and they travel on different paths:
//!
//! - [`PoolError`] is returned directly from the call that violated the pool's
//!   contract (bad configuration, wrong lifecycle state, submitting to a closed
//!   queue, an elapsed shutdown).
//! - [`TransformError`] is a per-job failure. It never surfaces from a pool
//!   method; it is carried inside the job's [`Outcome`](crate::Outcome) on the
//!   result stream while the pool keeps running.

use crate::PoolState;

pub type Result<T, E = PoolError> = core::result::Result<T, E>;

/// Errors raised by [`WorkerPool`](crate::WorkerPool) operations.
#[derive(Clone, thiserror::Error, Debug, PartialEq, Eq)]
pub enum PoolError {
    /// The pool could not be built from the supplied parameters (zero
    /// workers, zero capacity, missing transform).
    #[error("Configuration error: {reason}")]
    Configuration { reason: String },

    /// An operation was invoked in a lifecycle state that does not allow it.
    #[error("Cannot {operation} while the pool is {state}")]
    InvalidState {
        operation: &'static str,
        state: PoolState,
    },

    /// Workers can only be spawned from within a Tokio runtime.
    #[error("No Tokio runtime available to spawn workers")]
    NoRuntime,

    /// A job was submitted after the input queue was closed.
    #[error("Input queue is closed")]
    ClosedQueue,

    /// [`WorkerPool::shutdown`](crate::WorkerPool::shutdown) gave up waiting
    /// for workers to drain.
    #[error("Shutdown timed out with {live_workers} worker(s) still running")]
    ShutdownTimeout { live_workers: usize },
}

impl PoolError {
    pub(crate) fn configuration(reason: impl Into<String>) -> Self {
        Self::Configuration {
            reason: reason.into(),
        }
    }
}

/// A single job's failure, wrapped into its result instead of aborting the
/// worker.
#[derive(Clone, thiserror::Error, Debug, PartialEq, Eq)]
pub enum TransformError<E> {
    /// The transform returned an error.
    #[error("Transform failed: {0}")]
    Failed(E),

    /// The transform panicked. The payload is rendered to a string when it is
    /// a `&str` or `String`.
    #[error("Transform panicked: {0}")]
    Panicked(String),
}

impl<E> TransformError<E> {
    /// Returns the transform's own error, if it returned one.
    pub fn failure(&self) -> Option<&E> {
        match self {
            Self::Failed(e) => Some(e),
            Self::Panicked(_) => None,
        }
    }

    pub fn is_panic(&self) -> bool {
        matches!(self, Self::Panicked(_))
    }
}

/// Renders a caught panic payload.
pub(crate) fn panic_message(payload: &(dyn core::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
