//! Chaining pools into pipelines.
//!
//! A pipeline stage is an ordinary [`WorkerPool`]. [`pipe`] connects the
//! result stream of one stage to the input of the next: successful values are
//! resubmitted under their original sequence number, failures stay behind in
//! the returned [`Forwarded`] report, and once the upstream stream ends the
//! downstream input is closed. Closing therefore cascades stage by stage.
//!
//! [`feed`] is the source end of a pipeline: it submits every item of an
//! iterator and closes the input.

use crate::{Job, Result, ResultStream, Transform, TransformError, WorkerPool};
use std::sync::Arc;
use tokio::task::JoinHandle;

/// What happened to an upstream stream while it was piped into a pool.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Forwarded<E> {
    /// Successful results submitted downstream.
    pub forwarded: usize,
    /// Failed upstream jobs as `(seq, error)`; these never reach the next
    /// stage.
    pub failed: Vec<(u64, TransformError<E>)>,
}

impl<E> Default for Forwarded<E> {
    fn default() -> Self {
        Self {
            forwarded: 0,
            failed: Vec::new(),
        }
    }
}

/// Submits every item of `items` to `pool` in order, then closes its input.
/// Returns the number of jobs submitted.
///
/// # Errors
///
/// Propagates the first [`submit`](WorkerPool::submit) or
/// [`close_input`](WorkerPool::close_input) error. The input is left open in
/// that case.
pub async fn feed<T, F, I>(pool: &WorkerPool<T, F>, items: I) -> Result<usize>
where
    T: Send + 'static,
    F: Transform<T>,
    I: IntoIterator<Item = T>,
{
    let mut submitted = 0;
    for item in items {
        pool.submit(item).await?;
        submitted += 1;
    }
    pool.close_input()?;

    #[cfg(feature = "tracing")]
    tracing::debug!("Fed {submitted} jobs and closed input");
    Ok(submitted)
}

/// Forwards `upstream` into `downstream` until `upstream` ends, then closes
/// the downstream input.
///
/// `upstream` is always read to the end, even after `downstream` starts
/// rejecting jobs, so the upstream workers never block on a full result
/// queue and the upstream pool still terminates.
///
/// # Errors
///
/// Returns the first rejection from `downstream`, which happens when it was
/// not started or its input was already closed by someone else. The error is
/// reported once `upstream` has ended.
pub async fn pipe<T, E, F>(
    upstream: ResultStream<T, E>,
    downstream: &WorkerPool<T, F>,
) -> Result<Forwarded<E>>
where
    T: Send + 'static,
    F: Transform<T>,
{
    let mut report = Forwarded::default();
    let mut rejection = None;

    while let Some(outcome) = upstream.recv().await {
        match outcome.result {
            Ok(_) if rejection.is_some() => {}
            Ok(value) => match downstream.submit_job(Job::new(outcome.seq, value)).await {
                Ok(()) => report.forwarded += 1,
                Err(e) => {
                    #[cfg(feature = "tracing")]
                    tracing::warn!("Downstream rejected job {}: {e}; draining upstream", outcome.seq);
                    rejection = Some(e);
                }
            },
            Err(e) => {
                #[cfg(feature = "tracing")]
                tracing::debug!("Job {} failed upstream, not forwarded", outcome.seq);
                report.failed.push((outcome.seq, e));
            }
        }
    }

    let closed = downstream.close_input();
    match rejection {
        Some(e) => Err(e),
        None => closed.map(|()| report),
    }
}

/// Runs [`pipe`] on its own task.
pub fn forward<T, E, F>(
    upstream: ResultStream<T, E>,
    downstream: Arc<WorkerPool<T, F>>,
) -> JoinHandle<Result<Forwarded<E>>>
where
    T: Send + 'static,
    E: Send + 'static,
    F: Transform<T>,
{
    tokio::spawn(async move { pipe(upstream, &downstream).await })
}
