//! The bounded worker pool.
//!
//! [`WorkerPool`] fans a single stream of [`Job`]s out to a fixed number of
//! worker tasks and fans their [`Outcome`]s back into one [`ResultStream`].
//!
//! All workers share one bounded input queue and one bounded output queue. The
//! input queue gives backpressure to producers; the output queue gives
//! backpressure to workers when the consumer falls behind. Completion is
//! tracked by a [`CompletionBarrier`] sized to the worker count: each worker
//! arrives once when it exits, and the last arrival closes the output queue.
//! The result stream therefore ends precisely when every worker is gone, which
//! can only happen after the input was closed and drained.

use crate::{
    CompletionBarrier, Job, Outcome, PoolBuilder, PoolConfig, PoolError, PoolState, Result,
    ResultStream, Transform, WorkerCrash, WorkerState,
    pool::{
        state::{StateCell, WorkerStates},
        worker::{WorkerContext, spawn_supervised, worker_loop},
    },
    queue::{self, QueueSender, QueueStream},
};
use core::{fmt, time::Duration};
use portable_atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::{runtime::Handle, time::timeout};

/// A fixed-size pool of asynchronous workers applying one [`Transform`] to
/// every submitted job.
///
/// Lifecycle: [`build`](PoolBuilder::build) → [`start`](Self::start) →
/// [`submit`](Self::submit)… → [`close_input`](Self::close_input) → read
/// [`results`](Self::results) until the stream ends.
///
/// All methods take `&self`, so a pool is usually shared in an [`Arc`]
/// between a producer task and a consumer task. Dropping the pool closes the
/// input queue; workers then finish the queued jobs and exit.
///
/// # Example
///
/// ```
/// use fanpool::WorkerPool;
/// use futures::StreamExt;
///
/// # #[tokio::main(flavor = "multi_thread", worker_threads = 2)]
/// # async fn main() -> Result<(), fanpool::PoolError> {
/// let pool = WorkerPool::new(3, |n: u64| async move { Ok::<_, String>(n * 2) })?;
/// pool.start()?;
///
/// for n in 1..=5 {
///     pool.submit(n).await?;
/// }
/// pool.close_input()?;
///
/// let mut doubled: Vec<u64> = pool
///     .results()
///     .filter_map(|outcome| async move { outcome.result.ok() })
///     .collect()
///     .await;
/// doubled.sort_unstable();
/// assert_eq!(doubled, [2, 4, 6, 8, 10]);
/// # Ok(())
/// # }
/// ```
pub struct WorkerPool<T, F: Transform<T>> {
    config: PoolConfig,
    transform: Arc<F>,
    state: Arc<StateCell>,
    next_seq: AtomicU64,
    jobs_tx: QueueSender<Job<T>>,
    jobs_rx: QueueStream<Job<T>>,
    results_tx: QueueSender<Outcome<F::Output, F::Error>>,
    results_rx: ResultStream<F::Output, F::Error>,
    crashes_tx: QueueSender<WorkerCrash>,
    crashes_rx: QueueStream<WorkerCrash>,
    worker_states: Arc<WorkerStates>,
    barrier: Arc<CompletionBarrier>,
}

impl<T, F> WorkerPool<T, F>
where
    T: Send + 'static,
    F: Transform<T>,
{
    /// Builds a pool with `workers` workers and default queue capacities.
    ///
    /// # Errors
    ///
    /// Returns [`PoolError::Configuration`] if `workers` is zero.
    pub fn new(workers: usize, transform: F) -> Result<Self> {
        PoolBuilder::new(workers).transform(transform).build()
    }

    /// Starts a [`PoolBuilder`] for a pool of `workers` workers.
    pub fn builder(workers: usize) -> PoolBuilder<T, F> {
        PoolBuilder::new(workers)
    }

    /// Assembles the queues and the completion barrier. The configuration has
    /// already been validated by the builder.
    pub(crate) fn from_parts(config: PoolConfig, transform: F) -> Self {
        let (jobs_tx, jobs_rx) = queue::bounded(config.queue_capacity);
        let (results_tx, results_rx) = queue::bounded(config.result_capacity);
        let (crashes_tx, crashes_rx) = queue::unbounded();
        let state = Arc::new(StateCell::new(PoolState::Created));

        let barrier = {
            let state = Arc::clone(&state);
            let jobs_tx = jobs_tx.clone();
            let results_tx = results_tx.clone();
            let crashes_tx = crashes_tx.clone();
            CompletionBarrier::new(config.workers, move || {
                // If every worker crashed before the input was closed, go
                // through `Draining` so the state machine never skips a step.
                let _ = state.transition(PoolState::Started, PoolState::Draining);
                state.set(PoolState::Terminated);
                jobs_tx.close();
                results_tx.close();
                crashes_tx.close();

                #[cfg(feature = "tracing")]
                tracing::debug!("All workers terminated, result stream closed");
            })
        };

        Self {
            worker_states: Arc::new(WorkerStates::new(config.workers)),
            config,
            transform: Arc::new(transform),
            state,
            next_seq: AtomicU64::new(0),
            jobs_tx,
            jobs_rx,
            results_tx,
            results_rx,
            crashes_tx,
            crashes_rx,
            barrier: Arc::new(barrier),
        }
    }

    /// Spawns the workers on the current Tokio runtime.
    ///
    /// # Errors
    ///
    /// - [`PoolError::NoRuntime`] when called outside a Tokio runtime; the pool
    ///   stays in `Created`.
    /// - [`PoolError::InvalidState`] if the pool was already started.
    pub fn start(&self) -> Result<()> {
        let handle = Handle::try_current().map_err(|_| PoolError::NoRuntime)?;

        self.state
            .transition(PoolState::Created, PoolState::Started)
            .map_err(|state| PoolError::InvalidState {
                operation: "start",
                state,
            })?;

        #[cfg(feature = "tracing")]
        tracing::debug!("Starting worker pool with {} workers", self.config.workers);

        for worker_id in 0..self.config.workers {
            let ctx = WorkerContext {
                worker_id,
                jobs: self.jobs_rx.clone(),
                results: self.results_tx.clone(),
                transform: Arc::clone(&self.transform),
                states: Arc::clone(&self.worker_states),
            };

            // The handle is not kept: the barrier, not the join handles,
            // decides when the pool is finished.
            drop(spawn_supervised(
                &handle,
                worker_id,
                worker_loop(ctx),
                self.crashes_tx.clone(),
                Arc::clone(&self.worker_states),
                self.barrier.arrival(),
            ));
        }

        Ok(())
    }

    /// Submits `payload` as the next job and returns its sequence number.
    ///
    /// Waits while the input queue is full.
    ///
    /// # Errors
    ///
    /// - [`PoolError::InvalidState`] before [`start`](Self::start).
    /// - [`PoolError::ClosedQueue`] after [`close_input`](Self::close_input),
    ///   including when the input is closed while this call is waiting.
    pub async fn submit(&self, payload: T) -> Result<u64> {
        self.check_accepting()?;
        let seq = self.next_seq.fetch_add(1, Ordering::Relaxed);
        self.enqueue(Job::new(seq, payload)).await?;
        Ok(seq)
    }

    /// Submits a job with a caller-chosen sequence number.
    ///
    /// # Errors
    ///
    /// Same as [`submit`](Self::submit).
    pub async fn submit_job(&self, job: Job<T>) -> Result<()> {
        self.check_accepting()?;
        self.enqueue(job).await
    }

    fn check_accepting(&self) -> Result<()> {
        match self.state.get() {
            PoolState::Started => Ok(()),
            PoolState::Created => Err(PoolError::InvalidState {
                operation: "submit",
                state: PoolState::Created,
            }),
            PoolState::Draining | PoolState::Terminated => Err(PoolError::ClosedQueue),
        }
    }

    async fn enqueue(&self, job: Job<T>) -> Result<()> {
        #[cfg(feature = "tracing")]
        let _seq = job.seq;

        self.jobs_tx.send(job).await?;

        #[cfg(feature = "tracing")]
        tracing::trace!("Submitted job {_seq}");
        Ok(())
    }

    /// Signals that no more jobs will arrive. Workers drain what is queued and
    /// exit. Calling it again is a no-op.
    ///
    /// # Errors
    ///
    /// Returns [`PoolError::InvalidState`] if the pool was never started.
    pub fn close_input(&self) -> Result<()> {
        match self
            .state
            .transition(PoolState::Started, PoolState::Draining)
        {
            Ok(()) => {
                self.jobs_tx.close();
                #[cfg(feature = "tracing")]
                tracing::debug!("Input closed, draining {} queued jobs", self.jobs_rx.len());
                Ok(())
            }
            Err(PoolState::Created) => Err(PoolError::InvalidState {
                operation: "close input",
                state: PoolState::Created,
            }),
            Err(_) => Ok(()),
        }
    }

    /// The aggregated result stream.
    ///
    /// It ends once every worker has terminated. Each call returns a handle
    /// onto the same queue; concurrent readers split the results between
    /// them. Dropping a handle does not discard results: while the pool is
    /// alive, unread results stay queued and workers wait once
    /// `result_capacity` of them are pending.
    pub fn results(&self) -> ResultStream<F::Output, F::Error> {
        self.results_rx.clone()
    }

    /// Reports of workers that crashed outside their transform. Ends when the
    /// pool terminates.
    pub fn crashes(&self) -> QueueStream<WorkerCrash> {
        self.crashes_rx.clone()
    }

    /// Resolves once every worker has terminated and the result stream is
    /// closed. Results may still be buffered for reading.
    pub async fn wait(&self) {
        self.barrier.wait().await;
    }

    /// Closes the input and waits up to `limit` for the workers to drain.
    ///
    /// Workers are not cancelled: if the limit elapses they keep running and
    /// the pool can still be awaited with [`wait`](Self::wait).
    ///
    /// # Errors
    ///
    /// - [`PoolError::InvalidState`] if the pool was never started.
    /// - [`PoolError::ShutdownTimeout`] if the workers did not finish in time.
    pub async fn shutdown(&self, limit: Duration) -> Result<()> {
        self.close_input()?;

        #[cfg(feature = "tracing")]
        tracing::info!("Draining worker pool ({} workers live)", self.live_workers());

        match timeout(limit, self.wait()).await {
            Ok(()) => {
                #[cfg(feature = "tracing")]
                tracing::info!("Worker pool shutdown complete");
                Ok(())
            }
            Err(_) => {
                let live_workers = self.live_workers();
                #[cfg(feature = "tracing")]
                tracing::warn!("Graceful drain timed out ({live_workers} workers still live)");
                Err(PoolError::ShutdownTimeout { live_workers })
            }
        }
    }

    pub fn state(&self) -> PoolState {
        self.state.get()
    }

    /// Workers spawned and not yet terminated.
    pub fn live_workers(&self) -> usize {
        match self.state.get() {
            PoolState::Created => 0,
            _ => self.barrier.remaining(),
        }
    }

    /// Per-worker state, indexed by worker id. Every entry reads `Idle` before
    /// [`start`](Self::start).
    pub fn worker_states(&self) -> Vec<WorkerState> {
        self.worker_states.snapshot()
    }

    pub const fn workers(&self) -> usize {
        self.config.workers
    }

    pub const fn config(&self) -> &PoolConfig {
        &self.config
    }
}

impl<T, F: Transform<T>> Drop for WorkerPool<T, F> {
    fn drop(&mut self) {
        // Workers hold their own queue handles; closing the input lets them
        // drain and exit instead of waiting forever.
        self.jobs_tx.close();
    }
}

impl<T, F: Transform<T>> fmt::Debug for WorkerPool<T, F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorkerPool")
            .field("config", &self.config)
            .field("state", &self.state.get())
            .field("live_workers", &self.barrier.remaining())
            .field("queued_jobs", &self.jobs_rx.len())
            .field("queued_results", &self.results_rx.len())
            .finish_non_exhaustive()
    }
}
