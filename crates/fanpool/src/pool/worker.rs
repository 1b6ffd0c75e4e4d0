use crate::{
    Job, Outcome, Transform, TransformError, WorkerCrash,
    barrier::Arrival,
    error::panic_message,
    pool::state::{WorkerState, WorkerStates},
    queue::{QueueSender, QueueStream},
};
use core::panic::AssertUnwindSafe;
use futures::FutureExt;
use std::sync::Arc;
use tokio::{runtime::Handle, task::JoinHandle};

/// Everything a worker needs, moved into its task at spawn time.
pub(crate) struct WorkerContext<T, F: Transform<T>> {
    pub(crate) worker_id: usize,
    pub(crate) jobs: QueueStream<Job<T>>,
    pub(crate) results: QueueSender<Outcome<F::Output, F::Error>>,
    pub(crate) transform: Arc<F>,
    pub(crate) states: Arc<WorkerStates>,
}

/// Worker task: pulls [`Job`]s from the shared queue until it is closed and
/// empty, and pushes one [`Outcome`] per job.
///
/// A failing or panicking transform becomes an error outcome and the loop
/// continues. The pool keeps a receiver of its own, so while it is alive a
/// full result queue makes the worker wait for a reader. Only once the pool
/// and every [`ResultStream`](crate::ResultStream) are dropped does the send
/// fail, and the worker then exits without draining the remaining jobs.
pub(crate) async fn worker_loop<T, F>(ctx: WorkerContext<T, F>)
where
    T: Send + 'static,
    F: Transform<T>,
{
    let WorkerContext {
        worker_id,
        jobs,
        results,
        transform,
        states,
    } = ctx;

    #[cfg(feature = "tracing")]
    tracing::trace!("Worker {worker_id} started");

    loop {
        states.set(worker_id, WorkerState::Idle);
        let Some(job) = jobs.recv().await else {
            break;
        };

        let state = if jobs.is_closed() {
            WorkerState::Draining
        } else {
            WorkerState::Processing
        };
        states.set(worker_id, state);

        #[cfg(feature = "tracing")]
        tracing::trace!("Worker {worker_id} started job {}", job.seq);

        let outcome = run_job(worker_id, transform.as_ref(), job).await;

        #[cfg(feature = "tracing")]
        tracing::trace!(
            "Worker {worker_id} finished job {} (ok = {})",
            outcome.seq,
            outcome.is_ok()
        );

        if results.send(outcome).await.is_err() {
            #[cfg(feature = "tracing")]
            tracing::debug!("Worker {worker_id} exiting, no result receivers left");
            break;
        }
    }

    #[cfg(feature = "tracing")]
    tracing::trace!("Worker {worker_id} stopped");
}

/// Applies the transform to one job, containing both errors and panics.
async fn run_job<T, F>(worker_id: usize, transform: &F, job: Job<T>) -> Outcome<F::Output, F::Error>
where
    F: Transform<T>,
{
    let Job { seq, payload } = job;

    // The call itself happens inside the guarded future so that a transform
    // panicking before it returns its future is contained too.
    let result = match AssertUnwindSafe(async { transform.apply(payload).await })
        .catch_unwind()
        .await
    {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(e)) => Err(TransformError::Failed(e)),
        Err(panic) => {
            let message = panic_message(panic.as_ref());
            #[cfg(feature = "tracing")]
            tracing::warn!("Worker {worker_id} transform panicked on job {seq}: {message}");
            Err(TransformError::Panicked(message))
        }
    };

    Outcome {
        seq,
        worker_id,
        result,
    }
}

/// Spawns `work` as worker `worker_id` under a supervisor.
///
/// Whatever way `work` ends, the worker is marked terminated and `arrival` is
/// released. A panic that escapes `work` is reported on `crashes` first, so
/// the report is queued before the barrier can close that channel.
pub(crate) fn spawn_supervised<Fut>(
    handle: &Handle,
    worker_id: usize,
    work: Fut,
    crashes: QueueSender<WorkerCrash>,
    states: Arc<WorkerStates>,
    arrival: Arrival,
) -> JoinHandle<()>
where
    Fut: Future<Output = ()> + Send + 'static,
{
    handle.spawn(async move {
        if let Err(panic) = AssertUnwindSafe(work).catch_unwind().await {
            let message = panic_message(panic.as_ref());

            #[cfg(feature = "tracing")]
            tracing::error!("Worker {worker_id} crashed: {message}");

            if let Err(_e) = crashes.try_send(WorkerCrash { worker_id, message }) {
                #[cfg(feature = "tracing")]
                tracing::error!("Worker {worker_id} failed to report crash: {_e}");
            }
        }

        states.set(worker_id, WorkerState::Terminated);
        arrival.arrive();
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{CompletionBarrier, queue};
    use futures::StreamExt;

    #[tokio::test]
    async fn run_job_wraps_errors_and_panics() {
        let transform = |n: u32| async move {
            match n {
                0 => panic!("zero"),
                n if n % 2 == 0 => Err(format!("{n} is even")),
                n => Ok(n * 10),
            }
        };

        let ok = run_job(4, &transform, Job::new(7, 3)).await;
        assert_eq!(
            ok,
            Outcome {
                seq: 7,
                worker_id: 4,
                result: Ok(30)
            }
        );

        let failed = run_job(4, &transform, Job::new(8, 2)).await;
        assert_eq!(failed.result, Err(TransformError::Failed("2 is even".into())));

        let panicked = run_job(4, &transform, Job::new(9, 0)).await;
        assert_eq!(panicked.result, Err(TransformError::Panicked("zero".into())));
    }

    #[tokio::test]
    async fn eager_panic_is_contained() {
        // Panics while building the future, not while polling it.
        let transform = |n: u32| {
            assert!(n != 0, "refusing zero");
            async move { Ok::<_, ()>(n) }
        };

        let outcome = run_job(0, &transform, Job::new(0, 0)).await;
        assert_eq!(
            outcome.result,
            Err(TransformError::Panicked("refusing zero".into()))
        );
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn supervisor_reports_crash_and_arrives() {
        let (crash_tx, crash_rx) = queue::unbounded::<WorkerCrash>();
        let states = Arc::new(WorkerStates::new(2));
        let closer = crash_tx.clone();
        let barrier = Arc::new(CompletionBarrier::new(2, move || {
            closer.close();
        }));

        let crashed = spawn_supervised(
            &Handle::current(),
            0,
            async { panic!("internal invariant violated") },
            crash_tx.clone(),
            Arc::clone(&states),
            barrier.arrival(),
        );
        let clean = spawn_supervised(
            &Handle::current(),
            1,
            async {},
            crash_tx,
            Arc::clone(&states),
            barrier.arrival(),
        );

        crashed.await.unwrap();
        clean.await.unwrap();
        barrier.wait().await;

        let reports: Vec<_> = crash_rx.collect().await;
        assert_eq!(
            reports,
            vec![WorkerCrash {
                worker_id: 0,
                message: "internal invariant violated".into()
            }]
        );
        assert_eq!(states.snapshot(), vec![WorkerState::Terminated; 2]);
    }
}
