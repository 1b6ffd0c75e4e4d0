use crate::TransformError;

/// A unit of work travelling through the input queue.
///
/// `seq` is a diagnostic tag. [`WorkerPool::submit`](crate::WorkerPool::submit)
/// numbers jobs in submission order; callers that already have a number (for
/// example a pipeline stage forwarding an upstream job) use
/// [`WorkerPool::submit_job`](crate::WorkerPool::submit_job) to keep it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Job<T> {
    pub seq: u64,
    pub payload: T,
}

impl<T> Job<T> {
    pub const fn new(seq: u64, payload: T) -> Self {
        Self { seq, payload }
    }
}

/// The result of running one [`Job`] through the transform.
///
/// Every successfully submitted job produces exactly one `Outcome`, whether
/// the transform succeeded, failed or panicked.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Outcome<O, E> {
    /// Sequence number of the originating job.
    pub seq: u64,
    /// Worker that ran the job.
    pub worker_id: usize,
    pub result: Result<O, TransformError<E>>,
}

impl<O, E> Outcome<O, E> {
    pub fn is_ok(&self) -> bool {
        self.result.is_ok()
    }

    pub fn is_err(&self) -> bool {
        self.result.is_err()
    }

    /// Drops the diagnostics and keeps the value or error.
    pub fn into_result(self) -> Result<O, TransformError<E>> {
        self.result
    }
}

/// Report of a worker that died outside its transform.
///
/// Delivered on [`WorkerPool::crashes`](crate::WorkerPool::crashes), never on
/// the result stream.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WorkerCrash {
    pub worker_id: usize,
    pub message: String,
}
