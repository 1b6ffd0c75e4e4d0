use fanpool::{Job, Transform, WorkerPool};
use std::sync::{
    Arc,
    atomic::{AtomicU64, AtomicUsize, Ordering},
};

/// Deals jobs round-robin across independent pools.
///
/// Sequence numbers are assigned here rather than by the pools, so they stay
/// unique across the whole fan-out and can be matched up after the results
/// are merged.
pub struct Dispatcher<T, F: Transform<T>> {
    pools: Vec<Arc<WorkerPool<T, F>>>,
    next_pool: AtomicUsize,
    next_seq: AtomicU64,
}

impl<T, F> Dispatcher<T, F>
where
    T: Send + 'static,
    F: Transform<T>,
{
    pub fn new(pools: Vec<Arc<WorkerPool<T, F>>>) -> anyhow::Result<Self> {
        if pools.is_empty() {
            anyhow::bail!("a dispatcher needs at least one pool");
        }
        Ok(Self {
            pools,
            next_pool: AtomicUsize::new(0),
            next_seq: AtomicU64::new(0),
        })
    }

    pub fn next_pool_index(&self) -> usize {
        self.next_pool.fetch_add(1, Ordering::Relaxed) % self.pools.len()
    }

    /// Submits `payload` to the next pool in turn and returns the pool index
    /// together with the job's sequence number.
    ///
    /// # Errors
    ///
    /// Propagates the chosen pool's submission error. The sequence number is
    /// consumed either way.
    pub async fn dispatch(&self, payload: T) -> fanpool::Result<(usize, u64)> {
        let seq = self.next_seq.fetch_add(1, Ordering::Relaxed);
        let index = self.next_pool_index();
        self.pools[index].submit_job(Job::new(seq, payload)).await?;

        #[cfg(feature = "tracing")]
        tracing::trace!("Dispatched job {seq} to pool {index}");
        Ok((index, seq))
    }

    /// Closes the input of every pool. All pools are attempted; the first
    /// error is returned.
    pub fn close_all(&self) -> fanpool::Result<()> {
        let mut first_err = None;
        for pool in &self.pools {
            if let Err(e) = pool.close_input() {
                first_err.get_or_insert(e);
            }
        }
        first_err.map_or(Ok(()), Err)
    }

    pub fn pools(&self) -> &[Arc<WorkerPool<T, F>>] {
        &self.pools
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;

    type Echo = fn(u32) -> futures::future::Ready<Result<u32, ()>>;

    fn echo(n: u32) -> futures::future::Ready<Result<u32, ()>> {
        futures::future::ready(Ok(n))
    }

    fn pools(count: usize) -> Vec<Arc<WorkerPool<u32, Echo>>> {
        (0..count)
            .map(|_| Arc::new(WorkerPool::new(1, echo as Echo).unwrap()))
            .collect()
    }

    #[test]
    fn empty_dispatcher_rejected() {
        assert!(Dispatcher::new(pools(0)).is_err());
    }

    #[test]
    fn indices_wrap_around() {
        let dispatcher = Dispatcher::new(pools(3)).unwrap();
        let indices: Vec<_> = (0..7).map(|_| dispatcher.next_pool_index()).collect();
        assert_eq!(indices, [0, 1, 2, 0, 1, 2, 0]);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn jobs_are_dealt_evenly_with_global_sequence_numbers() {
        let dispatcher = Dispatcher::new(pools(2)).unwrap();
        for pool in dispatcher.pools() {
            pool.start().unwrap();
        }

        let mut placed = Vec::new();
        for n in 0..4 {
            placed.push(dispatcher.dispatch(n * 10).await.unwrap());
        }
        assert_eq!(placed, [(0, 0), (1, 1), (0, 2), (1, 3)]);
        dispatcher.close_all().unwrap();

        let first: Vec<_> = dispatcher.pools()[0].results().map(|o| o.seq).collect().await;
        let second: Vec<_> = dispatcher.pools()[1].results().map(|o| o.seq).collect().await;
        assert_eq!(first.len(), 2);
        assert_eq!(second.len(), 2);
        assert!(first.iter().all(|seq| seq % 2 == 0));
        assert!(second.iter().all(|seq| seq % 2 == 1));
    }

    #[tokio::test]
    async fn closing_unstarted_pools_reports_an_error() {
        let dispatcher = Dispatcher::new(pools(2)).unwrap();
        assert!(dispatcher.close_all().is_err());
    }
}
