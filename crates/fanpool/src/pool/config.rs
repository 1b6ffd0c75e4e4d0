use crate::{PoolError, Result, Transform, WorkerPool};
use core::marker::PhantomData;

/// Default capacity of the input queue.
pub const DEFAULT_QUEUE_CAPACITY: usize = 64;

/// Default capacity of the result queue.
pub const DEFAULT_RESULT_CAPACITY: usize = 64;

/// Sizing of a [`WorkerPool`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PoolConfig {
    /// Number of workers spawned by `start`. Fixed for the pool's lifetime.
    pub workers: usize,
    /// Jobs that may wait in the input queue before `submit` blocks.
    pub queue_capacity: usize,
    /// Results that may wait in the output queue before workers block.
    pub result_capacity: usize,
}

impl PoolConfig {
    pub const fn new(workers: usize) -> Self {
        Self {
            workers,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            result_capacity: DEFAULT_RESULT_CAPACITY,
        }
    }

    /// Checks the invariants the pool relies on.
    ///
    /// # Errors
    ///
    /// Returns [`PoolError::Configuration`] if any count is zero.
    pub fn validate(&self) -> Result<()> {
        if self.workers == 0 {
            return Err(PoolError::configuration(
                "worker count must be greater than 0",
            ));
        }
        if self.queue_capacity == 0 {
            return Err(PoolError::configuration(
                "queue capacity must be greater than 0",
            ));
        }
        if self.result_capacity == 0 {
            return Err(PoolError::configuration(
                "result capacity must be greater than 0",
            ));
        }
        Ok(())
    }
}

/// Builder for a [`WorkerPool`]; see [`WorkerPool::builder`].
#[must_use]
pub struct PoolBuilder<T, F> {
    config: PoolConfig,
    transform: Option<F>,
    _payload: PhantomData<fn(T)>,
}

impl<T, F> PoolBuilder<T, F>
where
    T: Send + 'static,
    F: Transform<T>,
{
    pub fn new(workers: usize) -> Self {
        Self::from_config(PoolConfig::new(workers))
    }

    pub fn from_config(config: PoolConfig) -> Self {
        Self {
            config,
            transform: None,
            _payload: PhantomData,
        }
    }

    pub fn workers(mut self, workers: usize) -> Self {
        self.config.workers = workers;
        self
    }

    pub fn queue_capacity(mut self, capacity: usize) -> Self {
        self.config.queue_capacity = capacity;
        self
    }

    pub fn result_capacity(mut self, capacity: usize) -> Self {
        self.config.result_capacity = capacity;
        self
    }

    pub fn transform(mut self, transform: F) -> Self {
        self.transform = Some(transform);
        self
    }

    /// Validates the configuration and creates the pool in the
    /// [`Created`](crate::PoolState::Created) state. No workers run until
    /// [`WorkerPool::start`].
    ///
    /// # Errors
    ///
    /// Returns [`PoolError::Configuration`] for a zero worker count, a zero
    /// capacity, or a missing transform.
    pub fn build(self) -> Result<WorkerPool<T, F>> {
        self.config.validate()?;
        let transform = self
            .transform
            .ok_or_else(|| PoolError::configuration("a transform is required"))?;
        Ok(WorkerPool::from_parts(self.config, transform))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::future::Ready;

    type Identity = fn(u32) -> Ready<Result<u32, ()>>;

    fn identity(n: u32) -> Ready<Result<u32, ()>> {
        futures::future::ready(Ok(n))
    }

    #[test]
    fn zero_workers_rejected() {
        let err = PoolBuilder::<u32, Identity>::new(0)
            .transform(identity)
            .build()
            .unwrap_err();
        assert!(matches!(err, PoolError::Configuration { .. }), "{err}");
    }

    #[test]
    fn zero_capacities_rejected() {
        let err = PoolBuilder::<u32, Identity>::new(2)
            .queue_capacity(0)
            .transform(identity)
            .build()
            .unwrap_err();
        assert_eq!(
            err,
            PoolError::configuration("queue capacity must be greater than 0")
        );

        let err = PoolBuilder::<u32, Identity>::new(2)
            .result_capacity(0)
            .transform(identity)
            .build()
            .unwrap_err();
        assert_eq!(
            err,
            PoolError::configuration("result capacity must be greater than 0")
        );
    }

    #[test]
    fn missing_transform_rejected() {
        let err = PoolBuilder::<u32, Identity>::new(2).build().unwrap_err();
        assert_eq!(err, PoolError::configuration("a transform is required"));
    }

    #[test]
    fn builder_applies_settings() {
        let pool = PoolBuilder::<u32, Identity>::new(1)
            .workers(3)
            .queue_capacity(8)
            .result_capacity(16)
            .transform(identity)
            .build()
            .unwrap();
        assert_eq!(
            pool.config(),
            &PoolConfig {
                workers: 3,
                queue_capacity: 8,
                result_capacity: 16,
            }
        );
    }
}
