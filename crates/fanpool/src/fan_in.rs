//! Merging independent streams into one.
//!
//! Each input stream gets a forwarding task. The forwarders share a
//! [`CompletionBarrier`] whose terminal action closes the merged queue, so the
//! merged stream ends right after the last input stream ends.

use crate::{CompletionBarrier, PoolError, Result, queue, queue::QueueStream};
use core::pin::pin;
use futures::{Stream, StreamExt};
use std::sync::Arc;
use tokio::runtime::Handle;

/// Merges `streams` into a single stream buffered by a queue of `capacity`.
///
/// Items from one input keep their relative order; items from different
/// inputs interleave arbitrarily. Forwarders stop early if the merged stream
/// is dropped.
///
/// # Errors
///
/// - [`PoolError::Configuration`] if `capacity` is zero.
/// - [`PoolError::NoRuntime`] outside a Tokio runtime.
pub fn merge<S, I>(streams: I, capacity: usize) -> Result<QueueStream<S::Item>>
where
    I: IntoIterator<Item = S>,
    S: Stream + Send + 'static,
    S::Item: Send + 'static,
{
    if capacity == 0 {
        return Err(PoolError::configuration(
            "merge capacity must be greater than 0",
        ));
    }
    let handle = Handle::try_current().map_err(|_| PoolError::NoRuntime)?;

    let streams: Vec<S> = streams.into_iter().collect();
    let (tx, rx) = queue::bounded(capacity);

    let barrier = {
        let tx = tx.clone();
        Arc::new(CompletionBarrier::new(streams.len(), move || {
            tx.close();
        }))
    };

    #[cfg(feature = "tracing")]
    tracing::debug!("Merging {} streams", streams.len());

    for (_index, stream) in streams.into_iter().enumerate() {
        let tx = tx.clone();
        let arrival = barrier.arrival();
        handle.spawn(async move {
            let mut stream = pin!(stream);
            while let Some(item) = stream.next().await {
                if tx.send(item).await.is_err() {
                    #[cfg(feature = "tracing")]
                    tracing::debug!("Merged stream dropped, stopping forwarder {_index}");
                    break;
                }
            }
            arrival.arrive();
        });
    }

    Ok(rx)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::WorkerPool;
    use futures::stream;

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn merges_all_items_then_ends() {
        let inputs = (0..3).map(|i| stream::iter(i * 100..i * 100 + 10));
        let merged = merge(inputs, 4).unwrap();

        let mut items: Vec<u32> = merged.collect().await;
        items.sort_unstable();
        let expected: Vec<u32> = (0..3).flat_map(|i| i * 100..i * 100 + 10).collect();
        assert_eq!(items, expected);
    }

    #[tokio::test]
    async fn keeps_per_input_order() {
        let merged = merge([stream::iter(0..50), stream::iter(100..150)], 2).unwrap();
        let items: Vec<u32> = merged.collect().await;

        let low: Vec<u32> = items.iter().copied().filter(|n| *n < 100).collect();
        let high: Vec<u32> = items.iter().copied().filter(|n| *n >= 100).collect();
        assert_eq!(low, (0..50).collect::<Vec<_>>());
        assert_eq!(high, (100..150).collect::<Vec<_>>());
    }

    #[tokio::test]
    async fn no_inputs_yield_an_empty_stream() {
        let merged = merge(Vec::<stream::Iter<std::vec::IntoIter<u8>>>::new(), 1).unwrap();
        assert_eq!(merged.recv().await, None);
    }

    #[tokio::test]
    async fn zero_capacity_is_rejected() {
        let err = merge([stream::iter(0..1u8)], 0).unwrap_err();
        assert!(matches!(err, PoolError::Configuration { .. }));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn merges_independent_pools() {
        let mut pools = Vec::new();
        for wrapper in 0..3_u32 {
            let pool = WorkerPool::new(1, move |n: u32| async move { Ok::<_, ()>((wrapper, n * 10)) })
                .unwrap();
            pool.start().unwrap();
            pools.push(pool);
        }

        let merged = merge(pools.iter().map(WorkerPool::results), 8).unwrap();
        for (i, pool) in pools.iter().enumerate() {
            let i = i as u32;
            pool.submit(i * 2 + 1).await.unwrap();
            pool.submit(i * 2 + 2).await.unwrap();
            pool.close_input().unwrap();
        }

        let mut wrapped: Vec<(u32, u32)> = merged.map(|o| o.result.unwrap()).collect().await;
        wrapped.sort_unstable();
        assert_eq!(
            wrapped,
            vec![(0, 10), (0, 20), (1, 30), (1, 40), (2, 50), (2, 60)]
        );
    }
}
