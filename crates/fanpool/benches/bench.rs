use core::hint::black_box;
use criterion::{Criterion, Throughput, criterion_group, criterion_main};
use fanpool::{WorkerPool, feed};
use futures::StreamExt;
use std::{sync::Arc, time::Instant};
use tokio::runtime::Builder;

const JOBS_PER_ITER: u64 = 10_000;

fn pool_throughput(c: &mut Criterion) {
    let rt = Builder::new_multi_thread().enable_all().build().unwrap();
    let mut group = c.benchmark_group("pool/throughput");
    group.throughput(Throughput::Elements(JOBS_PER_ITER));

    for workers in [1, 2, 4, 8, 16] {
        for capacity in [1, 64, 1024] {
            group.bench_function(format!("workers/{workers}/capacity/{capacity}"), |b| {
                b.to_async(&rt).iter_custom(|iters| async move {
                    let start = Instant::now();
                    for _ in 0..iters {
                        let pool = Arc::new(
                            WorkerPool::builder(workers)
                                .queue_capacity(capacity)
                                .result_capacity(capacity)
                                .transform(|n: u64| async move {
                                    Ok::<_, ()>(black_box(n).wrapping_mul(31))
                                })
                                .build()
                                .unwrap(),
                        );
                        pool.start().unwrap();

                        let producer = {
                            let pool = Arc::clone(&pool);
                            tokio::spawn(async move { feed(&pool, 0..JOBS_PER_ITER).await })
                        };
                        let received = pool.results().count().await;
                        producer.await.unwrap().unwrap();
                        assert_eq!(received as u64, JOBS_PER_ITER);
                    }
                    start.elapsed()
                });
            });
        }
    }

    group.finish();
}

criterion_group!(benches, pool_throughput);
criterion_main!(benches);
