use crate::demo::{config::DemoConfig, dispatch::Dispatcher, telemetry};
use core::time::Duration;
use fanpool::{Forwarded, Outcome, PoolBuilder, Transform, WorkerPool, feed, forward, merge};
use futures::StreamExt;
use rand::Rng;
use std::sync::Arc;

/// Collected results of a scenario, keyed by job sequence number.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Report {
    pub succeeded: Vec<(u64, u64)>,
    pub failed: Vec<(u64, String)>,
    pub crashes: usize,
}

impl Report {
    fn record(&mut self, outcome: Outcome<u64, String>) {
        telemetry::record_result(outcome.is_ok());
        match outcome.result {
            Ok(value) => self.succeeded.push((outcome.seq, value)),
            Err(e) => self.failed.push((outcome.seq, e.to_string())),
        }
    }

    fn sort(&mut self) {
        self.succeeded.sort_unstable();
        self.failed.sort_unstable();
    }

    pub fn print(&self) {
        for (seq, value) in &self.succeeded {
            println!("job {seq:>4}: ok {value}");
        }
        for (seq, error) in &self.failed {
            println!("job {seq:>4}: {error}");
        }
        println!(
            "{} succeeded, {} failed, {} worker crashes",
            self.succeeded.len(),
            self.failed.len(),
            self.crashes
        );
    }
}

/// Sleeps for a random duration up to `limit`.
async fn simulate_work(limit: Duration) {
    if limit.is_zero() {
        return;
    }
    let max_ms = u64::try_from(limit.as_millis()).unwrap_or(u64::MAX);
    let jitter = rand::rng().random_range(0..=max_ms);
    tokio::time::sleep(Duration::from_millis(jitter)).await;
}

fn doubling(delay: Duration, fail_even: bool) -> impl Transform<u64, Output = u64, Error = String> {
    move |n: u64| async move {
        simulate_work(delay).await;
        if fail_even && n % 2 == 0 {
            return Err(format!("{n} is even"));
        }
        n.checked_mul(2).ok_or_else(|| format!("doubling {n} overflows"))
    }
}

fn squaring(delay: Duration) -> impl Transform<u64, Output = u64, Error = String> {
    move |n: u64| async move {
        simulate_work(delay).await;
        n.checked_mul(n).ok_or_else(|| format!("squaring {n} overflows"))
    }
}

fn adding_one(delay: Duration) -> impl Transform<u64, Output = u64, Error = String> {
    move |n: u64| async move {
        simulate_work(delay).await;
        n.checked_add(1).ok_or_else(|| format!("{n} + 1 overflows"))
    }
}

fn build<F: Transform<u64>>(config: &DemoConfig, transform: F) -> fanpool::Result<Arc<WorkerPool<u64, F>>> {
    let pool = PoolBuilder::from_config(config.pool.clone())
        .transform(transform)
        .build()?;
    Ok(Arc::new(pool))
}

/// Waits for the crash side channel to close and counts its reports.
async fn drain_crashes<F: Transform<u64>>(pool: &WorkerPool<u64, F>) -> usize {
    let mut crashes = 0;
    let mut stream = pool.crashes();
    while let Some(crash) = stream.next().await {
        crashes += 1;
        telemetry::increment_worker_crashes();

        #[cfg(feature = "tracing")]
        tracing::error!("Worker {} crashed: {}", crash.worker_id, crash.message);
        #[cfg(not(feature = "tracing"))]
        eprintln!("worker {} crashed: {}", crash.worker_id, crash.message);
    }
    crashes
}

/// One pool doubling `1..=jobs`, optionally failing every even input.
pub async fn pool(config: &DemoConfig, jobs: u64, fail_even: bool) -> anyhow::Result<Report> {
    let pool = build(config, doubling(config.work_delay, fail_even))?;
    pool.start()?;

    let producer = {
        let pool = Arc::clone(&pool);
        tokio::spawn(async move { feed(&pool, 1..=jobs).await })
    };

    let mut report = Report::default();
    let mut results = pool.results();
    while let Some(outcome) = results.next().await {
        report.record(outcome);
    }

    let submitted = producer.await??;
    telemetry::increment_jobs_submitted(submitted as u64);
    report.crashes = drain_crashes(&pool).await;
    pool.shutdown(config.shutdown_timeout).await?;

    report.sort();
    Ok(report)
}

/// Two stages: square, then add one. Upstream failures are reported and not
/// forwarded.
pub async fn pipeline(config: &DemoConfig, values: &[u64]) -> anyhow::Result<Report> {
    let square = build(config, squaring(config.work_delay))?;
    let add_one = build(config, adding_one(config.work_delay))?;
    square.start()?;
    add_one.start()?;

    let link = forward(square.results(), Arc::clone(&add_one));
    let producer = {
        let square = Arc::clone(&square);
        let values = values.to_vec();
        tokio::spawn(async move { feed(&square, values).await })
    };

    let mut report = Report::default();
    let mut results = add_one.results();
    while let Some(outcome) = results.next().await {
        report.record(outcome);
    }

    let submitted = producer.await??;
    telemetry::increment_jobs_submitted(submitted as u64);

    let Forwarded { forwarded, failed } = link.await??;
    #[cfg(feature = "tracing")]
    tracing::debug!("Forwarded {forwarded} results between stages");
    #[cfg(not(feature = "tracing"))]
    let _ = forwarded;
    for (seq, e) in failed {
        telemetry::record_result(false);
        report.failed.push((seq, e.to_string()));
    }

    report.crashes = drain_crashes(&square).await + drain_crashes(&add_one).await;
    square.shutdown(config.shutdown_timeout).await?;
    add_one.shutdown(config.shutdown_timeout).await?;

    report.sort();
    Ok(report)
}

/// `jobs` inputs dealt across `pools` squaring pools, with every pool's
/// results merged into one stream.
pub async fn fan_in(config: &DemoConfig, pools: usize, jobs: u64) -> anyhow::Result<Report> {
    let members = (0..pools)
        .map(|_| build(config, squaring(config.work_delay)))
        .collect::<fanpool::Result<Vec<_>>>()?;
    for pool in &members {
        pool.start()?;
    }

    let dispatcher = Arc::new(Dispatcher::new(members)?);
    let mut merged = merge(
        dispatcher
            .pools()
            .iter()
            .enumerate()
            .map(|(index, pool)| pool.results().map(move |outcome| (index, outcome))),
        config.pool.result_capacity,
    )?;

    let producer = {
        let dispatcher = Arc::clone(&dispatcher);
        tokio::spawn(async move {
            for n in 1..=jobs {
                dispatcher.dispatch(n).await?;
            }
            dispatcher.close_all()?;
            Ok::<_, fanpool::PoolError>(jobs)
        })
    };

    let mut report = Report::default();
    let mut per_pool = vec![0usize; pools];
    while let Some((index, outcome)) = merged.next().await {
        per_pool[index] += 1;
        report.record(outcome);
    }

    let submitted = producer.await??;
    telemetry::increment_jobs_submitted(submitted);

    for (index, pool) in dispatcher.pools().iter().enumerate() {
        report.crashes += drain_crashes(pool).await;
        pool.shutdown(config.shutdown_timeout).await?;

        #[cfg(feature = "tracing")]
        tracing::info!("Pool {index} produced {} results", per_pool[index]);
        #[cfg(not(feature = "tracing"))]
        println!("pool {index} produced {} results", per_pool[index]);
    }

    report.sort();
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::demo::config::ScenarioArgs;
    use fanpool::PoolConfig;

    fn config(workers: usize) -> DemoConfig {
        DemoConfig {
            scenario: ScenarioArgs::Pool {
                jobs: 0,
                fail_even: false,
            },
            pool: PoolConfig::new(workers),
            work_delay: Duration::from_millis(2),
            shutdown_timeout: Duration::from_secs(5),
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn pool_doubles_every_job() {
        let report = pool(&config(3), 5, false).await.unwrap();
        assert_eq!(report.succeeded, [(0, 2), (1, 4), (2, 6), (3, 8), (4, 10)]);
        assert!(report.failed.is_empty());
        assert_eq!(report.crashes, 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn pool_reports_even_failures() {
        let report = pool(&config(2), 6, true).await.unwrap();
        assert_eq!(report.succeeded, [(0, 2), (2, 6), (4, 10)]);
        let failed: Vec<_> = report.failed.iter().map(|(seq, _)| *seq).collect();
        assert_eq!(failed, [1, 3, 5]);
        assert!(report.failed[0].1.contains("2 is even"));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn pipeline_squares_then_adds_one() {
        let report = pipeline(&config(2), &[1, 2, 3, 4]).await.unwrap();
        assert_eq!(report.succeeded, [(0, 2), (1, 5), (2, 10), (3, 17)]);
        assert!(report.failed.is_empty());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn pipeline_reports_upstream_overflow() {
        let report = pipeline(&config(1), &[3, u64::MAX]).await.unwrap();
        assert_eq!(report.succeeded, [(0, 10)]);
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].0, 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn fan_in_merges_every_pool() {
        let report = fan_in(&config(2), 3, 10).await.unwrap();
        let expected: Vec<_> = (1..=10u64).map(|n| (n - 1, n * n)).collect();
        assert_eq!(report.succeeded, expected);
        assert_eq!(report.crashes, 0);
    }
}
