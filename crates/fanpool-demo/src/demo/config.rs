use anyhow::Context;
use clap::{Parser, Subcommand};
use core::time::Duration;
use fanpool::{DEFAULT_QUEUE_CAPACITY, DEFAULT_RESULT_CAPACITY, PoolConfig};

/// Runs worker-pool, pipeline and fan-out/fan-in demonstrations.
///
/// Every option can also be set through the environment (or a `.env` file).
#[derive(Debug, Parser)]
#[command(version, about)]
pub struct CliArgs {
    #[command(subcommand)]
    pub scenario: ScenarioArgs,

    /// Workers per pool. Defaults to the number of logical CPUs.
    #[arg(long, global = true, env = "FANPOOL_WORKERS")]
    pub workers: Option<usize>,

    /// Jobs that may wait in a pool's input queue before submission blocks.
    #[arg(long, global = true, env = "FANPOOL_QUEUE_CAPACITY", default_value_t = DEFAULT_QUEUE_CAPACITY)]
    pub queue_capacity: usize,

    /// Results that may wait in a pool's output queue before workers block.
    #[arg(long, global = true, env = "FANPOOL_RESULT_CAPACITY", default_value_t = DEFAULT_RESULT_CAPACITY)]
    pub result_capacity: usize,

    /// Upper bound of the random simulated work per job, in milliseconds.
    #[arg(long, global = true, env = "FANPOOL_WORK_DELAY_MS", default_value_t = 0)]
    pub work_delay_ms: u64,

    /// Seconds to wait for pools to drain once the input is closed.
    #[arg(long, global = true, env = "FANPOOL_SHUTDOWN_TIMEOUT_SECS", default_value_t = 5)]
    pub shutdown_timeout_secs: u64,
}

#[derive(Debug, Clone, Subcommand)]
pub enum ScenarioArgs {
    /// A single pool doubling every job.
    Pool {
        /// Number of jobs, numbered from 1.
        #[arg(long, default_value_t = 5)]
        jobs: u64,

        /// Make the transform reject even inputs.
        #[arg(long)]
        fail_even: bool,
    },
    /// Two chained pools: square, then add one.
    Pipeline {
        /// Values fed into the first stage.
        #[arg(default_values_t = [1, 2, 3, 4])]
        values: Vec<u64>,
    },
    /// Jobs dealt round-robin to independent pools, merged into one stream.
    FanIn {
        /// Number of independent pools.
        #[arg(long, default_value_t = 3)]
        pools: usize,

        /// Number of jobs, numbered from 1.
        #[arg(long, default_value_t = 10)]
        jobs: u64,
    },
}

/// Validated settings shared by every scenario.
#[derive(Debug, Clone)]
pub struct DemoConfig {
    pub scenario: ScenarioArgs,
    pub pool: PoolConfig,
    pub work_delay: Duration,
    pub shutdown_timeout: Duration,
}

impl TryFrom<CliArgs> for DemoConfig {
    type Error = anyhow::Error;

    fn try_from(args: CliArgs) -> anyhow::Result<Self> {
        let pool = PoolConfig {
            workers: args.workers.unwrap_or_else(num_cpus::get),
            queue_capacity: args.queue_capacity,
            result_capacity: args.result_capacity,
        };
        pool.validate().context("invalid pool settings")?;

        if let ScenarioArgs::FanIn { pools: 0, .. } = args.scenario {
            anyhow::bail!("fan-in needs at least one pool");
        }
        if args.shutdown_timeout_secs == 0 {
            anyhow::bail!("shutdown timeout must be at least one second");
        }

        Ok(Self {
            scenario: args.scenario,
            pool,
            work_delay: Duration::from_millis(args.work_delay_ms),
            shutdown_timeout: Duration::from_secs(args.shutdown_timeout_secs),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> anyhow::Result<DemoConfig> {
        let args = CliArgs::try_parse_from(std::iter::once("fanpool-demo").chain(args.iter().copied()))?;
        DemoConfig::try_from(args)
    }

    #[test]
    fn defaults_fill_in() {
        let config = parse(&["pool"]).unwrap();
        assert!(config.pool.workers > 0);
        assert_eq!(config.pool.queue_capacity, DEFAULT_QUEUE_CAPACITY);
        assert_eq!(config.shutdown_timeout, Duration::from_secs(5));
        assert!(matches!(
            config.scenario,
            ScenarioArgs::Pool {
                jobs: 5,
                fail_even: false
            }
        ));
    }

    #[test]
    fn global_options_follow_the_subcommand() {
        let config = parse(&["pipeline", "3", "7", "--workers", "2", "--work-delay-ms", "10"]).unwrap();
        assert_eq!(config.pool.workers, 2);
        assert_eq!(config.work_delay, Duration::from_millis(10));
        match config.scenario {
            ScenarioArgs::Pipeline { values } => assert_eq!(values, vec![3, 7]),
            other => panic!("unexpected scenario {other:?}"),
        }
    }

    #[test]
    fn zero_workers_rejected() {
        let err = parse(&["pool", "--workers", "0"]).unwrap_err();
        assert!(format!("{err:#}").contains("worker count must be greater than 0"));
    }

    #[test]
    fn zero_pools_rejected() {
        assert!(parse(&["fan-in", "--pools", "0"]).is_err());
    }
}
