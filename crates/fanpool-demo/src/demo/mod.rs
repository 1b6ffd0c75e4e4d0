pub mod config;
pub mod dispatch;
pub mod scenarios;
pub mod telemetry;

use config::{DemoConfig, ScenarioArgs};
use std::time::Instant;

/// Runs the configured scenario to completion and prints its report.
pub async fn run(config: &DemoConfig) -> anyhow::Result<()> {
    let started = Instant::now();

    let report = match &config.scenario {
        ScenarioArgs::Pool { jobs, fail_even } => scenarios::pool(config, *jobs, *fail_even).await?,
        ScenarioArgs::Pipeline { values } => scenarios::pipeline(config, values).await?,
        ScenarioArgs::FanIn { pools, jobs } => scenarios::fan_in(config, *pools, *jobs).await?,
    };

    let elapsed = started.elapsed();
    telemetry::record_run_duration(elapsed.as_secs_f64() * 1000.0);
    report.print();

    #[cfg(feature = "tracing")]
    tracing::info!("Scenario finished in {elapsed:?}");
    Ok(())
}
