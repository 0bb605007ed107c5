use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use dotenvy::dotenv;
use tokio::sync::watch;
use tracing::{info, warn};

use form_pilot::brain::{OpenAiOracle, Oracle};
use form_pilot::config::{self, DispatchSettings, SchedulerSettings};
use form_pilot::face;
use form_pilot::hands::{ChromeLauncher, LaunchSettings};
use form_pilot::jobs::{JobDispatcher, JobRegistry, JobScheduler, sample_value_sets};

/// Form-filling job server: HTTP API, job dispatcher and sample-job scheduler.
#[derive(Debug, Parser)]
#[command(version, about)]
struct Args {
    /// First port to try; the next nine are tried if it is taken.
    #[arg(long, default_value_t = 3000)]
    port: u16,

    /// Show the browser window instead of running headless.
    #[arg(long)]
    headed: bool,

    /// Do not enqueue sample jobs.
    #[arg(long)]
    no_scheduler: bool,

    /// Minutes between scheduled sample jobs.
    #[arg(long, default_value_t = 5)]
    schedule_minutes: u64,

    /// Perception cycles allowed per job (0 = unlimited).
    #[arg(long, default_value_t = 100)]
    max_cycles: usize,

    /// Wall-clock limit per job in seconds (0 = unlimited).
    #[arg(long, default_value_t = 600)]
    job_timeout_secs: u64,

    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv().ok();
    let args = Args::parse();
    config::init_logging(&args.log_level);

    let oracle = OpenAiOracle::from_env()?;
    info!(model = oracle.model(), "oracle ready");
    let oracle: Arc<dyn Oracle> = Arc::new(oracle);

    let registry = JobRegistry::new();

    let mut dispatch = DispatchSettings::default();
    dispatch.agent.max_cycles = (args.max_cycles > 0).then_some(args.max_cycles);
    dispatch.job_timeout = (args.job_timeout_secs > 0).then(|| Duration::from_secs(args.job_timeout_secs));

    let launcher = ChromeLauncher::new(LaunchSettings {
        headless: !args.headed,
        ..LaunchSettings::default()
    });
    let (stop, shutdown) = watch::channel(false);
    let mut workers = Vec::new();

    let dispatcher = JobDispatcher::new(registry.clone(), Arc::new(launcher), oracle, dispatch);
    workers.push(tokio::spawn(dispatcher.run(shutdown.clone())));

    if !args.no_scheduler {
        let scheduler = JobScheduler::new(
            registry.clone(),
            sample_value_sets(),
            SchedulerSettings {
                interval: Duration::from_secs(args.schedule_minutes.max(1) * 60),
            },
        );
        workers.push(tokio::spawn(scheduler.run(shutdown)));
    }

    tokio::select! {
        served = face::serve(face::router(registry), args.port) => served?,
        _ = tokio::signal::ctrl_c() => info!("shutdown requested, finishing current job"),
    }

    let _ = stop.send(true);
    for worker in workers {
        if let Err(e) = worker.await {
            warn!(error = %e, "background task ended abnormally");
        }
    }
    Ok(())
}
