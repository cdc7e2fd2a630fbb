//! `pulse-daemon` — runs the jobs listed in pulse.toml on a recurring
//! scheduler until interrupted.
//!
//! Usage:
//!   pulse-daemon                         # ~/.pulse/pulse.toml (or $PULSE_CONFIG)
//!   pulse-daemon --config ./pulse.toml   # explicit config file
//!   pulse-daemon --print-config          # dump the effective config and exit

use anyhow::Result;
use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use pulse_core::config::PulseConfig;
use pulse_scheduler::{Eviction, Scheduler};

mod jobs;

#[derive(Parser)]
#[command(name = "pulse-daemon", version, about = "Recurring-task scheduler daemon")]
struct Cli {
    /// Config file (overrides $PULSE_CONFIG)
    #[arg(short, long)]
    config: Option<String>,

    /// Print the effective configuration as JSON and exit
    #[arg(long)]
    print_config: bool,

    /// Verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        "pulse_daemon=debug,pulse_scheduler=debug"
    } else {
        "pulse_daemon=info,pulse_scheduler=info"
    };
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    // load config: --config > PULSE_CONFIG env > ~/.pulse/pulse.toml
    let config_path = cli.config.or_else(|| std::env::var("PULSE_CONFIG").ok());
    let config = PulseConfig::load(config_path.as_deref()).unwrap_or_else(|e| {
        warn!(code = e.code(), "Config load failed ({}), using defaults", e);
        PulseConfig::default()
    });

    if cli.print_config {
        println!("{}", serde_json::to_string_pretty(&config)?);
        return Ok(());
    }

    // Eviction channel: scheduler → log sink
    let (evicted_tx, mut evicted_rx) =
        tokio::sync::mpsc::channel::<Eviction<String>>(config.scheduler.eviction_buffer.max(1));
    let scheduler = Scheduler::new(&config.scheduler, Some(evicted_tx));

    let registered = jobs::register_jobs(&scheduler, &config.jobs);
    if registered == 0 {
        warn!("no jobs configured, the scheduler will idle");
    }
    info!(
        jobs = registered,
        resolution_ms = config.scheduler.resolution_ms,
        "jobs registered"
    );

    tokio::spawn(async move {
        while let Some(eviction) = evicted_rx.recv().await {
            warn!(
                job = %eviction.key,
                code = eviction.error.code(),
                runs = eviction.fire_count,
                at = %eviction.at.to_rfc3339(),
                "job evicted: {}",
                eviction.error
            );
        }
    });

    let engine = scheduler.start();

    tokio::signal::ctrl_c().await?;
    info!("shutdown signal received");

    // signal the engine to stop and wait for the in-flight firing to finish
    scheduler.shutdown();
    engine.await?;
    info!(remaining = scheduler.len(), "scheduler stopped");
    Ok(())
}
