use anyhow::{Context, Result};
use clap::Parser;
use log::info;
use std::io;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use nic_logtail::config::{self, Config};
use nic_logtail::monitor::{DecodeErrorPolicy, Monitor, SchemaMismatchPolicy};
use nic_logtail::render::{JsonLines, Renderer, StatusLine};
use nic_logtail::source::{LogFollower, Records};
use nic_logtail::telemetry::RateComputer;
use nic_logtail::utils;

#[derive(Parser)]
#[command(name = "nic-logtail")]
#[command(version)]
#[command(about = "Live packet, bit and spin rates from a NIC driver stats log", long_about = None)]
struct Cli {
    /// Stats log to follow (one JSON snapshot per line)
    file: PathBuf,

    /// Config file to use instead of /etc/nic-logtail/config.toml
    #[arg(long)]
    config: Option<PathBuf>,

    /// Process the lines already in the file before following it
    #[arg(long)]
    from_start: bool,

    /// Stop at end of file instead of waiting for new lines
    #[arg(long)]
    no_follow: bool,

    /// Print one JSON object per interval instead of a status line
    #[arg(long)]
    json: bool,

    /// Show timestamps in UTC
    #[arg(long)]
    utc: bool,

    /// What to do with lines that are not valid snapshots
    #[arg(long, value_enum)]
    on_decode_error: Option<DecodeErrorPolicy>,

    /// What to do when the snapshot fields change mid-stream
    #[arg(long, value_enum)]
    on_schema_mismatch: Option<SchemaMismatchPolicy>,
}

impl Cli {
    /// Command-line flags win over the config file
    fn apply(&self, config: &mut Config) {
        if self.from_start {
            config.source.from_start = true;
        }
        if self.no_follow {
            config.source.follow = false;
        }
        if self.utc {
            config.display.utc = true;
        }
        if let Some(policy) = self.on_decode_error {
            config.policy.on_decode_error = policy;
        }
        if let Some(policy) = self.on_schema_mismatch {
            config.policy.on_schema_mismatch = policy;
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    utils::logger::init();

    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => config::load_config_from(path)?,
        None => config::load_config(),
    };
    cli.apply(&mut config);

    run_monitor(cli.file, cli.json, config).await
}

/// Follow the log until it ends, the monitor aborts, or Ctrl-C
async fn run_monitor(path: PathBuf, json: bool, config: Config) -> Result<()> {
    let computer = RateComputer::new(config.fields.clone(), config.rates.clone())
        .context("Invalid [rates] configuration")?;

    let stop = Arc::new(AtomicBool::new(false));
    let follower = LogFollower::open(&path, config.source.follow_options(), stop.clone())?;
    info!("=== nic-logtail: {} ===", follower.path().display());

    let mut monitor = Monitor::new(computer, config.policy.monitor_policy());

    let mut renderer: Box<dyn Renderer + Send> = if json {
        Box::new(JsonLines::new(io::stdout()))
    } else {
        Box::new(StatusLine::new(io::stdout(), config.display.utc))
    };

    // The loop blocks on file reads, so it gets its own thread
    let mut task =
        tokio::task::spawn_blocking(move || monitor.run(Records::new(follower), &mut renderer));

    let finished = tokio::select! {
        result = &mut task => Some(result),
        _ = tokio::signal::ctrl_c() => None,
    };

    let result = match finished {
        Some(result) => result,
        None => {
            info!("Received shutdown signal");
            // The follower ends the stream before its next line
            stop.store(true, Ordering::Relaxed);
            task.await
        }
    };
    let summary = result.context("Monitor thread panicked")??;

    info!("Monitor mode stopped after {} frames", summary.frames);
    Ok(())
}
