#![warn(clippy::all)]

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use logger::LogSettings;
use madstatus::{
    CommandActuator, DryRunActuator, HttpTransport, RebootActuator, StatusClient, StatusReader,
};
use tracing::info;

mod config;
mod watchdog;

use config::Config;
use watchdog::Watchdog;

#[derive(Parser, Debug)]
#[command(name = "madwatch", version)]
#[command(about = "Checks MAD devices and reboots the ones that got stuck")]
struct Args {
    /// Path to config.ini (defaults to configs/config.ini next to the executable)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Run a single sweep and exit
    #[arg(long)]
    once: bool,

    /// Log reboot decisions without running the reboot command
    #[arg(long)]
    dry_run: bool,

    /// Also log to stderr
    #[arg(long)]
    console: bool,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config = Config::from_config(args.config.as_ref()).context("Failed to load configuration")?;

    let _guard = logger::init(&LogSettings {
        level: config.log.level,
        file: config.log.file.clone(),
        backups: config.log.backups,
        console: args.console,
    })
    .context("Failed to initialize logging")?;

    info!("MAD - Check and Reboot - Daemon started");
    info!("Configuration:\n{config}");

    let transport = HttpTransport::new(config.timing.request_timeout)
        .context("Failed to build HTTP client")?;
    let reader = StatusReader::new(
        StatusClient::new(transport, config.timing.retry.clone()),
        config.mitm_endpoint()?,
        config.madmin_endpoint()?,
    );

    let actuator: Arc<dyn RebootActuator> = if args.dry_run {
        info!("Dry run: reboots are only logged");
        Arc::new(DryRunActuator)
    } else {
        Arc::new(CommandActuator::new(&config.reboot.command))
    };

    let watchdog = Watchdog::new(reader, actuator, &config);

    if args.once {
        watchdog.sweep().await;
    } else {
        watchdog.run().await;
    }

    Ok(())
}
