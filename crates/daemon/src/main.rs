// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! fleetd: runs the apply queue, scheduler, and event log until signalled.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use fleet_daemon::{logging, CommandExecutor, Config, Daemon};
use tokio::signal::unix::{signal, SignalKind};
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "fleetd")]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to the TOML config file (defaults to $FLEET_CONFIG, then built-in defaults)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Validate the config and exit
    #[arg(long)]
    check: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let config = Config::load(args.config.as_deref()).context("loading config")?;
    if args.check {
        println!("config ok: {} schedule(s)", config.schedules.len());
        return Ok(());
    }

    // Held until exit so the non-blocking writer flushes.
    let _log_guard = logging::init(config.log.dir.as_deref()).context("initialising logging")?;
    info!(version = env!("CARGO_PKG_VERSION"), "fleetd starting");

    let executor = Arc::new(CommandExecutor::from_config(&config.executor));
    let mut daemon = Daemon::new(config);
    daemon.start(executor).context("starting daemon")?;

    let mut sigterm = signal(SignalKind::terminate()).context("installing SIGTERM handler")?;
    tokio::select! {
        _ = tokio::signal::ctrl_c() => info!("received SIGINT"),
        _ = sigterm.recv() => info!("received SIGTERM"),
    }

    daemon.shutdown().await.context("shutting down")?;
    Ok(())
}
