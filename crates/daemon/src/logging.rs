// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Tracing subscriber setup.

use std::path::Path;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

/// Rolling log file prefix inside the log directory.
pub const LOG_FILE_PREFIX: &str = "fleetd.log";

/// Install the global subscriber.
///
/// With a log directory, output goes through a daily rolling non-blocking
/// writer and the returned guard must be held until exit so buffered lines
/// are flushed. Without one, logs go to stderr.
pub fn init(dir: Option<&Path>) -> Result<Option<WorkerGuard>, crate::DaemonError> {
    let directive = crate::env::log_filter();
    let filter = EnvFilter::try_new(&directive).unwrap_or_else(|_| EnvFilter::new("info"));

    match dir {
        Some(dir) => {
            std::fs::create_dir_all(dir)?;
            let appender = tracing_appender::rolling::daily(dir, LOG_FILE_PREFIX);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            tracing_subscriber::registry()
                .with(filter)
                .with(tracing_subscriber::fmt::layer().with_writer(writer).with_ansi(false))
                .try_init()
                .map_err(|e| crate::DaemonError::Logging(e.to_string()))?;
            Ok(Some(guard))
        }
        None => {
            tracing_subscriber::registry()
                .with(filter)
                .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
                .try_init()
                .map_err(|e| crate::DaemonError::Logging(e.to_string()))?;
            Ok(None)
        }
    }
}
