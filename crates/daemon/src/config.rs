// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Daemon configuration, loaded from TOML.
//!
//! Every field has a default, so an empty file (or no file at all) yields a
//! working daemon that applies configs with `fleet-apply`.

use std::path::{Path, PathBuf};
use std::time::Duration;

use fleet_core::{ErrorKind, Kinded, Priority};
use fleet_engine::{DispatchPolicy, QueueConfig, ScheduleOptions, WorkerLifecyclePolicy};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read { path: PathBuf, source: std::io::Error },

    #[error("failed to parse config {path}: {source}")]
    Parse { path: PathBuf, source: toml::de::Error },

    #[error("invalid config: {0}")]
    Invalid(String),
}

impl Kinded for ConfigError {
    fn kind(&self) -> ErrorKind {
        match self {
            ConfigError::Read { .. } => ErrorKind::NotFound,
            ConfigError::Parse { .. } | ConfigError::Invalid(_) => ErrorKind::ValidationError,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueueSection {
    pub buffer: usize,
    pub history: usize,
    /// Running jobs older than this are failed by the recovery sweeper.
    pub recover_after_secs: u64,
    pub recover_interval_secs: u64,
    /// Shutdown drain budget; 0 waits forever.
    pub drain_timeout_secs: u64,
}

impl Default for QueueSection {
    fn default() -> Self {
        Self {
            buffer: fleet_engine::queue::DEFAULT_BUFFER,
            history: fleet_engine::queue::DEFAULT_HISTORY,
            recover_after_secs: fleet_engine::queue::DEFAULT_STUCK_AGE.as_secs(),
            recover_interval_secs: 30,
            drain_timeout_secs: 30,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EventsSection {
    pub capacity: usize,
}

impl Default for EventsSection {
    fn default() -> Self {
        Self { capacity: 1_000 }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutorSection {
    /// Invoked as `program args... <config_path>`.
    pub program: String,
    pub args: Vec<String>,
    /// 0 disables the timeout.
    pub timeout_secs: u64,
}

impl Default for ExecutorSection {
    fn default() -> Self {
        Self { program: "fleet-apply".to_string(), args: Vec::new(), timeout_secs: 600 }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogSection {
    /// Directory for rolling log files; stderr when unset.
    pub dir: Option<PathBuf>,
}

/// A `[[schedule]]` entry seeded at startup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduleEntry {
    pub config_path: String,
    pub interval_secs: u64,
    #[serde(default)]
    pub jitter_secs: u64,
    #[serde(default)]
    pub priority: Priority,
    #[serde(default = "default_cost")]
    pub execution_cost: i64,
    #[serde(default)]
    pub host: Option<String>,
    #[serde(default)]
    pub cluster: Option<String>,
    #[serde(default)]
    pub environment: Option<String>,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

fn default_cost() -> i64 {
    1
}

fn default_enabled() -> bool {
    true
}

impl ScheduleEntry {
    pub fn options(&self) -> ScheduleOptions {
        let mut opts = ScheduleOptions::new(&self.config_path, Duration::from_secs(self.interval_secs))
            .priority(self.priority)
            .execution_cost(self.execution_cost)
            .jitter(Duration::from_secs(self.jitter_secs))
            .enabled(self.enabled);
        opts.host = self.host.clone();
        opts.cluster = self.cluster.clone();
        opts.environment = self.environment.clone();
        opts
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub queue: QueueSection,
    pub worker: WorkerLifecyclePolicy,
    pub scheduler: DispatchPolicy,
    pub events: EventsSection,
    pub executor: ExecutorSection,
    pub log: LogSection,
    #[serde(rename = "schedule")]
    pub schedules: Vec<ScheduleEntry>,
}

impl Config {
    /// Load from `path`, falling back to `FLEET_CONFIG`, then to defaults.
    /// `FLEET_STATE_DIR` overrides the log directory.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let path = path.map(Path::to_path_buf).or_else(crate::env::config_path);
        let mut config = match path {
            Some(path) => {
                let text = std::fs::read_to_string(&path)
                    .map_err(|source| ConfigError::Read { path: path.clone(), source })?;
                toml::from_str(&text).map_err(|source| ConfigError::Parse { path, source })?
            }
            None => Config::default(),
        };
        if let Some(state_dir) = crate::env::state_dir() {
            config.log.dir = Some(state_dir.join("logs"));
        }
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.queue.buffer == 0 {
            return Err(ConfigError::Invalid("queue.buffer must be at least 1".into()));
        }
        if self.queue.recover_after_secs == 0 || self.queue.recover_interval_secs == 0 {
            return Err(ConfigError::Invalid("queue recovery intervals must be positive".into()));
        }
        if self.events.capacity == 0 {
            return Err(ConfigError::Invalid("events.capacity must be at least 1".into()));
        }
        if self.executor.program.trim().is_empty() {
            return Err(ConfigError::Invalid("executor.program must not be empty".into()));
        }
        for (i, entry) in self.schedules.iter().enumerate() {
            if entry.config_path.trim().is_empty() {
                return Err(ConfigError::Invalid(format!("schedule[{i}].config_path must not be empty")));
            }
            if entry.interval_secs == 0 {
                return Err(ConfigError::Invalid(format!("schedule[{i}].interval_secs must be positive")));
            }
        }
        Ok(())
    }

    pub fn queue_config(&self) -> QueueConfig {
        QueueConfig::with_buffer(self.queue.buffer).history(self.queue.history).lifecycle(self.worker)
    }

    pub fn recover_after(&self) -> Duration {
        Duration::from_secs(self.queue.recover_after_secs)
    }

    pub fn recover_interval(&self) -> Duration {
        Duration::from_secs(self.queue.recover_interval_secs)
    }

    pub fn drain_timeout(&self) -> Duration {
        Duration::from_secs(self.queue.drain_timeout_secs)
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
