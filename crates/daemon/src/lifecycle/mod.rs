// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Daemon lifecycle: wiring, startup, graceful shutdown.

use std::sync::Arc;
use std::time::Instant;

use fleet_core::{Clock, ErrorKind, Kinded, SystemClock};
use fleet_engine::{Executor, HealthBoard, MaintenanceCalendar, Queue, QueueError, Scheduler, SchedulerDeps, SchedulerError};
use fleet_eval::{Evaluations, PillarResolver, DEFAULT_RETENTION};
use fleet_storage::{EventDraft, EventStore};
use fleet_vault::{EncryptedSecretStore, RuntimeSecretStore};
use thiserror::Error;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::bridge::{spawn_event_bridge, spawn_recovery_sweeper};
use crate::config::{Config, ConfigError};

/// Daemon errors
#[derive(Debug, Error)]
pub enum DaemonError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to initialise logging: {0}")]
    Logging(String),

    #[error(transparent)]
    Queue(#[from] QueueError),

    #[error(transparent)]
    Scheduler(#[from] SchedulerError),

    #[error("daemon already started")]
    AlreadyStarted,
}

impl Kinded for DaemonError {
    fn kind(&self) -> ErrorKind {
        match self {
            DaemonError::Config(e) => e.kind(),
            DaemonError::Queue(e) => e.kind(),
            DaemonError::Scheduler(e) => e.kind(),
            DaemonError::AlreadyStarted => ErrorKind::Conflict,
            DaemonError::Io(_) | DaemonError::Logging(_) => ErrorKind::ValidationError,
        }
    }
}

/// Every in-memory store the daemon owns, wired together.
///
/// Stores are shared through `Arc` so embedders can hold handles past the
/// daemon's own lifetime. Nothing is persisted; a restart starts empty.
pub struct Daemon<C: Clock = SystemClock> {
    pub config: Config,
    pub queue: Queue<C>,
    pub scheduler: Scheduler<C>,
    pub events: Arc<EventStore<C>>,
    pub health: Arc<HealthBoard>,
    pub maintenance: Arc<MaintenanceCalendar>,
    pub secrets: Arc<EncryptedSecretStore<C>>,
    pub runtime_secrets: Arc<RuntimeSecretStore<C>>,
    pub evaluations: Arc<Evaluations<C>>,
    pub pillars: Arc<PillarResolver>,
    start_time: Instant,
    cancel: CancellationToken,
    tasks: Vec<JoinHandle<()>>,
}

impl Daemon<SystemClock> {
    pub fn new(config: Config) -> Self {
        Self::with_clock(config, SystemClock)
    }
}

impl<C: Clock> Daemon<C> {
    pub fn with_clock(config: Config, clock: C) -> Self {
        let queue = Queue::with_clock(config.queue_config(), clock.clone());
        let health = Arc::new(HealthBoard::new());
        let maintenance = Arc::new(MaintenanceCalendar::new());
        let deps = SchedulerDeps { maintenance: maintenance.clone(), health: health.clone() };
        let scheduler = Scheduler::new(queue.clone(), config.scheduler, deps);

        Self {
            events: Arc::new(EventStore::with_clock(config.events.capacity, clock.clone())),
            secrets: Arc::new(EncryptedSecretStore::with_clock(clock.clone())),
            runtime_secrets: Arc::new(RuntimeSecretStore::with_clock(clock.clone())),
            evaluations: Arc::new(Evaluations::with_clock(clock, DEFAULT_RETENTION)),
            pillars: Arc::new(PillarResolver::new()),
            config,
            queue,
            scheduler,
            health,
            maintenance,
            start_time: Instant::now(),
            cancel: CancellationToken::new(),
            tasks: Vec::new(),
        }
    }

    /// Start background tasks, the queue worker, then the configured schedules.
    ///
    /// The event bridge subscribes before the worker starts so no transition
    /// is missed.
    pub fn start(&mut self, executor: Arc<dyn Executor>) -> Result<(), DaemonError> {
        if !self.tasks.is_empty() {
            return Err(DaemonError::AlreadyStarted);
        }
        self.tasks.push(spawn_event_bridge(self.queue.clone(), Arc::clone(&self.events), self.cancel.clone()));
        self.queue.start(executor)?;
        self.tasks.push(spawn_recovery_sweeper(
            self.queue.clone(),
            self.config.recover_after(),
            self.config.recover_interval(),
            self.cancel.clone(),
        ));

        for entry in &self.config.schedules {
            let schedule = self.scheduler.create_with_options(entry.options())?;
            info!(schedule_id = %schedule.id, config_path = %schedule.config_path, "schedule seeded");
        }

        self.events.append(
            EventDraft::new("daemon.started", "fleetd started")
                .field("schedules", self.config.schedules.len())
                .field("buffer", self.config.queue.buffer),
        );
        info!(schedules = self.config.schedules.len(), "daemon started");
        Ok(())
    }

    /// Stop schedules, drain in-flight applies, then stop the worker and
    /// background tasks.
    ///
    /// Teardown always runs to completion. A drain timeout is returned after
    /// everything has stopped.
    pub async fn shutdown(mut self) -> Result<(), DaemonError> {
        info!("shutting down daemon...");
        self.scheduler.shutdown();

        let drained = self.queue.safe_drain(self.config.drain_timeout()).await;
        if let Err(e) = &drained {
            warn!(error = %e, "stopping with applies still in flight");
        }

        self.queue.stop();
        self.queue.wait().await;
        self.cancel.cancel();
        for task in self.tasks.drain(..) {
            if let Err(e) = task.await {
                warn!(error = %e, "background task failed");
            }
        }

        self.events.append(
            EventDraft::new("daemon.stopped", "fleetd stopped")
                .field("uptime_secs", self.start_time.elapsed().as_secs())
                .field("drained", drained.is_ok()),
        );
        info!("daemon shutdown complete");
        drained.map_err(DaemonError::from)
    }
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;
