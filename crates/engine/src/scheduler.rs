// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Periodic dispatcher feeding the queue.
//!
//! Each enabled schedule owns a timer task that sleeps `interval` plus a
//! uniform jitter, then runs one tick: re-read the schedule, check the
//! dispatch policy, and enqueue on success.

use crate::health::{HostHealth, UnknownHealth};
use crate::maintenance::{MaintenanceWindows, NoMaintenance};
use crate::queue::{Queue, QueueError};
use fleet_core::clock::to_chrono;
use fleet_core::{Clock, ErrorKind, JobId, Kinded, Priority, Schedule, ScheduleId, SeqGen, SystemClock};
use indexmap::IndexMap;
use parking_lot::Mutex;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

pub const MIN_EXECUTION_COST: i64 = 1;
pub const MAX_EXECUTION_COST: i64 = 1000;

#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error("schedule interval must be at least one millisecond")]
    InvalidInterval,
    #[error("scheduler is shut down")]
    ShutDown,
    #[error("config path must not be empty")]
    EmptyConfigPath,
    #[error("schedule not found: {0}")]
    NotFound(String),
    #[error(transparent)]
    Queue(#[from] QueueError),
}

impl Kinded for SchedulerError {
    fn kind(&self) -> ErrorKind {
        match self {
            SchedulerError::InvalidInterval | SchedulerError::EmptyConfigPath => ErrorKind::ValidationError,
            SchedulerError::NotFound(_) => ErrorKind::NotFound,
            SchedulerError::ShutDown => ErrorKind::Conflict,
            SchedulerError::Queue(e) => e.kind(),
        }
    }
}

/// Why a tick did not dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    Maintenance,
    HostUnhealthy,
    CostExceeded,
    BacklogFull,
    LowPriorityShed,
    Disabled,
    EnqueueRejected,
}

fleet_core::simple_display! {
    SkipReason {
        Maintenance => "maintenance",
        HostUnhealthy => "host_unhealthy",
        CostExceeded => "cost_exceeded",
        BacklogFull => "backlog_full",
        LowPriorityShed => "low_priority_shed",
        Disabled => "disabled",
        EnqueueRejected => "enqueue_rejected",
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatchPolicy {
    pub max_backlog: usize,
    pub max_execution_cost: u32,
}

impl Default for DispatchPolicy {
    fn default() -> Self {
        Self { max_backlog: 100, max_execution_cost: MAX_EXECUTION_COST as u32 }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DispatchDecision {
    pub allowed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<SkipReason>,
}

impl DispatchDecision {
    fn allow() -> Self {
        Self { allowed: true, reason: None }
    }

    fn deny(reason: SkipReason) -> Self {
        Self { allowed: false, reason: Some(reason) }
    }
}

/// Result of one schedule tick.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TickOutcome {
    pub schedule_id: ScheduleId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub job_id: Option<JobId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub skipped: Option<SkipReason>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScheduleOptions {
    pub config_path: String,
    pub priority: Priority,
    /// Clamped to `[1, 1000]`.
    pub execution_cost: i64,
    pub host: Option<String>,
    pub cluster: Option<String>,
    pub environment: Option<String>,
    pub interval: Duration,
    pub jitter: Duration,
    pub enabled: bool,
}

impl ScheduleOptions {
    pub fn new(config_path: impl Into<String>, interval: Duration) -> Self {
        Self {
            config_path: config_path.into(),
            priority: Priority::Normal,
            execution_cost: MIN_EXECUTION_COST,
            host: None,
            cluster: None,
            environment: None,
            interval,
            jitter: Duration::ZERO,
            enabled: true,
        }
    }

    fleet_core::setters! {
        into { priority: Priority }
        set { execution_cost: i64, jitter: Duration, enabled: bool }
        option { host: String, cluster: String, environment: String }
    }
}

/// Seams consulted by `allow_dispatch`.
#[derive(Clone)]
pub struct SchedulerDeps {
    pub maintenance: Arc<dyn MaintenanceWindows>,
    pub health: Arc<dyn HostHealth>,
}

impl Default for SchedulerDeps {
    fn default() -> Self {
        Self { maintenance: Arc::new(NoMaintenance), health: Arc::new(UnknownHealth) }
    }
}

#[derive(Default)]
struct SchedulerState {
    schedules: IndexMap<ScheduleId, Schedule>,
    loops: HashMap<ScheduleId, CancellationToken>,
}

struct Inner<C: Clock> {
    queue: Queue<C>,
    policy: DispatchPolicy,
    deps: SchedulerDeps,
    seq: SeqGen,
    root: CancellationToken,
    state: Mutex<SchedulerState>,
}

/// Scheduler handle. Clones share the same schedules.
pub struct Scheduler<C: Clock = SystemClock> {
    inner: Arc<Inner<C>>,
}

impl<C: Clock> Clone for Scheduler<C> {
    fn clone(&self) -> Self {
        Self { inner: Arc::clone(&self.inner) }
    }
}

fn clean(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

impl<C: Clock> Scheduler<C> {
    pub fn new(queue: Queue<C>, policy: DispatchPolicy, deps: SchedulerDeps) -> Self {
        Self {
            inner: Arc::new(Inner {
                queue,
                policy,
                deps,
                seq: SeqGen::new(),
                root: CancellationToken::new(),
                state: Mutex::new(SchedulerState::default()),
            }),
        }
    }

    pub fn queue(&self) -> &Queue<C> {
        &self.inner.queue
    }

    /// Register a schedule and start its timer if enabled.
    pub fn create_with_options(&self, opts: ScheduleOptions) -> Result<Schedule, SchedulerError> {
        // Stored intervals are whole milliseconds; anything shorter would spin.
        if opts.interval.as_millis() == 0 {
            return Err(SchedulerError::InvalidInterval);
        }
        if opts.enabled && self.inner.root.is_cancelled() {
            return Err(SchedulerError::ShutDown);
        }
        let config_path = opts.config_path.trim();
        if config_path.is_empty() {
            return Err(SchedulerError::EmptyConfigPath);
        }

        let now = self.inner.queue.clock().utc();
        let schedule = Schedule {
            id: ScheduleId::from_seq(self.inner.seq.next()),
            config_path: config_path.to_string(),
            priority: opts.priority,
            execution_cost: opts.execution_cost.clamp(MIN_EXECUTION_COST, MAX_EXECUTION_COST) as u32,
            host: clean(opts.host),
            cluster: clean(opts.cluster),
            environment: clean(opts.environment),
            interval_ms: duration_ms(opts.interval),
            jitter_ms: duration_ms(opts.jitter),
            enabled: opts.enabled,
            created_at: now,
            last_run_at: None,
            next_run_at: now + to_chrono(opts.interval),
            dispatched_runs: 0,
            skipped_runs: 0,
            last_skip_reason: None,
        };

        {
            let mut state = self.inner.state.lock();
            state.schedules.insert(schedule.id.clone(), schedule.clone());
            if schedule.enabled {
                self.spawn_loop(&mut state, &schedule.id);
            }
        }
        tracing::info!(
            schedule_id = %schedule.id,
            config_path = %schedule.config_path,
            interval_ms = schedule.interval_ms,
            jitter_ms = schedule.jitter_ms,
            "schedule created"
        );
        Ok(schedule)
    }

    pub fn get(&self, id: &str) -> Option<Schedule> {
        self.inner.state.lock().schedules.get(id).cloned()
    }

    /// Schedules in creation order.
    pub fn list(&self) -> Vec<Schedule> {
        self.inner.state.lock().schedules.values().cloned().collect()
    }

    pub fn disable(&self, id: &str) -> Result<Schedule, SchedulerError> {
        let mut state = self.inner.state.lock();
        let schedule = state.schedules.get_mut(id).ok_or_else(|| SchedulerError::NotFound(id.to_string()))?;
        schedule.enabled = false;
        let schedule = schedule.clone();
        if let Some(token) = state.loops.remove(id) {
            token.cancel();
        }
        tracing::info!(schedule_id = %schedule.id, "schedule disabled");
        Ok(schedule)
    }

    /// Enable a schedule and restart its timer. Fails once the scheduler has
    /// been shut down, since no timer could run.
    pub fn enable(&self, id: &str) -> Result<Schedule, SchedulerError> {
        let now = self.inner.queue.clock().utc();
        let mut state = self.inner.state.lock();
        let schedule = state.schedules.get_mut(id).ok_or_else(|| SchedulerError::NotFound(id.to_string()))?;
        if self.inner.root.is_cancelled() {
            tracing::warn!(schedule_id = %schedule.id, "enable after scheduler shutdown");
            return Err(SchedulerError::ShutDown);
        }
        schedule.enabled = true;
        schedule.next_run_at = now + to_chrono(schedule.interval());
        let schedule = schedule.clone();
        self.spawn_loop(&mut state, &schedule.id);
        tracing::info!(schedule_id = %schedule.id, "schedule enabled");
        Ok(schedule)
    }

    /// Cancel every schedule loop. Schedules stay registered.
    pub fn shutdown(&self) {
        self.inner.root.cancel();
        let mut state = self.inner.state.lock();
        for (_, token) in state.loops.drain() {
            token.cancel();
        }
        tracing::info!("scheduler shut down");
    }

    /// Dry-run the dispatch policy for a schedule.
    pub fn evaluate(&self, id: &str) -> Result<DispatchDecision, SchedulerError> {
        let schedule = self.get(id).ok_or_else(|| SchedulerError::NotFound(id.to_string()))?;
        Ok(self.allow_dispatch(&schedule))
    }

    /// Run one tick immediately, as the timer would on wake.
    pub fn trigger(&self, id: &str) -> Result<TickOutcome, SchedulerError> {
        self.tick(id)
    }

    /// First matching rule denies.
    pub fn allow_dispatch(&self, schedule: &Schedule) -> DispatchDecision {
        let now = self.inner.queue.clock().utc();
        let deps = &self.inner.deps;
        let policy = &self.inner.policy;

        if deps.maintenance.in_maintenance(
            schedule.host.as_deref(),
            schedule.cluster.as_deref(),
            schedule.environment.as_deref(),
            now,
        ) {
            return DispatchDecision::deny(SkipReason::Maintenance);
        }
        if let Some(host) = &schedule.host {
            if deps.health.is_healthy(host) == Some(false) {
                return DispatchDecision::deny(SkipReason::HostUnhealthy);
            }
        }
        if schedule.execution_cost > policy.max_execution_cost {
            return DispatchDecision::deny(SkipReason::CostExceeded);
        }
        let pending = self.inner.queue.pending();
        if pending >= policy.max_backlog {
            return DispatchDecision::deny(SkipReason::BacklogFull);
        }
        if schedule.priority == Priority::Low && pending >= policy.max_backlog / 2 {
            return DispatchDecision::deny(SkipReason::LowPriorityShed);
        }
        DispatchDecision::allow()
    }

    fn tick(&self, id: &str) -> Result<TickOutcome, SchedulerError> {
        let schedule = self.get(id).ok_or_else(|| SchedulerError::NotFound(id.to_string()))?;
        let mut outcome = TickOutcome { schedule_id: schedule.id.clone(), job_id: None, skipped: None };
        if !schedule.enabled {
            outcome.skipped = Some(SkipReason::Disabled);
            return Ok(outcome);
        }

        let decision = self.allow_dispatch(&schedule);
        match decision.reason {
            Some(reason) => {
                tracing::info!(schedule_id = %schedule.id, %reason, "scheduled dispatch skipped");
                outcome.skipped = Some(reason);
            }
            None => match self.inner.queue.enqueue(&schedule.config_path, None, false, schedule.priority) {
                Ok(job) => {
                    tracing::info!(schedule_id = %schedule.id, job_id = %job.id, "scheduled dispatch");
                    outcome.job_id = Some(job.id);
                }
                Err(e) => {
                    tracing::warn!(schedule_id = %schedule.id, error = %e, "scheduled enqueue rejected");
                    outcome.skipped = Some(SkipReason::EnqueueRejected);
                }
            },
        }

        let now = self.inner.queue.clock().utc();
        let mut state = self.inner.state.lock();
        if let Some(stored) = state.schedules.get_mut(id) {
            stored.last_run_at = Some(now);
            stored.next_run_at = now + to_chrono(stored.interval());
            match outcome.skipped {
                Some(reason) => {
                    stored.skipped_runs += 1;
                    stored.last_skip_reason = Some(reason.to_string());
                }
                None => stored.dispatched_runs += 1,
            }
        }
        Ok(outcome)
    }

    fn spawn_loop(&self, state: &mut SchedulerState, id: &ScheduleId) {
        if self.inner.root.is_cancelled() {
            return;
        }
        let token = self.inner.root.child_token();
        if let Some(previous) = state.loops.insert(id.clone(), token.clone()) {
            previous.cancel();
        }
        let scheduler = self.clone();
        let id = id.clone();
        tokio::spawn(async move { scheduler.run_loop(id, token).await });
    }

    async fn run_loop(self, id: ScheduleId, token: CancellationToken) {
        loop {
            let timing = self.inner.state.lock().schedules.get(&id).filter(|s| s.enabled).map(|s| (s.interval(), s.jitter()));
            let Some((interval, jitter)) = timing else {
                return;
            };
            tokio::select! {
                _ = token.cancelled() => return,
                _ = tokio::time::sleep(interval + jitter_delay(jitter)) => {}
            }
            if let Err(e) = self.tick(&id) {
                tracing::warn!(schedule_id = %id, error = %e, "schedule tick failed");
                return;
            }
        }
    }
}

fn duration_ms(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}

/// Uniform delay in `[0, jitter]`.
fn jitter_delay(jitter: Duration) -> Duration {
    let max = duration_ms(jitter);
    if max == 0 {
        return Duration::ZERO;
    }
    Duration::from_millis(rand::thread_rng().gen_range(0..=max))
}

#[cfg(test)]
#[path = "scheduler_tests.rs"]
mod tests;
