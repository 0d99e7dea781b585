// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Priority-classed apply queue.
//!
//! Jobs live in a single map guarded by one lock; the three class channels
//! carry only job ids to the worker. Every transition is published to
//! subscribers after the lock is released.

use crate::lifecycle::{WorkerLifecyclePolicy, WorkerStats};
use chrono::{DateTime, Utc};
use fleet_core::clock::to_chrono;
use fleet_core::{Clock, ErrorKind, Job, JobId, JobStatus, Kinded, Priority, SeqGen, SystemClock};
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Per-class channel capacity when none is configured.
pub const DEFAULT_BUFFER: usize = 64;

/// Terminal jobs retained for lookups and idempotency.
pub const DEFAULT_HISTORY: usize = 10_000;

/// Running jobs older than this are failed by recovery.
pub const DEFAULT_STUCK_AGE: Duration = Duration::from_secs(5 * 60);

const DRAIN_POLL: Duration = Duration::from_millis(25);

#[derive(Debug, Error)]
pub enum QueueError {
    #[error("config path must not be empty")]
    EmptyConfigPath,
    #[error("emergency stop active: {reason}")]
    EmergencyActive { reason: String },
    #[error("change freeze active until {until}: {reason}")]
    FrozenUntil { until: DateTime<Utc>, reason: String },
    #[error("{class} priority queue is full")]
    BackpressureFull { class: Priority },
    #[error("queue is stopped")]
    Stopped,
    #[error("job not found: {0}")]
    NotFound(String),
    #[error("job {id} already finished ({status})")]
    AlreadyFinished { id: JobId, status: JobStatus },
    #[error("drain timed out with {running} job(s) still running")]
    DrainTimeout { running: usize },
    #[error("queue worker already started")]
    WorkerAlreadyStarted,
    #[error("idempotency key {key} belongs to job {id}, which has left history")]
    KeyEvicted { key: String, id: JobId },
}

impl Kinded for QueueError {
    fn kind(&self) -> ErrorKind {
        match self {
            QueueError::EmptyConfigPath => ErrorKind::ValidationError,
            QueueError::EmergencyActive { .. } => ErrorKind::EmergencyActive,
            QueueError::FrozenUntil { .. } => ErrorKind::Frozen,
            QueueError::BackpressureFull { .. } => ErrorKind::BackpressureFull,
            QueueError::NotFound(_) => ErrorKind::NotFound,
            QueueError::AlreadyFinished { .. }
            | QueueError::Stopped
            | QueueError::WorkerAlreadyStarted
            | QueueError::KeyEvicted { .. } => ErrorKind::Conflict,
            QueueError::DrainTimeout { .. } => ErrorKind::DrainTimeout,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueConfig {
    /// Capacity of each priority class channel.
    pub buffer: usize,
    pub history: usize,
    pub lifecycle: WorkerLifecyclePolicy,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self { buffer: DEFAULT_BUFFER, history: DEFAULT_HISTORY, lifecycle: WorkerLifecyclePolicy::default() }
    }
}

impl QueueConfig {
    pub fn with_buffer(buffer: usize) -> Self {
        Self { buffer, ..Self::default() }
    }

    fleet_core::setters! {
        set { history: usize, lifecycle: WorkerLifecyclePolicy }
    }
}

/// Snapshot of the queue's operator controls.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ControlStatus {
    pub paused: bool,
    pub emergency_stop: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub emergency_reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub frozen_until: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub freeze_reason: Option<String>,
    pub pending: usize,
    pub running: usize,
    pub worker: WorkerStats,
}

#[derive(Debug, Clone)]
struct Freeze {
    until: DateTime<Utc>,
    reason: String,
}

#[derive(Default)]
struct QueueState {
    jobs: HashMap<JobId, Job>,
    order: VecDeque<JobId>,
    by_key: HashMap<String, JobId>,
    in_flight: HashSet<JobId>,
    paused: bool,
    emergency: Option<String>,
    freeze: Option<Freeze>,
}

impl QueueState {
    fn active_freeze(&self, now: DateTime<Utc>) -> Option<&Freeze> {
        self.freeze.as_ref().filter(|f| now < f.until)
    }

    fn pending(&self) -> usize {
        self.jobs.values().filter(|j| j.status == JobStatus::Pending).count()
    }

    /// Drop the oldest terminal jobs once history exceeds `limit`.
    ///
    /// Idempotency keys outlive their jobs so a late retry is refused rather
    /// than applied a second time.
    fn trim_history(&mut self, limit: usize) {
        let mut excess = self.jobs.len().saturating_sub(limit.max(1));
        if excess == 0 {
            return;
        }
        let mut kept = VecDeque::with_capacity(self.order.len());
        while let Some(id) = self.order.pop_front() {
            let terminal = self.jobs.get(&id).is_some_and(Job::is_terminal);
            if excess > 0 && terminal {
                self.jobs.remove(&id);
                excess -= 1;
            } else {
                kept.push_back(id);
            }
        }
        self.order = kept;
    }
}

pub(crate) type ClassReceivers = [mpsc::Receiver<JobId>; 3];

pub(crate) struct Shared<C: Clock> {
    pub(crate) clock: C,
    pub(crate) lifecycle: WorkerLifecyclePolicy,
    pub(crate) cancel: CancellationToken,
    pub(crate) stats: Mutex<WorkerStats>,
    pub(crate) worker: Mutex<Option<JoinHandle<()>>>,
    pub(crate) receivers: Mutex<Option<ClassReceivers>>,
    history: usize,
    seq: SeqGen,
    senders: [mpsc::Sender<JobId>; 3],
    state: RwLock<QueueState>,
    sub_seq: SeqGen,
    subscribers: Mutex<BTreeMap<u64, mpsc::Sender<Job>>>,
}

/// Apply queue handle. Clones share the same queue.
pub struct Queue<C: Clock = SystemClock> {
    pub(crate) shared: Arc<Shared<C>>,
}

impl<C: Clock> Clone for Queue<C> {
    fn clone(&self) -> Self {
        Self { shared: Arc::clone(&self.shared) }
    }
}

impl Queue<SystemClock> {
    pub fn new(config: QueueConfig) -> Self {
        Self::with_clock(config, SystemClock)
    }
}

impl<C: Clock> Queue<C> {
    pub fn with_clock(config: QueueConfig, clock: C) -> Self {
        let buffer = config.buffer.max(1);
        let (high_tx, high_rx) = mpsc::channel(buffer);
        let (normal_tx, normal_rx) = mpsc::channel(buffer);
        let (low_tx, low_rx) = mpsc::channel(buffer);
        Self {
            shared: Arc::new(Shared {
                clock,
                lifecycle: config.lifecycle,
                cancel: CancellationToken::new(),
                stats: Mutex::new(WorkerStats::new(config.lifecycle.mode)),
                worker: Mutex::new(None),
                receivers: Mutex::new(Some([high_rx, normal_rx, low_rx])),
                history: config.history,
                seq: SeqGen::new(),
                senders: [high_tx, normal_tx, low_tx],
                state: RwLock::new(QueueState::default()),
                sub_seq: SeqGen::new(),
                subscribers: Mutex::new(BTreeMap::new()),
            }),
        }
    }

    pub fn clock(&self) -> &C {
        &self.shared.clock
    }

    /// Submit an apply.
    ///
    /// A job already recorded under `idempotency_key` is returned unchanged,
    /// even while an emergency stop or freeze is active.
    pub fn enqueue(
        &self,
        config_path: &str,
        idempotency_key: Option<&str>,
        force: bool,
        priority: Priority,
    ) -> Result<Job, QueueError> {
        let key = idempotency_key.map(str::trim).filter(|k| !k.is_empty());
        let now = self.shared.clock.utc();

        let job = {
            let mut state = self.shared.state.write();
            if let Some((k, id)) = key.and_then(|k| state.by_key.get(k).map(|id| (k, id))) {
                let Some(existing) = state.jobs.get(id) else {
                    return Err(QueueError::KeyEvicted { key: k.to_string(), id: id.clone() });
                };
                tracing::debug!(job_id = %existing.id, "idempotent enqueue hit");
                return Ok(existing.clone());
            }
            if !force {
                if let Some(reason) = &state.emergency {
                    return Err(QueueError::EmergencyActive { reason: reason.clone() });
                }
                if let Some(freeze) = state.active_freeze(now) {
                    return Err(QueueError::FrozenUntil { until: freeze.until, reason: freeze.reason.clone() });
                }
            }
            let config_path = config_path.trim();
            if config_path.is_empty() {
                return Err(QueueError::EmptyConfigPath);
            }

            let permit = match self.shared.senders[priority.index()].try_reserve() {
                Ok(permit) => permit,
                Err(mpsc::error::TrySendError::Full(())) => {
                    return Err(QueueError::BackpressureFull { class: priority })
                }
                Err(mpsc::error::TrySendError::Closed(())) => return Err(QueueError::Stopped),
            };

            let id = JobId::stamped(now, self.shared.seq.next());
            let job = Job::new(id.clone(), config_path, key.map(String::from), priority, now);
            state.jobs.insert(id.clone(), job.clone());
            state.order.push_back(id.clone());
            if let Some(key) = key {
                state.by_key.insert(key.to_string(), id.clone());
            }
            permit.send(id);
            state.trim_history(self.shared.history);
            job
        };

        tracing::info!(job_id = %job.id, class = %priority, config_path = %job.config_path, force, "job enqueued");
        self.publish(&job);
        Ok(job)
    }

    pub fn cancel(&self, id: &str) -> Result<Job, QueueError> {
        let now = self.shared.clock.utc();
        let job = {
            let mut state = self.shared.state.write();
            let job = state.jobs.get_mut(id).ok_or_else(|| QueueError::NotFound(id.to_string()))?;
            if job.is_terminal() {
                return Err(QueueError::AlreadyFinished { id: job.id.clone(), status: job.status });
            }
            job.cancel(now);
            job.clone()
        };
        tracing::info!(job_id = %job.id, "job canceled");
        self.publish(&job);
        Ok(job)
    }

    pub fn get(&self, id: &str) -> Option<Job> {
        self.shared.state.read().jobs.get(id).cloned()
    }

    /// Retained jobs in creation order.
    pub fn list(&self) -> Vec<Job> {
        let state = self.shared.state.read();
        state.order.iter().filter_map(|id| state.jobs.get(id).cloned()).collect()
    }

    pub fn pending(&self) -> usize {
        self.shared.state.read().pending()
    }

    pub fn running(&self) -> usize {
        self.shared.state.read().in_flight.len()
    }

    pub fn pause(&self) {
        self.shared.state.write().paused = true;
        tracing::info!("queue paused");
    }

    pub fn resume(&self) {
        self.shared.state.write().paused = false;
        tracing::info!("queue resumed");
    }

    pub fn is_paused(&self) -> bool {
        self.shared.state.read().paused
    }

    pub fn set_emergency_stop(&self, reason: impl Into<String>) {
        let reason = reason.into();
        tracing::warn!(%reason, "emergency stop engaged");
        self.shared.state.write().emergency = Some(reason);
    }

    pub fn clear_emergency_stop(&self) {
        self.shared.state.write().emergency = None;
        tracing::info!("emergency stop cleared");
    }

    /// Reject unforced enqueues until `until`.
    pub fn freeze_until(&self, until: DateTime<Utc>, reason: impl Into<String>) {
        let reason = reason.into();
        tracing::warn!(%until, %reason, "change freeze set");
        self.shared.state.write().freeze = Some(Freeze { until, reason });
    }

    pub fn clear_freeze(&self) {
        self.shared.state.write().freeze = None;
        tracing::info!("change freeze cleared");
    }

    pub fn control_status(&self) -> ControlStatus {
        let now = self.shared.clock.utc();
        let worker = *self.shared.stats.lock();
        let state = self.shared.state.read();
        let freeze = state.active_freeze(now);
        ControlStatus {
            paused: state.paused,
            emergency_stop: state.emergency.is_some(),
            emergency_reason: state.emergency.clone(),
            frozen_until: freeze.map(|f| f.until),
            freeze_reason: freeze.map(|f| f.reason.clone()),
            pending: state.pending(),
            running: state.in_flight.len(),
            worker,
        }
    }

    /// Pause and wait for in-flight applies to finish.
    ///
    /// A zero timeout waits forever. The queue stays paused either way.
    pub async fn safe_drain(&self, timeout: Duration) -> Result<(), QueueError> {
        self.pause();
        let deadline = (!timeout.is_zero()).then(|| tokio::time::Instant::now() + timeout);
        loop {
            let running = self.running();
            if running == 0 {
                tracing::info!("queue drained");
                return Ok(());
            }
            if deadline.is_some_and(|d| tokio::time::Instant::now() >= d) {
                tracing::warn!(running, "drain timed out");
                return Err(QueueError::DrainTimeout { running });
            }
            tokio::time::sleep(DRAIN_POLL).await;
        }
    }

    /// Fail every running job that has been running for at least `max_age`.
    pub fn recover_stuck_jobs(&self, max_age: Duration) -> Vec<Job> {
        let now = self.shared.clock.utc();
        let limit = to_chrono(max_age);
        let message = format!("recovered: job exceeded max running age of {}s", max_age.as_secs());

        let mut recovered = {
            let mut guard = self.shared.state.write();
            let state = &mut *guard;
            let mut out = Vec::new();
            for job in state.jobs.values_mut() {
                if job.running_for(now).is_some_and(|age| age >= limit) {
                    job.fail(now, message.clone());
                    state.in_flight.remove(&job.id);
                    out.push(job.clone());
                }
            }
            out
        };
        recovered.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));

        for job in &recovered {
            tracing::warn!(job_id = %job.id, max_age_secs = max_age.as_secs(), "recovered stuck job");
            self.publish(job);
        }
        recovered
    }

    /// Receive a snapshot of every job transition.
    ///
    /// Snapshots are dropped for this subscriber while its buffer is full.
    pub fn subscribe(&self, buffer: usize) -> (u64, mpsc::Receiver<Job>) {
        let (tx, rx) = mpsc::channel(buffer.max(1));
        let id = self.shared.sub_seq.next();
        self.shared.subscribers.lock().insert(id, tx);
        (id, rx)
    }

    pub fn unsubscribe(&self, id: u64) -> bool {
        self.shared.subscribers.lock().remove(&id).is_some()
    }

    pub(crate) fn publish(&self, job: &Job) {
        let mut subscribers = self.shared.subscribers.lock();
        subscribers.retain(|id, tx| match tx.try_send(job.clone()) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(_)) => {
                tracing::debug!(subscriber = id, job_id = %job.id, "subscriber full, dropping snapshot");
                true
            }
            Err(mpsc::error::TrySendError::Closed(_)) => false,
        });
    }

    /// Move a pending job to running. Returns `None` for jobs that were
    /// canceled while queued or evicted.
    pub(crate) fn claim(&self, id: &JobId) -> Option<Job> {
        let now = self.shared.clock.utc();
        let job = {
            let mut state = self.shared.state.write();
            let job = state.jobs.get_mut(id)?;
            if job.status != JobStatus::Pending {
                tracing::debug!(job_id = %id, status = %job.status, "skipping non-pending job");
                return None;
            }
            job.start(now);
            let job = job.clone();
            state.in_flight.insert(id.clone());
            job
        };
        tracing::info!(job_id = %job.id, class = %job.priority, "job running");
        self.publish(&job);
        Some(job)
    }

    /// Record the executor's outcome. Dropped if the job left `running`
    /// (canceled or recovered) while the apply was in flight.
    pub(crate) fn settle(&self, id: &JobId, outcome: Result<(), String>) -> Option<Job> {
        let now = self.shared.clock.utc();
        let job = {
            let mut state = self.shared.state.write();
            let tracked = state.in_flight.remove(id);
            let job = state.jobs.get_mut(id).filter(|j| tracked && j.status == JobStatus::Running);
            let Some(job) = job else {
                tracing::info!(job_id = %id, "apply result dropped, job no longer running");
                return None;
            };
            match outcome {
                Ok(()) => job.succeed(now),
                Err(error) => job.fail(now, error),
            }
            job.clone()
        };
        match &job.error {
            None => tracing::info!(job_id = %job.id, "job succeeded"),
            Some(error) => tracing::warn!(job_id = %job.id, %error, "job failed"),
        }
        self.publish(&job);
        Some(job)
    }
}

#[cfg(test)]
#[path = "queue_tests.rs"]
mod tests;
