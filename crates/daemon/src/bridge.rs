// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Background tasks: queue→event-log bridge and stuck-job recovery.

use std::sync::Arc;
use std::time::Duration;

use fleet_core::{Clock, Job};
use fleet_engine::Queue;
use fleet_storage::{EventDraft, EventStore};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Per-subscriber buffer for job snapshots.
pub const BRIDGE_BUFFER: usize = 256;

/// Event recorded for one job transition: type `job.<status>`.
pub fn job_event(job: &Job) -> EventDraft {
    let mut draft = EventDraft::new(format!("job.{}", job.status), format!("{} {}", job.config_path, job.status))
        .field("job_id", job.id.to_string())
        .field("config_path", job.config_path.clone())
        .field("priority", job.priority.as_str())
        .field("status", job.status.to_string());
    if let Some(key) = &job.idempotency_key {
        draft = draft.field("idempotency_key", key.clone());
    }
    if let Some(error) = &job.error {
        draft = draft.field("error", error.clone());
    }
    draft
}

/// Append every job transition to the event log until `cancel` fires or the
/// queue drops the subscription.
pub fn spawn_event_bridge<C: Clock>(
    queue: Queue<C>,
    events: Arc<EventStore<C>>,
    cancel: CancellationToken,
) -> JoinHandle<()> {
    let (sub_id, mut rx) = queue.subscribe(BRIDGE_BUFFER);
    tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                job = rx.recv() => match job {
                    Some(job) => {
                        events.append(job_event(&job));
                    }
                    None => break,
                },
            }
        }
        // Flush what is already buffered so shutdown transitions are logged.
        while let Ok(job) = rx.try_recv() {
            events.append(job_event(&job));
        }
        queue.unsubscribe(sub_id);
        tracing::debug!("event bridge stopped");
    })
}

/// Periodically fail jobs stuck in `running` for at least `max_age`.
pub fn spawn_recovery_sweeper<C: Clock>(
    queue: Queue<C>,
    max_age: Duration,
    every: Duration,
    cancel: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        // The first tick completes immediately.
        ticker.tick().await;
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {
                    let recovered = queue.recover_stuck_jobs(max_age);
                    if !recovered.is_empty() {
                        tracing::warn!(count = recovered.len(), "recovery sweep failed stuck jobs");
                    }
                }
            }
        }
    })
}

#[cfg(test)]
#[path = "bridge_tests.rs"]
mod tests;
