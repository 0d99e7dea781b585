// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Queue worker loop.
//!
//! A single task drains the three class channels. Non-blocking polls start
//! at a rotating index; a hit moves the index past the class it came from.
//! When every class is empty the task blocks on all three at once.

use crate::executor::Executor;
use crate::queue::{ClassReceivers, Queue, QueueError};
use fleet_core::{Clock, JobId};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Poll interval while paused, and the idle wake-up while blocked.
pub const PAUSE_POLL: Duration = Duration::from_millis(100);

pub(crate) const PANIC_MESSAGE: &str = "executor panicked";

enum Next {
    Job(JobId),
    Idle,
    Stop,
}

impl<C: Clock> Queue<C> {
    /// Spawn the worker. Fails if a worker was already started on this queue.
    pub fn start(&self, executor: Arc<dyn Executor>) -> Result<(), QueueError> {
        let receivers = self.shared.receivers.lock().take().ok_or(QueueError::WorkerAlreadyStarted)?;
        let queue = self.clone();
        let handle = tokio::spawn(async move { queue.run_worker(receivers, executor).await });
        *self.shared.worker.lock() = Some(handle);
        Ok(())
    }

    /// Signal the worker to exit. An apply already in flight still settles.
    pub fn stop(&self) {
        self.shared.cancel.cancel();
    }

    /// Wait for the worker task to exit.
    pub async fn wait(&self) {
        let handle = self.shared.worker.lock().take();
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                tracing::error!(error = %e, "queue worker task failed");
            }
        }
    }

    async fn run_worker(self, mut receivers: ClassReceivers, executor: Arc<dyn Executor>) {
        let cancel = self.shared.cancel.clone();
        let lifecycle = self.shared.lifecycle;
        let budget = lifecycle.budget();
        let mut next_class = 0usize;
        tracing::info!(mode = %lifecycle.mode, ?budget, "queue worker started");

        loop {
            if cancel.is_cancelled() {
                break;
            }
            if self.is_paused() {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = tokio::time::sleep(PAUSE_POLL) => continue,
                }
            }

            let id = match next_pending(&mut receivers, &mut next_class, &cancel).await {
                Next::Job(id) => id,
                Next::Idle => continue,
                Next::Stop => break,
            };

            // Paused after the id was taken: the job stays pending and is
            // dispatched on the next iteration after resume.
            if self.is_paused() {
                self.wait_resumed(&cancel).await;
                if cancel.is_cancelled() {
                    break;
                }
            }

            if !self.execute(&id, &executor).await {
                continue;
            }

            let recycled = self.shared.stats.lock().record_job(budget);
            if recycled {
                let generation = self.shared.stats.lock().generation;
                tracing::info!(generation, delay_ms = lifecycle.restart_delay_ms, "worker generation recycled");
                if lifecycle.restart_delay_ms > 0 {
                    tokio::select! {
                        _ = cancel.cancelled() => break,
                        _ = tokio::time::sleep(Duration::from_millis(lifecycle.restart_delay_ms)) => {}
                    }
                }
            }
        }

        tracing::info!("queue worker stopped");
    }

    async fn wait_resumed(&self, cancel: &CancellationToken) {
        while self.is_paused() && !cancel.is_cancelled() {
            tokio::select! {
                _ = cancel.cancelled() => return,
                _ = tokio::time::sleep(PAUSE_POLL) => {}
            }
        }
    }

    /// Run one claimed job. Returns false if the id no longer names a
    /// pending job.
    async fn execute(&self, id: &JobId, executor: &Arc<dyn Executor>) -> bool {
        let Some(job) = self.claim(id) else {
            return false;
        };

        let exec = Arc::clone(executor);
        let path = job.config_path.clone();
        let outcome = match tokio::spawn(async move { exec.apply_path(&path).await }).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => Err(e.0),
            Err(join) => {
                tracing::error!(job_id = %job.id, error = %join, "executor task aborted");
                Err(PANIC_MESSAGE.to_string())
            }
        };

        self.settle(&job.id, outcome);
        true
    }
}

fn poll_classes(receivers: &mut ClassReceivers, next_class: &mut usize) -> Option<JobId> {
    for offset in 0..receivers.len() {
        let class = (*next_class + offset) % receivers.len();
        if let Ok(id) = receivers[class].try_recv() {
            *next_class = (class + 1) % receivers.len();
            return Some(id);
        }
    }
    None
}

async fn next_pending(
    receivers: &mut ClassReceivers,
    next_class: &mut usize,
    cancel: &CancellationToken,
) -> Next {
    if let Some(id) = poll_classes(receivers, next_class) {
        return Next::Job(id);
    }

    let [high, normal, low] = receivers;
    tokio::select! {
        _ = cancel.cancelled() => Next::Stop,
        Some(id) = high.recv() => {
            *next_class = 1;
            Next::Job(id)
        }
        Some(id) = normal.recv() => {
            *next_class = 2;
            Next::Job(id)
        }
        Some(id) = low.recv() => {
            *next_class = 0;
            Next::Job(id)
        }
        _ = tokio::time::sleep(PAUSE_POLL) => Next::Idle,
    }
}

#[cfg(test)]
#[path = "worker_tests.rs"]
mod tests;
