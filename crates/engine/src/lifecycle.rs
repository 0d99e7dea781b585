// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Worker lifecycle policy and generation bookkeeping.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkerMode {
    #[default]
    Persistent,
    Stateless,
}

fleet_core::simple_display! {
    WorkerMode {
        Persistent => "persistent",
        Stateless => "stateless",
    }
}

/// How long a worker generation lives before it is recycled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkerLifecyclePolicy {
    pub mode: WorkerMode,
    /// Jobs per generation; 0 means unlimited (stateless treats 0 as 1).
    pub max_jobs_per_worker: u32,
    pub restart_delay_ms: u64,
}

impl WorkerLifecyclePolicy {
    pub fn persistent() -> Self {
        Self::default()
    }

    /// One job per generation, simulating a fresh process per apply.
    pub fn stateless() -> Self {
        Self { mode: WorkerMode::Stateless, max_jobs_per_worker: 1, restart_delay_ms: 0 }
    }

    /// Jobs a generation may handle before recycling, if bounded.
    pub fn budget(&self) -> Option<u32> {
        match (self.mode, self.max_jobs_per_worker) {
            (WorkerMode::Stateless, 0) => Some(1),
            (WorkerMode::Persistent, 0) => None,
            (_, n) => Some(n),
        }
    }
}

/// Worker generation counters reported by the queue's control status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkerStats {
    pub mode: WorkerMode,
    pub generation: u64,
    pub recycles: u64,
    pub jobs_in_generation: u32,
    pub jobs_total: u64,
}

impl WorkerStats {
    pub(crate) fn new(mode: WorkerMode) -> Self {
        Self { mode, generation: 1, recycles: 0, jobs_in_generation: 0, jobs_total: 0 }
    }

    /// Count a handled job. Returns true when the generation's budget is spent
    /// and the worker has moved to a new generation.
    pub(crate) fn record_job(&mut self, budget: Option<u32>) -> bool {
        self.jobs_in_generation += 1;
        self.jobs_total += 1;
        match budget {
            Some(limit) if self.jobs_in_generation >= limit => {
                self.generation += 1;
                self.recycles += 1;
                self.jobs_in_generation = 0;
                true
            }
            _ => false,
        }
    }
}
