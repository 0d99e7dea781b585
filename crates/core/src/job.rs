// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Apply job identifier and state machine.

use crate::priority::Priority;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

crate::define_id! {
    /// Unique identifier for a queued apply.
    ///
    /// Format: `job-<yyyymmddThhmmss>-<seq>`, stamped in UTC at enqueue time.
    pub struct JobId("job-");
}

impl JobId {
    pub fn stamped(at: DateTime<Utc>, seq: u64) -> Self {
        Self(format!("{}{}-{}", Self::PREFIX, at.format("%Y%m%dT%H%M%S"), seq))
    }
}

/// Lifecycle status of a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Pending,
    Running,
    Succeeded,
    Failed,
    Canceled,
}

impl JobStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, JobStatus::Succeeded | JobStatus::Failed | JobStatus::Canceled)
    }
}

crate::simple_display! {
    JobStatus {
        Pending => "pending",
        Running => "running",
        Succeeded => "succeeded",
        Failed => "failed",
        Canceled => "canceled",
    }
}

/// A configuration apply owned by the queue.
///
/// Unset timestamps serialize as `""`; the fields are always present.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Job {
    pub id: JobId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub idempotency_key: Option<String>,
    pub config_path: String,
    pub priority: Priority,
    pub status: JobStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    #[serde(default, with = "crate::time_fmt::empty_as_none")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default, with = "crate::time_fmt::empty_as_none")]
    pub ended_at: Option<DateTime<Utc>>,
}

impl Job {
    pub fn new(
        id: JobId,
        config_path: impl Into<String>,
        idempotency_key: Option<String>,
        priority: Priority,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            idempotency_key,
            config_path: config_path.into(),
            priority,
            status: JobStatus::Pending,
            error: None,
            created_at,
            started_at: None,
            ended_at: None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    pub fn start(&mut self, at: DateTime<Utc>) {
        self.status = JobStatus::Running;
        self.started_at = Some(at);
    }

    pub fn succeed(&mut self, at: DateTime<Utc>) {
        self.status = JobStatus::Succeeded;
        self.ended_at = Some(at);
    }

    pub fn fail(&mut self, at: DateTime<Utc>, error: impl Into<String>) {
        self.status = JobStatus::Failed;
        self.error = Some(error.into());
        self.ended_at = Some(at);
    }

    pub fn cancel(&mut self, at: DateTime<Utc>) {
        self.status = JobStatus::Canceled;
        self.ended_at = Some(at);
    }

    /// How long a running job has been running as of `now`.
    pub fn running_for(&self, now: DateTime<Utc>) -> Option<chrono::Duration> {
        match (self.status, self.started_at) {
            (JobStatus::Running, Some(started)) => Some(now - started),
            _ => None,
        }
    }
}

#[cfg(test)]
#[path = "job_tests.rs"]
mod tests;
