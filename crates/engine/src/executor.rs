// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Apply executor seam.

use async_trait::async_trait;
use thiserror::Error;

/// Failure reported by an executor. The message is recorded verbatim on the job.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{0}")]
pub struct ApplyError(pub String);

impl ApplyError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

/// Runs a declared configuration against its targets.
///
/// Cancellation never aborts a running apply: the queue lets it finish and
/// drops the result if the job was canceled meanwhile.
#[async_trait]
pub trait Executor: Send + Sync + 'static {
    async fn apply_path(&self, config_path: &str) -> Result<(), ApplyError>;
}
