// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use crate::variables::MergeError;
use fleet_core::{ErrorKind, Kinded};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EvalError {
    #[error("invalid {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
    #[error("pillar {0} is already registered")]
    DuplicatePillar(String),
    #[error("pillar not found: {0}")]
    PillarNotFound(String),
    #[error("upgrade not found: {0}")]
    UpgradeNotFound(String),
    #[error("upgrade is {0} and cannot change")]
    UpgradeFinished(String),
    #[error(transparent)]
    Merge(#[from] MergeError),
}

impl EvalError {
    pub fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        Self::Invalid { field, reason: reason.into() }
    }
}

impl Kinded for EvalError {
    fn kind(&self) -> ErrorKind {
        match self {
            EvalError::Invalid { .. } => ErrorKind::ValidationError,
            EvalError::DuplicatePillar(_) | EvalError::UpgradeFinished(_) => ErrorKind::Conflict,
            EvalError::PillarNotFound(_) | EvalError::UpgradeNotFound(_) => ErrorKind::NotFound,
            EvalError::Merge(e) => e.kind(),
        }
    }
}

/// Reject negative or non-finite inputs.
pub(crate) fn non_negative(field: &'static str, value: f64) -> Result<f64, EvalError> {
    if !value.is_finite() || value < 0.0 {
        return Err(EvalError::invalid(field, format!("must be a finite non-negative number, got {value}")));
    }
    Ok(value)
}
