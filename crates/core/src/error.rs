// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Error taxonomy shared by every store and evaluator.
//!
//! Each crate keeps its own `thiserror` enum; [`Kinded`] maps those variants
//! onto a stable, machine-readable [`ErrorKind`] for the outer surface.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    ValidationError,
    NotFound,
    Conflict,
    EmergencyActive,
    Frozen,
    BackpressureFull,
    SecretExpired,
    SessionExpired,
    IntegrityViolation,
    PrecedenceConflict,
    DrainTimeout,
}

impl ErrorKind {
    pub fn code(self) -> &'static str {
        match self {
            ErrorKind::ValidationError => "validation_error",
            ErrorKind::NotFound => "not_found",
            ErrorKind::Conflict => "conflict",
            ErrorKind::EmergencyActive => "emergency_active",
            ErrorKind::Frozen => "frozen",
            ErrorKind::BackpressureFull => "backpressure_full",
            ErrorKind::SecretExpired => "secret_expired",
            ErrorKind::SessionExpired => "session_expired",
            ErrorKind::IntegrityViolation => "integrity_violation",
            ErrorKind::PrecedenceConflict => "precedence_conflict",
            ErrorKind::DrainTimeout => "drain_timeout",
        }
    }

    /// Whether a caller may reasonably retry the same request later.
    pub fn retryable(self) -> bool {
        matches!(self, ErrorKind::BackpressureFull | ErrorKind::DrainTimeout)
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.code())
    }
}

/// Errors that classify themselves into the shared taxonomy.
pub trait Kinded: std::error::Error {
    fn kind(&self) -> ErrorKind;
}

/// Structured error body: short code plus human-readable message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub code: String,
    pub message: String,
}

impl ErrorBody {
    pub fn from_error<E: Kinded + ?Sized>(err: &E) -> Self {
        Self { code: err.kind().code().to_string(), message: err.to_string() }
    }
}
