// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Wave-based upgrade orchestration.
//!
//! An [`UpgradeRun`] is a value: [`UpgradeRun::step`] returns the next state
//! and leaves the input untouched.

use crate::error::EvalError;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UpgradePhase {
    Pending,
    InProgress,
    Blocked,
    Completed,
    Aborted,
}

impl UpgradePhase {
    pub fn is_terminal(self) -> bool {
        matches!(self, UpgradePhase::Completed | UpgradePhase::Aborted)
    }
}

fleet_core::simple_display! {
    UpgradePhase {
        Pending => "pending",
        InProgress => "in_progress",
        Blocked => "blocked",
        Completed => "completed",
        Aborted => "aborted",
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpgradeRun {
    pub name: String,
    pub total_nodes: u32,
    pub wave_size: u32,
    pub upgraded_nodes: u32,
    /// Waves that passed the health gate.
    pub waves_completed: u32,
    pub phase: UpgradePhase,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub last_detail: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub abort_reason: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum UpgradeStep {
    /// Report the health gate of the current wave.
    Advance {
        healthy: bool,
        #[serde(default)]
        detail: String,
    },
    Abort { reason: String },
}

impl UpgradeStep {
    pub fn healthy() -> Self {
        UpgradeStep::Advance { healthy: true, detail: String::new() }
    }

    pub fn unhealthy(detail: impl Into<String>) -> Self {
        UpgradeStep::Advance { healthy: false, detail: detail.into() }
    }

    pub fn abort(reason: impl Into<String>) -> Self {
        UpgradeStep::Abort { reason: reason.into() }
    }
}

impl UpgradeRun {
    pub fn start(name: impl Into<String>, total_nodes: u32, wave_size: u32) -> Result<Self, EvalError> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(EvalError::invalid("name", "must not be empty"));
        }
        if total_nodes == 0 {
            return Err(EvalError::invalid("total_nodes", "must be at least 1"));
        }
        if wave_size == 0 {
            return Err(EvalError::invalid("wave_size", "must be at least 1"));
        }
        Ok(Self {
            name,
            total_nodes,
            wave_size,
            upgraded_nodes: 0,
            waves_completed: 0,
            phase: UpgradePhase::Pending,
            last_detail: String::new(),
            abort_reason: String::new(),
        })
    }

    /// Nodes in the wave currently being processed.
    pub fn current_wave(&self) -> u32 {
        self.wave_size.min(self.total_nodes.saturating_sub(self.upgraded_nodes))
    }

    /// Rejects states that [`UpgradeRun::start`] could never produce, such as
    /// a run deserialized from a hand-edited record.
    fn validate(&self) -> Result<(), EvalError> {
        if self.wave_size == 0 {
            return Err(EvalError::invalid("wave_size", "must be at least 1"));
        }
        if self.upgraded_nodes > self.total_nodes {
            return Err(EvalError::invalid("upgraded_nodes", "must not exceed total_nodes"));
        }
        Ok(())
    }

    pub fn step(&self, step: &UpgradeStep) -> Result<Self, EvalError> {
        if self.phase.is_terminal() {
            return Err(EvalError::UpgradeFinished(self.phase.to_string()));
        }
        self.validate()?;
        let mut next = self.clone();
        match step {
            UpgradeStep::Abort { reason } => {
                next.phase = UpgradePhase::Aborted;
                next.abort_reason = reason.clone();
                tracing::warn!(upgrade = %self.name, %reason, "upgrade aborted");
            }
            UpgradeStep::Advance { healthy: false, detail } => {
                next.phase = UpgradePhase::Blocked;
                next.last_detail = detail.clone();
                tracing::warn!(upgrade = %self.name, %detail, "upgrade wave blocked");
            }
            UpgradeStep::Advance { healthy: true, detail } => {
                next.upgraded_nodes += self.current_wave();
                next.waves_completed = next.waves_completed.saturating_add(1);
                next.last_detail = detail.clone();
                next.phase = if next.upgraded_nodes >= next.total_nodes {
                    UpgradePhase::Completed
                } else {
                    UpgradePhase::InProgress
                };
            }
        }
        Ok(next)
    }
}
