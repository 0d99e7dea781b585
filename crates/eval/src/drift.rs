// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Configuration drift SLO evaluation.

use crate::error::{non_negative, EvalError};
use fleet_core::value::round2;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DriftStatus {
    InsufficientSamples,
    Breached,
    Healthy,
}

fleet_core::simple_display! {
    DriftStatus {
        InsufficientSamples => "insufficient_samples",
        Breached => "breached",
        Healthy => "healthy",
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DriftPolicy {
    /// Minimum compliance percentage.
    pub target_compliance_percent: f64,
    pub min_samples: u32,
    #[serde(default)]
    pub auto_create_incident: bool,
}

impl DriftPolicy {
    pub fn new(target_compliance_percent: f64, min_samples: u32) -> Self {
        Self { target_compliance_percent, min_samples, auto_create_incident: false }
    }

    fleet_core::setters! {
        set { auto_create_incident: bool }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DriftSample {
    pub scope: String,
    pub samples: u32,
    pub changed: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DriftEvaluation {
    pub scope: String,
    pub status: DriftStatus,
    pub drift_rate_percent: f64,
    pub compliance_percent: f64,
    pub incident_recommended: bool,
}

pub fn evaluate(policy: &DriftPolicy, sample: &DriftSample) -> Result<DriftEvaluation, EvalError> {
    non_negative("target_compliance_percent", policy.target_compliance_percent)?;
    if sample.changed > sample.samples {
        return Err(EvalError::invalid(
            "changed",
            format!("{} changed exceeds {} samples", sample.changed, sample.samples),
        ));
    }

    let drift_rate =
        if sample.samples == 0 { 0.0 } else { f64::from(sample.changed) / f64::from(sample.samples) * 100.0 };
    let compliance = 100.0 - drift_rate;
    let status = if sample.samples < policy.min_samples {
        DriftStatus::InsufficientSamples
    } else if compliance < policy.target_compliance_percent {
        DriftStatus::Breached
    } else {
        DriftStatus::Healthy
    };

    Ok(DriftEvaluation {
        scope: sample.scope.clone(),
        status,
        drift_rate_percent: round2(drift_rate),
        compliance_percent: round2(compliance),
        incident_recommended: status == DriftStatus::Breached && policy.auto_create_incident,
    })
}
