// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-tenant cost admission.

use crate::error::{non_negative, EvalError};
use fleet_core::value::round2;
use fleet_core::Priority;
use serde::{Deserialize, Serialize};

/// Queue depth at which expensive runs are steered to the low class.
pub const BACKLOG_DEPTH: u32 = 20;

pub const THROTTLE_OVER_RUN_LIMIT: u64 = 300;
pub const THROTTLE_OVER_BUDGET: u64 = 600;
pub const THROTTLE_ABOVE_THRESHOLD: u64 = 120;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CostPolicy {
    pub max_cost_per_run: f64,
    pub max_hourly_budget: f64,
    pub throttle_above_percent: f64,
    #[serde(default = "default_multiplier")]
    pub off_peak_multiplier: f64,
}

fn default_multiplier() -> f64 {
    1.0
}

impl CostPolicy {
    pub fn new(max_cost_per_run: f64, max_hourly_budget: f64) -> Self {
        Self { max_cost_per_run, max_hourly_budget, throttle_above_percent: 80.0, off_peak_multiplier: 1.0 }
    }

    fleet_core::setters! {
        set { throttle_above_percent: f64, off_peak_multiplier: f64 }
    }

    pub fn validate(&self) -> Result<(), EvalError> {
        non_negative("max_cost_per_run", self.max_cost_per_run)?;
        non_negative("max_hourly_budget", self.max_hourly_budget)?;
        non_negative("throttle_above_percent", self.throttle_above_percent)?;
        non_negative("off_peak_multiplier", self.off_peak_multiplier)?;
        Ok(())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CostRequest {
    pub tenant: String,
    pub estimated_cost: f64,
    #[serde(default)]
    pub hourly_spend: f64,
    #[serde(default)]
    pub queue_depth: u32,
    #[serde(default)]
    pub priority: Priority,
    #[serde(default)]
    pub off_peak: bool,
}

impl CostRequest {
    pub fn new(tenant: impl Into<String>, estimated_cost: f64) -> Self {
        Self { tenant: tenant.into(), estimated_cost, ..Self::default() }
    }

    fleet_core::setters! {
        set { hourly_spend: f64, queue_depth: u32, priority: Priority, off_peak: bool }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CostDecision {
    pub tenant: String,
    pub allowed: bool,
    pub reason: String,
    pub effective_cost: f64,
    pub utilization_percent: f64,
    pub throttle_for_seconds: u64,
    pub recommended_priority: Priority,
}

/// Decide whether a run fits the tenant's cost envelope.
pub fn admit(policy: Option<&CostPolicy>, req: &CostRequest) -> Result<CostDecision, EvalError> {
    non_negative("estimated_cost", req.estimated_cost)?;
    non_negative("hourly_spend", req.hourly_spend)?;

    let Some(policy) = policy else {
        return Ok(CostDecision {
            tenant: req.tenant.clone(),
            allowed: true,
            reason: "no cost policy for tenant".to_string(),
            effective_cost: round2(req.estimated_cost),
            utilization_percent: 0.0,
            throttle_for_seconds: 0,
            recommended_priority: req.priority,
        });
    };
    policy.validate()?;

    let effective = if req.off_peak { req.estimated_cost * policy.off_peak_multiplier } else { req.estimated_cost };
    let utilization = if policy.max_hourly_budget > 0.0 {
        round2((req.hourly_spend + effective) / policy.max_hourly_budget * 100.0)
    } else {
        0.0
    };

    let deny = |reason: String, throttle: u64| CostDecision {
        tenant: req.tenant.clone(),
        allowed: false,
        reason,
        effective_cost: round2(effective),
        utilization_percent: utilization,
        throttle_for_seconds: throttle,
        recommended_priority: req.priority,
    };

    if effective > policy.max_cost_per_run {
        return Ok(deny(
            format!("effective cost {:.2} exceeds per-run limit {:.2}", effective, policy.max_cost_per_run),
            THROTTLE_OVER_RUN_LIMIT,
        ));
    }
    if utilization > 100.0 {
        return Ok(deny(format!("hourly budget exhausted ({utilization:.2}%)"), THROTTLE_OVER_BUDGET));
    }
    if utilization > policy.throttle_above_percent {
        return Ok(deny(
            format!("utilization {utilization:.2}% above throttle threshold {:.2}%", policy.throttle_above_percent),
            THROTTLE_ABOVE_THRESHOLD,
        ));
    }

    let shed = req.queue_depth >= BACKLOG_DEPTH && effective >= policy.max_cost_per_run * 0.5;
    Ok(CostDecision {
        tenant: req.tenant.clone(),
        allowed: true,
        reason: if shed { "within budget; backlog suggests low priority" } else { "within budget" }.to_string(),
        effective_cost: round2(effective),
        utilization_percent: utilization,
        throttle_for_seconds: 0,
        recommended_priority: if shed { Priority::Low } else { req.priority },
    })
}
