// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Deployment preflight checks.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PreflightCheck {
    EmergencyStop,
    ChangeFreeze,
    MaintenanceWindow,
    HostHealth,
    DriftSlo,
    Approvals,
}

fleet_core::simple_display! {
    PreflightCheck {
        EmergencyStop => "emergency_stop",
        ChangeFreeze => "change_freeze",
        MaintenanceWindow => "maintenance_window",
        HostHealth => "host_health",
        DriftSlo => "drift_slo",
        Approvals => "approvals",
    }
}

/// Observed state a deployment is checked against.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PreflightInput {
    pub deployment: String,
    #[serde(default)]
    pub emergency_stop: bool,
    #[serde(default)]
    pub change_freeze: bool,
    #[serde(default)]
    pub in_maintenance: bool,
    #[serde(default)]
    pub unhealthy_hosts: Vec<String>,
    #[serde(default)]
    pub drift_breached: bool,
    #[serde(default)]
    pub approvals: u32,
    #[serde(default)]
    pub required_approvals: u32,
}

impl PreflightInput {
    pub fn new(deployment: impl Into<String>) -> Self {
        Self { deployment: deployment.into(), ..Self::default() }
    }

    fleet_core::setters! {
        set {
            emergency_stop: bool,
            change_freeze: bool,
            in_maintenance: bool,
            unhealthy_hosts: Vec<String>,
            drift_breached: bool,
            approvals: u32,
            required_approvals: u32,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckResult {
    pub check: PreflightCheck,
    pub passed: bool,
    pub detail: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PreflightReport {
    pub deployment: String,
    pub ready: bool,
    /// Failed checks, in evaluation order.
    pub blocking: Vec<PreflightCheck>,
    pub checks: Vec<CheckResult>,
}

fn check(check: PreflightCheck, passed: bool, ok: &str, failed: String) -> CheckResult {
    CheckResult { check, passed, detail: if passed { ok.to_string() } else { failed } }
}

pub fn run(input: &PreflightInput) -> PreflightReport {
    let checks = vec![
        check(PreflightCheck::EmergencyStop, !input.emergency_stop, "no emergency stop", "emergency stop active".into()),
        check(PreflightCheck::ChangeFreeze, !input.change_freeze, "no change freeze", "change freeze active".into()),
        check(
            PreflightCheck::MaintenanceWindow,
            !input.in_maintenance,
            "outside maintenance",
            "target is in a maintenance window".into(),
        ),
        check(
            PreflightCheck::HostHealth,
            input.unhealthy_hosts.is_empty(),
            "all hosts healthy",
            format!("unhealthy hosts: {}", input.unhealthy_hosts.join(", ")),
        ),
        check(PreflightCheck::DriftSlo, !input.drift_breached, "drift SLO met", "drift SLO breached".into()),
        check(
            PreflightCheck::Approvals,
            input.approvals >= input.required_approvals,
            "approvals satisfied",
            format!("{} of {} approvals", input.approvals, input.required_approvals),
        ),
    ];
    let blocking: Vec<PreflightCheck> = checks.iter().filter(|c| !c.passed).map(|c| c.check).collect();
    if !blocking.is_empty() {
        tracing::info!(deployment = %input.deployment, blocking = blocking.len(), "preflight blocked");
    }
    PreflightReport { deployment: input.deployment.clone(), ready: blocking.is_empty(), blocking, checks }
}
