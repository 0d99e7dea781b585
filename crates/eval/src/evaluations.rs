// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Recording front for the evaluators.
//!
//! Every decision is stamped with the clock and kept in a bounded ledger per
//! evaluator, so callers can fetch it again by id. Tenant cost and rate
//! policies live here too; the evaluators themselves stay pure.

use crate::cost::{self, CostDecision, CostPolicy, CostRequest};
use crate::distribution::{self, DistributionPlan, DistributionPolicy, DistributionRequest};
use crate::drift::{self, DriftEvaluation, DriftPolicy, DriftSample};
use crate::error::EvalError;
use crate::perf::{self, PerfMeasurement, PerfThresholds, PerfVerdict};
use crate::preflight::{self, PreflightInput, PreflightReport};
use crate::rate::{self, RateDecision, RatePolicy, RateRequest};
use crate::reboot::{self, RebootHost, RebootPlan, RebootPolicy};
use crate::soak::{self, SoakProfile, SoakResult};
use crate::topology::{self, PlacementPlan, PlacementRequest};
use crate::upgrade::{UpgradeRun, UpgradeStep};
use crate::variables::{Resolution, ResolveRequest, VariableResolver};
use fleet_core::{Clock, Ledger, Recorded, SystemClock};
use parking_lot::RwLock;
use std::collections::HashMap;

/// Records retained per evaluator.
pub const DEFAULT_RETENTION: usize = 1_000;

pub struct Evaluations<C: Clock = SystemClock> {
    clock: C,
    cost_policies: RwLock<HashMap<String, CostPolicy>>,
    rate_policies: RwLock<HashMap<String, RatePolicy>>,
    cost: Ledger<CostDecision>,
    rate: Ledger<RateDecision>,
    distribution: Ledger<DistributionPlan>,
    placement: Ledger<PlacementPlan>,
    reboot: Ledger<RebootPlan>,
    upgrade: Ledger<UpgradeRun>,
    drift: Ledger<DriftEvaluation>,
    perf: Ledger<PerfVerdict>,
    preflight: Ledger<PreflightReport>,
    soak: Ledger<SoakResult>,
    merge: Ledger<Resolution>,
}

impl Evaluations<SystemClock> {
    pub fn new() -> Self {
        Self::with_clock(SystemClock, DEFAULT_RETENTION)
    }
}

impl Default for Evaluations<SystemClock> {
    fn default() -> Self {
        Self::new()
    }
}

fn tenant_key(tenant: &str) -> Result<String, EvalError> {
    let tenant = tenant.trim();
    if tenant.is_empty() {
        return Err(EvalError::invalid("tenant", "must not be empty"));
    }
    Ok(tenant.to_string())
}

impl<C: Clock> Evaluations<C> {
    pub fn with_clock(clock: C, retention: usize) -> Self {
        Self {
            clock,
            cost_policies: RwLock::new(HashMap::new()),
            rate_policies: RwLock::new(HashMap::new()),
            cost: Ledger::new("cost-admission", retention),
            rate: Ledger::new("rate-limit", retention),
            distribution: Ledger::new("artifact-distribution", retention),
            placement: Ledger::new("topology-placement", retention),
            reboot: Ledger::new("reboot-plan", retention),
            upgrade: Ledger::new("upgrade-wave", retention),
            drift: Ledger::new("drift-slo", retention),
            perf: Ledger::new("perf-gate", retention),
            preflight: Ledger::new("deploy-preflight", retention),
            soak: Ledger::new("load-soak", retention),
            merge: Ledger::new("variable-merge", retention),
        }
    }

    pub fn set_cost_policy(&self, tenant: &str, policy: CostPolicy) -> Result<(), EvalError> {
        policy.validate()?;
        self.cost_policies.write().insert(tenant_key(tenant)?, policy);
        Ok(())
    }

    pub fn cost_policy(&self, tenant: &str) -> Option<CostPolicy> {
        self.cost_policies.read().get(tenant.trim()).cloned()
    }

    pub fn remove_cost_policy(&self, tenant: &str) -> bool {
        self.cost_policies.write().remove(tenant.trim()).is_some()
    }

    pub fn admit_cost(&self, req: &CostRequest) -> Result<Recorded<CostDecision>, EvalError> {
        let policy = self.cost_policy(&req.tenant);
        let decision = cost::admit(policy.as_ref(), req)?;
        if !decision.allowed {
            tracing::info!(tenant = %req.tenant, reason = %decision.reason, "cost admission denied");
        }
        Ok(self.cost.record(self.clock.utc(), decision))
    }

    pub fn set_rate_policy(&self, tenant: &str, policy: RatePolicy) -> Result<(), EvalError> {
        self.rate_policies.write().insert(tenant_key(tenant)?, policy);
        Ok(())
    }

    pub fn rate_policy(&self, tenant: &str) -> Option<RatePolicy> {
        self.rate_policies.read().get(tenant.trim()).copied()
    }

    pub fn check_rate(&self, req: &RateRequest) -> Recorded<RateDecision> {
        let now = self.clock.utc();
        let policy = self.rate_policy(&req.tenant);
        self.rate.record(now, rate::check(policy.as_ref(), req, now))
    }

    pub fn plan_distribution(
        &self,
        policy: &DistributionPolicy,
        req: &DistributionRequest,
    ) -> Result<Recorded<DistributionPlan>, EvalError> {
        let plan = distribution::plan(policy, req)?;
        Ok(self.distribution.record(self.clock.utc(), plan))
    }

    pub fn place(&self, req: &PlacementRequest) -> Result<Recorded<PlacementPlan>, EvalError> {
        let plan = topology::place(req)?;
        Ok(self.placement.record(self.clock.utc(), plan))
    }

    pub fn plan_reboot(&self, policy: &RebootPolicy, hosts: &[RebootHost]) -> Result<Recorded<RebootPlan>, EvalError> {
        let plan = reboot::plan(policy, hosts)?;
        Ok(self.reboot.record(self.clock.utc(), plan))
    }

    pub fn start_upgrade(&self, name: &str, total_nodes: u32, wave_size: u32) -> Result<Recorded<UpgradeRun>, EvalError> {
        let run = UpgradeRun::start(name, total_nodes, wave_size)?;
        tracing::info!(upgrade = %run.name, total_nodes, wave_size, "upgrade started");
        Ok(self.upgrade.record(self.clock.utc(), run))
    }

    /// Apply `step` to a recorded upgrade state. The new state gets its own id.
    pub fn step_upgrade(&self, id: &str, step: &UpgradeStep) -> Result<Recorded<UpgradeRun>, EvalError> {
        let current = self.upgrade.get(id).ok_or_else(|| EvalError::UpgradeNotFound(id.to_string()))?;
        let next = current.record.step(step)?;
        Ok(self.upgrade.record(self.clock.utc(), next))
    }

    pub fn evaluate_drift(&self, policy: &DriftPolicy, sample: &DriftSample) -> Result<Recorded<DriftEvaluation>, EvalError> {
        let out = drift::evaluate(policy, sample)?;
        Ok(self.drift.record(self.clock.utc(), out))
    }

    pub fn gate_perf(&self, thresholds: &PerfThresholds, m: &PerfMeasurement) -> Result<Recorded<PerfVerdict>, EvalError> {
        let verdict = perf::gate(thresholds, m)?;
        Ok(self.perf.record(self.clock.utc(), verdict))
    }

    pub fn preflight(&self, input: &PreflightInput) -> Recorded<PreflightReport> {
        self.preflight.record(self.clock.utc(), preflight::run(input))
    }

    pub fn soak(&self, profile: &SoakProfile) -> Result<Recorded<SoakResult>, EvalError> {
        let result = soak::simulate(profile)?;
        Ok(self.soak.record(self.clock.utc(), result))
    }

    /// Merge variable layers. Hard-fail conflicts are returned as errors and
    /// not recorded.
    pub fn merge_variables(&self, req: &ResolveRequest) -> Result<Recorded<Resolution>, EvalError> {
        let resolution = VariableResolver::resolve(req)?;
        Ok(self.merge.record(self.clock.utc(), resolution))
    }

    pub fn cost_decisions(&self) -> &Ledger<CostDecision> {
        &self.cost
    }

    pub fn rate_decisions(&self) -> &Ledger<RateDecision> {
        &self.rate
    }

    pub fn distribution_plans(&self) -> &Ledger<DistributionPlan> {
        &self.distribution
    }

    pub fn placements(&self) -> &Ledger<PlacementPlan> {
        &self.placement
    }

    pub fn reboot_plans(&self) -> &Ledger<RebootPlan> {
        &self.reboot
    }

    pub fn upgrades(&self) -> &Ledger<UpgradeRun> {
        &self.upgrade
    }

    pub fn drift_evaluations(&self) -> &Ledger<DriftEvaluation> {
        &self.drift
    }

    pub fn perf_verdicts(&self) -> &Ledger<PerfVerdict> {
        &self.perf
    }

    pub fn preflight_reports(&self) -> &Ledger<PreflightReport> {
        &self.preflight
    }

    pub fn soak_results(&self) -> &Ledger<SoakResult> {
        &self.soak
    }

    pub fn merges(&self) -> &Ledger<Resolution> {
        &self.merge
    }
}

#[cfg(test)]
#[path = "evaluations_tests.rs"]
mod tests;
