// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Rolling reboot planning.

use crate::error::{non_negative, EvalError};
use fleet_core::value::round2;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RebootPolicy {
    pub environment: String,
    pub max_concurrent_reboots: u32,
    pub min_healthy_percent: f64,
    /// Roles rebooted first, in this order. Unlisted roles follow alphabetically.
    #[serde(default)]
    pub dependency_order: Vec<String>,
}

impl RebootPolicy {
    pub fn new(environment: impl Into<String>, max_concurrent_reboots: u32, min_healthy_percent: f64) -> Self {
        Self {
            environment: environment.into(),
            max_concurrent_reboots,
            min_healthy_percent,
            dependency_order: Vec::new(),
        }
    }

    pub fn dependency_order<I, S>(mut self, roles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.dependency_order = roles.into_iter().map(Into::into).collect();
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RebootHost {
    pub id: String,
    pub role: String,
    #[serde(default)]
    pub failure_domain: String,
    pub healthy: bool,
}

impl RebootHost {
    pub fn new(id: impl Into<String>, role: impl Into<String>, healthy: bool) -> Self {
        Self { id: id.into(), role: role.into(), failure_domain: String::new(), healthy }
    }

    fleet_core::setters! {
        into { failure_domain: String }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RebootWave {
    /// 1-based.
    pub index: u32,
    pub role: String,
    pub hosts: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RebootPlan {
    pub environment: String,
    pub allowed: bool,
    pub reason: String,
    pub healthy_percent: f64,
    pub waves: Vec<RebootWave>,
}

/// Listed roles first, then the rest by name.
fn role_order(policy: &RebootPolicy, buckets: &BTreeMap<String, Vec<&RebootHost>>) -> Vec<String> {
    let mut order: Vec<String> = Vec::new();
    for role in &policy.dependency_order {
        let role = role.trim();
        if buckets.contains_key(role) && !order.iter().any(|r| r == role) {
            order.push(role.to_string());
        }
    }
    for role in buckets.keys() {
        if !order.contains(role) {
            order.push(role.clone());
        }
    }
    order
}

pub fn plan(policy: &RebootPolicy, hosts: &[RebootHost]) -> Result<RebootPlan, EvalError> {
    non_negative("min_healthy_percent", policy.min_healthy_percent)?;
    if hosts.is_empty() {
        return Err(EvalError::invalid("hosts", "at least one host is required"));
    }

    let healthy = hosts.iter().filter(|h| h.healthy).count();
    let healthy_percent = round2(healthy as f64 / hosts.len() as f64 * 100.0);
    if healthy_percent < policy.min_healthy_percent {
        tracing::info!(
            environment = %policy.environment,
            healthy_percent,
            min = policy.min_healthy_percent,
            "reboot plan denied"
        );
        return Ok(RebootPlan {
            environment: policy.environment.clone(),
            allowed: false,
            reason: format!(
                "healthy hosts {healthy_percent:.2}% below minimum {:.2}%",
                policy.min_healthy_percent
            ),
            healthy_percent,
            waves: Vec::new(),
        });
    }

    let mut buckets: BTreeMap<String, Vec<&RebootHost>> = BTreeMap::new();
    for host in hosts {
        buckets.entry(host.role.trim().to_string()).or_default().push(host);
    }

    let size = policy.max_concurrent_reboots.max(1) as usize;
    let mut waves = Vec::new();
    for role in role_order(policy, &buckets) {
        let Some(bucket) = buckets.get_mut(&role) else {
            continue;
        };
        bucket.sort_by(|a, b| a.failure_domain.cmp(&b.failure_domain).then_with(|| a.id.cmp(&b.id)));
        for chunk in bucket.chunks(size) {
            waves.push(RebootWave {
                index: waves.len() as u32 + 1,
                role: role.clone(),
                hosts: chunk.iter().map(|h| h.id.clone()).collect(),
            });
        }
    }

    Ok(RebootPlan {
        environment: policy.environment.clone(),
        allowed: true,
        reason: format!("{} wave(s) of at most {size}", waves.len()),
        healthy_percent,
        waves,
    })
}
