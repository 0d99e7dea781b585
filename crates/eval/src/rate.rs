// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-tenant request rate admission over a one-minute window.

use chrono::{DateTime, Timelike, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RatePolicy {
    pub requests_per_minute: u32,
    #[serde(default)]
    pub burst: u32,
}

impl RatePolicy {
    pub fn new(requests_per_minute: u32, burst: u32) -> Self {
        Self { requests_per_minute, burst }
    }

    pub fn limit(&self) -> u32 {
        self.requests_per_minute.saturating_add(self.burst)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateRequest {
    pub tenant: String,
    /// Requests already seen in the current minute.
    pub observed: u32,
}

impl RateRequest {
    pub fn new(tenant: impl Into<String>, observed: u32) -> Self {
        Self { tenant: tenant.into(), observed }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateDecision {
    pub tenant: String,
    pub allowed: bool,
    /// `None` when the tenant has no policy.
    pub remaining: Option<u32>,
    pub retry_after_seconds: u32,
    pub limit: Option<u32>,
}

/// Admit one more request if the tenant is under `rpm + burst`.
pub fn check(policy: Option<&RatePolicy>, req: &RateRequest, now: DateTime<Utc>) -> RateDecision {
    let Some(policy) = policy else {
        return RateDecision {
            tenant: req.tenant.clone(),
            allowed: true,
            remaining: None,
            retry_after_seconds: 0,
            limit: None,
        };
    };

    let limit = policy.limit();
    let allowed = req.observed < limit;
    if !allowed {
        tracing::debug!(tenant = %req.tenant, observed = req.observed, limit, "rate limited");
    }
    RateDecision {
        tenant: req.tenant.clone(),
        allowed,
        remaining: Some(limit.saturating_sub(req.observed.saturating_add(1))),
        retry_after_seconds: if allowed { 0 } else { 60 - now.second().min(59) },
        limit: Some(limit),
    }
}
