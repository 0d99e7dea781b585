// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Artifact distribution planning.

use crate::error::{non_negative, EvalError};
use serde::{Deserialize, Serialize};

/// Links slower than this are treated as constrained.
pub const CONSTRAINED_LINK_MBPS: f64 = 20.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DistributionMode {
    Direct,
    RegionalCache,
    RelayCache,
}

fleet_core::simple_display! {
    DistributionMode {
        Direct => "direct",
        RegionalCache => "regional-cache",
        RelayCache => "relay-cache",
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DistributionPolicy {
    pub prefer_regional_cache: bool,
    /// Artifacts at least this large go through the regional cache.
    pub regional_threshold_mb: f64,
    pub allow_relay: bool,
    pub max_throttle_mbps: f64,
}

impl Default for DistributionPolicy {
    fn default() -> Self {
        Self { prefer_regional_cache: false, regional_threshold_mb: 500.0, allow_relay: false, max_throttle_mbps: 100.0 }
    }
}

impl DistributionPolicy {
    fleet_core::setters! {
        set { prefer_regional_cache: bool, regional_threshold_mb: f64, allow_relay: bool, max_throttle_mbps: f64 }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DistributionRequest {
    pub artifact: String,
    pub artifact_size_mb: f64,
    pub available_bandwidth_mbps: f64,
    #[serde(default)]
    pub cache_hit: bool,
    #[serde(default)]
    pub urgent: bool,
}

impl DistributionRequest {
    pub fn new(artifact: impl Into<String>, artifact_size_mb: f64, available_bandwidth_mbps: f64) -> Self {
        Self { artifact: artifact.into(), artifact_size_mb, available_bandwidth_mbps, ..Self::default() }
    }

    fleet_core::setters! {
        set { cache_hit: bool, urgent: bool }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DistributionPlan {
    pub artifact: String,
    pub mode: DistributionMode,
    /// `None` when the transfer is not throttled.
    pub throttle_mbps: Option<f64>,
    pub reason: String,
}

pub fn plan(policy: &DistributionPolicy, req: &DistributionRequest) -> Result<DistributionPlan, EvalError> {
    non_negative("artifact_size_mb", req.artifact_size_mb)?;
    non_negative("available_bandwidth_mbps", req.available_bandwidth_mbps)?;
    non_negative("max_throttle_mbps", policy.max_throttle_mbps)?;

    let constrained = req.available_bandwidth_mbps < CONSTRAINED_LINK_MBPS;
    let (mode, reason) = if req.cache_hit {
        (DistributionMode::RegionalCache, "artifact already cached regionally".to_string())
    } else if constrained && policy.allow_relay && !req.urgent {
        (
            DistributionMode::RelayCache,
            format!("constrained link ({:.1} Mbps) routed through relay", req.available_bandwidth_mbps),
        )
    } else if policy.prefer_regional_cache && req.artifact_size_mb >= policy.regional_threshold_mb {
        (
            DistributionMode::RegionalCache,
            format!("artifact size {:.1} MB at or above regional threshold", req.artifact_size_mb),
        )
    } else {
        (DistributionMode::Direct, "direct transfer".to_string())
    };

    let throttle_mbps =
        if req.urgent { None } else { Some(policy.max_throttle_mbps.min(req.available_bandwidth_mbps)) };

    Ok(DistributionPlan { artifact: req.artifact.clone(), mode, throttle_mbps, reason })
}
