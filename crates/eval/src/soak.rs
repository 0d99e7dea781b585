// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Deterministic load-soak projection.
//!
//! Each simulated minute draws a jitter in `[0, 1)` from an FNV hash of the
//! profile and the minute index. The same profile always projects the same
//! series.

use crate::error::{non_negative, EvalError};
use fleet_core::value::{fnv1a_json, round2, unit_fraction};
use serde::{Deserialize, Serialize};

/// Longest projection, in minutes.
pub const MAX_MINUTES: u32 = 60;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SoakProfile {
    pub name: String,
    pub duration_minutes: u32,
    pub target_rps: f64,
    pub baseline_p95_ms: f64,
    pub max_p95_ms: f64,
    pub max_error_rate_percent: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SoakInterval {
    pub minute: u32,
    pub rps: f64,
    pub p95_ms: f64,
    pub error_rate_percent: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SoakResult {
    pub name: String,
    pub passed: bool,
    pub peak_p95_ms: f64,
    pub peak_error_rate_percent: f64,
    pub intervals: Vec<SoakInterval>,
}

pub fn simulate(profile: &SoakProfile) -> Result<SoakResult, EvalError> {
    if profile.duration_minutes == 0 {
        return Err(EvalError::invalid("duration_minutes", "must be at least 1"));
    }
    non_negative("target_rps", profile.target_rps)?;
    non_negative("baseline_p95_ms", profile.baseline_p95_ms)?;
    non_negative("max_p95_ms", profile.max_p95_ms)?;
    non_negative("max_error_rate_percent", profile.max_error_rate_percent)?;

    let seed = fnv1a_json(profile);
    let minutes = profile.duration_minutes.min(MAX_MINUTES);
    let intervals: Vec<SoakInterval> = (1..=minutes)
        .map(|minute| {
            let jitter = unit_fraction(fnv1a_json(&(seed, minute)));
            let rps = profile.target_rps * (0.9 + 0.2 * jitter);
            let load = if profile.target_rps > 0.0 { rps / profile.target_rps } else { 0.0 };
            SoakInterval {
                minute,
                rps: round2(rps),
                p95_ms: round2(profile.baseline_p95_ms * (1.0 + 0.5 * jitter)),
                error_rate_percent: round2(0.5 * jitter * load),
            }
        })
        .collect();

    let peak_p95_ms = intervals.iter().map(|i| i.p95_ms).fold(0.0, f64::max);
    let peak_error_rate_percent = intervals.iter().map(|i| i.error_rate_percent).fold(0.0, f64::max);
    Ok(SoakResult {
        name: profile.name.clone(),
        passed: peak_p95_ms <= profile.max_p95_ms && peak_error_rate_percent <= profile.max_error_rate_percent,
        peak_p95_ms,
        peak_error_rate_percent,
        intervals,
    })
}
