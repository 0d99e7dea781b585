// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Performance gate.
//!
//! The score starts at 100. Each breached threshold subtracts its weight
//! scaled by how far the measurement is past the limit, capped at the full
//! weight. Too few samples costs a flat penalty.

use crate::error::{non_negative, EvalError};
use fleet_core::value::round2;
use serde::{Deserialize, Serialize};

const LATENCY_WEIGHT: f64 = 40.0;
const THROUGHPUT_WEIGHT: f64 = 35.0;
const ERROR_WEIGHT: f64 = 25.0;
const SAMPLE_PENALTY: f64 = 10.0;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerfThresholds {
    pub max_p95_latency_ms: f64,
    pub min_throughput_rps: f64,
    pub max_error_rate_percent: f64,
    pub min_samples: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerfMeasurement {
    pub build: String,
    pub p95_latency_ms: f64,
    pub throughput_rps: f64,
    pub error_rate_percent: f64,
    pub samples: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerfVerdict {
    pub build: String,
    pub passed: bool,
    pub score: f64,
    pub failures: Vec<String>,
}

/// Fraction of `limit` by which `excess` overshoots, capped at 1.
fn overshoot(excess: f64, limit: f64) -> f64 {
    if limit <= 0.0 {
        1.0
    } else {
        (excess / limit).min(1.0)
    }
}

pub fn gate(thresholds: &PerfThresholds, m: &PerfMeasurement) -> Result<PerfVerdict, EvalError> {
    non_negative("max_p95_latency_ms", thresholds.max_p95_latency_ms)?;
    non_negative("min_throughput_rps", thresholds.min_throughput_rps)?;
    non_negative("max_error_rate_percent", thresholds.max_error_rate_percent)?;
    non_negative("p95_latency_ms", m.p95_latency_ms)?;
    non_negative("throughput_rps", m.throughput_rps)?;
    non_negative("error_rate_percent", m.error_rate_percent)?;

    let mut score = 100.0;
    let mut failures = Vec::new();

    if m.p95_latency_ms > thresholds.max_p95_latency_ms {
        let over = m.p95_latency_ms - thresholds.max_p95_latency_ms;
        score -= LATENCY_WEIGHT * overshoot(over, thresholds.max_p95_latency_ms);
        failures.push(format!("p95 latency {:.2}ms above {:.2}ms", m.p95_latency_ms, thresholds.max_p95_latency_ms));
    }
    if m.throughput_rps < thresholds.min_throughput_rps {
        let under = thresholds.min_throughput_rps - m.throughput_rps;
        score -= THROUGHPUT_WEIGHT * overshoot(under, thresholds.min_throughput_rps);
        failures.push(format!("throughput {:.2}rps below {:.2}rps", m.throughput_rps, thresholds.min_throughput_rps));
    }
    if m.error_rate_percent > thresholds.max_error_rate_percent {
        let over = m.error_rate_percent - thresholds.max_error_rate_percent;
        score -= ERROR_WEIGHT * overshoot(over, thresholds.max_error_rate_percent);
        failures.push(format!(
            "error rate {:.2}% above {:.2}%",
            m.error_rate_percent, thresholds.max_error_rate_percent
        ));
    }
    if m.samples < thresholds.min_samples {
        score -= SAMPLE_PENALTY;
        failures.push(format!("{} samples below minimum {}", m.samples, thresholds.min_samples));
    }

    Ok(PerfVerdict {
        build: m.build.clone(),
        passed: failures.is_empty(),
        score: round2(f64::max(score, 0.0)),
        failures,
    })
}
