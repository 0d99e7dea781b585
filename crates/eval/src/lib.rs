// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! fleet-eval: layered variable merge and deterministic admission and
//! planning evaluators.

pub mod cost;
pub mod distribution;
pub mod drift;
mod error;
pub mod evaluations;
pub mod perf;
pub mod pillar;
pub mod preflight;
pub mod rate;
pub mod reboot;
pub mod soak;
pub mod topology;
pub mod upgrade;
pub mod variables;

pub use error::EvalError;
pub use evaluations::{Evaluations, DEFAULT_RETENTION};
pub use pillar::{Pillar, PillarResolver, PillarScope, PillarTarget};
pub use variables::{
    Conflict, EdgeAction, LookupResult, MergeError, MergeStrategy, Resolution, ResolveRequest, SourceEdge,
    VariableLayer, VariableResolver,
};
