// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! fleetd library
//!
//! Composition root for the fleet control-plane core: configuration,
//! logging, the command executor, and the daemon lifecycle.

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

pub mod bridge;
pub mod command;
pub mod config;
pub mod env;
pub mod lifecycle;
pub mod logging;

pub use command::CommandExecutor;
pub use config::{Config, ConfigError};
pub use lifecycle::{Daemon, DaemonError};
