// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! fleet-storage: bounded, hash-chained audit event log.

mod event;
mod event_log;

pub use event::{seal, Event, EventDraft, HASH_PREFIX};
pub use event_log::{EventQuery, EventStore, IntegrityReport, IntegrityViolation, SubscriberId};
