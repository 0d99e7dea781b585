// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! fleet-core: shared data model and concurrency helpers for the fleet
//! control-plane core.

pub mod macros;

pub mod clock;
pub mod error;
pub mod id;
pub mod job;
pub mod ledger;
pub mod priority;
pub mod schedule;
pub mod time_fmt;
pub mod value;

pub use clock::{Clock, FakeClock, SystemClock};
pub use error::{ErrorBody, ErrorKind, Kinded};
pub use id::SeqGen;
pub use job::{Job, JobId, JobStatus};
pub use ledger::{Ledger, Recorded};
pub use priority::Priority;
pub use schedule::{Schedule, ScheduleId};
pub use value::JsonMap;
