// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! fleet-engine: apply queue, worker, and periodic scheduler.

pub mod executor;
pub mod health;
pub mod lifecycle;
pub mod maintenance;
pub mod queue;
pub mod scheduler;
pub mod worker;

#[cfg(any(test, feature = "test-support"))]
pub mod test_support;

pub use executor::{ApplyError, Executor};
pub use health::{HealthBoard, HostHealth, HostHealthRecord, UnknownHealth};
pub use lifecycle::{WorkerLifecyclePolicy, WorkerMode, WorkerStats};
pub use maintenance::{
    MaintenanceCalendar, MaintenanceWindow, MaintenanceWindows, NoMaintenance, WindowError, WindowId, WindowScope,
};
pub use queue::{ControlStatus, Queue, QueueConfig, QueueError};
pub use scheduler::{
    DispatchDecision, DispatchPolicy, ScheduleOptions, Scheduler, SchedulerDeps, SchedulerError, SkipReason,
    TickOutcome,
};

#[cfg(any(test, feature = "test-support"))]
pub use test_support::FakeExecutor;
