// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Maintenance windows.
//!
//! A window blocks scheduled dispatch to its host, cluster, or environment
//! while `starts_at <= now < ends_at`.

use chrono::{DateTime, Utc};
use fleet_core::{ErrorKind, Kinded, SeqGen};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use thiserror::Error;

fleet_core::define_id! {
    /// Identifier of a maintenance window, `maint-window-<seq>`.
    pub struct WindowId("maint-window-");
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WindowScope {
    Host,
    Cluster,
    Environment,
}

fleet_core::simple_display! {
    WindowScope {
        Host => "host",
        Cluster => "cluster",
        Environment => "environment",
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MaintenanceWindow {
    pub id: WindowId,
    pub scope: WindowScope,
    pub target: String,
    pub starts_at: DateTime<Utc>,
    pub ends_at: DateTime<Utc>,
    #[serde(default)]
    pub reason: String,
}

impl MaintenanceWindow {
    pub fn is_active(&self, at: DateTime<Utc>) -> bool {
        self.starts_at <= at && at < self.ends_at
    }

    fn covers(&self, host: Option<&str>, cluster: Option<&str>, environment: Option<&str>) -> bool {
        let subject = match self.scope {
            WindowScope::Host => host,
            WindowScope::Cluster => cluster,
            WindowScope::Environment => environment,
        };
        subject.is_some_and(|s| s.trim() == self.target)
    }
}

#[derive(Debug, Error)]
pub enum WindowError {
    #[error("maintenance window target must not be empty")]
    EmptyTarget,
    #[error("maintenance window must end after it starts")]
    EndsBeforeStart,
}

impl Kinded for WindowError {
    fn kind(&self) -> ErrorKind {
        ErrorKind::ValidationError
    }
}

/// Maintenance lookup used by the scheduler.
pub trait MaintenanceWindows: Send + Sync {
    fn in_maintenance(
        &self,
        host: Option<&str>,
        cluster: Option<&str>,
        environment: Option<&str>,
        at: DateTime<Utc>,
    ) -> bool;
}

/// Calendar with no windows.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoMaintenance;

impl MaintenanceWindows for NoMaintenance {
    fn in_maintenance(&self, _: Option<&str>, _: Option<&str>, _: Option<&str>, _: DateTime<Utc>) -> bool {
        false
    }
}

#[derive(Debug, Default)]
pub struct MaintenanceCalendar {
    seq: SeqGen,
    windows: RwLock<Vec<MaintenanceWindow>>,
}

impl MaintenanceCalendar {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(
        &self,
        scope: WindowScope,
        target: &str,
        starts_at: DateTime<Utc>,
        ends_at: DateTime<Utc>,
        reason: &str,
    ) -> Result<MaintenanceWindow, WindowError> {
        let target = target.trim();
        if target.is_empty() {
            return Err(WindowError::EmptyTarget);
        }
        if ends_at <= starts_at {
            return Err(WindowError::EndsBeforeStart);
        }
        let window = MaintenanceWindow {
            id: WindowId::from_seq(self.seq.next()),
            scope,
            target: target.to_string(),
            starts_at,
            ends_at,
            reason: reason.trim().to_string(),
        };
        tracing::info!(window_id = %window.id, %scope, target, %starts_at, %ends_at, "maintenance window added");
        self.windows.write().push(window.clone());
        Ok(window)
    }

    pub fn remove(&self, id: &str) -> bool {
        let mut windows = self.windows.write();
        let before = windows.len();
        windows.retain(|w| w.id != id);
        windows.len() != before
    }

    pub fn list(&self) -> Vec<MaintenanceWindow> {
        self.windows.read().clone()
    }

    pub fn active_at(&self, at: DateTime<Utc>) -> Vec<MaintenanceWindow> {
        self.windows.read().iter().filter(|w| w.is_active(at)).cloned().collect()
    }
}

impl MaintenanceWindows for MaintenanceCalendar {
    fn in_maintenance(
        &self,
        host: Option<&str>,
        cluster: Option<&str>,
        environment: Option<&str>,
        at: DateTime<Utc>,
    ) -> bool {
        self.windows.read().iter().any(|w| w.is_active(at) && w.covers(host, cluster, environment))
    }
}

#[cfg(test)]
#[path = "maintenance_tests.rs"]
mod tests;
