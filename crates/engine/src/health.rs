// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Last-known host health.

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Health lookup used by the scheduler. `None` means the host is unknown,
/// which never blocks dispatch.
pub trait HostHealth: Send + Sync {
    fn is_healthy(&self, host: &str) -> Option<bool>;
}

/// Health source that knows no hosts.
#[derive(Debug, Clone, Copy, Default)]
pub struct UnknownHealth;

impl HostHealth for UnknownHealth {
    fn is_healthy(&self, _host: &str) -> Option<bool> {
        None
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostHealthRecord {
    pub host: String,
    pub healthy: bool,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub detail: String,
    pub reported_at: DateTime<Utc>,
}

/// Host health reports, latest report wins.
#[derive(Debug, Default)]
pub struct HealthBoard {
    hosts: RwLock<BTreeMap<String, HostHealthRecord>>,
}

impl HealthBoard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn report(&self, host: &str, healthy: bool, detail: &str, at: DateTime<Utc>) -> HostHealthRecord {
        let host = host.trim().to_string();
        let record = HostHealthRecord { host: host.clone(), healthy, detail: detail.trim().to_string(), reported_at: at };
        if !healthy {
            tracing::warn!(%host, detail = %record.detail, "host reported unhealthy");
        }
        self.hosts.write().insert(host, record.clone());
        record
    }

    pub fn get(&self, host: &str) -> Option<HostHealthRecord> {
        self.hosts.read().get(host.trim()).cloned()
    }

    /// Records sorted by host name.
    pub fn list(&self) -> Vec<HostHealthRecord> {
        self.hosts.read().values().cloned().collect()
    }

    pub fn forget(&self, host: &str) -> bool {
        self.hosts.write().remove(host.trim()).is_some()
    }
}

impl HostHealth for HealthBoard {
    fn is_healthy(&self, host: &str) -> Option<bool> {
        self.hosts.read().get(host.trim()).map(|r| r.healthy)
    }
}
