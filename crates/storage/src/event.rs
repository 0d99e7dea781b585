// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Audit event record and chain hashing.

use chrono::{DateTime, Utc};
use fleet_core::time_fmt::rfc3339_nanos;
use fleet_core::value::canonical_map_json;
use fleet_core::JsonMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};

pub const HASH_PREFIX: &str = "sha256:";

/// A sealed event as retained by the [`EventStore`](crate::EventStore).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub time: DateTime<Utc>,
    #[serde(rename = "type")]
    pub event_type: String,
    pub message: String,
    #[serde(default)]
    pub fields: JsonMap,
    #[serde(default)]
    pub hash: String,
}

impl Event {
    pub fn new(
        time: DateTime<Utc>,
        event_type: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            time,
            event_type: event_type.into(),
            message: message.into(),
            fields: JsonMap::new(),
            hash: String::new(),
        }
    }
}

/// An event before it is appended. A missing time is stamped at append.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EventDraft {
    pub time: Option<DateTime<Utc>>,
    pub event_type: String,
    pub message: String,
    pub fields: JsonMap,
}

impl EventDraft {
    pub fn new(event_type: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            time: None,
            event_type: event_type.into(),
            message: message.into(),
            fields: JsonMap::new(),
        }
    }

    pub fn at(mut self, time: DateTime<Utc>) -> Self {
        self.time = Some(time);
        self
    }

    pub fn field(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(key.into(), value.into());
        self
    }
}

/// `"sha256:" + hex(sha256(prev_hash || time || type || message || canonical_json(fields)))`
pub fn seal(prev_hash: &str, event: &Event) -> String {
    let mut hasher = Sha256::new();
    hasher.update(prev_hash.as_bytes());
    hasher.update(rfc3339_nanos(&event.time).as_bytes());
    hasher.update(event.event_type.as_bytes());
    hasher.update(event.message.as_bytes());
    hasher.update(canonical_map_json(&event.fields).as_bytes());
    format!("{}{:x}", HASH_PREFIX, hasher.finalize())
}
