// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! One-shot runtime secret sessions.
//!
//! A session holds a canonical JSON payload that can be read exactly once.
//! Consume, destroy, and expiry all zero the buffer. Expiry is applied
//! lazily on every operation, which also evicts the oldest terminal
//! sessions once more than the retention limit are held.

use chrono::{DateTime, Duration, Utc};
use fleet_core::value::canonical_map_json;
use fleet_core::{Clock, ErrorKind, JsonMap, Kinded, SeqGen, SystemClock};
use indexmap::IndexMap;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use zeroize::{Zeroize, Zeroizing};

pub const MIN_TTL_SECONDS: i64 = 30;
pub const MAX_TTL_SECONDS: i64 = 3600;

fleet_core::define_id! {
    /// Identifier of a runtime secret session, `runtime-secret-<seq>`.
    pub struct RuntimeSecretId("runtime-secret-");
}

#[derive(Debug, Error)]
pub enum RuntimeSecretError {
    #[error("source must not be empty")]
    EmptySource,
    #[error("ttl_seconds must be within [30, 3600], got {0}")]
    TtlOutOfRange(i64),
    #[error("runtime secret not found: {0}")]
    NotFound(String),
    #[error("runtime secret {0} already_consumed")]
    AlreadyConsumed(RuntimeSecretId),
    #[error("runtime secret {0} destroyed")]
    Destroyed(RuntimeSecretId),
    #[error("runtime secret {id} expired at {expired_at}")]
    SessionExpired { id: RuntimeSecretId, expired_at: DateTime<Utc> },
    #[error("runtime secret {id} payload is unreadable: {source}")]
    Corrupt { id: RuntimeSecretId, source: serde_json::Error },
}

impl Kinded for RuntimeSecretError {
    fn kind(&self) -> ErrorKind {
        match self {
            RuntimeSecretError::EmptySource | RuntimeSecretError::TtlOutOfRange(_) => ErrorKind::ValidationError,
            RuntimeSecretError::NotFound(_) => ErrorKind::NotFound,
            RuntimeSecretError::AlreadyConsumed(_) | RuntimeSecretError::Destroyed(_) => ErrorKind::Conflict,
            RuntimeSecretError::SessionExpired { .. } => ErrorKind::SessionExpired,
            RuntimeSecretError::Corrupt { .. } => ErrorKind::IntegrityViolation,
        }
    }
}

#[derive(Clone, Default)]
pub struct MaterializeRequest {
    pub source: String,
    pub data: JsonMap,
    pub ttl_seconds: i64,
}

impl MaterializeRequest {
    pub fn new(source: impl Into<String>, ttl_seconds: i64) -> Self {
        Self { source: source.into(), data: JsonMap::new(), ttl_seconds }
    }

    pub fn entry(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.data.insert(key.into(), value.into());
        self
    }
}

/// Session descriptor. Never carries the payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuntimeSession {
    pub id: RuntimeSecretId,
    pub source: String,
    pub ttl_seconds: i64,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub consumed: bool,
    #[serde(default, with = "fleet_core::time_fmt::empty_as_none")]
    pub consumed_at: Option<DateTime<Utc>>,
    pub destroyed: bool,
    #[serde(default, with = "fleet_core::time_fmt::empty_as_none")]
    pub destroyed_at: Option<DateTime<Utc>>,
    /// Set when expiry zeroed an unread payload.
    #[serde(default)]
    pub expired: bool,
}

/// Payload handed out by a successful consume.
#[derive(Clone, PartialEq)]
pub struct Consumed {
    pub session: RuntimeSession,
    pub data: JsonMap,
}

impl std::fmt::Debug for Consumed {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Consumed")
            .field("session", &self.session)
            .field("keys", &self.data.keys().collect::<Vec<_>>())
            .finish()
    }
}

struct Entry {
    session: RuntimeSession,
    payload: Zeroizing<Vec<u8>>,
}

impl Entry {
    fn wipe(&mut self) {
        self.payload.zeroize();
    }

    fn is_terminal(&self) -> bool {
        self.session.consumed || self.session.destroyed || self.session.expired
    }
}

/// Terminal sessions kept for `get`/`list` before the oldest are evicted.
pub const DEFAULT_RETAINED_SESSIONS: usize = 1_024;

/// Short-lived, single-read secret sessions.
pub struct RuntimeSecretStore<C: Clock = SystemClock> {
    clock: C,
    seq: SeqGen,
    retention: usize,
    entries: Mutex<IndexMap<String, Entry>>,
}

impl RuntimeSecretStore<SystemClock> {
    pub fn new() -> Self {
        Self::with_clock(SystemClock)
    }
}

impl Default for RuntimeSecretStore<SystemClock> {
    fn default() -> Self {
        Self::new()
    }
}

/// Zero payloads whose session has expired unread, then evict the oldest
/// terminal sessions beyond `retention`.
fn sweep(entries: &mut IndexMap<String, Entry>, now: DateTime<Utc>, retention: usize) {
    for entry in entries.values_mut() {
        let s = &entry.session;
        if !s.expired && !s.consumed && !s.destroyed && now >= s.expires_at {
            entry.wipe();
            entry.session.expired = true;
            tracing::info!(session_id = %entry.session.id, "runtime secret expired");
        }
    }

    let mut excess = entries.values().filter(|e| e.is_terminal()).count().saturating_sub(retention);
    if excess > 0 {
        entries.retain(|_, entry| {
            if excess > 0 && entry.is_terminal() {
                excess -= 1;
                false
            } else {
                true
            }
        });
    }
}

fn find<'a>(entries: &'a mut IndexMap<String, Entry>, id: &str) -> Result<&'a mut Entry, RuntimeSecretError> {
    entries.get_mut(id).ok_or_else(|| RuntimeSecretError::NotFound(id.to_string()))
}

impl<C: Clock> RuntimeSecretStore<C> {
    pub fn with_clock(clock: C) -> Self {
        Self::with_retention(clock, DEFAULT_RETAINED_SESSIONS)
    }

    /// Keep at most `retention` consumed, destroyed or expired sessions.
    pub fn with_retention(clock: C, retention: usize) -> Self {
        Self { clock, seq: SeqGen::new(), retention, entries: Mutex::new(IndexMap::new()) }
    }

    pub fn materialize(&self, req: MaterializeRequest) -> Result<RuntimeSession, RuntimeSecretError> {
        let source = req.source.trim();
        if source.is_empty() {
            return Err(RuntimeSecretError::EmptySource);
        }
        if !(MIN_TTL_SECONDS..=MAX_TTL_SECONDS).contains(&req.ttl_seconds) {
            return Err(RuntimeSecretError::TtlOutOfRange(req.ttl_seconds));
        }

        let now = self.clock.utc();
        let mut entries = self.entries.lock();
        sweep(&mut entries, now, self.retention);

        let session = RuntimeSession {
            id: RuntimeSecretId::from_seq(self.seq.next()),
            source: source.to_string(),
            ttl_seconds: req.ttl_seconds,
            created_at: now,
            expires_at: now + Duration::seconds(req.ttl_seconds),
            consumed: false,
            consumed_at: None,
            destroyed: false,
            destroyed_at: None,
            expired: false,
        };
        let payload = Zeroizing::new(canonical_map_json(&req.data).into_bytes());
        entries.insert(session.id.to_string(), Entry { session: session.clone(), payload });
        tracing::info!(session_id = %session.id, source = %session.source, ttl_seconds = session.ttl_seconds, "runtime secret materialized");
        Ok(session)
    }

    /// Read the payload. Succeeds at most once per session.
    pub fn consume(&self, id: &str) -> Result<Consumed, RuntimeSecretError> {
        let now = self.clock.utc();
        let mut entries = self.entries.lock();
        sweep(&mut entries, now, self.retention);
        let entry = find(&mut entries, id)?;

        let session_id = entry.session.id.clone();
        if entry.session.destroyed {
            return Err(RuntimeSecretError::Destroyed(session_id));
        }
        if entry.session.consumed {
            return Err(RuntimeSecretError::AlreadyConsumed(session_id));
        }
        if entry.session.expired || now >= entry.session.expires_at {
            return Err(RuntimeSecretError::SessionExpired { id: session_id, expired_at: entry.session.expires_at });
        }

        let decoded = serde_json::from_slice::<JsonMap>(&entry.payload);
        entry.wipe();
        entry.session.consumed = true;
        entry.session.consumed_at = Some(now);
        let data = decoded.map_err(|source| RuntimeSecretError::Corrupt { id: session_id.clone(), source })?;

        tracing::info!(session_id = %session_id, "runtime secret consumed");
        Ok(Consumed { session: entry.session.clone(), data })
    }

    /// Zero and retire a session. Repeated calls return the first outcome.
    pub fn destroy(&self, id: &str) -> Result<RuntimeSession, RuntimeSecretError> {
        let now = self.clock.utc();
        let mut entries = self.entries.lock();
        sweep(&mut entries, now, self.retention);
        let entry = find(&mut entries, id)?;

        if !entry.session.destroyed {
            entry.wipe();
            entry.session.destroyed = true;
            entry.session.destroyed_at = Some(now);
            if !entry.session.consumed {
                entry.session.consumed = true;
                entry.session.consumed_at = Some(now);
            }
            tracing::info!(session_id = %entry.session.id, "runtime secret destroyed");
        }
        Ok(entry.session.clone())
    }

    pub fn get(&self, id: &str) -> Result<RuntimeSession, RuntimeSecretError> {
        let now = self.clock.utc();
        let mut entries = self.entries.lock();
        sweep(&mut entries, now, self.retention);
        Ok(find(&mut entries, id)?.session.clone())
    }

    /// Sessions in creation order.
    pub fn list(&self) -> Vec<RuntimeSession> {
        let now = self.clock.utc();
        let mut entries = self.entries.lock();
        sweep(&mut entries, now, self.retention);
        entries.values().map(|e| e.session.clone()).collect()
    }

    #[cfg(test)]
    fn payload_len(&self, id: &str) -> usize {
        self.entries.lock().get(id).map_or(0, |e| e.payload.len())
    }
}

#[cfg(test)]
#[path = "runtime_tests.rs"]
mod tests;
