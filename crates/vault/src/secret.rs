// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Envelope-encrypted secret store with versioned rotation and TTL.

use crate::envelope::{EnvelopeError, Kek, Sealed, CIPHER};
use chrono::{DateTime, Duration, Utc};
use fleet_core::{Clock, ErrorKind, Kinded, SystemClock};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;
use zeroize::Zeroizing;

#[derive(Debug, Error)]
pub enum SecretError {
    #[error("secret name must not be empty")]
    EmptyName,
    #[error("secret value must not be empty")]
    EmptyValue,
    #[error("set either expires_at or a ttl, not both")]
    ConflictingExpiry,
    #[error("expires_at {0} is not in the future")]
    ExpiryInPast(DateTime<Utc>),
    #[error("ttl must not be negative, got {0}")]
    NegativeTtl(i64),
    #[error("secret not found: {0}")]
    NotFound(String),
    #[error("secret {name} expired at {expired_at}")]
    Expired { name: String, expired_at: DateTime<Utc> },
    #[error("secret {name} failed integrity check: {source}")]
    Integrity { name: String, source: EnvelopeError },
    #[error("secret {0} did not decrypt to utf-8")]
    NotUtf8(String),
}

impl Kinded for SecretError {
    fn kind(&self) -> ErrorKind {
        match self {
            SecretError::EmptyName
            | SecretError::EmptyValue
            | SecretError::ConflictingExpiry
            | SecretError::ExpiryInPast(_)
            | SecretError::NegativeTtl(_) => ErrorKind::ValidationError,
            SecretError::NotFound(_) => ErrorKind::NotFound,
            SecretError::Expired { .. } => ErrorKind::SecretExpired,
            SecretError::Integrity { .. } | SecretError::NotUtf8(_) => ErrorKind::IntegrityViolation,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvelopeInfo {
    pub dek_cipher: String,
    pub content_cipher: String,
}

impl Default for EnvelopeInfo {
    fn default() -> Self {
        Self { dek_cipher: CIPHER.to_string(), content_cipher: CIPHER.to_string() }
    }
}

/// Public view of a stored secret. Never carries the value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecretMetadata {
    pub name: String,
    pub version: u64,
    #[serde(default)]
    pub labels: BTreeMap<String, String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default, with = "fleet_core::time_fmt::empty_as_none")]
    pub expires_at: Option<DateTime<Utc>>,
    pub rotation_count: u64,
    pub envelope: EnvelopeInfo,
}

impl SecretMetadata {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|at| now >= at)
    }
}

#[derive(Clone, PartialEq, Eq, Serialize)]
pub struct ResolvedSecret {
    pub name: String,
    pub version: u64,
    pub value: String,
    #[serde(with = "fleet_core::time_fmt::empty_as_none")]
    pub expires_at: Option<DateTime<Utc>>,
}

impl std::fmt::Debug for ResolvedSecret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResolvedSecret")
            .field("name", &self.name)
            .field("version", &self.version)
            .field("value", &"<redacted>")
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

#[derive(Clone, Default)]
pub struct UpsertRequest {
    pub name: String,
    pub value: String,
    pub ttl_seconds: Option<i64>,
    pub expires_at: Option<DateTime<Utc>>,
    pub labels: BTreeMap<String, String>,
}

impl UpsertRequest {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self { name: name.into(), value: value.into(), ..Self::default() }
    }

    pub fn label(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.labels.insert(key.into(), value.into());
        self
    }

    fleet_core::setters! {
        option { ttl_seconds: i64, expires_at: DateTime<Utc> }
    }
}

#[derive(Clone, Default)]
pub struct RotateRequest {
    /// Replacement value; the current value is re-sealed when absent.
    pub value: Option<String>,
    /// New expiry of now plus this many seconds.
    pub extend_ttl_seconds: Option<i64>,
    pub expires_at: Option<DateTime<Utc>>,
}

impl RotateRequest {
    pub fn new() -> Self {
        Self::default()
    }

    fleet_core::setters! {
        option { value: String, extend_ttl_seconds: i64, expires_at: DateTime<Utc> }
    }
}

struct StoredSecret {
    meta: SecretMetadata,
    sealed: Sealed,
}

/// Secrets sealed under a process-local key. Nothing survives a restart.
pub struct EncryptedSecretStore<C: Clock = SystemClock> {
    clock: C,
    kek: Kek,
    items: RwLock<BTreeMap<String, StoredSecret>>,
}

impl EncryptedSecretStore<SystemClock> {
    pub fn new() -> Self {
        Self::with_clock(SystemClock)
    }
}

impl Default for EncryptedSecretStore<SystemClock> {
    fn default() -> Self {
        Self::new()
    }
}

fn normalize_name(name: &str) -> Result<String, SecretError> {
    let name = name.trim().to_lowercase();
    if name.is_empty() {
        return Err(SecretError::EmptyName);
    }
    Ok(name)
}

/// Expiry for a write: a ttl, an absolute time, or neither (no expiry).
/// A zero ttl means no expiry.
fn resolve_expiry(
    now: DateTime<Utc>,
    ttl_seconds: Option<i64>,
    expires_at: Option<DateTime<Utc>>,
) -> Result<Option<DateTime<Utc>>, SecretError> {
    match (ttl_seconds, expires_at) {
        (Some(_), Some(_)) => Err(SecretError::ConflictingExpiry),
        (None, Some(at)) if at <= now => Err(SecretError::ExpiryInPast(at)),
        (None, Some(at)) => Ok(Some(at)),
        (Some(ttl), None) if ttl < 0 => Err(SecretError::NegativeTtl(ttl)),
        (Some(0), None) | (None, None) => Ok(None),
        (Some(ttl), None) => Ok(Some(now + Duration::seconds(ttl))),
    }
}

impl<C: Clock> EncryptedSecretStore<C> {
    pub fn with_clock(clock: C) -> Self {
        Self { clock, kek: Kek::generate(), items: RwLock::new(BTreeMap::new()) }
    }

    /// Create or replace a secret. Replacing bumps the version and keeps
    /// `created_at` and `rotation_count`.
    pub fn upsert(&self, req: UpsertRequest) -> Result<SecretMetadata, SecretError> {
        let name = normalize_name(&req.name)?;
        let value = req.value.trim();
        if value.is_empty() {
            return Err(SecretError::EmptyValue);
        }
        let now = self.clock.utc();
        let expires_at = resolve_expiry(now, req.ttl_seconds, req.expires_at)?;
        let sealed = self.seal(&name, value.as_bytes())?;

        let mut items = self.items.write();
        let (version, created_at, rotation_count) = match items.get(&name) {
            Some(existing) => (existing.meta.version + 1, existing.meta.created_at, existing.meta.rotation_count),
            None => (1, now, 0),
        };
        let meta = SecretMetadata {
            name: name.clone(),
            version,
            labels: req.labels,
            created_at,
            updated_at: now,
            expires_at,
            rotation_count,
            envelope: EnvelopeInfo::default(),
        };
        items.insert(name, StoredSecret { meta: meta.clone(), sealed });
        tracing::info!(secret = %meta.name, version, "secret stored");
        Ok(meta)
    }

    pub fn resolve(&self, name: &str) -> Result<ResolvedSecret, SecretError> {
        let name = normalize_name(name)?;
        let now = self.clock.utc();
        let items = self.items.read();
        let item = items.get(&name).ok_or_else(|| SecretError::NotFound(name.clone()))?;
        Self::ensure_live(&item.meta, now)?;

        let plaintext = self.open(&name, &item.sealed)?;
        let value = std::str::from_utf8(&plaintext).map_err(|_| SecretError::NotUtf8(name.clone()))?.to_string();
        Ok(ResolvedSecret { name, version: item.meta.version, value, expires_at: item.meta.expires_at })
    }

    /// Re-seal under fresh key material, optionally with a new value or expiry.
    pub fn rotate(&self, name: &str, req: RotateRequest) -> Result<SecretMetadata, SecretError> {
        let name = normalize_name(name)?;
        let now = self.clock.utc();
        let new_value = match req.value.as_deref().map(str::trim) {
            Some("") => return Err(SecretError::EmptyValue),
            other => other.map(str::to_string),
        };

        let mut items = self.items.write();
        let item = items.get_mut(&name).ok_or_else(|| SecretError::NotFound(name.clone()))?;
        Self::ensure_live(&item.meta, now)?;

        let expires_at = if req.extend_ttl_seconds.is_some() || req.expires_at.is_some() {
            resolve_expiry(now, req.extend_ttl_seconds, req.expires_at)?
        } else {
            item.meta.expires_at
        };

        let sealed = match new_value {
            Some(value) => self.seal(&name, value.as_bytes())?,
            None => {
                let current = self.open(&name, &item.sealed)?;
                self.seal(&name, &current)?
            }
        };

        item.sealed = sealed;
        item.meta.version += 1;
        item.meta.rotation_count += 1;
        item.meta.updated_at = now;
        item.meta.expires_at = expires_at;
        tracing::info!(secret = %name, version = item.meta.version, rotations = item.meta.rotation_count, "secret rotated");
        Ok(item.meta.clone())
    }

    /// Secrets whose expiry has elapsed. They stay stored until replaced or deleted.
    pub fn expired(&self) -> Vec<SecretMetadata> {
        let now = self.clock.utc();
        self.items.read().values().filter(|i| i.meta.is_expired(now)).map(|i| i.meta.clone()).collect()
    }

    pub fn get(&self, name: &str) -> Option<SecretMetadata> {
        let name = normalize_name(name).ok()?;
        self.items.read().get(&name).map(|i| i.meta.clone())
    }

    /// Metadata sorted by name.
    pub fn list(&self) -> Vec<SecretMetadata> {
        self.items.read().values().map(|i| i.meta.clone()).collect()
    }

    pub fn delete(&self, name: &str) -> bool {
        let Ok(name) = normalize_name(name) else {
            return false;
        };
        let removed = self.items.write().remove(&name).is_some();
        if removed {
            tracing::info!(secret = %name, "secret deleted");
        }
        removed
    }

    fn ensure_live(meta: &SecretMetadata, now: DateTime<Utc>) -> Result<(), SecretError> {
        match meta.expires_at {
            Some(at) if now >= at => Err(SecretError::Expired { name: meta.name.clone(), expired_at: at }),
            _ => Ok(()),
        }
    }

    fn seal(&self, name: &str, plaintext: &[u8]) -> Result<Sealed, SecretError> {
        self.kek.seal(name, plaintext).map_err(|source| SecretError::Integrity { name: name.to_string(), source })
    }

    fn open(&self, name: &str, sealed: &Sealed) -> Result<Zeroizing<Vec<u8>>, SecretError> {
        self.kek.open(name, sealed).map_err(|source| {
            tracing::error!(secret = %name, "secret failed authentication");
            SecretError::Integrity { name: name.to_string(), source }
        })
    }
}

#[cfg(test)]
#[path = "secret_tests.rs"]
mod tests;
