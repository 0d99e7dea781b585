// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Helpers for recursively JSON-like values.
//!
//! JSON round-trip is the canonical cloning rule and defines value equality.
//! Canonical JSON sorts object keys at every level so hashes and equality do
//! not depend on insertion order.

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};

/// JSON object alias used for free-form payloads (event fields, layers).
pub type JsonMap = Map<String, Value>;

/// Return a copy of `value` with object keys sorted recursively.
pub fn canonicalize(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            let mut out = Map::new();
            for key in keys {
                if let Some(v) = map.get(key) {
                    out.insert(key.clone(), canonicalize(v));
                }
            }
            Value::Object(out)
        }
        Value::Array(items) => Value::Array(items.iter().map(canonicalize).collect()),
        other => other.clone(),
    }
}

/// Canonical JSON text for a value.
pub fn canonical_json(value: &Value) -> String {
    canonicalize(value).to_string()
}

/// Canonical JSON text for an object map.
pub fn canonical_map_json(map: &JsonMap) -> String {
    canonical_json(&Value::Object(map.clone()))
}

/// Canonical JSON text for any serializable input.
pub fn canonical_json_of<T: Serialize>(input: &T) -> Result<String, serde_json::Error> {
    Ok(canonical_json(&serde_json::to_value(input)?))
}

/// Deep clone through a JSON round-trip.
pub fn deep_clone<T: Serialize + DeserializeOwned>(input: &T) -> Result<T, serde_json::Error> {
    serde_json::from_value(serde_json::to_value(input)?)
}

/// Value equality under canonical JSON.
pub fn json_eq(a: &Value, b: &Value) -> bool {
    canonical_json(a) == canonical_json(b)
}

const FNV_OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;

/// 64-bit FNV-1a.
pub fn fnv1a64(bytes: &[u8]) -> u64 {
    let mut hash = FNV_OFFSET;
    for b in bytes {
        hash ^= u64::from(*b);
        hash = hash.wrapping_mul(FNV_PRIME);
    }
    hash
}

/// FNV-1a over the canonical JSON of `input`. Serialization failures hash the
/// empty string so evaluators stay total.
pub fn fnv1a_json<T: Serialize>(input: &T) -> u64 {
    fnv1a64(canonical_json_of(input).unwrap_or_default().as_bytes())
}

/// Map a hash onto `[0, 1)` with four decimal digits of resolution.
pub fn unit_fraction(hash: u64) -> f64 {
    (hash % 10_000) as f64 / 10_000.0
}

/// Round to two decimal places.
pub fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

#[cfg(test)]
#[path = "value_tests.rs"]
mod tests;
