// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Layered variable merge with conflict tracking.
//!
//! Layers are applied in order. Every key the merge touches produces a
//! source-graph edge; replacing a value with a different one produces a
//! conflict entry. Object keys are visited in sorted order, so identical
//! layers always yield identical output.

use fleet_core::value::json_eq;
use fleet_core::{ErrorKind, JsonMap, Kinded};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum MergeStrategy {
    #[default]
    #[serde(rename = "merge-last")]
    MergeLast,
    #[serde(rename = "merge-first")]
    MergeFirst,
    #[serde(rename = "overwrite")]
    Overwrite,
    #[serde(rename = "remove")]
    Remove,
}

fleet_core::simple_display! {
    MergeStrategy {
        MergeLast => "merge-last",
        MergeFirst => "merge-first",
        Overwrite => "overwrite",
        Remove => "remove",
    }
}

impl MergeStrategy {
    /// Parse a strategy name; blank input selects the default.
    pub fn parse(input: &str) -> Result<Self, MergeError> {
        match input.trim().to_ascii_lowercase().as_str() {
            "" | "merge-last" => Ok(MergeStrategy::MergeLast),
            "merge-first" => Ok(MergeStrategy::MergeFirst),
            "overwrite" => Ok(MergeStrategy::Overwrite),
            "remove" => Ok(MergeStrategy::Remove),
            other => Err(MergeError::UnknownStrategy(other.to_string())),
        }
    }

    fn resolution_note(self) -> &'static str {
        match self {
            MergeStrategy::MergeLast => "later layer value wins (merge-last)",
            MergeStrategy::MergeFirst => "earlier layer value kept (merge-first)",
            MergeStrategy::Overwrite => "later layer replaces the whole key (overwrite)",
            MergeStrategy::Remove => "later layer value wins; null removes the key (remove)",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VariableLayer {
    pub name: String,
    #[serde(default)]
    pub data: JsonMap,
}

impl VariableLayer {
    pub fn new(name: impl Into<String>, data: JsonMap) -> Self {
        Self { name: name.into(), data }
    }

    /// Build a layer from a JSON object literal. Non-objects become empty layers.
    pub fn from_value(name: impl Into<String>, data: Value) -> Self {
        match data {
            Value::Object(map) => Self::new(name, map),
            _ => Self::new(name, JsonMap::new()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ResolveRequest {
    pub layers: Vec<VariableLayer>,
    #[serde(default)]
    pub strategy: MergeStrategy,
    #[serde(default)]
    pub hard_fail: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lookup: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
}

impl ResolveRequest {
    pub fn new(layers: Vec<VariableLayer>) -> Self {
        Self { layers, strategy: MergeStrategy::default(), hard_fail: false, lookup: None, default: None }
    }

    fleet_core::setters! {
        set { strategy: MergeStrategy, hard_fail: bool }
        option { lookup: String }
    }

    /// Value returned by the lookup when the path is absent.
    pub fn default_value(mut self, value: impl Into<Value>) -> Self {
        self.default = Some(value.into());
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EdgeAction {
    Set,
    Override,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceEdge {
    pub path: String,
    /// Layer that held the path before; empty for a first assignment.
    pub from: String,
    pub to: String,
    pub action: EdgeAction,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Conflict {
    pub path: String,
    pub previous_layer: String,
    pub current_layer: String,
    pub previous_value: Value,
    pub current_value: Value,
    pub resolution: String,
    pub hint: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LookupResult {
    pub path: String,
    pub found: bool,
    pub value: Value,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Resolution {
    pub merged: JsonMap,
    pub precedence: Vec<String>,
    pub conflicts: Vec<Conflict>,
    pub warnings: Vec<String>,
    pub source_graph: Vec<SourceEdge>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lookup: Option<LookupResult>,
}

#[derive(Debug, Error)]
pub enum MergeError {
    #[error("unknown merge strategy: {0}")]
    UnknownStrategy(String),
    #[error("layer {0} has an empty name")]
    EmptyLayerName(usize),
    #[error("precedence conflict on {count} path(s), first at {first_path}")]
    PrecedenceConflict { count: usize, first_path: String, partial: Box<Resolution> },
}

impl MergeError {
    /// Partial merge result carried by a hard-fail conflict.
    pub fn partial(&self) -> Option<&Resolution> {
        match self {
            MergeError::PrecedenceConflict { partial, .. } => Some(partial),
            _ => None,
        }
    }
}

impl Kinded for MergeError {
    fn kind(&self) -> ErrorKind {
        match self {
            MergeError::UnknownStrategy(_) | MergeError::EmptyLayerName(_) => ErrorKind::ValidationError,
            MergeError::PrecedenceConflict { .. } => ErrorKind::PrecedenceConflict,
        }
    }
}

/// Override count at which a path is reported in `warnings`.
const WARN_OVERRIDES: u32 = 2;

struct Merger {
    strategy: MergeStrategy,
    sources: HashMap<String, String>,
    overrides: BTreeMap<String, (u32, String)>,
    conflicts: Vec<Conflict>,
    edges: Vec<SourceEdge>,
}

fn join(prefix: &str, key: &str) -> String {
    if prefix.is_empty() {
        key.to_string()
    } else {
        format!("{prefix}.{key}")
    }
}

impl Merger {
    fn new(strategy: MergeStrategy) -> Self {
        Self {
            strategy,
            sources: HashMap::new(),
            overrides: BTreeMap::new(),
            conflicts: Vec::new(),
            edges: Vec::new(),
        }
    }

    /// Layer that last wrote `path` or its nearest ancestor.
    fn source_of(&self, path: &str) -> String {
        let mut current = path;
        loop {
            if let Some(layer) = self.sources.get(current) {
                return layer.clone();
            }
            match current.rfind('.') {
                Some(idx) => current = &current[..idx],
                None => return String::new(),
            }
        }
    }

    fn set(&mut self, path: &str, layer: &str) {
        self.edges.push(SourceEdge {
            path: path.to_string(),
            from: String::new(),
            to: layer.to_string(),
            action: EdgeAction::Set,
        });
        self.sources.insert(path.to_string(), layer.to_string());
    }

    fn overridden(&mut self, path: &str, layer: &str) {
        let from = self.source_of(path);
        self.edges.push(SourceEdge {
            path: path.to_string(),
            from,
            to: layer.to_string(),
            action: EdgeAction::Override,
        });
        let descendants = format!("{path}.");
        self.sources.retain(|p, _| !p.starts_with(&descendants));
        self.sources.insert(path.to_string(), layer.to_string());
        let entry = self.overrides.entry(path.to_string()).or_insert((0, String::new()));
        entry.0 += 1;
        entry.1 = layer.to_string();
    }

    fn conflict(&mut self, path: &str, layer: &str, previous: &Value, current: &Value) {
        self.conflicts.push(Conflict {
            path: path.to_string(),
            previous_layer: self.source_of(path),
            current_layer: layer.to_string(),
            previous_value: previous.clone(),
            current_value: current.clone(),
            resolution: self.strategy.resolution_note().to_string(),
            hint: format!("define {path} in a single layer or reorder the layers"),
        });
    }

    fn merge(&mut self, target: &mut JsonMap, incoming: &JsonMap, prefix: &str, layer: &str) {
        for (key, value) in incoming {
            let path = join(prefix, key);
            let Some(existing) = target.get_mut(key) else {
                if self.strategy == MergeStrategy::Remove && value.is_null() {
                    continue;
                }
                target.insert(key.clone(), value.clone());
                self.set(&path, layer);
                continue;
            };

            match self.strategy {
                MergeStrategy::Overwrite => {
                    if !json_eq(existing, value) {
                        self.conflict(&path, layer, existing, value);
                    }
                    *existing = value.clone();
                    self.overridden(&path, layer);
                }
                MergeStrategy::Remove if value.is_null() => {
                    let previous = existing.clone();
                    self.conflict(&path, layer, &previous, value);
                    target.remove(key);
                    self.overridden(&path, layer);
                }
                MergeStrategy::MergeLast | MergeStrategy::Remove => {
                    if existing.is_object() && value.is_object() {
                        if let (Some(inner), Some(incoming)) = (existing.as_object_mut(), value.as_object()) {
                            self.merge(inner, incoming, &path, layer);
                        }
                        continue;
                    }
                    if !json_eq(existing, value) {
                        self.conflict(&path, layer, existing, value);
                        *existing = value.clone();
                    }
                    self.overridden(&path, layer);
                }
                MergeStrategy::MergeFirst => {
                    if existing.is_object() && value.is_object() {
                        if let (Some(inner), Some(incoming)) = (existing.as_object_mut(), value.as_object()) {
                            self.merge(inner, incoming, &path, layer);
                        }
                    } else if !json_eq(existing, value) {
                        self.conflict(&path, layer, existing, value);
                    }
                }
            }
        }
    }

    fn warnings(&self) -> Vec<String> {
        self.overrides
            .iter()
            .filter(|(_, (count, _))| *count >= WARN_OVERRIDES)
            .map(|(path, (count, latest))| format!("{path} overridden {count} times; final value from {latest}"))
            .collect()
    }
}

/// Pure layer-merge entry points.
pub struct VariableResolver;

impl VariableResolver {
    pub fn resolve(req: &ResolveRequest) -> Result<Resolution, MergeError> {
        if let Some(index) = req.layers.iter().position(|l| l.name.trim().is_empty()) {
            return Err(MergeError::EmptyLayerName(index));
        }

        let mut merger = Merger::new(req.strategy);
        let mut merged = JsonMap::new();
        for layer in &req.layers {
            merger.merge(&mut merged, &layer.data, "", layer.name.trim());
        }

        let lookup = req.lookup.as_deref().map(|path| {
            let found = Self::lookup(&merged, path);
            LookupResult {
                path: path.to_string(),
                found: found.is_some(),
                value: found.cloned().or_else(|| req.default.clone()).unwrap_or(Value::Null),
            }
        });

        let resolution = Resolution {
            precedence: req.layers.iter().map(|l| l.name.trim().to_string()).collect(),
            warnings: merger.warnings(),
            conflicts: merger.conflicts,
            source_graph: merger.edges,
            merged,
            lookup,
        };

        if req.hard_fail {
            if let Some(first) = resolution.conflicts.first() {
                tracing::warn!(conflicts = resolution.conflicts.len(), path = %first.path, "variable merge hard-failed");
                return Err(MergeError::PrecedenceConflict {
                    count: resolution.conflicts.len(),
                    first_path: first.path.clone(),
                    partial: Box::new(resolution),
                });
            }
        }
        Ok(resolution)
    }

    /// Navigate a dot-separated path through nested objects.
    pub fn lookup<'a>(map: &'a JsonMap, path: &str) -> Option<&'a Value> {
        let mut parts = path.split('.');
        let mut current = map.get(parts.next()?)?;
        for part in parts {
            current = current.as_object()?.get(part)?;
        }
        Some(current)
    }

    /// [`VariableResolver::lookup`] with a fallback.
    pub fn lookup_or(map: &JsonMap, path: &str, default: Value) -> Value {
        Self::lookup(map, path).cloned().unwrap_or(default)
    }
}

#[cfg(test)]
#[path = "variables_tests.rs"]
mod tests;
