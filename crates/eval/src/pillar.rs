// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Scoped variable layers.
//!
//! A pillar is a named layer bound to a scope. Resolving for a target picks
//! every pillar whose scope matches and hands them to the variable resolver
//! ordered from broadest to narrowest scope.

use crate::error::EvalError;
use crate::variables::{MergeStrategy, Resolution, ResolveRequest, VariableLayer, VariableResolver};
use fleet_core::JsonMap;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum PillarScope {
    Global,
    Environment(String),
    Cluster(String),
    Host(String),
}

impl PillarScope {
    /// Merge rank; narrower scopes apply later.
    fn rank(&self) -> u8 {
        match self {
            PillarScope::Global => 0,
            PillarScope::Environment(_) => 1,
            PillarScope::Cluster(_) => 2,
            PillarScope::Host(_) => 3,
        }
    }

    fn matches(&self, target: &PillarTarget) -> bool {
        match self {
            PillarScope::Global => true,
            PillarScope::Environment(env) => target.environment.as_deref() == Some(env.as_str()),
            PillarScope::Cluster(cluster) => target.cluster.as_deref() == Some(cluster.as_str()),
            PillarScope::Host(host) => target.host == *host,
        }
    }
}

impl std::fmt::Display for PillarScope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PillarScope::Global => f.write_str("global"),
            PillarScope::Environment(name) => write!(f, "environment:{name}"),
            PillarScope::Cluster(name) => write!(f, "cluster:{name}"),
            PillarScope::Host(name) => write!(f, "host:{name}"),
        }
    }
}

impl std::str::FromStr for PillarScope {
    type Err = EvalError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s == "global" {
            return Ok(PillarScope::Global);
        }
        let (kind, name) =
            s.split_once(':').ok_or_else(|| EvalError::invalid("scope", format!("unrecognised scope {s:?}")))?;
        let name = name.trim();
        if name.is_empty() {
            return Err(EvalError::invalid("scope", format!("scope {s:?} has no name")));
        }
        match kind.trim() {
            "environment" | "env" => Ok(PillarScope::Environment(name.to_string())),
            "cluster" => Ok(PillarScope::Cluster(name.to_string())),
            "host" => Ok(PillarScope::Host(name.to_string())),
            other => Err(EvalError::invalid("scope", format!("unknown scope kind {other:?}"))),
        }
    }
}

impl TryFrom<String> for PillarScope {
    type Error = EvalError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<PillarScope> for String {
    fn from(scope: PillarScope) -> Self {
        scope.to_string()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pillar {
    pub name: String,
    pub scope: PillarScope,
    #[serde(default)]
    pub data: JsonMap,
}

impl Pillar {
    pub fn new(name: impl Into<String>, scope: PillarScope, data: JsonMap) -> Self {
        Self { name: name.into(), scope, data }
    }
}

/// What a pillar resolution is computed for.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PillarTarget {
    pub host: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cluster: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub environment: Option<String>,
}

impl PillarTarget {
    pub fn host(host: impl Into<String>) -> Self {
        Self { host: host.into(), ..Self::default() }
    }

    fleet_core::setters! {
        option { cluster: String, environment: String }
    }
}

/// Registry of pillars in registration order.
#[derive(Default)]
pub struct PillarResolver {
    pillars: RwLock<Vec<Pillar>>,
}

impl PillarResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, pillar: Pillar) -> Result<Pillar, EvalError> {
        let name = pillar.name.trim().to_string();
        if name.is_empty() {
            return Err(EvalError::invalid("name", "pillar name must not be empty"));
        }
        let pillar = Pillar { name, ..pillar };

        let mut pillars = self.pillars.write();
        if pillars.iter().any(|p| p.name == pillar.name) {
            return Err(EvalError::DuplicatePillar(pillar.name));
        }
        tracing::debug!(pillar = %pillar.name, scope = %pillar.scope, "pillar registered");
        pillars.push(pillar.clone());
        Ok(pillar)
    }

    pub fn remove(&self, name: &str) -> Result<Pillar, EvalError> {
        let mut pillars = self.pillars.write();
        let index = pillars
            .iter()
            .position(|p| p.name == name)
            .ok_or_else(|| EvalError::PillarNotFound(name.to_string()))?;
        Ok(pillars.remove(index))
    }

    pub fn list(&self) -> Vec<Pillar> {
        self.pillars.read().clone()
    }

    /// Pillars applying to `target`, broadest scope first.
    pub fn matching(&self, target: &PillarTarget) -> Vec<Pillar> {
        let mut matched: Vec<Pillar> =
            self.pillars.read().iter().filter(|p| p.scope.matches(target)).cloned().collect();
        matched.sort_by_key(|p| p.scope.rank());
        matched
    }

    pub fn resolve(
        &self,
        target: &PillarTarget,
        strategy: MergeStrategy,
        hard_fail: bool,
    ) -> Result<Resolution, EvalError> {
        if target.host.trim().is_empty() {
            return Err(EvalError::invalid("host", "target host must not be empty"));
        }
        let layers =
            self.matching(target).into_iter().map(|p| VariableLayer::new(p.name, p.data)).collect();
        let req = ResolveRequest::new(layers).strategy(strategy).hard_fail(hard_fail);
        Ok(VariableResolver::resolve(&req)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fleet_core::{ErrorKind, Kinded};
    use serde_json::{json, Value};

    fn data(v: Value) -> JsonMap {
        v.as_object().cloned().unwrap_or_default()
    }

    fn resolver() -> PillarResolver {
        let r = PillarResolver::new();
        r.register(Pillar::new("web-host", PillarScope::Host("web-1".into()), data(json!({"port": 8443}))))
            .unwrap();
        r.register(Pillar::new("defaults", PillarScope::Global, data(json!({"port": 80, "tier": "std"}))))
            .unwrap();
        r.register(Pillar::new(
            "prod",
            PillarScope::Environment("prod".into()),
            data(json!({"tier": "gold", "port": 443})),
        ))
        .unwrap();
        r.register(Pillar::new("eu", PillarScope::Cluster("eu".into()), data(json!({"region": "eu"})))).unwrap();
        r
    }

    #[test]
    fn resolves_broadest_to_narrowest() {
        let target = PillarTarget::host("web-1").environment("prod").cluster("eu");
        let out = resolver().resolve(&target, MergeStrategy::MergeLast, false).unwrap();
        assert_eq!(out.precedence, vec!["defaults", "prod", "eu", "web-host"]);
        assert_eq!(Value::Object(out.merged), json!({"port": 8443, "tier": "gold", "region": "eu"}));
        assert_eq!(out.warnings, vec!["port overridden 2 times; final value from web-host"]);
    }

    #[test]
    fn non_matching_scopes_are_skipped() {
        let out = resolver().resolve(&PillarTarget::host("db-1"), MergeStrategy::MergeLast, false).unwrap();
        assert_eq!(out.precedence, vec!["defaults"]);
    }

    #[test]
    fn hard_fail_surfaces_precedence_conflict() {
        let target = PillarTarget::host("db-1").environment("prod");
        let err = resolver().resolve(&target, MergeStrategy::MergeLast, true).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::PrecedenceConflict);
    }

    #[test]
    fn duplicate_and_missing_names() {
        let r = resolver();
        let err = r.register(Pillar::new(" prod ", PillarScope::Global, JsonMap::new())).unwrap_err();
        assert!(matches!(err, EvalError::DuplicatePillar(ref n) if n == "prod"));
        assert_eq!(r.remove("prod").unwrap().name, "prod");
        assert_eq!(r.remove("prod").unwrap_err().kind(), ErrorKind::NotFound);
        assert_eq!(r.list().len(), 3);
    }

    #[yare::parameterized(
        global  = { "global", PillarScope::Global },
        env     = { "environment:prod", PillarScope::Environment("prod".into()) },
        env_alias = { "env:prod", PillarScope::Environment("prod".into()) },
        cluster = { "cluster:eu", PillarScope::Cluster("eu".into()) },
        host    = { " host:web-1 ", PillarScope::Host("web-1".into()) },
    )]
    fn scope_parsing(input: &str, expected: PillarScope) {
        assert_eq!(input.parse::<PillarScope>().unwrap(), expected);
    }

    #[test]
    fn scope_serde_uses_strings() {
        let pillar: Pillar = serde_json::from_value(json!({"name": "p", "scope": "cluster:eu"})).unwrap();
        assert_eq!(pillar.scope, PillarScope::Cluster("eu".into()));
        assert_eq!(serde_json::to_value(&pillar.scope).unwrap(), json!("cluster:eu"));
        assert!(serde_json::from_value::<Pillar>(json!({"name": "p", "scope": "rack:1"})).is_err());
        assert!("host:".parse::<PillarScope>().is_err());
    }
}
