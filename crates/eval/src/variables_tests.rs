// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use proptest::prelude::*;
use serde_json::json;
use similar_asserts::assert_eq;

fn layer(name: &str, data: Value) -> VariableLayer {
    VariableLayer::from_value(name, data)
}

fn resolve(strategy: MergeStrategy, layers: Vec<VariableLayer>) -> Resolution {
    VariableResolver::resolve(&ResolveRequest::new(layers).strategy(strategy)).unwrap()
}

#[test]
fn merge_last_recurses_and_later_wins() {
    let out = resolve(
        MergeStrategy::MergeLast,
        vec![
            layer("base", json!({"app": {"port": 80, "name": "web"}, "region": "eu"})),
            layer("prod", json!({"app": {"port": 443}})),
        ],
    );
    assert_eq!(Value::Object(out.merged), json!({"app": {"port": 443, "name": "web"}, "region": "eu"}));
    assert_eq!(out.precedence, vec!["base", "prod"]);
    assert_eq!(out.conflicts.len(), 1);
    let conflict = &out.conflicts[0];
    assert_eq!(conflict.path, "app.port");
    assert_eq!(conflict.previous_layer, "base");
    assert_eq!(conflict.current_layer, "prod");
    assert_eq!(conflict.previous_value, json!(80));
    assert_eq!(conflict.current_value, json!(443));
}

#[test]
fn source_graph_records_set_and_override() {
    let out = resolve(
        MergeStrategy::MergeLast,
        vec![layer("a", json!({"x": 1, "nested": {"y": 1}})), layer("b", json!({"x": 2}))],
    );
    let edges: Vec<_> =
        out.source_graph.iter().map(|e| (e.path.as_str(), e.from.as_str(), e.to.as_str(), e.action)).collect();
    assert_eq!(
        edges,
        vec![
            ("nested", "", "a", EdgeAction::Set),
            ("x", "", "a", EdgeAction::Set),
            ("x", "a", "b", EdgeAction::Override),
        ]
    );
}

#[test]
fn equal_values_override_without_conflict() {
    let out = resolve(MergeStrategy::MergeLast, vec![layer("a", json!({"x": [1, 2]})), layer("b", json!({"x": [1, 2]}))]);
    assert!(out.conflicts.is_empty());
    assert_eq!(out.source_graph.last().unwrap().action, EdgeAction::Override);
}

#[test]
fn merge_first_keeps_earlier_value() {
    let out = resolve(
        MergeStrategy::MergeFirst,
        vec![layer("a", json!({"x": "one", "m": {"k": 1}})), layer("b", json!({"x": "two", "m": {"j": 2}}))],
    );
    assert_eq!(Value::Object(out.merged), json!({"x": "one", "m": {"k": 1, "j": 2}}));
    assert_eq!(out.conflicts.len(), 1);
    assert_eq!(out.conflicts[0].resolution, "earlier layer value kept (merge-first)");
    assert!(out.source_graph.iter().all(|e| e.action == EdgeAction::Set));
}

#[test]
fn overwrite_replaces_whole_subtree() {
    let out = resolve(
        MergeStrategy::Overwrite,
        vec![layer("a", json!({"app": {"port": 80, "name": "web"}})), layer("b", json!({"app": {"port": 443}}))],
    );
    assert_eq!(Value::Object(out.merged), json!({"app": {"port": 443}}));
    assert_eq!(out.conflicts.len(), 1);
    assert_eq!(out.conflicts[0].path, "app");
}

#[test]
fn remove_deletes_null_paths() {
    let out = resolve(
        MergeStrategy::Remove,
        vec![
            layer("a", json!({"app": {"debug": true, "port": 80}, "legacy": 1})),
            layer("b", json!({"app": {"debug": null}, "legacy": null, "absent": null})),
        ],
    );
    assert_eq!(Value::Object(out.merged), json!({"app": {"port": 80}}));
    let removed: Vec<_> = out.conflicts.iter().map(|c| c.path.as_str()).collect();
    assert_eq!(removed, vec!["app.debug", "legacy"]);
}

#[test]
fn null_is_a_value_outside_remove() {
    let out = resolve(MergeStrategy::MergeLast, vec![layer("a", json!({"x": 1})), layer("b", json!({"x": null}))]);
    assert_eq!(Value::Object(out.merged), json!({"x": null}));
}

#[test]
fn repeated_overrides_warn_with_latest_source() {
    let out = resolve(
        MergeStrategy::MergeLast,
        vec![layer("a", json!({"x": 1})), layer("b", json!({"x": 2})), layer("c", json!({"x": 3}))],
    );
    assert_eq!(out.warnings, vec!["x overridden 2 times; final value from c"]);
    assert_eq!(out.conflicts[1].previous_layer, "b");
}

#[test]
fn hard_fail_returns_partial_result() {
    let req = ResolveRequest::new(vec![layer("a", json!({"x": "one"})), layer("b", json!({"x": "two"}))])
        .hard_fail(true);
    let err = VariableResolver::resolve(&req).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::PrecedenceConflict);

    let partial = err.partial().unwrap();
    assert_eq!(Value::Object(partial.merged.clone()), json!({"x": "two"}));
    assert_eq!(partial.conflicts.len(), 1);
    assert_eq!(partial.conflicts[0].previous_layer, "a");
    assert_eq!(partial.conflicts[0].current_layer, "b");
}

#[test]
fn hard_fail_without_conflicts_succeeds() {
    let req = ResolveRequest::new(vec![layer("a", json!({"x": 1})), layer("b", json!({"y": 2}))]).hard_fail(true);
    assert!(VariableResolver::resolve(&req).is_ok());
}

#[yare::parameterized(
    nested  = { "app.db.host", Some(json!("db-1")) },
    top     = { "region", Some(json!("eu")) },
    missing = { "app.db.port", None },
    through_scalar = { "region.name", None },
    empty   = { "", None },
)]
fn lookup_paths(path: &str, expected: Option<Value>) {
    let map = json!({"app": {"db": {"host": "db-1"}}, "region": "eu"});
    let map = map.as_object().unwrap();
    similar_asserts::assert_eq!(VariableResolver::lookup(map, path).cloned(), expected);
}

#[test]
fn lookup_in_request_uses_default() {
    let req = ResolveRequest::new(vec![layer("a", json!({"x": 1}))]).lookup("y.z").default_value(json!("fallback"));
    let out = VariableResolver::resolve(&req).unwrap();
    let lookup = out.lookup.unwrap();
    assert!(!lookup.found);
    assert_eq!(lookup.value, json!("fallback"));
    assert_eq!(VariableResolver::lookup_or(&out.merged, "x", json!(0)), json!(1));
}

#[test]
fn strategy_parsing() {
    assert_eq!(MergeStrategy::parse("").unwrap(), MergeStrategy::MergeLast);
    assert_eq!(MergeStrategy::parse(" Merge-First ").unwrap(), MergeStrategy::MergeFirst);
    assert_eq!(MergeStrategy::parse("union").unwrap_err().kind(), ErrorKind::ValidationError);
    let req: ResolveRequest = serde_json::from_value(json!({"layers": [], "strategy": "overwrite"})).unwrap();
    assert_eq!(req.strategy, MergeStrategy::Overwrite);
}

#[test]
fn empty_layer_name_is_rejected() {
    let err = VariableResolver::resolve(&ResolveRequest::new(vec![layer(" ", json!({}))])).unwrap_err();
    assert!(matches!(err, MergeError::EmptyLayerName(0)));
}

fn arb_value() -> impl Strategy<Value = Value> {
    let leaf = prop_oneof![
        Just(Value::Null),
        any::<bool>().prop_map(Value::from),
        (-50i64..50).prop_map(Value::from),
        "[a-c]{0,3}".prop_map(Value::from),
    ];
    leaf.prop_recursive(3, 16, 3, |inner| {
        prop::collection::btree_map("[a-d]", inner, 0..3)
            .prop_map(|m| Value::Object(m.into_iter().collect()))
    })
}

fn arb_layers() -> impl Strategy<Value = Vec<VariableLayer>> {
    prop::collection::vec(prop::collection::btree_map("[a-d]", arb_value(), 0..4), 0..4).prop_map(|maps| {
        maps.into_iter().enumerate().map(|(i, m)| VariableLayer::new(format!("l{i}"), m.into_iter().collect())).collect()
    })
}

proptest! {
    #[test]
    fn merge_is_deterministic(layers in arb_layers(), strategy in prop_oneof![
        Just(MergeStrategy::MergeLast),
        Just(MergeStrategy::MergeFirst),
        Just(MergeStrategy::Overwrite),
        Just(MergeStrategy::Remove),
    ]) {
        let req = ResolveRequest::new(layers).strategy(strategy);
        let a = VariableResolver::resolve(&req).unwrap();
        let b = VariableResolver::resolve(&req.clone()).unwrap();
        prop_assert_eq!(a, b);
    }
}
