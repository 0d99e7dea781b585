// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Cross-crate scenarios for the fleet control-plane core.

#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(clippy::panic)]

use std::sync::Arc;
use std::time::Duration;

use fleet_core::{Clock, ErrorKind, FakeClock, JobStatus, Kinded, Priority};
use fleet_engine::{FakeExecutor, Queue, QueueConfig};
use fleet_eval::reboot::{RebootHost, RebootPolicy};
use fleet_eval::{Evaluations, MergeError, MergeStrategy, ResolveRequest, VariableLayer, VariableResolver};
use fleet_storage::{EventDraft, EventStore};
use fleet_vault::{
    EncryptedSecretStore, MaterializeRequest, RotateRequest, RuntimeSecretError, RuntimeSecretStore, UpsertRequest,
};
use serde_json::json;
use similar_asserts::assert_eq;

async fn wait_until_settled<C: Clock>(queue: &Queue<C>, count: usize) {
    for _ in 0..300 {
        if queue.list().iter().filter(|j| j.is_terminal()).count() >= count {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("queue never settled {count} job(s)");
}

#[tokio::test]
async fn queue_priority_and_idempotency() {
    let queue = Queue::new(QueueConfig::with_buffer(4));
    let exec = FakeExecutor::new();

    let first = queue.enqueue("A", Some("k1"), false, Priority::Low).unwrap();
    let second = queue.enqueue("B", Some(""), false, Priority::High).unwrap();
    let third = queue.enqueue("A", Some("k1"), false, Priority::High).unwrap();

    assert_eq!(third.id, first.id);
    assert_eq!(third.priority, Priority::Low);
    assert_ne!(second.id, first.id);
    assert_eq!(second.idempotency_key, None);
    assert_eq!(queue.list().len(), 2);

    queue.start(Arc::new(exec.clone())).unwrap();
    wait_until_settled(&queue, 2).await;

    assert_eq!(exec.calls(), vec!["B", "A"]);
    assert!(queue.list().iter().all(|j| j.status == JobStatus::Succeeded));

    queue.stop();
    queue.wait().await;
}

#[test]
fn event_chain_detects_tampering() {
    let events = EventStore::new(100);
    events.append(EventDraft::new("a", "one"));
    events.append(EventDraft::new("b", "two"));

    let report = events.verify_integrity();
    assert!(report.valid);
    assert_eq!(report.checked, 2);

    assert!(events.tamper_with(1, |e| e.hash = "sha256:tampered".to_string()));

    let report = events.verify_integrity();
    assert!(!report.valid);
    assert_eq!(report.violations[0].index, 1);
}

#[test]
fn envelope_rotation_bumps_version_and_extends_expiry() {
    let clock = FakeClock::new();
    let store = EncryptedSecretStore::with_clock(clock.clone());

    store.upsert(UpsertRequest::new("db_password", "s3cr3t-v1").ttl_seconds(3600)).unwrap();
    clock.advance(Duration::from_secs(30 * 60));
    store
        .rotate("db_password", RotateRequest::new().value("s3cr3t-v2").extend_ttl_seconds(7200))
        .unwrap();

    let resolved = store.resolve("db_password").unwrap();
    assert_eq!(resolved.version, 2);
    assert_eq!(resolved.value, "s3cr3t-v2");
    assert_eq!(resolved.expires_at, Some(clock.utc() + chrono::Duration::seconds(7200)));

    let meta = store.get("db_password").unwrap();
    assert_eq!(meta.rotation_count, 1);
    assert_eq!(meta.envelope.dek_cipher, "aes-256-gcm");
    assert_eq!(meta.envelope.content_cipher, "aes-256-gcm");
}

#[test]
fn runtime_secret_is_consumed_once() {
    let clock = FakeClock::new();
    let store = RuntimeSecretStore::with_clock(clock.clone());
    let request = || MaterializeRequest::new("x", 120).entry("db_user", "svc").entry("db_pass", "top");

    let session = store.materialize(request()).unwrap();
    clock.advance(Duration::from_secs(10));

    let consumed = store.consume(&session.id.to_string()).unwrap();
    assert_eq!(serde_json::Value::Object(consumed.data), json!({"db_user": "svc", "db_pass": "top"}));
    assert!(consumed.session.consumed);

    let err = store.consume(&session.id.to_string()).unwrap_err();
    assert!(matches!(err, RuntimeSecretError::AlreadyConsumed(_)));
    assert_eq!(err.kind(), ErrorKind::Conflict);

    let late = store.materialize(request()).unwrap();
    clock.advance(Duration::from_secs(121));
    let err = store.consume(&late.id.to_string()).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::SessionExpired);
}

#[test]
fn hard_fail_merge_returns_partial_result() {
    let layers = vec![
        VariableLayer::from_value("a", json!({"x": "one"})),
        VariableLayer::from_value("b", json!({"x": "two"})),
    ];
    let req = ResolveRequest::new(layers).strategy(MergeStrategy::MergeLast).hard_fail(true);

    let err = VariableResolver::resolve(&req).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::PrecedenceConflict);
    assert!(matches!(err, MergeError::PrecedenceConflict { count: 1, .. }));

    let partial = err.partial().unwrap();
    assert_eq!(serde_json::Value::Object(partial.merged.clone()), json!({"x": "two"}));
    assert_eq!(partial.conflicts.len(), 1);
    assert_eq!(partial.conflicts[0].previous_layer, "a");
    assert_eq!(partial.conflicts[0].current_layer, "b");
}

#[test]
fn reboot_plan_orders_waves_by_dependency() {
    let evaluations = Evaluations::with_clock(FakeClock::new(), 10);
    let policy = RebootPolicy::new("prod", 2, 75.0).dependency_order(["db", "api"]);
    let hosts = [
        RebootHost::new("db-1", "db", true),
        RebootHost::new("db-2", "db", true),
        RebootHost::new("api-1", "api", true),
        RebootHost::new("api-2", "api", true),
    ];

    let recorded = evaluations.plan_reboot(&policy, &hosts).unwrap();
    let plan = &recorded.record;
    assert!(plan.allowed);
    assert_eq!(plan.waves.len(), 2);
    assert_eq!(plan.waves[0].hosts, vec!["db-1", "db-2"]);
    assert_eq!(plan.waves[1].hosts, vec!["api-1", "api-2"]);
    assert_eq!(evaluations.reboot_plans().get(&recorded.id).unwrap().record, *plan);
}

#[tokio::test]
async fn recovery_leaves_no_job_running_past_max_age() {
    let clock = FakeClock::new();
    let queue = Queue::with_clock(QueueConfig::with_buffer(4), clock.clone());
    let exec = FakeExecutor::gated();
    queue.enqueue("slow.yaml", None, false, Priority::Normal).unwrap();
    queue.start(Arc::new(exec.clone())).unwrap();

    for _ in 0..300 {
        if queue.running() == 1 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    clock.advance(Duration::from_secs(120));

    let recovered = queue.recover_stuck_jobs(Duration::from_secs(60));
    assert_eq!(recovered.len(), 1);
    let now = clock.utc();
    assert!(!queue.list().iter().any(|j| {
        j.status == JobStatus::Running && j.running_for(now).is_some_and(|age| age >= chrono::Duration::seconds(60))
    }));

    exec.release(1);
    queue.stop();
    queue.wait().await;
}
