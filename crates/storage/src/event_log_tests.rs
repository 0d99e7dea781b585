// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use fleet_core::FakeClock;
use proptest::prelude::*;
use std::time::Duration;

fn store(capacity: usize) -> (EventStore<FakeClock>, FakeClock) {
    let clock = FakeClock::new();
    (EventStore::with_clock(capacity, clock.clone()), clock)
}

#[test]
fn append_stamps_time_and_chains_hashes() {
    let (store, clock) = store(8);
    let first = store.append(EventDraft::new("a", "one"));
    let second = store.append(EventDraft::new("b", "two"));

    assert_eq!(first.time, clock.utc());
    assert!(first.hash.starts_with("sha256:"));
    assert_eq!(first.hash.len(), "sha256:".len() + 64);
    assert_eq!(first.hash, seal("", &first));
    assert_eq!(second.hash, seal(&first.hash, &second));
    assert_eq!(store.last_hash(), second.hash);
}

#[test]
fn explicit_time_is_preserved() {
    let (store, clock) = store(8);
    let at = clock.utc() - chrono::Duration::hours(1);
    let e = store.append(EventDraft::new("a", "past").at(at));
    assert_eq!(e.time, at);
}

#[test]
fn chain_verifies_then_detects_tampered_hash() {
    let (store, _) = store(8);
    store.append(EventDraft::new("a", "one"));
    store.append(EventDraft::new("b", "two"));

    let report = store.verify_integrity();
    assert!(report.valid);
    assert_eq!(report.checked, 2);

    store.ring.write().events[1].hash = "sha256:tampered".to_string();
    let report = store.verify_integrity();
    assert!(!report.valid);
    assert_eq!(report.violations.len(), 1);
    assert_eq!(report.violations[0].index, 1);
    assert_eq!(report.violations[0].got_hash, "sha256:tampered");
    assert_eq!(report.violations[0].reason, "hash mismatch");
}

#[test]
fn tampered_message_is_flagged_at_its_index() {
    let (store, _) = store(8);
    for i in 0..4 {
        store.append(EventDraft::new("job.state", format!("m{i}")));
    }
    assert!(store.tamper_with(2, |e| e.message = "rewritten".into()));
    let report = store.verify_integrity();
    assert_eq!(report.violations.iter().map(|v| v.index).collect::<Vec<_>>(), vec![2]);
}

#[test]
fn missing_prefix_is_reported() {
    let (store, _) = store(8);
    store.append(EventDraft::new("a", "one"));
    store.tamper_with(0, |e| e.hash = "deadbeef".into());
    let report = store.verify_integrity();
    assert_eq!(report.violations[0].reason, "malformed hash prefix");
}

#[test]
fn eviction_is_fifo_and_chain_still_verifies() {
    let (store, _) = store(3);
    for i in 0..5 {
        store.append(EventDraft::new("t", format!("e{i}")));
    }
    assert_eq!(store.len(), 3);
    let messages: Vec<_> =
        store.query(&EventQuery::default()).into_iter().map(|e| e.message).collect();
    assert_eq!(messages, vec!["e2", "e3", "e4"]);
    assert!(store.verify_integrity().valid);
}

#[test]
fn replace_reseals_and_discards_old_hashes() {
    let (store, clock) = store(8);
    store.append(EventDraft::new("old", "gone"));
    let mut a = Event::new(clock.utc(), "a", "one");
    a.hash = "sha256:stale".into();
    let b = Event::new(clock.utc() + chrono::Duration::seconds(1), "b", "two");

    store.replace(vec![a.clone(), b.clone()]);

    let events = store.query(&EventQuery::default());
    assert_eq!(events.len(), 2);
    assert_eq!(events[0].time, a.time);
    assert_eq!(events[0].hash, seal("", &events[0]));
    assert_eq!(events[1].hash, seal(&events[0].hash, &events[1]));
    assert!(store.verify_integrity().valid);
}

#[test]
fn query_filters_and_orders() {
    let (store, clock) = store(16);
    store.append(EventDraft::new("job.pending", "Queued web"));
    clock.advance(Duration::from_secs(10));
    let cutoff = clock.utc();
    store.append(EventDraft::new("job.running", "Running WEB apply"));
    clock.advance(Duration::from_secs(10));
    store.append(EventDraft::new("secret.rotated", "rotated db"));
    store.append(EventDraft::new("job.succeeded", "web done"));

    let q = EventQuery {
        since: Some(cutoff),
        type_prefix: Some("job.".into()),
        contains: Some("web".into()),
        ..Default::default()
    };
    let got: Vec<_> = store.query(&q).into_iter().map(|e| e.event_type).collect();
    assert_eq!(got, vec!["job.running", "job.succeeded"]);

    let q = EventQuery { limit: 2, desc: true, ..Default::default() };
    let got: Vec<_> = store.query(&q).into_iter().map(|e| e.event_type).collect();
    assert_eq!(got, vec!["job.succeeded", "secret.rotated"]);
}

#[tokio::test]
async fn subscribers_receive_appends_and_drop_when_full() {
    let (store, _) = store(16);
    let (id, mut rx) = store.subscribe(1);
    store.append(EventDraft::new("a", "first"));
    store.append(EventDraft::new("b", "dropped"));

    let got = rx.recv().await.unwrap();
    assert_eq!(got.message, "first");
    assert!(rx.try_recv().is_err());

    assert!(store.unsubscribe(id));
    assert!(rx.recv().await.is_none());
    assert!(!store.unsubscribe(id));
}

#[test]
fn dropped_receivers_are_pruned() {
    let (store, _) = store(4);
    let (_, rx) = store.subscribe(4);
    drop(rx);
    assert_eq!(store.subscriber_count(), 1);
    store.append(EventDraft::new("a", "x"));
    assert_eq!(store.subscriber_count(), 0);
}

#[yare::parameterized(
    empty_fields  = { serde_json::json!({}) },
    nested_fields = { serde_json::json!({"job": {"id": "job-1", "status": "running"}, "n": 3}) },
)]
fn fields_participate_in_hash(fields: serde_json::Value) {
    let (store, _) = store(4);
    let mut draft = EventDraft::new("t", "m");
    if let serde_json::Value::Object(map) = fields {
        draft.fields = map;
    }
    store.append(draft);
    store.tamper_with(0, |e| {
        e.fields.insert("injected".into(), serde_json::json!(true));
    });
    assert!(!store.verify_integrity().valid);
}

proptest! {
    #[test]
    fn any_append_sequence_verifies(
        capacity in 1usize..6,
        messages in proptest::collection::vec("[a-z ]{0,12}", 0..20),
    ) {
        let (store, clock) = store(capacity);
        for (i, m) in messages.iter().enumerate() {
            clock.advance(Duration::from_millis(i as u64));
            store.append(EventDraft::new("p", m.clone()).field("i", i as u64));
        }
        let report = store.verify_integrity();
        prop_assert!(report.valid);
        prop_assert_eq!(report.checked, messages.len().min(capacity));
    }
}
