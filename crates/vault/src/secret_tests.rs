// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use fleet_core::FakeClock;
use proptest::prelude::*;

fn store() -> (EncryptedSecretStore<FakeClock>, FakeClock) {
    let clock = FakeClock::new();
    (EncryptedSecretStore::with_clock(clock.clone()), clock)
}

#[test]
fn upsert_then_resolve() {
    let (store, _clock) = store();
    let meta = store.upsert(UpsertRequest::new("  DB_Password ", " s3cr3t ").label("team", "core")).unwrap();
    assert_eq!(meta.name, "db_password");
    assert_eq!(meta.version, 1);
    assert_eq!(meta.rotation_count, 0);
    assert_eq!(meta.expires_at, None);
    assert_eq!(meta.envelope.dek_cipher, "aes-256-gcm");
    assert_eq!(meta.envelope.content_cipher, "aes-256-gcm");
    assert_eq!(meta.labels.get("team").map(String::as_str), Some("core"));

    let resolved = store.resolve("db_password").unwrap();
    assert_eq!(resolved.value, "s3cr3t");
    assert_eq!(resolved.version, 1);
    assert!(!format!("{resolved:?}").contains("s3cr3t"));
}

#[test]
fn upsert_existing_bumps_version_and_keeps_created_at() {
    let (store, clock) = store();
    let first = store.upsert(UpsertRequest::new("token", "a")).unwrap();
    clock.advance(std::time::Duration::from_secs(60));
    let second = store.upsert(UpsertRequest::new("TOKEN", "b")).unwrap();

    assert_eq!(second.version, 2);
    assert_eq!(second.created_at, first.created_at);
    assert_eq!(second.updated_at, clock.utc());
    assert_eq!(store.resolve("token").unwrap().value, "b");
}

#[yare::parameterized(
    empty_name   = { "  ", "v", None, false, ErrorKind::ValidationError },
    empty_value  = { "n", "  ", None, false, ErrorKind::ValidationError },
    negative_ttl = { "n", "v", Some(-1), false, ErrorKind::ValidationError },
    both_expiry  = { "n", "v", Some(60), true, ErrorKind::ValidationError },
)]
fn upsert_rejects(name: &str, value: &str, ttl: Option<i64>, with_expiry: bool, kind: ErrorKind) {
    let (store, clock) = store();
    let mut req = UpsertRequest::new(name, value);
    req.ttl_seconds = ttl;
    if with_expiry {
        req.expires_at = Some(clock.utc() + Duration::hours(1));
    }
    assert_eq!(store.upsert(req).unwrap_err().kind(), kind);
    assert!(store.list().is_empty());
}

#[test]
fn expiry_in_past_is_rejected() {
    let (store, clock) = store();
    let err = store.upsert(UpsertRequest::new("n", "v").expires_at(clock.utc() - Duration::seconds(1))).unwrap_err();
    assert!(matches!(err, SecretError::ExpiryInPast(_)));
}

#[test]
fn ttl_expiry_and_expired_listing() {
    let (store, clock) = store();
    store.upsert(UpsertRequest::new("short", "v").ttl_seconds(60)).unwrap();
    store.upsert(UpsertRequest::new("forever", "v")).unwrap();

    clock.advance(std::time::Duration::from_secs(59));
    assert!(store.resolve("short").is_ok());
    assert!(store.expired().is_empty());

    clock.advance(std::time::Duration::from_secs(1));
    let err = store.resolve("short").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::SecretExpired);

    let expired: Vec<_> = store.expired().into_iter().map(|m| m.name).collect();
    assert_eq!(expired, vec!["short"]);
    // Not evicted.
    assert_eq!(store.list().len(), 2);
}

#[test]
fn rotate_with_new_value_and_extended_ttl() {
    let (store, clock) = store();
    store.upsert(UpsertRequest::new("db_password", "s3cr3t-v1").ttl_seconds(3600)).unwrap();
    clock.advance(std::time::Duration::from_secs(30 * 60));

    let meta = store
        .rotate("db_password", RotateRequest::new().value("s3cr3t-v2").extend_ttl_seconds(7200))
        .unwrap();
    assert_eq!(meta.version, 2);
    assert_eq!(meta.rotation_count, 1);
    assert_eq!(meta.expires_at, Some(clock.utc() + Duration::seconds(7200)));

    let resolved = store.resolve("db_password").unwrap();
    assert_eq!(resolved.value, "s3cr3t-v2");
    assert_eq!(resolved.version, 2);
}

#[test]
fn rotate_without_value_reseals_current_value() {
    let (store, _clock) = store();
    store.upsert(UpsertRequest::new("token", "abc").ttl_seconds(600)).unwrap();
    let before = store.get("token").unwrap();

    let meta = store.rotate("token", RotateRequest::new()).unwrap();
    assert_eq!(meta.version, 2);
    assert_eq!(meta.expires_at, before.expires_at);
    assert_eq!(store.resolve("token").unwrap().value, "abc");

    let upserted = store.upsert(UpsertRequest::new("token", "def")).unwrap();
    assert_eq!(upserted.rotation_count, 1);
    assert_eq!(upserted.version, 3);
}

#[test]
fn rotate_expired_or_missing_is_rejected() {
    let (store, clock) = store();
    store.upsert(UpsertRequest::new("token", "abc").ttl_seconds(30)).unwrap();
    clock.advance(std::time::Duration::from_secs(30));

    let err = store.rotate("token", RotateRequest::new().value("new")).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::SecretExpired);
    assert_eq!(store.get("token").unwrap().version, 1);

    let err = store.rotate("missing", RotateRequest::new()).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
    assert!(matches!(store.rotate("token", RotateRequest::new().value(" ")), Err(SecretError::EmptyValue)));
}

#[test]
fn swapped_envelopes_fail_integrity() {
    let (store, _clock) = store();
    store.upsert(UpsertRequest::new("alpha", "one")).unwrap();
    store.upsert(UpsertRequest::new("beta", "two")).unwrap();
    {
        let mut items = store.items.write();
        let alpha = items.get("alpha").unwrap().sealed.clone();
        let beta = items.get("beta").unwrap().sealed.clone();
        items.get_mut("alpha").unwrap().sealed = beta;
        items.get_mut("beta").unwrap().sealed = alpha;
    }

    let err = store.resolve("alpha").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::IntegrityViolation);
    assert_eq!(store.resolve("beta").unwrap_err().kind(), ErrorKind::IntegrityViolation);
}

#[test]
fn get_list_and_delete() {
    let (store, _clock) = store();
    store.upsert(UpsertRequest::new("zeta", "1")).unwrap();
    store.upsert(UpsertRequest::new("alpha", "2")).unwrap();

    let names: Vec<_> = store.list().into_iter().map(|m| m.name).collect();
    assert_eq!(names, vec!["alpha", "zeta"]);
    assert_eq!(store.get("ALPHA").unwrap().version, 1);

    assert!(store.delete("alpha"));
    assert!(!store.delete("alpha"));
    assert!(store.get("alpha").is_none());
    assert_eq!(store.resolve("alpha").unwrap_err().kind(), ErrorKind::NotFound);
}

#[test]
fn metadata_serializes_without_value() {
    let (store, _clock) = store();
    let meta = store.upsert(UpsertRequest::new("token", "hunter2")).unwrap();
    let json = serde_json::to_string(&meta).unwrap();
    assert!(!json.contains("hunter2"));
    assert!(json.contains(r#""expires_at":"""#));
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn round_trips_large_utf8(value in "[\\PC]{1,64}", repeat in 1usize..300) {
        let value = value.repeat(repeat);
        prop_assume!(!value.trim().is_empty());
        let (store, _clock) = store();
        store.upsert(UpsertRequest::new("blob", value.clone())).unwrap();
        prop_assert_eq!(store.resolve("blob").unwrap().value, value.trim());
    }
}

#[test]
fn round_trips_sixteen_kib() {
    let (store, _clock) = store();
    let value = "ü".repeat(8 * 1024) + "end";
    assert!(value.len() >= 16 * 1024);
    store.upsert(UpsertRequest::new("blob", value.clone())).unwrap();
    assert_eq!(store.resolve("blob").unwrap().value, value);
}
