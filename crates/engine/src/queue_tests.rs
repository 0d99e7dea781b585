// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use fleet_core::FakeClock;

fn queue(buffer: usize) -> (Queue<FakeClock>, FakeClock) {
    let clock = FakeClock::new();
    (Queue::with_clock(QueueConfig::with_buffer(buffer), clock.clone()), clock)
}

#[test]
fn enqueue_assigns_stamped_ids() {
    let (queue, _clock) = queue(4);
    let a = queue.enqueue("site.yaml", None, false, Priority::Normal).unwrap();
    let b = queue.enqueue("site.yaml", None, false, Priority::Normal).unwrap();

    assert_eq!(a.id, "job-20260101T000000-1");
    assert_eq!(b.id, "job-20260101T000000-2");
    assert_eq!(a.status, JobStatus::Pending);
    assert_eq!(queue.pending(), 2);
}

#[test]
fn idempotent_key_returns_first_job() {
    let (queue, _clock) = queue(4);
    let first = queue.enqueue("a.yaml", Some("k1"), false, Priority::Low).unwrap();
    let again = queue.enqueue("a.yaml", Some("k1"), false, Priority::High).unwrap();

    assert_eq!(again, first);
    assert_eq!(again.priority, Priority::Low);
    assert_eq!(queue.list().len(), 1);
}

#[test]
fn blank_key_is_not_an_idempotency_key() {
    let (queue, _clock) = queue(4);
    let a = queue.enqueue("a.yaml", Some("  "), false, Priority::Normal).unwrap();
    let b = queue.enqueue("a.yaml", Some(""), false, Priority::Normal).unwrap();
    assert_ne!(a.id, b.id);
    assert_eq!(a.idempotency_key, None);
}

#[test]
fn empty_config_path_is_rejected() {
    let (queue, _clock) = queue(4);
    let err = queue.enqueue("   ", None, false, Priority::Normal).unwrap_err();
    assert!(matches!(err, QueueError::EmptyConfigPath));
    assert_eq!(err.kind(), ErrorKind::ValidationError);
}

#[test]
fn full_class_channel_records_nothing() {
    let (queue, _clock) = queue(1);
    queue.enqueue("a.yaml", None, false, Priority::High).unwrap();
    let err = queue.enqueue("b.yaml", Some("k2"), false, Priority::High).unwrap_err();

    assert!(matches!(err, QueueError::BackpressureFull { class: Priority::High }));
    assert_eq!(err.kind(), ErrorKind::BackpressureFull);
    assert!(err.kind().retryable());
    assert_eq!(queue.list().len(), 1);

    // Other classes have their own capacity, and the rejected key stays free.
    queue.enqueue("b.yaml", Some("k2"), false, Priority::Low).unwrap();
}

#[test]
fn emergency_stop_blocks_unless_forced() {
    let (queue, _clock) = queue(4);
    queue.set_emergency_stop("bad rollout");

    let err = queue.enqueue("a.yaml", None, false, Priority::Normal).unwrap_err();
    assert!(matches!(&err, QueueError::EmergencyActive { reason } if reason == "bad rollout"));
    assert_eq!(err.kind(), ErrorKind::EmergencyActive);

    queue.enqueue("a.yaml", None, true, Priority::Normal).unwrap();
    queue.clear_emergency_stop();
    queue.enqueue("b.yaml", None, false, Priority::Normal).unwrap();
}

#[test]
fn idempotent_hit_wins_over_emergency_stop() {
    let (queue, _clock) = queue(4);
    let job = queue.enqueue("a.yaml", Some("k1"), false, Priority::Normal).unwrap();
    queue.set_emergency_stop("halt");
    assert_eq!(queue.enqueue("a.yaml", Some("k1"), false, Priority::Normal).unwrap().id, job.id);
}

#[test]
fn freeze_expires_with_clock() {
    let (queue, clock) = queue(4);
    let until = clock.utc() + chrono::Duration::minutes(10);
    queue.freeze_until(until, "release week");

    let err = queue.enqueue("a.yaml", None, false, Priority::Normal).unwrap_err();
    assert!(matches!(&err, QueueError::FrozenUntil { until: u, .. } if *u == until));
    assert_eq!(err.kind(), ErrorKind::Frozen);
    assert!(queue.enqueue("a.yaml", None, true, Priority::Normal).is_ok());

    clock.advance(Duration::from_secs(600));
    assert!(queue.enqueue("a.yaml", None, false, Priority::Normal).is_ok());
    assert_eq!(queue.control_status().frozen_until, None);
}

#[test]
fn cancel_pending_then_terminal_conflicts() {
    let (queue, clock) = queue(4);
    let job = queue.enqueue("a.yaml", None, false, Priority::Normal).unwrap();
    clock.advance(Duration::from_secs(3));

    let canceled = queue.cancel(&job.id).unwrap();
    assert_eq!(canceled.status, JobStatus::Canceled);
    assert_eq!(canceled.ended_at, Some(clock.utc()));

    let err = queue.cancel(&job.id).unwrap_err();
    assert!(matches!(err, QueueError::AlreadyFinished { status: JobStatus::Canceled, .. }));
    assert_eq!(err.kind(), ErrorKind::Conflict);

    let err = queue.cancel("job-missing").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
}

#[test]
fn claim_skips_canceled_jobs() {
    let (queue, _clock) = queue(4);
    let job = queue.enqueue("a.yaml", None, false, Priority::Normal).unwrap();
    queue.cancel(&job.id).unwrap();
    assert!(queue.claim(&job.id).is_none());
    assert_eq!(queue.running(), 0);
}

#[test]
fn settle_drops_result_for_canceled_running_job() {
    let (queue, _clock) = queue(4);
    let job = queue.enqueue("a.yaml", None, false, Priority::Normal).unwrap();
    queue.claim(&job.id).unwrap();
    assert_eq!(queue.running(), 1);

    queue.cancel(&job.id).unwrap();
    assert!(queue.settle(&job.id, Ok(())).is_none());
    assert_eq!(queue.get(&job.id).unwrap().status, JobStatus::Canceled);
    assert_eq!(queue.running(), 0);
}

#[test]
fn settle_records_error_verbatim() {
    let (queue, _clock) = queue(4);
    let job = queue.enqueue("a.yaml", None, false, Priority::Normal).unwrap();
    queue.claim(&job.id).unwrap();
    let failed = queue.settle(&job.id, Err("exit status 2: no such host".into())).unwrap();
    assert_eq!(failed.status, JobStatus::Failed);
    assert_eq!(failed.error.as_deref(), Some("exit status 2: no such host"));
}

#[test]
fn recover_stuck_jobs_fails_old_running_jobs() {
    let (queue, clock) = queue(4);
    let old = queue.enqueue("old.yaml", None, false, Priority::Normal).unwrap();
    queue.claim(&old.id).unwrap();
    clock.advance(Duration::from_secs(240));
    let young = queue.enqueue("young.yaml", None, false, Priority::Normal).unwrap();
    queue.claim(&young.id).unwrap();
    clock.advance(Duration::from_secs(60));

    let recovered = queue.recover_stuck_jobs(DEFAULT_STUCK_AGE);
    assert_eq!(recovered.len(), 1);
    assert_eq!(recovered[0].id, old.id);
    assert_eq!(recovered[0].error.as_deref(), Some("recovered: job exceeded max running age of 300s"));
    assert_eq!(queue.running(), 1);
    assert_eq!(queue.get(&young.id).unwrap().status, JobStatus::Running);

    // A late executor result for the recovered job is dropped.
    assert!(queue.settle(&old.id, Ok(())).is_none());
    assert_eq!(queue.get(&old.id).unwrap().status, JobStatus::Failed);
}

#[tokio::test]
async fn subscribers_see_every_transition() {
    let (queue, _clock) = queue(4);
    let (_, mut rx) = queue.subscribe(16);

    let job = queue.enqueue("a.yaml", None, false, Priority::Normal).unwrap();
    queue.claim(&job.id).unwrap();
    queue.settle(&job.id, Ok(())).unwrap();

    let statuses: Vec<_> = [rx.recv().await, rx.recv().await, rx.recv().await]
        .into_iter()
        .map(|j| j.unwrap().status)
        .collect();
    assert_eq!(statuses, vec![JobStatus::Pending, JobStatus::Running, JobStatus::Succeeded]);
}

#[tokio::test]
async fn full_subscriber_drops_snapshots() {
    let (queue, _clock) = queue(8);
    let (id, mut rx) = queue.subscribe(1);
    queue.enqueue("a.yaml", None, false, Priority::Normal).unwrap();
    queue.enqueue("b.yaml", None, false, Priority::Normal).unwrap();

    assert_eq!(rx.recv().await.unwrap().config_path, "a.yaml");
    assert!(rx.try_recv().is_err());

    assert!(queue.unsubscribe(id));
    assert!(rx.recv().await.is_none());
}

#[test]
fn history_evicts_oldest_terminal_jobs() {
    let clock = FakeClock::new();
    let queue = Queue::with_clock(QueueConfig::with_buffer(8).history(2), clock);
    let a = queue.enqueue("a.yaml", Some("ka"), false, Priority::Normal).unwrap();
    queue.cancel(&a.id).unwrap();
    let b = queue.enqueue("b.yaml", None, false, Priority::Normal).unwrap();
    let c = queue.enqueue("c.yaml", None, false, Priority::Normal).unwrap();

    let ids: Vec<_> = queue.list().into_iter().map(|j| j.id).collect();
    assert_eq!(ids, vec![b.id, c.id]);
    assert!(queue.get(&a.id).is_none());
}

#[test]
fn evicted_idempotency_key_is_refused_not_reapplied() {
    let clock = FakeClock::new();
    let queue = Queue::with_clock(QueueConfig::with_buffer(8).history(2), clock);
    let first = queue.enqueue("a.yaml", Some("k1"), false, Priority::Normal).unwrap();
    queue.cancel(&first.id).unwrap();
    queue.enqueue("b.yaml", None, false, Priority::Normal).unwrap();
    queue.enqueue("c.yaml", None, false, Priority::Normal).unwrap();
    assert!(queue.get(&first.id).is_none());

    let err = queue.enqueue("a.yaml", Some("k1"), false, Priority::Normal).unwrap_err();
    assert!(matches!(&err, QueueError::KeyEvicted { key, id } if key == "k1" && *id == first.id));
    assert_eq!(err.kind(), ErrorKind::Conflict);
    assert_eq!(queue.list().len(), 2);
}

#[test]
fn control_status_reports_controls_and_counts() {
    let (queue, _clock) = queue(4);
    queue.enqueue("a.yaml", None, false, Priority::Normal).unwrap();
    queue.pause();
    queue.set_emergency_stop("incident");

    let status = queue.control_status();
    assert!(status.paused);
    assert!(status.emergency_stop);
    assert_eq!(status.emergency_reason.as_deref(), Some("incident"));
    assert_eq!(status.pending, 1);
    assert_eq!(status.running, 0);
    assert_eq!(status.worker.generation, 1);

    queue.resume();
    assert!(!queue.is_paused());
}

#[tokio::test]
async fn drain_without_running_jobs_returns_immediately() {
    let (queue, _clock) = queue(4);
    queue.safe_drain(Duration::from_secs(1)).await.unwrap();
    assert!(queue.is_paused());
}

#[tokio::test(start_paused = true)]
async fn drain_times_out_with_running_count() {
    let (queue, _clock) = queue(4);
    let job = queue.enqueue("a.yaml", None, false, Priority::Normal).unwrap();
    queue.claim(&job.id).unwrap();

    let err = queue.safe_drain(Duration::from_millis(200)).await.unwrap_err();
    assert!(matches!(err, QueueError::DrainTimeout { running: 1 }));
    assert_eq!(err.kind(), ErrorKind::DrainTimeout);
}

#[tokio::test(start_paused = true)]
async fn drain_with_zero_timeout_waits_for_completion() {
    let (queue, _clock) = queue(4);
    let job = queue.enqueue("a.yaml", None, false, Priority::Normal).unwrap();
    queue.claim(&job.id).unwrap();

    let finisher = queue.clone();
    let id = job.id.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(60)).await;
        finisher.settle(&id, Ok(()));
    });

    queue.safe_drain(Duration::ZERO).await.unwrap();
    assert_eq!(queue.get(&job.id).unwrap().status, JobStatus::Succeeded);
}

#[test]
fn job_serializes_unset_timestamps_as_empty() {
    let (queue, _clock) = queue(4);
    let job = queue.enqueue("a.yaml", None, false, Priority::High).unwrap();
    let json = serde_json::to_value(&job).unwrap();
    assert_eq!(json["started_at"], "");
    assert_eq!(json["ended_at"], "");
    assert_eq!(json["priority"], "high");
    assert_eq!(json["status"], "pending");
}
