//! Deletion executor against the in-memory SiteWise fake
//!
//! Covers idempotent deletes, polling until not-found, timeouts, retries and
//! the per-batch concurrency limit.

mod test_utils;

use sitewise_sweep::api::ResourceNode;
use sitewise_sweep::executor::{DeleteError, DeletionExecutor, DeletionOutcome};
use sitewise_sweep::testing::{FakeCall, FakeOp, FakeSiteWise, InstantSleeper, STATUS_DELETING};
use sitewise_sweep::wait::PollConfig;
use sitewise_sweep::ApiError;
use sitewise_sweep_common::ResourceKind;
use test_utils::TEST_POLL_INTERVAL;

fn poll(max_attempts: Option<u32>) -> PollConfig {
    PollConfig {
        interval: TEST_POLL_INTERVAL,
        max_attempts,
    }
}

fn portal(id: &str) -> ResourceNode {
    ResourceNode::new(id, id, ResourceKind::Portal)
}

fn describe_count(fake: &FakeSiteWise, id: &str) -> usize {
    fake.calls()
        .iter()
        .filter(|c| matches!(c, FakeCall::Describe(_, d) if d == id))
        .count()
}

#[tokio::test]
async fn test_delete_is_idempotent() {
    let fake = FakeSiteWise::new();
    fake.add_portal("p", "p");
    let sleeper = InstantSleeper::new();
    let executor = DeletionExecutor::new(&fake, &sleeper, poll(None));

    let first = executor.delete(&portal("p")).await.unwrap();
    assert_eq!(first, DeletionOutcome::Deleted);
    assert!(!fake.exists("p"));

    let second = executor.delete(&portal("p")).await.unwrap();
    assert_eq!(second, DeletionOutcome::AlreadyDeleted);

    // The second delete saw not-found immediately and never polled
    assert_eq!(describe_count(&fake, "p"), 1);
}

#[tokio::test]
async fn test_polls_until_not_found() {
    let fake = FakeSiteWise::new();
    fake.add_portal("p", "p").set_latency("p", 3);
    let sleeper = InstantSleeper::new();
    let executor = DeletionExecutor::new(&fake, &sleeper, poll(None));

    let outcome = executor.delete(&portal("p")).await.unwrap();

    assert_eq!(outcome, DeletionOutcome::Deleted);
    assert_eq!(describe_count(&fake, "p"), 4);
    assert_eq!(sleeper.sleeps(), vec![TEST_POLL_INTERVAL; 3]);
}

#[tokio::test]
async fn test_timeout_reports_last_status() {
    let fake = FakeSiteWise::new();
    fake.add_portal("p", "p").set_stuck("p");
    let sleeper = InstantSleeper::new();
    let executor = DeletionExecutor::new(&fake, &sleeper, poll(Some(5)));

    let err = executor.delete(&portal("p")).await.unwrap_err();

    let DeleteError::Timeout(timeout) = err else {
        panic!("expected timeout, got {err:?}");
    };
    assert_eq!(timeout.id, "p");
    assert_eq!(timeout.kind, ResourceKind::Portal);
    assert_eq!(timeout.last_status, STATUS_DELETING);
    assert_eq!(timeout.attempts, 5);
    assert_eq!(describe_count(&fake, "p"), 5);
    // No sleep after the final attempt
    assert_eq!(sleeper.sleeps().len(), 4);
}

#[tokio::test]
async fn test_failed_status_stops_polling() {
    let fake = FakeSiteWise::new();
    fake.add_portal("p", "p").set_deletion_failed("p");
    let sleeper = InstantSleeper::new();
    let executor = DeletionExecutor::new(&fake, &sleeper, poll(None));

    let err = executor.delete(&portal("p")).await.unwrap_err();

    assert!(
        matches!(&err, DeleteError::Failed { id, .. } if id == "p"),
        "unexpected error: {err:?}"
    );
    assert!(!err.is_fatal());
    // Reported on the first describe, not after the 300-attempt portal budget
    assert_eq!(describe_count(&fake, "p"), 1);
    assert!(sleeper.sleeps().is_empty());
}

#[tokio::test]
async fn test_throttled_delete_is_retried() {
    let fake = FakeSiteWise::new();
    fake.add_portal("p", "p")
        .fail_next(FakeOp::Delete, "p", ApiError::Throttled)
        .fail_next(
            FakeOp::Delete,
            "p",
            ApiError::Conflict {
                message: "portal is updating".into(),
            },
        );
    let sleeper = InstantSleeper::new();
    let executor = DeletionExecutor::new(&fake, &sleeper, poll(None));

    let outcome = executor.delete(&portal("p")).await.unwrap();

    assert_eq!(outcome, DeletionOutcome::Deleted);
    assert_eq!(fake.delete_calls(), vec!["p", "p", "p"]);
    assert_eq!(sleeper.sleeps().len(), 2);
}

#[tokio::test]
async fn test_throttled_describe_consumes_an_attempt() {
    let fake = FakeSiteWise::new();
    fake.add_portal("p", "p")
        .set_latency("p", 1)
        .fail_next(FakeOp::Describe, "p", ApiError::Throttled);
    let sleeper = InstantSleeper::new();
    let executor = DeletionExecutor::new(&fake, &sleeper, poll(Some(2)));

    // Throttled poll + DELETING poll exhaust a budget of two
    let err = executor.delete(&portal("p")).await.unwrap_err();
    assert!(matches!(err, DeleteError::Timeout(ref t) if t.attempts == 2));
}

#[tokio::test]
async fn test_service_error_fails_resource() {
    let fake = FakeSiteWise::new();
    fake.add_portal("p", "p").fail_next(
        FakeOp::Delete,
        "p",
        ApiError::Service {
            code: "ValidationException".into(),
            message: "bad portal".into(),
        },
    );
    let sleeper = InstantSleeper::new();
    let executor = DeletionExecutor::new(&fake, &sleeper, poll(None));

    let err = executor.delete(&portal("p")).await.unwrap_err();

    assert!(matches!(err, DeleteError::Failed { ref id, .. } if id == "p"));
    assert!(!err.is_fatal());
    assert!(fake.exists("p"));
}

#[tokio::test]
async fn test_transport_error_is_fatal() {
    let fake = FakeSiteWise::new();
    fake.add_portal("p", "p").fail_next(
        FakeOp::Describe,
        "p",
        ApiError::Transport {
            message: "connection reset".into(),
        },
    );
    let sleeper = InstantSleeper::new();
    let executor = DeletionExecutor::new(&fake, &sleeper, poll(None));

    let err = executor.delete(&portal("p")).await.unwrap_err();
    assert!(err.is_fatal());
}

#[tokio::test]
async fn test_batch_respects_concurrency_limit() {
    let fake = FakeSiteWise::new();
    let nodes: Vec<_> = (0..6).map(|i| portal(&format!("p{i}"))).collect();
    for node in &nodes {
        fake.add_portal(&node.id, &node.name).set_latency(&node.id, 3);
    }
    let sleeper = InstantSleeper::new();
    let executor = DeletionExecutor::new(&fake, &sleeper, poll(None));

    let results = executor.delete_batch(&nodes, 2).await;

    assert_eq!(results.len(), 6);
    assert!(results.iter().all(|r| r == &Ok(DeletionOutcome::Deleted)));
    assert_eq!(fake.max_concurrent_deletes(), 2);
}

#[tokio::test]
async fn test_sequential_batch_by_default() {
    let fake = FakeSiteWise::new();
    let nodes: Vec<_> = (0..3).map(|i| portal(&format!("p{i}"))).collect();
    for node in &nodes {
        fake.add_portal(&node.id, &node.name).set_latency(&node.id, 2);
    }
    let sleeper = InstantSleeper::new();
    let executor = DeletionExecutor::new(&fake, &sleeper, poll(None));

    executor.delete_batch(&nodes, 1).await;

    assert_eq!(fake.max_concurrent_deletes(), 1);
    assert_eq!(fake.deleted(), vec!["p0", "p1", "p2"]);
}
