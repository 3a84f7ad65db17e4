//! Integration tests for the Scheduler.
//!
//! These tests cover task scheduling, the single-flight trigger, lower
//! bound selection and recovery of interrupted tasks.

use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::integration::common::{Harness, TestScheduler, base_time, dataset, hours};
use tethys_core::{AppError, SyncConfig, TaskRecord, TaskStatus, TaskSummary, TriggerOutcome};

async fn trigger_and_wait(scheduler: &TestScheduler) -> TaskSummary {
    let TriggerOutcome::Accepted(running) = scheduler.trigger().await.unwrap() else {
        panic!("expected accepted");
    };
    running.wait().await.unwrap()
}

/// Test 1: Triggering on an empty queue schedules a task and runs it.
#[tokio::test]
async fn test_trigger_schedules_and_runs_task() {
    // Arrange
    let harness = Harness::new();
    harness.catalog.publish(dataset("a", hours(1)));
    let scheduler = harness.scheduler_with(SyncConfig::default().with_start_from(Some(base_time())));

    // Act
    let outcome = scheduler.trigger().await.unwrap();

    // Assert
    let TriggerOutcome::Accepted(running) = outcome else {
        panic!("expected accepted");
    };
    assert_eq!(running.total, 1);
    let summary = running.wait().await.unwrap();
    assert_eq!(summary.status, TaskStatus::Success);
    assert_eq!(summary.watermark, hours(1));

    let tasks = harness.queue.tasks();
    assert_eq!(tasks.len(), 1);
    assert_eq!(tasks[0].status, TaskStatus::Success);
    assert_eq!(harness.reporter.count("TaskScheduled"), 1);
}

/// Test 2: A second trigger while a task is ongoing yields a conflict.
///
/// The first task is held inside its fold. The second trigger should:
/// - Return Conflict
/// - Leave exactly one task ongoing
/// - Not start the task it scheduled
#[tokio::test]
async fn test_trigger_conflict_while_ongoing() {
    // Arrange
    let harness = Harness::new();
    harness.catalog.publish(dataset("a", hours(1)));
    let gate = harness.catalog.gate();
    let scheduler = harness.scheduler_with(SyncConfig::default().with_start_from(Some(base_time())));

    let first = scheduler.trigger().await.unwrap();
    assert!(first.is_accepted());

    // Act
    let second = scheduler.trigger().await.unwrap();

    // Assert
    assert!(matches!(second, TriggerOutcome::Conflict));
    assert_eq!(harness.queue.count_with_status(TaskStatus::Ongoing), 1);
    assert_eq!(harness.queue.count_with_status(TaskStatus::NotStarted), 1);
    assert_eq!(harness.reporter.count("TriggerConflict"), 1);

    // Release the first task and let it finish.
    gate.add_permits(16);
    let TriggerOutcome::Accepted(running) = first else {
        unreachable!();
    };
    let summary = running.wait().await.unwrap();
    assert_eq!(summary.status, TaskStatus::Success);
    assert_eq!(harness.queue.count_with_status(TaskStatus::Ongoing), 0);
}

/// Test 3: Concurrent triggers never start two tasks.
#[tokio::test]
async fn test_concurrent_triggers_single_flight() {
    // Arrange
    let harness = Harness::new();
    harness.catalog.publish(dataset("a", hours(1)));
    let gate = harness.catalog.gate();
    let scheduler = harness.scheduler_with(SyncConfig::default().with_start_from(Some(base_time())));

    // Act
    let (left, right) = tokio::join!(scheduler.trigger(), scheduler.trigger());

    // Assert
    let outcomes = [left.unwrap(), right.unwrap()];
    let accepted = outcomes.iter().filter(|o| o.is_accepted()).count();
    let conflicts = outcomes
        .iter()
        .filter(|o| matches!(o, TriggerOutcome::Conflict))
        .count();
    assert_eq!(accepted, 1);
    assert_eq!(conflicts, 1);
    assert_eq!(harness.queue.count_with_status(TaskStatus::Ongoing), 1);

    gate.add_permits(16);
    for outcome in outcomes {
        if let TriggerOutcome::Accepted(running) = outcome {
            running.wait().await.unwrap();
        }
    }
}

/// Test 4: The lower bound prefers the latest watermark over everything else.
#[tokio::test]
async fn test_next_pending_prefers_latest_watermark() {
    // Arrange
    let harness = Harness::new();
    harness.queue.insert(TaskRecord {
        uri: "http://ex/task/old".to_string(),
        status: TaskStatus::Success,
        created: base_time(),
        watermark: Some(hours(7)),
    });
    harness.queue.insert(TaskRecord {
        uri: "http://ex/task/older".to_string(),
        status: TaskStatus::Failed,
        created: base_time(),
        watermark: Some(hours(3)),
    });
    harness.pending_task(hours(10));
    let scheduler = harness.scheduler_with(SyncConfig::default().with_start_from(Some(hours(1))));

    // Act
    let pending = scheduler.next_pending().await.unwrap().unwrap();

    // Assert
    assert_eq!(pending.since, hours(7));
}

/// Test 5: Without any watermark the configured start wins, then creation time.
#[tokio::test]
async fn test_next_pending_falls_back_to_start_then_created() {
    // Arrange
    let harness = Harness::new();
    let task = harness.pending_task(hours(4));

    // Act
    let configured = harness
        .scheduler_with(SyncConfig::default().with_start_from(Some(hours(2))))
        .next_pending()
        .await
        .unwrap()
        .unwrap();
    let unconfigured = harness.scheduler().next_pending().await.unwrap().unwrap();

    // Assert
    assert_eq!(configured.since, hours(2));
    assert_eq!(unconfigured.since, hours(4));
    assert_eq!(unconfigured.record.uri, task.uri);
}

/// Test 6: An empty queue has nothing pending.
#[tokio::test]
async fn test_next_pending_empty_queue() {
    let harness = Harness::new();
    assert!(harness.scheduler().next_pending().await.unwrap().is_none());
}

/// Test 7: The oldest not-started task runs first.
#[tokio::test]
async fn test_trigger_picks_oldest_pending_task() {
    // Arrange
    let harness = Harness::new();
    let newer = harness.pending_task(hours(2));
    let older = harness.pending_task(hours(1));
    let scheduler = harness.scheduler();

    // Act
    let outcome = scheduler.trigger().await.unwrap();

    // Assert
    let TriggerOutcome::Accepted(running) = outcome else {
        panic!("expected accepted");
    };
    assert_eq!(running.task_uri, older.uri);
    running.wait().await.unwrap();
    assert_eq!(
        harness.queue.get(&newer.uri).unwrap().status,
        TaskStatus::NotStarted
    );
}

/// Test 8: The global watermark never decreases across tasks.
///
/// Two datasets are synced, a third is published and synced, then a run
/// with an empty window follows. Every task starts from the previous maximum.
#[tokio::test]
async fn test_watermark_monotonic_across_tasks() {
    // Arrange
    let harness = Harness::new();
    harness.catalog.publish(dataset("a", hours(1)));
    harness.catalog.publish(dataset("b", hours(2)));
    let scheduler = harness.scheduler_with(SyncConfig::default().with_start_from(Some(base_time())));

    // Act
    let first = trigger_and_wait(&scheduler).await;
    harness.catalog.publish(dataset("c", hours(3)));
    let second = trigger_and_wait(&scheduler).await;
    let third = trigger_and_wait(&scheduler).await;

    // Assert
    assert_eq!(
        [first.handled, second.handled, third.handled],
        [2, 1, 0]
    );
    assert_eq!(
        [first.watermark, second.watermark, third.watermark],
        [hours(2), hours(3), hours(3)]
    );

    let writes = harness.queue.watermark_writes();
    assert!(writes.windows(2).all(|w| w[0] <= w[1]));
    assert_eq!(harness.queue.count_with_status(TaskStatus::Success), 3);
}

/// Test 9: A listing failure propagates from trigger and fails the task.
#[tokio::test]
async fn test_trigger_listing_failure() {
    // Arrange
    let harness = Harness::new();
    harness.catalog.fail_listing();
    let scheduler = harness.scheduler();

    // Act
    let result = scheduler.trigger().await;

    // Assert
    assert!(matches!(result, Err(AppError::HttpStatus { .. })));
    assert_eq!(harness.queue.count_with_status(TaskStatus::Failed), 1);
    assert_eq!(harness.queue.count_with_status(TaskStatus::Ongoing), 0);
}

/// Test 10: Tasks left ongoing by a crash are failed at startup.
#[tokio::test]
async fn test_recover_interrupted_unblocks_trigger() {
    // Arrange
    let harness = Harness::new();
    harness.queue.insert(TaskRecord {
        uri: "http://ex/task/crashed".to_string(),
        status: TaskStatus::Ongoing,
        created: base_time(),
        watermark: Some(hours(1)),
    });
    let scheduler = harness.scheduler();
    assert!(matches!(
        scheduler.trigger().await.unwrap(),
        TriggerOutcome::Conflict
    ));

    // Act
    let recovered = scheduler.recover_interrupted().await.unwrap();

    // Assert
    assert_eq!(recovered, 1);
    assert_eq!(
        harness.queue.get("http://ex/task/crashed").unwrap().status,
        TaskStatus::Failed
    );
    let outcome = scheduler.trigger().await.unwrap();
    assert!(outcome.is_accepted());
    if let TriggerOutcome::Accepted(running) = outcome {
        let summary = running.wait().await.unwrap();
        assert_eq!(summary.watermark, hours(1));
    }
}

/// Test 11: The periodic loop triggers until cancelled.
#[tokio::test]
async fn test_run_periodic_triggers_until_cancelled() {
    // Arrange
    let harness = Harness::new();
    let scheduler = harness.scheduler_with(SyncConfig::default().with_start_from(Some(base_time())));
    let cancel = CancellationToken::new();

    let looping = {
        let scheduler = scheduler.clone();
        let cancel = cancel.clone();
        tokio::spawn(async move {
            scheduler
                .run_periodic(Duration::from_millis(20), cancel)
                .await
        })
    };

    // Act
    tokio::time::sleep(Duration::from_millis(150)).await;
    cancel.cancel();
    tokio::time::timeout(Duration::from_secs(2), looping)
        .await
        .expect("periodic loop should stop after cancellation")
        .unwrap();

    // Let a fold spawned by the last tick finish.
    tokio::time::sleep(Duration::from_millis(50)).await;

    // Assert
    assert!(harness.queue.count_with_status(TaskStatus::Success) >= 1);
    assert_eq!(harness.queue.count_with_status(TaskStatus::Ongoing), 0);
}
