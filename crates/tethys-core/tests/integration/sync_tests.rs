//! Integration tests for SyncService and the dataset pipeline.
//!
//! These tests drive `start` and `execute` directly against the mocks.

use crate::integration::common::{
    Harness, attachment_distribution, base_time, content_distribution, content_url, dataset,
    dataset_uri, hours, news_subject,
};
use tethys_core::config::SKOLEM_NAMESPACE;
use tethys_core::statement::{self, NEWS_ITEM_CLASS, RDF_TYPE};
use tethys_core::{AppError, DatasetConsumer, Statement, SyncConfig, TaskStatus, Term};

/// Test 1: An empty window still closes the task with a watermark.
///
/// With no datasets released after `since`, the task should:
/// - Persist `since` as its watermark
/// - Finish with status success
/// - Leave the graph untouched
#[tokio::test]
async fn test_empty_window_records_since() {
    // Arrange
    let harness = Harness::new();
    let task = harness.pending_task(base_time());
    let service = harness.service();

    // Act
    let running = service
        .start(&task.uri, hours(5), &harness.reporter)
        .await
        .unwrap();
    let summary = service.execute(running, &harness.reporter).await.unwrap();

    // Assert
    assert_eq!(summary.status, TaskStatus::Success);
    assert_eq!(summary.total, 0);
    let stored = harness.queue.get(&task.uri).unwrap();
    assert_eq!(stored.status, TaskStatus::Success);
    assert_eq!(stored.watermark, Some(hours(5)));
    assert_eq!(harness.graph.len(), 0);
    assert_eq!(
        harness.queue.status_history(&task.uri),
        vec![TaskStatus::Ongoing, TaskStatus::Success]
    );
}

/// Test 2: Datasets are consumed oldest first regardless of catalog order.
///
/// The catalog pages newest first over multiple pages. The task should:
/// - Fetch content in ascending release order
/// - Persist a strictly increasing sequence of watermarks
/// - End with the newest release date as its watermark
#[tokio::test]
async fn test_datasets_consumed_in_ascending_order() {
    // Arrange
    let harness = Harness::new();
    for (id, hour) in [("c", 3), ("a", 1), ("e", 5), ("b", 2), ("d", 4)] {
        harness.catalog.publish(dataset(id, hours(hour)));
    }
    let task = harness.pending_task(base_time());
    let service = harness.service_with(SyncConfig::default().with_page_size(2));

    // Act
    let running = service
        .start(&task.uri, base_time(), &harness.reporter)
        .await
        .unwrap();
    let summary = service.execute(running, &harness.reporter).await.unwrap();

    // Assert
    assert_eq!(summary.status, TaskStatus::Success);
    assert_eq!(summary.handled, 5);
    assert_eq!(
        harness.catalog.content_requests(),
        ["a", "b", "c", "d", "e"].map(content_url).to_vec()
    );
    let writes = harness.queue.watermark_writes();
    assert_eq!(writes, (1..=5).map(hours).collect::<Vec<_>>());
    assert_eq!(harness.queue.get(&task.uri).unwrap().watermark, Some(hours(5)));
}

/// Test 3: A failing dataset stops the fold.
///
/// When the second of three datasets fails, the task should:
/// - Keep the first dataset applied
/// - Never touch the third dataset
/// - Close as failed with the first dataset's release date as watermark
#[tokio::test]
async fn test_failing_dataset_stops_task() {
    // Arrange
    let harness = Harness::new();
    harness.catalog.publish(dataset("a", hours(1)));
    harness.catalog.publish(dataset("b", hours(2)));
    harness.catalog.publish(dataset("c", hours(3)));
    harness.catalog.break_content(&content_url("b"));
    let task = harness.pending_task(base_time());
    let service = harness.service();

    // Act
    let running = service
        .start(&task.uri, base_time(), &harness.reporter)
        .await
        .unwrap();
    let summary = service.execute(running, &harness.reporter).await.unwrap();

    // Assert
    assert_eq!(summary.status, TaskStatus::Failed);
    assert_eq!(summary.handled, 1);
    assert_eq!(summary.total, 3);
    assert!(harness.graph.has_subject(&news_subject("a")));
    assert!(!harness.graph.has_subject(&news_subject("c")));
    assert!(!harness.catalog.content_requests().contains(&content_url("c")));

    let stored = harness.queue.get(&task.uri).unwrap();
    assert_eq!(stored.status, TaskStatus::Failed);
    assert_eq!(stored.watermark, Some(hours(1)));
    assert_eq!(harness.reporter.count("DatasetFailed"), 1);
}

/// Test 4: A failure on the very first dataset keeps the watermark at `since`.
#[tokio::test]
async fn test_first_dataset_failure_keeps_since() {
    // Arrange
    let harness = Harness::new();
    harness.catalog.publish(dataset("a", hours(1)));
    harness.catalog.break_content(&content_url("a"));
    let task = harness.pending_task(base_time());
    let service = harness.service();

    // Act
    let running = service
        .start(&task.uri, base_time(), &harness.reporter)
        .await
        .unwrap();
    let summary = service.execute(running, &harness.reporter).await.unwrap();

    // Assert
    assert_eq!(summary.status, TaskStatus::Failed);
    assert_eq!(summary.handled, 0);
    assert_eq!(
        harness.queue.get(&task.uri).unwrap().watermark,
        Some(base_time())
    );
}

/// Test 5: A listing failure fails the task before any dataset is touched.
#[tokio::test]
async fn test_listing_failure_closes_task() {
    // Arrange
    let harness = Harness::new();
    harness.catalog.publish(dataset("a", hours(1)));
    harness.catalog.fail_listing();
    let task = harness.pending_task(base_time());
    let service = harness.service();

    // Act
    let result = service.start(&task.uri, hours(0), &harness.reporter).await;

    // Assert
    assert!(matches!(result, Err(AppError::HttpStatus { status: 503, .. })));
    let stored = harness.queue.get(&task.uri).unwrap();
    assert_eq!(stored.status, TaskStatus::Failed);
    assert_eq!(stored.watermark, Some(hours(0)));
    assert!(harness.catalog.content_requests().is_empty());
}

/// Test 6: Attachment download failures never fail the dataset.
///
/// Of three attachments, one downloads, one fails and one has no
/// pre-registered location. The dataset should still count as consumed.
#[tokio::test]
async fn test_attachment_failures_are_soft() {
    // Arrange
    let harness = Harness::new();
    let ok = attachment_distribution("ok", "http://ex/doc/ok");
    let broken = attachment_distribution("broken", "http://ex/doc/broken");
    let untracked = attachment_distribution("untracked", "http://ex/doc/untracked");
    harness.catalog.set_download(&ok.download_url, b"%PDF-1.7");
    harness.files.track_attachment("http://ex/doc/ok", "share://docs/ok.pdf");
    harness
        .files
        .track_attachment("http://ex/doc/broken", "share://docs/broken.pdf");
    harness.catalog.publish_with(
        dataset("a", hours(1)),
        vec![content_distribution("a"), ok, broken, untracked],
    );
    let task = harness.pending_task(base_time());
    let service = harness.service();

    // Act
    let running = service
        .start(&task.uri, base_time(), &harness.reporter)
        .await
        .unwrap();
    let summary = service.execute(running, &harness.reporter).await.unwrap();

    // Assert
    assert_eq!(summary.status, TaskStatus::Success);
    assert_eq!(summary.handled, 1);
    assert_eq!(harness.reporter.count("AttachmentFailed"), 1);
    assert_eq!(harness.reporter.count("AttachmentSkipped"), 1);
    let copied = harness.share.path_for("share://docs/ok.pdf").unwrap();
    assert_eq!(std::fs::read(copied).unwrap(), b"%PDF-1.7");
}

/// Test 7: A dataset without primary content is consumed without writes.
#[tokio::test]
async fn test_dataset_without_content_is_consumed() {
    // Arrange
    let harness = Harness::new();
    harness.catalog.publish_with(dataset("a", hours(1)), vec![]);
    let task = harness.pending_task(base_time());
    let service = harness.service();

    // Act
    let running = service
        .start(&task.uri, base_time(), &harness.reporter)
        .await
        .unwrap();
    let summary = service.execute(running, &harness.reporter).await.unwrap();

    // Assert
    assert_eq!(summary.status, TaskStatus::Success);
    assert_eq!(summary.watermark, hours(1));
    assert_eq!(harness.graph.insert_requests(), 0);
    assert!(harness.files.records().is_empty());
    assert_eq!(harness.reporter.count("ContentMissing"), 1);
}

/// Test 8: Content is augmented, skolemized, persisted and registered.
///
/// After consuming one dataset:
/// - The classified news item gains the local type statement
/// - Blank nodes become IRIs under the dataset's skolem namespace
/// - The local copy parses back to exactly the statements in the graph
/// - One file record points at the local copy
#[tokio::test]
async fn test_content_written_and_registered() {
    // Arrange
    let harness = Harness::new();
    harness.catalog.publish(dataset("a", hours(1)));
    let task = harness.pending_task(base_time());
    let service = harness.service();

    // Act
    let running = service
        .start(&task.uri, base_time(), &harness.reporter)
        .await
        .unwrap();
    service.execute(running, &harness.reporter).await.unwrap();

    // Assert
    let typed = Statement::new(
        Term::reference(news_subject("a")),
        Term::reference(RDF_TYPE),
        Term::reference(NEWS_ITEM_CLASS),
    );
    assert!(harness.graph.contains(&typed));
    assert!(
        harness
            .graph
            .has_subject_prefix(&format!("{}a/", SKOLEM_NAMESPACE))
    );

    let records = harness.files.records();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].dataset_uri, dataset_uri("a"));
    assert_eq!(records[0].physical_uri, "share://a.ttl");

    let local = harness.share.read_to_string("share://a.ttl").await.unwrap();
    let reparsed = statement::parse_turtle(&local, "http://unused/").unwrap();
    assert_eq!(reparsed.len(), harness.graph.len());
    assert!(reparsed.iter().all(|s| harness.graph.contains(s)));
    assert_eq!(records[0].size, local.len() as u64);
}

/// Test 9: A new version retracts the statements of its predecessor.
///
/// Version 1 is synced in a first task. Version 2 arrives in a second task
/// with a previous-version link. Afterwards only version 2 is present.
#[tokio::test]
async fn test_new_version_supersedes_previous() {
    // Arrange
    let harness = Harness::new();
    harness.catalog.publish(dataset("v1", hours(1)));
    let first = harness.pending_task(base_time());
    let service = harness.service();
    let running = service
        .start(&first.uri, base_time(), &harness.reporter)
        .await
        .unwrap();
    service.execute(running, &harness.reporter).await.unwrap();
    assert!(harness.graph.has_subject(&news_subject("v1")));

    let mut v2 = dataset("v2", hours(2));
    v2.previous_version_link = Some("/datasets/v2/previous-version".to_string());
    harness
        .catalog
        .set_previous_version("/datasets/v2/previous-version", &dataset_uri("v1"));
    harness.catalog.publish(v2);
    let second = harness.pending_task(hours(1));

    // Act
    let running = service
        .start(&second.uri, hours(1), &harness.reporter)
        .await
        .unwrap();
    let summary = service.execute(running, &harness.reporter).await.unwrap();

    // Assert
    assert_eq!(summary.status, TaskStatus::Success);
    assert!(!harness.graph.has_subject(&news_subject("v1")));
    assert!(
        !harness
            .graph
            .has_subject_prefix(&format!("{}v1/", SKOLEM_NAMESPACE))
    );
    assert!(harness.graph.has_subject(&news_subject("v2")));
    assert_eq!(harness.reporter.count("PredecessorRemoved"), 1);
}

/// Test 10: Removing a predecessor twice, or one that was never synced, is a no-op.
#[tokio::test]
async fn test_supersede_is_idempotent() {
    // Arrange
    let harness = Harness::new();
    harness.catalog.publish(dataset("v1", hours(1)));
    let task = harness.pending_task(base_time());
    let service = harness.service();
    let running = service
        .start(&task.uri, base_time(), &harness.reporter)
        .await
        .unwrap();
    service.execute(running, &harness.reporter).await.unwrap();

    let consumer = DatasetConsumer::new(
        harness.catalog.clone(),
        harness.files.clone(),
        harness.graph.clone(),
        harness.share.clone(),
        SyncConfig::default(),
    );

    // Act
    let first = consumer
        .remove_dataset_statements(&dataset_uri("v1"))
        .await
        .unwrap();
    let second = consumer
        .remove_dataset_statements(&dataset_uri("v1"))
        .await
        .unwrap();
    let unknown = consumer
        .remove_dataset_statements(&dataset_uri("never-synced"))
        .await
        .unwrap();

    // Assert
    assert!(first > 0);
    assert_eq!(second, first);
    assert_eq!(unknown, 0);
    assert_eq!(harness.graph.len(), 0);
}

/// Test 11: Small batch sizes split writes into several requests.
#[tokio::test]
async fn test_batch_size_controls_request_count() {
    // Arrange
    let harness = Harness::new();
    harness.catalog.publish(dataset("a", hours(1)));
    let task = harness.pending_task(base_time());
    let service = harness.service_with(SyncConfig::default().with_batch_sizes(2, 2));

    // Act
    let running = service
        .start(&task.uri, base_time(), &harness.reporter)
        .await
        .unwrap();
    service.execute(running, &harness.reporter).await.unwrap();

    // Assert: 4 parsed statements plus 1 type statement, two per request
    assert_eq!(harness.graph.len(), 5);
    assert_eq!(harness.graph.insert_requests(), 3);
}

/// Test 12: A rejected insert stops the fold like any other dataset failure.
///
/// The second of three datasets hits a store error on its insert request.
/// The task should:
/// - Keep the first dataset applied and registered
/// - Never fetch the third dataset
/// - Close as failed with the first dataset's release date as watermark
#[tokio::test]
async fn test_insert_failure_stops_task() {
    // Arrange
    let harness = Harness::new();
    harness.catalog.publish(dataset("a", hours(1)));
    harness.catalog.publish(dataset("b", hours(2)));
    harness.catalog.publish(dataset("c", hours(3)));
    harness.graph.fail_insert_request(2);
    let task = harness.pending_task(base_time());
    let service = harness.service();

    // Act
    let running = service
        .start(&task.uri, base_time(), &harness.reporter)
        .await
        .unwrap();
    let summary = service.execute(running, &harness.reporter).await.unwrap();

    // Assert
    assert_eq!(summary.status, TaskStatus::Failed);
    assert_eq!(summary.handled, 1);
    assert!(harness.graph.has_subject(&news_subject("a")));
    assert!(!harness.graph.has_subject(&news_subject("b")));
    assert!(!harness.catalog.content_requests().contains(&content_url("c")));
    assert_eq!(harness.files.records().len(), 1);

    let stored = harness.queue.get(&task.uri).unwrap();
    assert_eq!(stored.status, TaskStatus::Failed);
    assert_eq!(stored.watermark, Some(hours(1)));
    assert_eq!(harness.reporter.count("DatasetFailed"), 1);
}

/// Test 13: A rejected delete while superseding fails the new version.
///
/// The predecessor's statements stay in place and the new version is never
/// written. The task keeps `since` as its watermark.
#[tokio::test]
async fn test_delete_failure_during_supersede_fails_dataset() {
    // Arrange
    let harness = Harness::new();
    harness.catalog.publish(dataset("v1", hours(1)));
    let first = harness.pending_task(base_time());
    let service = harness.service();
    let running = service
        .start(&first.uri, base_time(), &harness.reporter)
        .await
        .unwrap();
    service.execute(running, &harness.reporter).await.unwrap();

    let mut v2 = dataset("v2", hours(2));
    v2.previous_version_link = Some("/datasets/v2/previous-version".to_string());
    harness
        .catalog
        .set_previous_version("/datasets/v2/previous-version", &dataset_uri("v1"));
    harness.catalog.publish(v2);
    harness.graph.fail_deletes();
    let second = harness.pending_task(hours(1));

    // Act
    let running = service
        .start(&second.uri, hours(1), &harness.reporter)
        .await
        .unwrap();
    let summary = service.execute(running, &harness.reporter).await.unwrap();

    // Assert
    assert_eq!(summary.status, TaskStatus::Failed);
    assert_eq!(summary.handled, 0);
    assert!(harness.graph.delete_requests() > 0);
    assert!(harness.graph.has_subject(&news_subject("v1")));
    assert!(!harness.graph.has_subject(&news_subject("v2")));
    assert!(!harness.catalog.content_requests().contains(&content_url("v2")));

    let stored = harness.queue.get(&second.uri).unwrap();
    assert_eq!(stored.status, TaskStatus::Failed);
    assert_eq!(stored.watermark, Some(hours(1)));
    assert_eq!(harness.reporter.count("PredecessorRemoved"), 0);
    assert_eq!(harness.reporter.count("DatasetFailed"), 1);
}

/// Test 14: A watermark that cannot be persisted aborts the task.
///
/// The first watermark write fails after dataset `a` was applied. `execute`
/// should:
/// - Return the store error
/// - Report the task as failed
/// - Still close the task as failed with `a`'s release date as watermark
/// - Never start dataset `b`
#[tokio::test]
async fn test_watermark_write_failure_closes_task() {
    // Arrange
    let harness = Harness::new();
    harness.catalog.publish(dataset("a", hours(1)));
    harness.catalog.publish(dataset("b", hours(2)));
    harness.queue.fail_watermark_write(1);
    let task = harness.pending_task(base_time());
    let service = harness.service();

    // Act
    let running = service
        .start(&task.uri, base_time(), &harness.reporter)
        .await
        .unwrap();
    let result = service.execute(running, &harness.reporter).await;

    // Assert
    assert!(matches!(result, Err(AppError::StoreError(_))));
    assert_eq!(harness.reporter.count("TaskFailed"), 1);
    assert_eq!(harness.reporter.count("DatasetConsumed"), 0);
    assert!(!harness.catalog.content_requests().contains(&content_url("b")));

    let stored = harness.queue.get(&task.uri).unwrap();
    assert_eq!(stored.status, TaskStatus::Failed);
    assert_eq!(stored.watermark, Some(hours(1)));
    assert_eq!(harness.queue.watermark_writes(), vec![hours(1)]);
    assert_eq!(
        harness.queue.status_history(&task.uri),
        vec![TaskStatus::Ongoing, TaskStatus::Failed]
    );
}
