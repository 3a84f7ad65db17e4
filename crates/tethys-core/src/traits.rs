//! Trait definitions for external dependencies.
//!
//! The sync engine talks to three outside systems: the upstream catalog,
//! the target store and the local file share. The first two are abstracted
//! here so the pipeline and scheduler can run against mocks in tests and
//! against HTTP implementations (`tethys-client`, `tethys-store`) in
//! production.
//!
//! The target store is split into three traits by concern: task records
//! ([`TaskQueue`]), file records ([`FileRegistry`]) and graph data
//! ([`GraphStore`]).

use std::future::Future;
use std::path::Path;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::AppError;
use crate::models::{Dataset, Distribution, FileRecord, Page, PageRequest};
use crate::statement::Statement;
use crate::task::{TaskRecord, TaskStatus};

/// Client for the upstream dataset catalog.
pub trait CatalogClient: Send + Sync + Clone {
    /// Fetches one page of datasets released strictly after `since`.
    ///
    /// Pages are ordered by descending release date.
    fn fetch_dataset_page(
        &self,
        since: DateTime<Utc>,
        page: PageRequest,
    ) -> impl Future<Output = Result<Page<Dataset>, AppError>> + Send;

    /// Fetches one page of the distribution listing behind `link`.
    fn fetch_distribution_page(
        &self,
        link: &str,
        page: PageRequest,
    ) -> impl Future<Output = Result<Page<Distribution>, AppError>> + Send;

    /// Resolves a previous-version link to the URI of the superseded dataset.
    ///
    /// Returns `None` when the link resolves to an empty resource.
    fn fetch_previous_version(
        &self,
        link: &str,
    ) -> impl Future<Output = Result<Option<String>, AppError>> + Send;

    /// Downloads a distribution body as text.
    fn fetch_content(&self, url: &str) -> impl Future<Output = Result<String, AppError>> + Send;

    /// Streams a distribution body into `dest`. Returns the bytes written.
    fn download_to(
        &self,
        url: &str,
        dest: &Path,
    ) -> impl Future<Output = Result<u64, AppError>> + Send;
}

/// Persistence for sync task records.
pub trait TaskQueue: Send + Sync + Clone {
    /// Oldest task still in `not-started`, by creation time.
    fn find_oldest_not_started(
        &self,
    ) -> impl Future<Output = Result<Option<TaskRecord>, AppError>> + Send;

    /// Creates a `not-started` task.
    fn create_task(
        &self,
        id: Uuid,
        created: DateTime<Utc>,
    ) -> impl Future<Output = Result<TaskRecord, AppError>> + Send;

    /// All tasks currently `ongoing`.
    fn list_ongoing(&self) -> impl Future<Output = Result<Vec<TaskRecord>, AppError>> + Send;

    /// Greatest watermark recorded by any task.
    fn latest_watermark(
        &self,
    ) -> impl Future<Output = Result<Option<DateTime<Utc>>, AppError>> + Send;

    /// Replaces the status of a task.
    fn persist_status(
        &self,
        task_uri: &str,
        status: TaskStatus,
    ) -> impl Future<Output = Result<(), AppError>> + Send;

    /// Replaces the watermark of a task.
    fn persist_watermark(
        &self,
        task_uri: &str,
        watermark: DateTime<Utc>,
    ) -> impl Future<Output = Result<(), AppError>> + Send;
}

/// Lookup and registration of file records.
pub trait FileRegistry: Send + Sync + Clone {
    /// Physical URIs of the derived artifacts registered for a dataset.
    fn find_dataset_files(
        &self,
        dataset_uri: &str,
    ) -> impl Future<Output = Result<Vec<String>, AppError>> + Send;

    /// Physical location pre-registered for an attachment subject.
    fn find_attachment_location(
        &self,
        subject_uri: &str,
    ) -> impl Future<Output = Result<Option<String>, AppError>> + Send;

    /// Registers a derived artifact.
    fn register(&self, record: &FileRecord) -> impl Future<Output = Result<(), AppError>> + Send;
}

/// Writes statements into a named graph.
///
/// Each call is one request; callers are responsible for batching.
pub trait GraphStore: Send + Sync + Clone {
    fn insert_data(
        &self,
        graph: &str,
        statements: &[Statement],
    ) -> impl Future<Output = Result<(), AppError>> + Send;

    fn delete_data(
        &self,
        graph: &str,
        statements: &[Statement],
    ) -> impl Future<Output = Result<(), AppError>> + Send;
}
