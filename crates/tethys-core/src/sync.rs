//! Sync service: runs a task through its persisted state machine.
//!
//! # Flow
//!
//! ```text
//! start:    persist ongoing → list datasets since `since` (ascending)
//!             └─ listing fails → watermark := since, status := failed, Err
//! execute:  for each dataset, oldest first:
//!             consume → persist watermark (if it moved) → next
//!             └─ dataset fails → stop
//!           persist final status (success | failed)
//! ```
//!
//! An empty window still records `since` as the task's watermark, so the
//! global watermark never moves backwards.

use chrono::{DateTime, Utc};

use crate::config::SyncConfig;
use crate::cursor;
use crate::error::AppError;
use crate::pipeline::DatasetConsumer;
use crate::progress::{SyncEvent, SyncReporter};
use crate::storage::FileShare;
use crate::task::{SyncTask, TaskStatus, TaskSummary};
use crate::traits::{CatalogClient, FileRegistry, GraphStore, TaskQueue};

/// Service running sync tasks against the upstream catalog.
///
/// # Type Parameters
///
/// * `Q` - Task record persistence
/// * `C` - Upstream catalog client
/// * `F` - File record registry
/// * `G` - Graph data store
pub struct SyncService<Q, C, F, G>
where
    Q: TaskQueue,
    C: CatalogClient,
    F: FileRegistry,
    G: GraphStore,
{
    queue: Q,
    catalog: C,
    consumer: DatasetConsumer<C, F, G>,
    config: SyncConfig,
}

impl<Q, C, F, G> Clone for SyncService<Q, C, F, G>
where
    Q: TaskQueue,
    C: CatalogClient,
    F: FileRegistry,
    G: GraphStore,
{
    fn clone(&self) -> Self {
        Self {
            queue: self.queue.clone(),
            catalog: self.catalog.clone(),
            consumer: self.consumer.clone(),
            config: self.config.clone(),
        }
    }
}

impl<Q, C, F, G> SyncService<Q, C, F, G>
where
    Q: TaskQueue,
    C: CatalogClient,
    F: FileRegistry,
    G: GraphStore,
{
    pub fn new(queue: Q, catalog: C, files: F, graph: G, share: FileShare) -> Self {
        Self::with_config(queue, catalog, files, graph, share, SyncConfig::default())
    }

    pub fn with_config(
        queue: Q,
        catalog: C,
        files: F,
        graph: G,
        share: FileShare,
        config: SyncConfig,
    ) -> Self {
        let consumer = DatasetConsumer::new(catalog.clone(), files, graph, share, config.clone());
        Self {
            queue,
            catalog,
            consumer,
            config,
        }
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    /// Moves the task to `ongoing` and lists its datasets.
    ///
    /// If listing fails the task is closed as failed with `since` as its
    /// watermark, and the listing error is returned.
    pub async fn start<R: SyncReporter>(
        &self,
        task_uri: &str,
        since: DateTime<Utc>,
        reporter: &R,
    ) -> Result<SyncTask, AppError> {
        self.queue
            .persist_status(task_uri, TaskStatus::Ongoing)
            .await?;
        reporter.report(SyncEvent::TaskStarted { task_uri, since });

        match cursor::list_unconsumed_datasets(&self.catalog, since, self.config.page_size).await {
            Ok(datasets) => {
                reporter.report(SyncEvent::DatasetsListed {
                    task_uri,
                    total: datasets.len(),
                });
                Ok(SyncTask::new(task_uri, since, datasets))
            }
            Err(e) => {
                let error = e.to_string();
                reporter.report(SyncEvent::TaskFailed {
                    task_uri,
                    handled: 0,
                    total: 0,
                    error: &error,
                });
                let task = SyncTask::new(task_uri, since, Vec::new());
                if let Err(close_err) = self.close_with_failure(&task).await {
                    tracing::error!(task = task_uri, error = %close_err, "Failed to close task after listing error");
                }
                Err(e)
            }
        }
    }

    /// Folds over the task's datasets and persists the final status.
    ///
    /// A failing dataset does not make this return `Err`: the task is closed
    /// as failed and the summary reports it. `Err` means the task state
    /// itself could not be persisted.
    pub async fn execute<R: SyncReporter>(
        &self,
        mut task: SyncTask,
        reporter: &R,
    ) -> Result<TaskSummary, AppError> {
        if let Err(e) = self.fold(&mut task, reporter).await {
            let error = e.to_string();
            reporter.report(SyncEvent::TaskFailed {
                task_uri: &task.uri,
                handled: task.handled(),
                total: task.total(),
                error: &error,
            });
            if let Err(close_err) = self.close_with_failure(&task).await {
                tracing::error!(task = %task.uri, error = %close_err, "Failed to close task after error");
            }
            return Err(e);
        }
        Ok(task.summary())
    }

    async fn fold<R: SyncReporter>(&self, task: &mut SyncTask, reporter: &R) -> Result<(), AppError> {
        if task.total() == 0 {
            self.queue.persist_watermark(&task.uri, task.since).await?;
            self.queue
                .persist_status(&task.uri, TaskStatus::Success)
                .await?;
            reporter.report(SyncEvent::TaskSucceeded {
                task_uri: &task.uri,
                handled: 0,
                watermark: task.since,
            });
            return Ok(());
        }

        let total = task.total();
        let mut failure = None;

        loop {
            let index = task.handled();
            let Some(dataset) = task.next_dataset() else {
                break;
            };
            reporter.report(SyncEvent::DatasetStarted {
                dataset_id: &dataset.id,
                index,
                total,
            });

            let dataset_id = dataset.id.clone();
            match self.consumer.consume(dataset, reporter).await {
                Ok(()) => {
                    if let Some(watermark) = task.record_success() {
                        self.queue.persist_watermark(&task.uri, watermark).await?;
                    }
                    reporter.report(SyncEvent::DatasetConsumed {
                        dataset_id: &dataset_id,
                        handled: task.handled(),
                        total,
                    });
                }
                Err(e) => {
                    let error = e.to_string();
                    reporter.report(SyncEvent::DatasetFailed {
                        dataset_id: &dataset_id,
                        error: &error,
                    });
                    task.record_failure();
                    failure = Some(error);
                }
            }
        }

        match task.final_status() {
            TaskStatus::Failed => self.close_with_failure(task).await?,
            status => self.queue.persist_status(&task.uri, status).await?,
        }
        match failure {
            None => reporter.report(SyncEvent::TaskSucceeded {
                task_uri: &task.uri,
                handled: task.handled(),
                watermark: task.watermark(),
            }),
            Some(error) => reporter.report(SyncEvent::TaskFailed {
                task_uri: &task.uri,
                handled: task.handled(),
                total,
                error: &error,
            }),
        }
        Ok(())
    }

    /// Records the task's current watermark and marks it failed.
    pub async fn close_with_failure(&self, task: &SyncTask) -> Result<(), AppError> {
        self.queue
            .persist_watermark(&task.uri, task.watermark())
            .await?;
        self.queue
            .persist_status(&task.uri, TaskStatus::Failed)
            .await
    }
}
