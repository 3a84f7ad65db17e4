//! Progress reporting for sync runs.
//!
//! The scheduler, sync service and pipeline emit [`SyncEvent`]s instead of
//! logging directly, so tests can run silently and frontends can decide
//! how to render progress.

use chrono::{DateTime, Utc};
use tracing::{debug, error, info, warn};

// =============================================================================
// Sync Events
// =============================================================================

/// Events emitted while scheduling and running sync tasks.
#[derive(Debug, Clone)]
pub enum SyncEvent<'a> {
    /// A new `not-started` task was created.
    TaskScheduled { task_uri: &'a str },
    /// Trigger refused because a task is already ongoing.
    TriggerConflict { ongoing: usize },
    /// Trigger found nothing to run.
    NoPendingTask,
    /// An interrupted task was closed as failed at startup.
    TaskRecovered { task_uri: &'a str },
    /// Task moved to `ongoing` and is listing datasets.
    TaskStarted {
        task_uri: &'a str,
        since: DateTime<Utc>,
    },
    /// Dataset listing completed.
    DatasetsListed { task_uri: &'a str, total: usize },
    /// A dataset is about to be consumed.
    DatasetStarted {
        dataset_id: &'a str,
        index: usize,
        total: usize,
    },
    /// Statements of a superseded dataset were retracted.
    PredecessorRemoved {
        dataset_id: &'a str,
        predecessor: &'a str,
        statements: usize,
    },
    /// Dataset has no primary content distribution.
    ContentMissing { dataset_id: &'a str },
    /// Primary content was inserted and its artifact registered.
    ContentWritten {
        dataset_id: &'a str,
        statements: usize,
        physical_uri: &'a str,
    },
    /// Attachment has no pre-registered location and was skipped.
    AttachmentSkipped {
        dataset_id: &'a str,
        download_url: &'a str,
    },
    /// Attachment download failed; the dataset still counts as consumed.
    AttachmentFailed {
        dataset_id: &'a str,
        download_url: &'a str,
        error: &'a str,
    },
    /// Attachment mirroring finished for a dataset.
    AttachmentsMirrored { dataset_id: &'a str, copied: usize },
    /// Dataset fully applied.
    DatasetConsumed {
        dataset_id: &'a str,
        handled: usize,
        total: usize,
    },
    /// Dataset failed; the fold stops.
    DatasetFailed { dataset_id: &'a str, error: &'a str },
    /// Task finished successfully.
    TaskSucceeded {
        task_uri: &'a str,
        handled: usize,
        watermark: DateTime<Utc>,
    },
    /// Task finished with a failure.
    TaskFailed {
        task_uri: &'a str,
        handled: usize,
        total: usize,
        error: &'a str,
    },
}

// =============================================================================
// Sync Reporter Trait
// =============================================================================

/// Trait for reporting sync events.
pub trait SyncReporter: Send + Sync {
    /// Called when a sync event occurs.
    ///
    /// The default implementation does nothing (silent mode).
    fn report(&self, event: SyncEvent<'_>) {
        let _ = event;
    }
}

/// Silent reporter that ignores all events.
#[derive(Debug, Default, Clone, Copy)]
pub struct SilentReporter;

impl SyncReporter for SilentReporter {}

/// Tracing-based reporter for server logging.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingReporter;

impl SyncReporter for TracingReporter {
    fn report(&self, event: SyncEvent<'_>) {
        match event {
            SyncEvent::TaskScheduled { task_uri } => {
                info!(task = task_uri, "Scheduled new sync task");
            }
            SyncEvent::TriggerConflict { ongoing } => {
                warn!(ongoing, "A sync task is already running");
            }
            SyncEvent::NoPendingTask => {
                info!("No sync task to run");
            }
            SyncEvent::TaskRecovered { task_uri } => {
                warn!(task = task_uri, "Interrupted sync task marked as failed");
            }
            SyncEvent::TaskStarted { task_uri, since } => {
                info!(task = task_uri, %since, "Sync task started");
            }
            SyncEvent::DatasetsListed { task_uri, total } => {
                info!(task = task_uri, total, "Found datasets to consume");
            }
            SyncEvent::DatasetStarted {
                dataset_id,
                index,
                total,
            } => {
                info!(dataset = dataset_id, "Consuming dataset {}/{}", index + 1, total);
            }
            SyncEvent::PredecessorRemoved {
                dataset_id,
                predecessor,
                statements,
            } => {
                info!(dataset = dataset_id, predecessor, statements, "Removed previous version");
            }
            SyncEvent::ContentMissing { dataset_id } => {
                warn!(dataset = dataset_id, "No primary content distribution found");
            }
            SyncEvent::ContentWritten {
                dataset_id,
                statements,
                physical_uri,
            } => {
                info!(dataset = dataset_id, statements, file = physical_uri, "Content written");
            }
            SyncEvent::AttachmentSkipped {
                dataset_id,
                download_url,
            } => {
                debug!(dataset = dataset_id, url = download_url, "Attachment not tracked locally");
            }
            SyncEvent::AttachmentFailed {
                dataset_id,
                download_url,
                error,
            } => {
                warn!(dataset = dataset_id, url = download_url, %error, "Attachment download failed, continuing");
            }
            SyncEvent::AttachmentsMirrored { dataset_id, copied } => {
                info!(dataset = dataset_id, copied, "Attachments mirrored");
            }
            SyncEvent::DatasetConsumed {
                dataset_id,
                handled,
                total,
            } => {
                info!(dataset = dataset_id, handled, total, "Dataset consumed");
            }
            SyncEvent::DatasetFailed { dataset_id, error } => {
                error!(dataset = dataset_id, %error, "Dataset failed");
            }
            SyncEvent::TaskSucceeded {
                task_uri,
                handled,
                watermark,
            } => {
                info!(task = task_uri, handled, %watermark, "Sync task succeeded");
            }
            SyncEvent::TaskFailed {
                task_uri,
                handled,
                total,
                error,
            } => {
                error!(task = task_uri, handled, total, %error, "Sync task failed");
            }
        }
    }
}
