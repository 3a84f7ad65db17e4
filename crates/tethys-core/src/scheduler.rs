//! Scheduler: decides when a sync task runs.
//!
//! # Trigger
//!
//! ```text
//! trigger():
//!     1. schedule a not-started task unless one exists
//!     2. any task ongoing?          → Conflict
//!     3. oldest not-started task?   → none: NoTaskFound
//!     4. since := latest watermark | configured start | task creation time
//!     5. start (ongoing + listing)  → listing error: Err
//!     6. spawn the fold             → Accepted
//! ```
//!
//! Steps 1 to 5 run under an in-process lock, so two concurrent triggers in
//! the same process can never both start a task. Across processes the
//! ongoing check in step 2 is the only guard.
//!
//! # Recovery
//!
//! A task left `ongoing` by a crashed process would block every later
//! trigger with a conflict. [`Scheduler::recover_interrupted`] closes such
//! tasks as failed at startup; their recorded watermark stays valid because
//! it only ever covers fully applied datasets.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use uuid::Uuid;

use crate::config::SyncConfig;
use crate::error::AppError;
use crate::progress::{SyncEvent, SyncReporter};
use crate::sync::SyncService;
use crate::task::{TaskRecord, TaskStatus, TaskSummary};
use crate::traits::{CatalogClient, FileRegistry, GraphStore, TaskQueue};

// =============================================================================
// Trigger Outcome
// =============================================================================

/// Result of a trigger request.
#[derive(Debug)]
pub enum TriggerOutcome {
    /// A task was started; its fold runs in the background.
    Accepted(RunningTask),
    /// No task is waiting to run.
    NoTaskFound,
    /// Another task is ongoing.
    Conflict,
}

impl TriggerOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            TriggerOutcome::Accepted(_) => "accepted",
            TriggerOutcome::NoTaskFound => "no-task-found",
            TriggerOutcome::Conflict => "conflict",
        }
    }

    pub fn is_accepted(&self) -> bool {
        matches!(self, TriggerOutcome::Accepted(_))
    }
}

/// Handle to a task whose fold runs in the background.
///
/// Dropping the handle detaches the fold; it keeps running.
#[derive(Debug)]
pub struct RunningTask {
    pub task_uri: String,
    pub total: usize,
    handle: JoinHandle<Result<TaskSummary, AppError>>,
}

impl RunningTask {
    /// Waits for the fold to finish.
    pub async fn wait(self) -> Result<TaskSummary, AppError> {
        self.handle
            .await
            .map_err(|e| AppError::Generic(format!("Sync task aborted: {}", e)))?
    }
}

/// A not-started task together with its computed lower bound.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingTask {
    pub record: TaskRecord,
    pub since: DateTime<Utc>,
}

// =============================================================================
// Scheduler
// =============================================================================

/// Schedules and starts sync tasks.
pub struct Scheduler<Q, C, F, G, R>
where
    Q: TaskQueue,
    C: CatalogClient,
    F: FileRegistry,
    G: GraphStore,
    R: SyncReporter,
{
    queue: Q,
    service: SyncService<Q, C, F, G>,
    reporter: R,
    trigger_lock: Arc<Mutex<()>>,
}

impl<Q, C, F, G, R> Clone for Scheduler<Q, C, F, G, R>
where
    Q: TaskQueue,
    C: CatalogClient,
    F: FileRegistry,
    G: GraphStore,
    R: SyncReporter + Clone,
{
    fn clone(&self) -> Self {
        Self {
            queue: self.queue.clone(),
            service: self.service.clone(),
            reporter: self.reporter.clone(),
            trigger_lock: Arc::clone(&self.trigger_lock),
        }
    }
}

impl<Q, C, F, G, R> Scheduler<Q, C, F, G, R>
where
    Q: TaskQueue + 'static,
    C: CatalogClient + 'static,
    F: FileRegistry + 'static,
    G: GraphStore + 'static,
    R: SyncReporter + Clone + 'static,
{
    pub fn new(queue: Q, service: SyncService<Q, C, F, G>, reporter: R) -> Self {
        Self {
            queue,
            service,
            reporter,
            trigger_lock: Arc::new(Mutex::new(())),
        }
    }

    fn config(&self) -> &SyncConfig {
        self.service.config()
    }

    /// Creates a not-started task unless one already exists.
    ///
    /// Returns the created task, or `None` when one was already waiting.
    pub async fn schedule_if_absent(&self) -> Result<Option<TaskRecord>, AppError> {
        if self.queue.find_oldest_not_started().await?.is_some() {
            return Ok(None);
        }
        let record = self.queue.create_task(Uuid::new_v4(), Utc::now()).await?;
        self.reporter.report(SyncEvent::TaskScheduled {
            task_uri: &record.uri,
        });
        Ok(Some(record))
    }

    pub async fn is_running(&self) -> Result<bool, AppError> {
        Ok(!self.queue.list_ongoing().await?.is_empty())
    }

    /// Oldest not-started task and the lower bound it will sync from.
    pub async fn next_pending(&self) -> Result<Option<PendingTask>, AppError> {
        let Some(record) = self.queue.find_oldest_not_started().await? else {
            return Ok(None);
        };
        let since = match self.queue.latest_watermark().await? {
            Some(watermark) => watermark,
            None => self.config().start_from.unwrap_or(record.created),
        };
        Ok(Some(PendingTask { record, since }))
    }

    /// Closes tasks left ongoing by an interrupted process.
    pub async fn recover_interrupted(&self) -> Result<usize, AppError> {
        let ongoing = self.queue.list_ongoing().await?;
        for task in &ongoing {
            self.queue
                .persist_status(&task.uri, TaskStatus::Failed)
                .await?;
            self.reporter.report(SyncEvent::TaskRecovered {
                task_uri: &task.uri,
            });
        }
        Ok(ongoing.len())
    }

    /// Schedules a task if needed and starts the oldest one.
    pub async fn trigger(&self) -> Result<TriggerOutcome, AppError> {
        let _guard = self.trigger_lock.lock().await;

        self.schedule_if_absent().await?;

        let ongoing = self.queue.list_ongoing().await?.len();
        if ongoing > 0 {
            self.reporter.report(SyncEvent::TriggerConflict { ongoing });
            return Ok(TriggerOutcome::Conflict);
        }

        let Some(pending) = self.next_pending().await? else {
            self.reporter.report(SyncEvent::NoPendingTask);
            return Ok(TriggerOutcome::NoTaskFound);
        };

        let task = self
            .service
            .start(&pending.record.uri, pending.since, &self.reporter)
            .await?;

        let task_uri = task.uri.clone();
        let total = task.total();
        let service = self.service.clone();
        let reporter = self.reporter.clone();
        let handle = tokio::spawn(async move { service.execute(task, &reporter).await });

        Ok(TriggerOutcome::Accepted(RunningTask {
            task_uri,
            total,
            handle,
        }))
    }

    /// Triggers every `interval` until cancelled.
    ///
    /// Trigger errors are logged and do not stop the loop.
    pub async fn run_periodic(&self, interval: Duration, cancel: CancellationToken) {
        info!(interval_ms = interval.as_millis() as u64, "Periodic sync enabled");
        let mut ticker = tokio::time::interval(interval);
        // First tick fires immediately.
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    info!("Periodic sync stopped");
                    break;
                }
                _ = ticker.tick() => {
                    match self.trigger().await {
                        Ok(outcome) => info!(outcome = outcome.as_str(), "Periodic sync trigger"),
                        Err(e) => error!(error = %e, "Periodic sync trigger failed"),
                    }
                }
            }
        }
    }
}
