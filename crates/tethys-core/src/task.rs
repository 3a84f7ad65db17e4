//! Sync task types.
//!
//! A sync task is one persisted run of the pipeline over the datasets
//! released after a lower bound.
//!
//! # Lifecycle
//!
//! ```text
//! not-started → ongoing → success
//!                  ↓
//!               failed
//! ```
//!
//! Only [`TaskStatus`] and the watermark are persisted. The fold state
//! carried through a run ([`SyncTask`]) lives in memory only.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::Dataset;

/// Namespace for sync task URIs.
pub const TASK_NAMESPACE: &str =
    "http://kanselarij.vo.data.gift/services/valvas-publication-consumer/sync-tasks/";

/// Namespace for sync task status concepts.
pub const STATUS_NAMESPACE: &str =
    "http://kanselarij.vo.data.gift/services/valvas-publication-consumer/sync-task-statuses/";

// =============================================================================
// Task Status
// =============================================================================

/// Persisted status of a sync task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TaskStatus {
    NotStarted,
    Ongoing,
    Success,
    Failed,
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::NotStarted => "not-started",
            TaskStatus::Ongoing => "ongoing",
            TaskStatus::Success => "success",
            TaskStatus::Failed => "failed",
        }
    }

    /// Status concept URI stored in the target store.
    pub fn uri(&self) -> String {
        format!("{}{}", STATUS_NAMESPACE, self.as_str())
    }

    /// Parses a status concept URI.
    pub fn from_uri(uri: &str) -> Result<Self, ParseTaskStatusError> {
        uri.strip_prefix(STATUS_NAMESPACE)
            .ok_or_else(|| ParseTaskStatusError(uri.to_string()))?
            .parse()
    }

    /// Returns true if the task will never run again.
    pub fn is_terminal(&self) -> bool {
        matches!(self, TaskStatus::Success | TaskStatus::Failed)
    }
}

/// Error type for parsing TaskStatus from string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseTaskStatusError(String);

impl std::fmt::Display for ParseTaskStatusError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "invalid task status: {}", self.0)
    }
}

impl std::error::Error for ParseTaskStatusError {}

impl std::str::FromStr for TaskStatus {
    type Err = ParseTaskStatusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "not-started" => Ok(TaskStatus::NotStarted),
            "ongoing" => Ok(TaskStatus::Ongoing),
            "success" => Ok(TaskStatus::Success),
            "failed" => Ok(TaskStatus::Failed),
            _ => Err(ParseTaskStatusError(s.to_string())),
        }
    }
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// =============================================================================
// Task Record
// =============================================================================

/// A sync task as stored in the target store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskRecord {
    pub uri: String,
    pub status: TaskStatus,
    pub created: DateTime<Utc>,
    /// Release timestamp of the last fully applied dataset.
    pub watermark: Option<DateTime<Utc>>,
}

impl TaskRecord {
    /// Task URI for a freshly minted identifier.
    pub fn uri_for(id: uuid::Uuid) -> String {
        format!("{}{}", TASK_NAMESPACE, id)
    }
}

// =============================================================================
// In-memory fold state
// =============================================================================

/// Progress of the dataset fold within a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Progress {
    /// No dataset attempted yet.
    Idle,
    /// At least one dataset consumed, none failed.
    Progressing,
    /// A dataset failed; the fold stops here.
    Failed,
}

/// A running sync task with its dataset list and fold accumulator.
#[derive(Debug, Clone)]
pub struct SyncTask {
    pub uri: String,
    /// Exclusive lower bound on release dates for this run.
    pub since: DateTime<Utc>,
    datasets: Vec<Dataset>,
    cursor: usize,
    progress: Progress,
    watermark: DateTime<Utc>,
}

impl SyncTask {
    /// Starts a run over `datasets`, which must be sorted by ascending release date.
    pub fn new(uri: impl Into<String>, since: DateTime<Utc>, datasets: Vec<Dataset>) -> Self {
        Self {
            uri: uri.into(),
            since,
            datasets,
            cursor: 0,
            progress: Progress::Idle,
            watermark: since,
        }
    }

    pub fn total(&self) -> usize {
        self.datasets.len()
    }

    /// Number of datasets fully applied so far.
    pub fn handled(&self) -> usize {
        self.cursor
    }

    pub fn progress(&self) -> Progress {
        self.progress
    }

    pub fn watermark(&self) -> DateTime<Utc> {
        self.watermark
    }

    pub fn datasets(&self) -> &[Dataset] {
        &self.datasets
    }

    /// Next dataset to attempt, or `None` once finished or failed.
    pub fn next_dataset(&mut self) -> Option<&mut Dataset> {
        if self.progress == Progress::Failed {
            return None;
        }
        self.datasets.get_mut(self.cursor)
    }

    /// Records the dataset at the cursor as applied.
    ///
    /// Returns the new watermark when it moved forward. The watermark never
    /// decreases, even if upstream returned equal release dates.
    pub fn record_success(&mut self) -> Option<DateTime<Utc>> {
        let released = self.datasets.get(self.cursor)?.release_date;
        self.cursor += 1;
        self.progress = Progress::Progressing;
        if released > self.watermark {
            self.watermark = released;
            Some(released)
        } else {
            None
        }
    }

    pub fn record_failure(&mut self) {
        self.progress = Progress::Failed;
    }

    /// Status to persist once the fold is done.
    pub fn final_status(&self) -> TaskStatus {
        if self.progress == Progress::Failed {
            TaskStatus::Failed
        } else {
            TaskStatus::Success
        }
    }

    pub fn summary(&self) -> TaskSummary {
        TaskSummary {
            task_uri: self.uri.clone(),
            status: self.final_status(),
            handled: self.handled(),
            total: self.total(),
            watermark: self.watermark,
        }
    }
}

/// Outcome of a completed run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TaskSummary {
    pub task_uri: String,
    pub status: TaskStatus,
    pub handled: usize,
    pub total: usize,
    pub watermark: DateTime<Utc>,
}

// =============================================================================
// Tests
// =============================================================================
