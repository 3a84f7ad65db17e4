//! Sync task records in the triplestore.
//!
//! Tasks are `ext:SyncTask` resources with an `adms:status`, a
//! `dct:created` timestamp and, once a dataset has been applied, an
//! `ext:datasetsUntil` watermark. Reads search every graph; new tasks are
//! written to the configured task graph.

use chrono::{DateTime, Utc};
use tracing::debug;
use uuid::Uuid;

use tethys_core::config::PUBLIC_GRAPH;
use tethys_core::error::AppError;
use tethys_core::statement::{escape_datetime, escape_string, escape_uri};
use tethys_core::task::{TaskRecord, TaskStatus};
use tethys_core::traits::TaskQueue;

use crate::sparql::{Binding, PREFIXES, SparqlClient};

/// Triplestore implementation of the task queue.
#[derive(Clone)]
pub struct TaskRepository {
    sparql: SparqlClient,
    graph: String,
}

impl TaskRepository {
    /// Creates a repository that writes new tasks to the public graph.
    pub fn new(sparql: SparqlClient) -> Self {
        Self::with_graph(sparql, PUBLIC_GRAPH)
    }

    pub fn with_graph(sparql: SparqlClient, graph: impl Into<String>) -> Self {
        Self {
            sparql,
            graph: graph.into(),
        }
    }
}

// =============================================================================
// Query builders
// =============================================================================

fn select_by_status(status: TaskStatus, limit: Option<usize>) -> String {
    let limit = limit.map(|n| format!(" LIMIT {}", n)).unwrap_or_default();
    format!(
        "{PREFIXES}
SELECT ?task ?created ?watermark WHERE {{
  GRAPH ?g {{
    ?task a ext:SyncTask ;
      adms:status {status} ;
      dct:created ?created .
    OPTIONAL {{ ?task ext:datasetsUntil ?watermark }}
  }}
}} ORDER BY ASC(?created){limit}",
        status = escape_uri(&status.uri()),
    )
}

fn insert_task(graph: &str, record: &TaskRecord, id: Uuid) -> String {
    format!(
        "{PREFIXES}
INSERT DATA {{
  GRAPH {graph} {{
    {task} a ext:SyncTask ;
      mu:uuid {id} ;
      adms:status {status} ;
      dct:created {created} .
  }}
}}",
        graph = escape_uri(graph),
        task = escape_uri(&record.uri),
        id = escape_string(&id.to_string()),
        status = escape_uri(&record.status.uri()),
        created = escape_datetime(record.created),
    )
}

const SELECT_LATEST_WATERMARK: &str = "
SELECT ?watermark WHERE {
  GRAPH ?g {
    ?task a ext:SyncTask ;
      ext:datasetsUntil ?watermark .
  }
} ORDER BY DESC(?watermark) LIMIT 1";

/// Replaces the single value of `predicate` on a task, in the task's own graph.
fn replace_task_value(task_uri: &str, predicate: &str, object: &str) -> String {
    let task = escape_uri(task_uri);
    format!(
        "{PREFIXES}
DELETE WHERE {{
  GRAPH ?g {{
    {task} {predicate} ?value .
  }}
}} ;
INSERT {{
  GRAPH ?g {{
    {task} {predicate} {object} .
  }}
}} WHERE {{
  GRAPH ?g {{
    {task} a ext:SyncTask .
  }}
}}"
    )
}

fn update_status(task_uri: &str, status: TaskStatus) -> String {
    replace_task_value(task_uri, "adms:status", &escape_uri(&status.uri()))
}

fn update_watermark(task_uri: &str, watermark: DateTime<Utc>) -> String {
    replace_task_value(task_uri, "ext:datasetsUntil", &escape_datetime(watermark))
}

fn task_from_binding(binding: &Binding, status: TaskStatus) -> Result<TaskRecord, AppError> {
    let created = binding
        .datetime("created")?
        .ok_or_else(|| AppError::StoreError("Sync task without dct:created".to_string()))?;
    Ok(TaskRecord {
        uri: binding.require("task")?.to_string(),
        status,
        created,
        watermark: binding.datetime("watermark")?,
    })
}

// =============================================================================
// TaskQueue Trait Implementation
// =============================================================================

impl TaskQueue for TaskRepository {
    async fn find_oldest_not_started(&self) -> Result<Option<TaskRecord>, AppError> {
        let rows = self
            .sparql
            .query(&select_by_status(TaskStatus::NotStarted, Some(1)))
            .await?;
        rows.first()
            .map(|row| task_from_binding(row, TaskStatus::NotStarted))
            .transpose()
    }

    async fn create_task(&self, id: Uuid, created: DateTime<Utc>) -> Result<TaskRecord, AppError> {
        let record = TaskRecord {
            uri: TaskRecord::uri_for(id),
            status: TaskStatus::NotStarted,
            created,
            watermark: None,
        };
        self.sparql
            .update(&insert_task(&self.graph, &record, id))
            .await?;
        debug!(task = %record.uri, "Inserted sync task");
        Ok(record)
    }

    async fn list_ongoing(&self) -> Result<Vec<TaskRecord>, AppError> {
        let rows = self
            .sparql
            .query(&select_by_status(TaskStatus::Ongoing, None))
            .await?;
        rows.iter()
            .map(|row| task_from_binding(row, TaskStatus::Ongoing))
            .collect()
    }

    async fn latest_watermark(&self) -> Result<Option<DateTime<Utc>>, AppError> {
        let rows = self
            .sparql
            .query(&format!("{PREFIXES}{SELECT_LATEST_WATERMARK}"))
            .await?;
        match rows.first() {
            Some(row) => row.datetime("watermark"),
            None => Ok(None),
        }
    }

    async fn persist_status(&self, task_uri: &str, status: TaskStatus) -> Result<(), AppError> {
        self.sparql.update(&update_status(task_uri, status)).await
    }

    async fn persist_watermark(
        &self,
        task_uri: &str,
        watermark: DateTime<Utc>,
    ) -> Result<(), AppError> {
        self.sparql
            .update(&update_watermark(task_uri, watermark))
            .await
    }
}
