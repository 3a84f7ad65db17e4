//! Response bodies.

use serde::Serialize;

use tethys_core::TriggerOutcome;

/// Body of `POST /ingest`.
#[derive(Debug, Serialize)]
pub struct TriggerResponse {
    pub outcome: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub task: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub datasets: Option<usize>,
}

impl From<&TriggerOutcome> for TriggerResponse {
    fn from(outcome: &TriggerOutcome) -> Self {
        let (task, datasets) = match outcome {
            TriggerOutcome::Accepted(running) => {
                (Some(running.task_uri.clone()), Some(running.total))
            }
            TriggerOutcome::NoTaskFound | TriggerOutcome::Conflict => (None, None),
        };
        Self {
            outcome: outcome.as_str(),
            task,
            datasets,
        }
    }
}

/// Body of `GET /health`.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}
