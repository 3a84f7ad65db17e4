//! Sync trigger endpoint.

use axum::{Json, extract::State, http::StatusCode};
use tracing::{error, info};

use tethys_core::TriggerOutcome;

use crate::dto::TriggerResponse;
use crate::error::ApiError;
use crate::state::AppState;

/// Runs one sync cycle.
///
/// - `202` when a task was started; it keeps running after the response
/// - `200` when there was nothing to run
/// - `409` when another task is ongoing
pub async fn trigger_ingest(
    State(state): State<AppState>,
) -> Result<(StatusCode, Json<TriggerResponse>), ApiError> {
    let outcome = state.scheduler.trigger().await.map_err(|e| {
        error!(error = %e, "Sync trigger failed");
        ApiError::from(e)
    })?;

    let body = TriggerResponse::from(&outcome);
    let status = match outcome {
        TriggerOutcome::Accepted(running) => {
            info!(task = %running.task_uri, datasets = running.total, "Sync task started");
            StatusCode::ACCEPTED
        }
        TriggerOutcome::NoTaskFound => StatusCode::OK,
        TriggerOutcome::Conflict => StatusCode::CONFLICT,
    };

    Ok((status, Json(body)))
}
