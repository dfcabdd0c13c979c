//! Safe-apply routes
//!
//! API endpoints for applying change batches and for the scheduled-change
//! and experiment stores the apply modes feed.

use crate::apply::{
    ApplyMode, ApplyOptions, ApplyOutcome, ChangeItem, ExperimentTrial, ScheduledChange,
};
use crate::error::{validation_error, AppError};
use crate::models::SuccessResponse;
use crate::risk::RiskPolicy;
use crate::state::SharedState;
use axum::{extract::State, Json};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use validator::Validate;

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ApplyRequest {
    #[validate(length(min = 1, message = "At least one change is required"))]
    pub changes: Vec<ChangeItem>,
    pub mode: ApplyMode,
    #[serde(default)]
    pub options: ApplyOptions,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduledListResponse {
    pub scheduled: Vec<ScheduledChange>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReleasedResponse {
    pub released: usize,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExperimentListResponse {
    pub experiments: Vec<ExperimentTrial>,
}

/// Apply a batch of proposed changes under the chosen mode
pub async fn apply_changes(
    State(state): State<SharedState>,
    Json(payload): Json<ApplyRequest>,
) -> Result<Json<SuccessResponse<ApplyOutcome>>, AppError> {
    // Validate input
    payload.validate().map_err(|e| validation_error(e.to_string()))?;

    let outcome = state
        .negotiator
        .apply(payload.changes, payload.mode, payload.options)
        .await?;

    let message = if outcome.blocked.is_empty() {
        "Changes applied".to_string()
    } else {
        format!("{} change(s) blocked by guardrails", outcome.blocked.len())
    };
    Ok(Json(SuccessResponse::with_data(message, outcome)))
}

/// List scheduled changes, released and unreleased
pub async fn list_scheduled(
    State(state): State<SharedState>,
) -> Result<Json<SuccessResponse<ScheduledListResponse>>, AppError> {
    let scheduled = state.scheduled.list().await;
    Ok(Json(SuccessResponse::with_data(
        "Scheduled changes retrieved",
        ScheduledListResponse { scheduled },
    )))
}

/// Release every due scheduled change into the queue.
///
/// An external scheduler calls this on a cadence; it is also available for
/// manual release.
pub async fn release_scheduled(
    State(state): State<SharedState>,
) -> Result<Json<SuccessResponse<ReleasedResponse>>, AppError> {
    let settings = state.guardrails.get().await;
    let policy = RiskPolicy::from(&settings);
    let released = state
        .scheduled
        .release_due(Utc::now(), &state.queue, &policy)
        .await;
    Ok(Json(SuccessResponse::with_data(
        format!("Released {} scheduled change(s)", released.len()),
        ReleasedResponse { released: released.len() },
    )))
}

/// List recorded experiment trials
pub async fn list_experiments(
    State(state): State<SharedState>,
) -> Result<Json<SuccessResponse<ExperimentListResponse>>, AppError> {
    let experiments = state.experiments.list().await;
    Ok(Json(SuccessResponse::with_data(
        "Experiments retrieved",
        ExperimentListResponse { experiments },
    )))
}
