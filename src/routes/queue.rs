//! Action queue routes
//!
//! API endpoints for inspecting the queue, moving actions through the
//! approval state machine and triggering an execution run.

use crate::error::AppError;
use crate::executor::RunReport;
use crate::models::{MessageResponse, SuccessResponse};
use crate::queue::QueuedAction;
use crate::state::SharedState;
use axum::{
    extract::{Path, State},
    Json,
};
use serde::Serialize;
use uuid::Uuid;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueListResponse {
    pub actions: Vec<QueuedAction>,
    pub pending_count: usize,
    pub is_executing: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionResponse {
    pub action: QueuedAction,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkResponse {
    pub affected: usize,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunResponse {
    pub report: RunReport,
}

/// List every queued action in insertion order
pub async fn list_queue(
    State(state): State<SharedState>,
) -> Result<Json<SuccessResponse<QueueListResponse>>, AppError> {
    let actions = state.queue.list().await;
    let pending_count = state.queue.pending_count().await;
    Ok(Json(SuccessResponse::with_data(
        "Queue retrieved",
        QueueListResponse {
            actions,
            pending_count,
            is_executing: state.executor.is_executing(),
        },
    )))
}

/// Approve a pending action
pub async fn approve_action(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<Json<SuccessResponse<ActionResponse>>, AppError> {
    let action = state.queue.approve(id).await?;
    Ok(Json(SuccessResponse::with_data("Action approved", ActionResponse { action })))
}

/// Reject a pending action
pub async fn reject_action(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<Json<SuccessResponse<ActionResponse>>, AppError> {
    let action = state.queue.reject(id).await?;
    Ok(Json(SuccessResponse::with_data("Action rejected", ActionResponse { action })))
}

/// Approve every pending action
pub async fn approve_all(
    State(state): State<SharedState>,
) -> Result<Json<SuccessResponse<BulkResponse>>, AppError> {
    let affected = state.queue.approve_all().await;
    Ok(Json(SuccessResponse::with_data(
        format!("Approved {} action(s)", affected),
        BulkResponse { affected },
    )))
}

/// Reject every pending action
pub async fn reject_all(
    State(state): State<SharedState>,
) -> Result<Json<SuccessResponse<BulkResponse>>, AppError> {
    let affected = state.queue.reject_all().await;
    Ok(Json(SuccessResponse::with_data(
        format!("Rejected {} action(s)", affected),
        BulkResponse { affected },
    )))
}

/// Remove one action; an executing action must resolve first
pub async fn remove_action(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<Json<MessageResponse>, AppError> {
    state.queue.remove(id).await?;
    Ok(Json(MessageResponse::new("Action removed")))
}

/// Drop every action in a terminal state
pub async fn clear_completed(
    State(state): State<SharedState>,
) -> Result<Json<SuccessResponse<BulkResponse>>, AppError> {
    let affected = state.queue.clear_completed().await;
    Ok(Json(SuccessResponse::with_data(
        format!("Cleared {} finished action(s)", affected),
        BulkResponse { affected },
    )))
}

/// Empty the queue entirely
pub async fn clear_all(
    State(state): State<SharedState>,
) -> Result<Json<SuccessResponse<BulkResponse>>, AppError> {
    let affected = state.queue.clear_all().await;
    Ok(Json(SuccessResponse::with_data(
        format!("Cleared {} action(s)", affected),
        BulkResponse { affected },
    )))
}

/// Execute every currently approved action, serialized and in queue order.
/// Returns 409 if a run is already in progress.
pub async fn run_executor(
    State(state): State<SharedState>,
) -> Result<Json<SuccessResponse<RunResponse>>, AppError> {
    let report = state.executor.run().await?;
    Ok(Json(SuccessResponse::with_data(
        format!(
            "Run finished: {} succeeded, {} failed",
            report.succeeded, report.failed
        ),
        RunResponse { report },
    )))
}
