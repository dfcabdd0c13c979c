//! Approval workflow routes
//!
//! API endpoints for creating, reviewing and cancelling approval requests.
//! The acting principal arrives via forwarded identity headers.

use crate::approval::{ApprovalQuery, ApprovalRequest, CreateApproval, ReviewDecision};
use crate::audit::Page;
use crate::error::AppError;
use crate::models::{Actor, SuccessResponse};
use crate::state::SharedState;
use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    Json,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewRequest {
    pub decision: ReviewDecision,
    #[serde(default)]
    pub comments: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApprovalResponse {
    pub request: ApprovalRequest,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApprovalListResponse {
    #[serde(flatten)]
    pub page: Page<ApprovalRequest>,
}

/// Create an approval request
pub async fn create_approval(
    State(state): State<SharedState>,
    headers: HeaderMap,
    Json(payload): Json<CreateApproval>,
) -> Result<(StatusCode, Json<SuccessResponse<ApprovalResponse>>), AppError> {
    let actor = Actor::from_headers(&headers);
    let request = state.approvals.create(payload, &actor).await;
    Ok((
        StatusCode::CREATED,
        Json(SuccessResponse::with_data(
            "Approval request created",
            ApprovalResponse { request },
        )),
    ))
}

/// List approval requests, filtered and paginated, most recent first
pub async fn list_approvals(
    State(state): State<SharedState>,
    Query(filter): Query<ApprovalQuery>,
) -> Result<Json<SuccessResponse<ApprovalListResponse>>, AppError> {
    let page = state.approvals.query(&filter).await;
    Ok(Json(SuccessResponse::with_data(
        "Approval requests retrieved",
        ApprovalListResponse { page },
    )))
}

/// Approve or reject a pending request; requires approve capability
pub async fn review_approval(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
    headers: HeaderMap,
    Json(payload): Json<ReviewRequest>,
) -> Result<Json<SuccessResponse<ApprovalResponse>>, AppError> {
    let actor = Actor::from_headers(&headers);
    let request = state
        .approvals
        .review(id, payload.decision, &actor, payload.comments)
        .await?;
    let message = match payload.decision {
        ReviewDecision::Approve => "Request approved",
        ReviewDecision::Reject => "Request rejected",
    };
    Ok(Json(SuccessResponse::with_data(message, ApprovalResponse { request })))
}

/// Cancel a pending request; allowed for the requester or an approver
pub async fn cancel_approval(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
    headers: HeaderMap,
) -> Result<Json<SuccessResponse<ApprovalResponse>>, AppError> {
    let actor = Actor::from_headers(&headers);
    let request = state.approvals.cancel(id, &actor).await?;
    Ok(Json(SuccessResponse::with_data(
        "Request cancelled",
        ApprovalResponse { request },
    )))
}
