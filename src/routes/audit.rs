//! Audit log routes
//!
//! Read side of the append-only audit log plus the rollback command.

use crate::audit::{AuditLogEntry, AuditQuery, RollbackEngine};
use crate::error::AppError;
use crate::models::{Actor, SuccessResponse};
use crate::state::SharedState;
use axum::{
    extract::{Path, Query, State},
    http::HeaderMap,
    Json,
};
use serde::Serialize;
use uuid::Uuid;

/// An audit entry annotated with whether it can still be reversed
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditEntryView {
    #[serde(flatten)]
    pub entry: AuditLogEntry,
    pub can_rollback: bool,
}

impl From<AuditLogEntry> for AuditEntryView {
    fn from(entry: AuditLogEntry) -> Self {
        let can_rollback = RollbackEngine::can_rollback(&entry);
        Self { entry, can_rollback }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditListResponse {
    pub items: Vec<AuditEntryView>,
    pub total: usize,
    pub has_more: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RollbackResponse {
    pub entry: AuditEntryView,
}

/// List audit entries, filtered and paginated, most recent first
pub async fn list_audit(
    State(state): State<SharedState>,
    Query(filter): Query<AuditQuery>,
) -> Result<Json<SuccessResponse<AuditListResponse>>, AppError> {
    let page = state.audit.query(&filter).await;
    Ok(Json(SuccessResponse::with_data(
        "Audit log retrieved",
        AuditListResponse {
            items: page.items.into_iter().map(AuditEntryView::from).collect(),
            total: page.total,
            has_more: page.has_more,
        },
    )))
}

/// Reverse a previously successful action; requires approve capability.
/// Appends a new rollback entry and never mutates the original.
pub async fn rollback_entry(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
    headers: HeaderMap,
) -> Result<Json<SuccessResponse<RollbackResponse>>, AppError> {
    let actor = Actor::from_headers(&headers);
    let entry = state.rollback.rollback(id, &actor).await?;
    Ok(Json(SuccessResponse::with_data(
        "Rollback executed",
        RollbackResponse { entry: entry.into() },
    )))
}
