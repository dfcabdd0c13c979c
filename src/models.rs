//! Data models and DTOs (Data Transfer Objects)
//!
//! Contains the shared response envelopes and the request actor principal.

use axum::http::HeaderMap;
use serde::Serialize;

/// Generic success response
#[derive(Serialize)]
pub struct SuccessResponse<T: Serialize> {
    pub success: bool,
    pub message: String,
    #[serde(flatten)]
    pub data: Option<T>,
}

impl<T: Serialize> SuccessResponse<T> {
    pub fn with_data(message: impl Into<String>, data: T) -> Self {
        Self {
            success: true,
            message: message.into(),
            data: Some(data),
        }
    }
}

/// Message-only response (no data)
#[derive(Serialize)]
pub struct MessageResponse {
    pub success: bool,
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
        }
    }
}

/// The principal issuing a command.
///
/// Authentication is an external collaborator; the gateway in front of this
/// service resolves the session and forwards identity and capability via
/// headers. `can_approve` gates review/rollback commands.
#[derive(Debug, Clone)]
pub struct Actor {
    pub id: String,
    pub name: String,
    pub can_approve: bool,
}

impl Actor {
    /// Resolve the actor from forwarded identity headers, with an anonymous
    /// non-approver fallback
    pub fn from_headers(headers: &HeaderMap) -> Self {
        let header = |name: &str| {
            headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string)
        };
        let id = header("x-actor-id").unwrap_or_else(|| "anonymous".to_string());
        let name = header("x-actor-name").unwrap_or_else(|| id.clone());
        let can_approve = header("x-actor-role")
            .map(|role| role.eq_ignore_ascii_case("approver") || role.eq_ignore_ascii_case("admin"))
            .unwrap_or(false);
        Self { id, name, can_approve }
    }
}
