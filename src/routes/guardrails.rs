//! Guardrail settings routes

use crate::error::AppError;
use crate::events::DomainEvent;
use crate::guardrail::GuardrailSettings;
use crate::models::SuccessResponse;
use crate::state::SharedState;
use axum::{extract::State, Json};
use serde::Serialize;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SettingsResponse {
    pub settings: GuardrailSettings,
}

/// Get the current guardrail settings
pub async fn get_settings(
    State(state): State<SharedState>,
) -> Result<Json<SuccessResponse<SettingsResponse>>, AppError> {
    let settings = state.guardrails.get().await;
    Ok(Json(SuccessResponse::with_data(
        "Guardrail settings retrieved",
        SettingsResponse { settings },
    )))
}

/// Replace the guardrail settings; values are validated before taking effect
pub async fn update_settings(
    State(state): State<SharedState>,
    Json(payload): Json<GuardrailSettings>,
) -> Result<Json<SuccessResponse<SettingsResponse>>, AppError> {
    let settings = state.guardrails.update(payload).await?;
    state.events.publish(DomainEvent::SettingsUpdated);
    Ok(Json(SuccessResponse::with_data(
        "Guardrail settings updated",
        SettingsResponse { settings },
    )))
}

/// Restore the default guardrail settings
pub async fn reset_settings(
    State(state): State<SharedState>,
) -> Result<Json<SuccessResponse<SettingsResponse>>, AppError> {
    let settings = state.guardrails.reset().await;
    state.events.publish(DomainEvent::SettingsUpdated);
    Ok(Json(SuccessResponse::with_data(
        "Guardrail settings reset to defaults",
        SettingsResponse { settings },
    )))
}
