//! Route definitions and router setup
//!
//! Configures all API routes and middleware.

mod apply;
mod approvals;
mod audit;
mod guardrails;
mod queue;

use crate::config::Settings;
use crate::state::SharedState;
use axum::{
    http::{header, Method},
    routing::{delete, get, post, put},
    Router,
};
use std::time::Duration;
use tower::ServiceBuilder;
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    request_id::MakeRequestUuid,
    trace::{DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer},
    ServiceBuilderExt,
};
use tracing::Level;

/// Create the application router with all routes and middleware
pub fn create_router(state: SharedState, settings: &Settings) -> Router {
    // Build CORS layer
    let cors = build_cors_layer(settings);

    // Build tracing/logging layer
    let trace_layer = TraceLayer::new_for_http()
        .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
        .on_request(DefaultOnRequest::new().level(Level::INFO))
        .on_response(DefaultOnResponse::new().level(Level::INFO));

    // Build middleware stack
    let middleware = ServiceBuilder::new()
        .set_x_request_id(MakeRequestUuid)
        .layer(trace_layer)
        .layer(CompressionLayer::new())
        .layer(cors)
        .propagate_x_request_id();

    // Build the router
    Router::new()
        // Health check
        .route("/health", get(health_check))
        // Safe-apply entry point
        .route("/api/apply", post(apply::apply_changes))
        // Action queue
        .route("/api/queue", get(queue::list_queue))
        .route("/api/queue", delete(queue::clear_all))
        .route("/api/queue/run", post(queue::run_executor))
        .route("/api/queue/approve-all", post(queue::approve_all))
        .route("/api/queue/reject-all", post(queue::reject_all))
        .route("/api/queue/clear-completed", post(queue::clear_completed))
        .route("/api/queue/{id}", delete(queue::remove_action))
        .route("/api/queue/{id}/approve", post(queue::approve_action))
        .route("/api/queue/{id}/reject", post(queue::reject_action))
        // Approval workflow
        .route("/api/approvals", get(approvals::list_approvals))
        .route("/api/approvals", post(approvals::create_approval))
        .route("/api/approvals/{id}/review", post(approvals::review_approval))
        .route("/api/approvals/{id}/cancel", post(approvals::cancel_approval))
        // Guardrail settings
        .route("/api/guardrails", get(guardrails::get_settings))
        .route("/api/guardrails", put(guardrails::update_settings))
        .route("/api/guardrails/reset", post(guardrails::reset_settings))
        // Audit log & rollback
        .route("/api/audit", get(audit::list_audit))
        .route("/api/audit/{id}/rollback", post(audit::rollback_entry))
        // Scheduled changes & experiment trials
        .route("/api/scheduled", get(apply::list_scheduled))
        .route("/api/scheduled/release", post(apply::release_scheduled))
        .route("/api/experiments", get(apply::list_experiments))
        // Apply middleware and state
        .layer(middleware)
        .with_state(state)
}

/// Build CORS layer from settings
fn build_cors_layer(settings: &Settings) -> CorsLayer {
    let origins: Vec<_> = settings
        .cors
        .allowed_origins
        .iter()
        .filter_map(|s| s.parse().ok())
        .collect();

    if origins.is_empty() {
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE, Method::OPTIONS])
            .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION, header::ACCEPT])
            .max_age(Duration::from_secs(3600))
    } else {
        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE, Method::OPTIONS])
            .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION, header::ACCEPT])
            .max_age(Duration::from_secs(3600))
    }
}

/// Health check endpoint
async fn health_check() -> axum::Json<serde_json::Value> {
    axum::Json(serde_json::json!({
        "success": true,
        "message": "Server is running fine.",
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "version": env!("CARGO_PKG_VERSION")
    }))
}
