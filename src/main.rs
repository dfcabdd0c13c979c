//! AdGuard API - Change Governance & Safe-Apply Platform
//!
//! Every mutation to an ad account passes through one governed pipeline:
//! - Classify: risk level derived from the proposed change and performance
//! - Guardrails: configurable protective rules (block / warn / allow)
//! - Queue: pending actions move through an explicit approval state machine
//! - Execute: serialized runs against the external platform, fully audited
//! - Rollback: successful actions can be reversed from the audit log

mod apply;
mod approval;
mod audit;
mod change;
mod config;
mod error;
mod events;
mod executor;
mod guardrail;
mod models;
mod queue;
mod risk;
mod routes;
mod state;

use crate::config::Settings;
use crate::routes::create_router;
use crate::state::AppState;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing subscriber for structured logging
    init_tracing();

    info!("🚀 Starting AdGuard - Change Governance & Safe-Apply Platform...");

    // Load configuration
    let settings = Settings::load()?;
    info!("📋 Configuration loaded successfully");

    // All stores are in-memory; state is process-lifetime
    let state = Arc::new(AppState::new(&settings));

    // Build the router
    let app = create_router(state, &settings);

    // Create socket address
    let addr = SocketAddr::from((settings.server.host, settings.server.port));

    info!("🌐 Server listening on http://{}", addr);
    info!("");
    info!("📚 API Endpoints:");
    info!("   ─── Safe Apply ───");
    info!("   POST   /api/apply                 - Apply changes (direct/draft/scheduled/experiment)");
    info!("   GET    /api/scheduled             - List scheduled changes");
    info!("   POST   /api/scheduled/release     - Release due scheduled changes");
    info!("   GET    /api/experiments           - List experiment trials");
    info!("");
    info!("   ─── Action Queue ───");
    info!("   GET    /api/queue                 - List queued actions");
    info!("   POST   /api/queue/:id/approve     - Approve a pending action");
    info!("   POST   /api/queue/:id/reject      - Reject a pending action");
    info!("   POST   /api/queue/approve-all     - Approve all pending actions");
    info!("   POST   /api/queue/reject-all      - Reject all pending actions");
    info!("   POST   /api/queue/run             - Execute approved actions");
    info!("   POST   /api/queue/clear-completed - Drop finished actions");
    info!("   DELETE /api/queue/:id             - Remove one action");
    info!("   DELETE /api/queue                 - Empty the queue");
    info!("");
    info!("   ─── Approval Workflow ───");
    info!("   POST   /api/approvals             - Create approval request");
    info!("   GET    /api/approvals             - List approval requests");
    info!("   POST   /api/approvals/:id/review  - Approve/reject a request");
    info!("   POST   /api/approvals/:id/cancel  - Cancel a request");
    info!("");
    info!("   ─── Guardrails, Audit & Rollback ───");
    info!("   GET    /api/guardrails            - Get guardrail settings");
    info!("   PUT    /api/guardrails            - Update guardrail settings");
    info!("   POST   /api/guardrails/reset      - Restore default settings");
    info!("   GET    /api/audit                 - Query the audit log");
    info!("   POST   /api/audit/:id/rollback    - Roll back a successful action");
    info!("");

    // Create TCP listener and serve
    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("👋 Server shutdown complete");
    Ok(())
}

/// Initialize tracing with structured logging
fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,adguard_api=debug,tower_http=debug"));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(
            fmt::layer()
                .with_target(true)
                .with_level(true)
                .with_thread_ids(true)
                .with_file(true)
                .with_line_number(true)
                .compact(),
        )
        .init();
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("📴 Received Ctrl+C signal, initiating graceful shutdown...");
        },
        _ = terminate => {
            info!("📴 Received terminate signal, initiating graceful shutdown...");
        },
    }
}
