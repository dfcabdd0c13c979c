//! Application state management
//!
//! Contains shared state accessible across all handlers. Every mutable
//! store serializes through its own lock; the executor additionally holds
//! the process-wide single-flight slot.

use crate::apply::{ExperimentStore, SafeApplyNegotiator, ScheduledStore};
use crate::approval::ApprovalStore;
use crate::audit::{AuditLog, RollbackEngine};
use crate::config::Settings;
use crate::events::EventBus;
use crate::executor::{Executor, LoggingBoundary, MutationBoundary};
use crate::guardrail::GuardrailStore;
use crate::queue::ActionQueue;
use std::sync::Arc;
use std::time::Duration;

/// Application state shared across all handlers
pub struct AppState {
    pub guardrails: Arc<GuardrailStore>,
    pub queue: Arc<ActionQueue>,
    pub approvals: ApprovalStore,
    pub audit: Arc<AuditLog>,
    pub scheduled: Arc<ScheduledStore>,
    pub experiments: Arc<ExperimentStore>,
    pub negotiator: SafeApplyNegotiator,
    pub executor: Arc<Executor>,
    pub rollback: RollbackEngine,
    pub events: EventBus,
}

impl AppState {
    /// Wire the full governance core against the given mutation boundary
    pub fn with_boundary(settings: &Settings, boundary: Arc<dyn MutationBoundary>) -> Self {
        let events = EventBus::new(settings.governance.event_capacity);
        let guardrails = Arc::new(GuardrailStore::new());
        let queue = Arc::new(ActionQueue::new(events.clone()));
        let audit = Arc::new(AuditLog::new());
        let scheduled = Arc::new(ScheduledStore::new());
        let experiments = Arc::new(ExperimentStore::new());

        let negotiator = SafeApplyNegotiator::new(
            queue.clone(),
            guardrails.clone(),
            scheduled.clone(),
            experiments.clone(),
        );
        let executor = Arc::new(Executor::new(
            queue.clone(),
            audit.clone(),
            boundary,
            events.clone(),
            Duration::from_secs(settings.governance.executor_timeout_secs),
        ));
        let rollback = RollbackEngine::new(audit.clone(), executor.clone(), events.clone());

        Self {
            guardrails,
            queue,
            approvals: ApprovalStore::new(events.clone()),
            audit,
            scheduled,
            experiments,
            negotiator,
            executor,
            rollback,
            events,
        }
    }

    /// Default wiring with the logging stand-in boundary
    pub fn new(settings: &Settings) -> Self {
        Self::with_boundary(settings, Arc::new(LoggingBoundary))
    }
}

/// Type alias for shared state
pub type SharedState = Arc<AppState>;
