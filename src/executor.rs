//! Executor
//!
//! Serially applies approved queue entries against the external mutation
//! boundary. One run in flight at a time; within a run, strictly one
//! action in flight at a time. Sequential execution preserves per-entity
//! edit ordering and bounds the mutation rate presented to the platform.

use crate::audit::AuditLog;
use crate::change::ProposedChange;
use crate::error::AppError;
use crate::events::{DomainEvent, EventBus};
use crate::queue::ActionQueue;
use async_trait::async_trait;
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{info, warn};

/// Error surfaced by the external mutation API
#[derive(Debug, Error)]
pub enum MutationError {
    #[error("{0}")]
    Platform(String),
}

/// The only side-effecting boundary this core issues calls through.
///
/// The real ad-platform client lives outside this repository; the binary
/// wires a stub and tests wire instrumented fakes.
#[async_trait]
pub trait MutationBoundary: Send + Sync {
    async fn execute(&self, change: &ProposedChange) -> Result<(), MutationError>;
}

/// Stand-in boundary that accepts every mutation and only logs it
pub struct LoggingBoundary;

#[async_trait]
impl MutationBoundary for LoggingBoundary {
    async fn execute(&self, change: &ProposedChange) -> Result<(), MutationError> {
        info!(
            "Mutation boundary: {} '{}' {} -> {}",
            change.action_type.as_str(),
            change.entity_name,
            change.current_value,
            change.new_value
        );
        Ok(())
    }
}

/// Summary of one execution run
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunReport {
    pub executed: usize,
    pub succeeded: usize,
    pub failed: usize,
}

/// Releases the single-flight slot when a run finishes, even on early return
struct FlightGuard<'a>(&'a AtomicBool);

impl Drop for FlightGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

pub struct Executor {
    queue: Arc<ActionQueue>,
    audit: Arc<AuditLog>,
    boundary: Arc<dyn MutationBoundary>,
    bus: EventBus,
    timeout: Duration,
    executing: AtomicBool,
}

impl Executor {
    pub fn new(
        queue: Arc<ActionQueue>,
        audit: Arc<AuditLog>,
        boundary: Arc<dyn MutationBoundary>,
        bus: EventBus,
        timeout: Duration,
    ) -> Self {
        Self {
            queue,
            audit,
            boundary,
            bus,
            timeout,
            executing: AtomicBool::new(false),
        }
    }

    pub fn is_executing(&self) -> bool {
        self.executing.load(Ordering::SeqCst)
    }

    /// Execute every action that was approved at the moment this call
    /// started, strictly in queue order.
    ///
    /// Actions approved after the snapshot wait for the next run. A failure
    /// terminates only its own action; the rest of the batch proceeds.
    pub async fn run(&self) -> Result<RunReport, AppError> {
        let _guard = self.acquire_flight_slot()?;

        let snapshot = self.queue.snapshot_approved().await;
        info!("Execution run started: {} approved action(s)", snapshot.len());

        let mut report = RunReport { executed: 0, succeeded: 0, failed: 0 };
        for action in snapshot {
            // The entry may have been removed since the snapshot; skip it
            if let Err(e) = self.queue.begin_execution(action.id).await {
                warn!("Skipping action {}: {}", action.id, e);
                continue;
            }

            let outcome = self.call_boundary(&action.change).await;
            report.executed += 1;

            let entity_name = action.change.entity_name.clone();
            match &outcome {
                Ok(()) => {
                    report.succeeded += 1;
                    self.bus.publish(DomainEvent::ActionExecuted {
                        action_id: action.id,
                        entity_name: entity_name.clone(),
                    });
                }
                Err(error) => {
                    report.failed += 1;
                    self.bus.publish(DomainEvent::ActionFailed {
                        action_id: action.id,
                        entity_name: entity_name.clone(),
                        error: error.clone(),
                    });
                }
            }

            self.queue.finish_execution(action.id, outcome.clone()).await?;
            self.audit
                .record_execution(&action.change, outcome, "queue_executor")
                .await;
        }

        info!(
            "Execution run finished: {} executed, {} succeeded, {} failed",
            report.executed, report.succeeded, report.failed
        );
        Ok(report)
    }

    /// Apply a single change outside the queue (the rollback path).
    ///
    /// Shares the single-flight slot with `run()`, so a rollback serializes
    /// with queue execution instead of racing it.
    pub async fn execute_single(&self, change: &ProposedChange) -> Result<Result<(), String>, AppError> {
        let _guard = self.acquire_flight_slot()?;
        Ok(self.call_boundary(change).await)
    }

    fn acquire_flight_slot(&self) -> Result<FlightGuard<'_>, AppError> {
        if self
            .executing
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(AppError::ExecutionInProgress);
        }
        Ok(FlightGuard(&self.executing))
    }

    /// One bounded call against the platform; expiry becomes a plain
    /// "timeout" failure instead of a stuck executing entry
    async fn call_boundary(&self, change: &ProposedChange) -> Result<(), String> {
        match tokio::time::timeout(self.timeout, self.boundary.execute(change)).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => Err(e.to_string()),
            Err(_) => Err("timeout".to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::{AuditQuery, AuditStatus};
    use crate::change::{ActionType, EntityType};
    use crate::queue::ActionStatus;
    use crate::risk::RiskPolicy;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use std::sync::atomic::AtomicUsize;

    fn change(name: &str) -> ProposedChange {
        ProposedChange {
            entity_type: EntityType::Campaign,
            entity_id: format!("c-{name}"),
            entity_name: name.to_string(),
            action_type: ActionType::SetBudget,
            field_name: "daily_budget".to_string(),
            current_value: json!(50),
            new_value: json!(100),
            account_id: "acct-1".to_string(),
        }
    }

    /// Instrumented boundary: optional delay, scripted failures by entity
    /// name, and a concurrency high-water mark.
    struct StubBoundary {
        delay: Duration,
        fail_for: Vec<String>,
        in_flight: AtomicUsize,
        max_in_flight: AtomicUsize,
        calls: AtomicUsize,
    }

    impl StubBoundary {
        fn new(delay: Duration, fail_for: &[&str]) -> Self {
            Self {
                delay,
                fail_for: fail_for.iter().map(|s| s.to_string()).collect(),
                in_flight: AtomicUsize::new(0),
                max_in_flight: AtomicUsize::new(0),
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl MutationBoundary for StubBoundary {
        async fn execute(&self, change: &ProposedChange) -> Result<(), MutationError> {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_in_flight.fetch_max(now, Ordering::SeqCst);
            self.calls.fetch_add(1, Ordering::SeqCst);
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            if self.fail_for.contains(&change.entity_name) {
                Err(MutationError::Platform(format!(
                    "platform rejected change to '{}'",
                    change.entity_name
                )))
            } else {
                Ok(())
            }
        }
    }

    struct Fixture {
        queue: Arc<ActionQueue>,
        audit: Arc<AuditLog>,
        executor: Arc<Executor>,
        boundary: Arc<StubBoundary>,
    }

    fn fixture(boundary: StubBoundary, timeout: Duration) -> Fixture {
        let bus = EventBus::new(64);
        let queue = Arc::new(ActionQueue::new(bus.clone()));
        let audit = Arc::new(AuditLog::new());
        let boundary = Arc::new(boundary);
        let executor = Arc::new(Executor::new(
            queue.clone(),
            audit.clone(),
            boundary.clone(),
            bus,
            timeout,
        ));
        Fixture { queue, audit, executor, boundary }
    }

    async fn enqueue_approved(f: &Fixture, name: &str) -> uuid::Uuid {
        let id = f
            .queue
            .enqueue(change(name), None, &RiskPolicy::default())
            .await
            .id;
        f.queue.approve(id).await.unwrap();
        id
    }

    #[tokio::test]
    async fn partial_failure_isolation() {
        let f = fixture(StubBoundary::new(Duration::ZERO, &["b"]), Duration::from_secs(5));
        let a = enqueue_approved(&f, "a").await;
        let b = enqueue_approved(&f, "b").await;
        let c = enqueue_approved(&f, "c").await;

        let report = f.executor.run().await.unwrap();
        assert_eq!((report.executed, report.succeeded, report.failed), (3, 2, 1));

        assert_eq!(f.queue.get(a).await.unwrap().status, ActionStatus::Completed);
        let failed = f.queue.get(b).await.unwrap();
        assert_eq!(failed.status, ActionStatus::Failed);
        assert!(failed.error.as_deref().unwrap().contains("rejected"));
        assert_eq!(f.queue.get(c).await.unwrap().status, ActionStatus::Completed);

        // Every outcome is in the audit log, success and failure alike
        assert_eq!(f.audit.len().await, 3);
        let failed_page = f
            .audit
            .query(&AuditQuery { status: Some(AuditStatus::Failed), ..Default::default() })
            .await;
        assert_eq!(failed_page.total, 1);
        assert_eq!(failed_page.items[0].entity_name, "b");
    }

    #[tokio::test]
    async fn never_two_actions_in_flight() {
        let f = fixture(StubBoundary::new(Duration::from_millis(20), &[]), Duration::from_secs(5));
        for name in ["a", "b", "c", "d"] {
            enqueue_approved(&f, name).await;
        }
        f.executor.run().await.unwrap();
        assert_eq!(f.boundary.max_in_flight.load(Ordering::SeqCst), 1);
        assert_eq!(f.boundary.calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn concurrent_run_is_rejected() {
        let f = fixture(StubBoundary::new(Duration::from_millis(50), &[]), Duration::from_secs(5));
        enqueue_approved(&f, "a").await;

        let executor = f.executor.clone();
        let first = tokio::spawn(async move { executor.run().await });
        tokio::time::sleep(Duration::from_millis(10)).await;

        let second = f.executor.run().await;
        assert!(matches!(second, Err(AppError::ExecutionInProgress)));

        first.await.unwrap().unwrap();
        // Slot is released once the run resolves
        assert!(!f.executor.is_executing());
        f.executor.run().await.unwrap();
    }

    #[tokio::test]
    async fn timeout_marks_action_failed() {
        let f = fixture(
            StubBoundary::new(Duration::from_millis(200), &[]),
            Duration::from_millis(20),
        );
        let id = enqueue_approved(&f, "slow").await;

        let report = f.executor.run().await.unwrap();
        assert_eq!(report.failed, 1);

        let action = f.queue.get(id).await.unwrap();
        assert_eq!(action.status, ActionStatus::Failed);
        assert_eq!(action.error.as_deref(), Some("timeout"));
    }

    #[tokio::test]
    async fn approvals_during_run_wait_for_next_run() {
        let f = fixture(StubBoundary::new(Duration::from_millis(40), &[]), Duration::from_secs(5));
        enqueue_approved(&f, "a").await;
        let late = f
            .queue
            .enqueue(change("late"), None, &RiskPolicy::default())
            .await
            .id;

        let executor = f.executor.clone();
        let run = tokio::spawn(async move { executor.run().await });
        tokio::time::sleep(Duration::from_millis(10)).await;
        // Approved mid-run: not part of the snapshot
        f.queue.approve(late).await.unwrap();

        let report = run.await.unwrap().unwrap();
        assert_eq!(report.executed, 1);
        assert_eq!(f.queue.get(late).await.unwrap().status, ActionStatus::Approved);

        let report = f.executor.run().await.unwrap();
        assert_eq!(report.executed, 1);
        assert_eq!(f.queue.get(late).await.unwrap().status, ActionStatus::Completed);
    }

    #[tokio::test]
    async fn execute_single_shares_the_flight_slot() {
        let f = fixture(StubBoundary::new(Duration::from_millis(50), &[]), Duration::from_secs(5));
        enqueue_approved(&f, "a").await;

        let executor = f.executor.clone();
        let run = tokio::spawn(async move { executor.run().await });
        tokio::time::sleep(Duration::from_millis(10)).await;

        let result = f.executor.execute_single(&change("x")).await;
        assert!(matches!(result, Err(AppError::ExecutionInProgress)));
        run.await.unwrap().unwrap();

        let outcome = f.executor.execute_single(&change("x")).await.unwrap();
        assert!(outcome.is_ok());
    }
}
