//! Action queue store
//!
//! Thread-safe ordered store for queued actions. All mutation goes through
//! this owner so approvals, executions and removals serialize on one lock.

use crate::change::ProposedChange;
use crate::error::AppError;
use crate::events::{DomainEvent, EventBus};
use crate::queue::{ActionStatus, QueuedAction};
use crate::risk::{self, RiskPolicy};
use chrono::Utc;
use tokio::sync::RwLock;
use tracing::{debug, info};
use uuid::Uuid;

pub struct ActionQueue {
    actions: RwLock<Vec<QueuedAction>>,
    bus: EventBus,
}

impl ActionQueue {
    pub fn new(bus: EventBus) -> Self {
        Self {
            actions: RwLock::new(Vec::new()),
            bus,
        }
    }

    /// Classify and append a proposed change at the tail of the queue
    pub async fn enqueue(
        &self,
        change: ProposedChange,
        performance_score: Option<f64>,
        policy: &RiskPolicy,
    ) -> QueuedAction {
        let risk_level = risk::classify(&change, performance_score, policy);
        let action = QueuedAction::new(change, risk_level);
        let mut actions = self.actions.write().await;
        actions.push(action.clone());
        info!(
            "Enqueued {} on '{}' (risk: {:?}, id: {})",
            action.change.action_type.as_str(),
            action.change.entity_name,
            action.risk_level,
            action.id
        );
        self.bus.publish(DomainEvent::ActionEnqueued {
            action_id: action.id,
            entity_name: action.change.entity_name.clone(),
            risk_level: action.risk_level,
        });
        action
    }

    /// Approve a pending action
    pub async fn approve(&self, id: Uuid) -> Result<QueuedAction, AppError> {
        let action = self.transition(id, ActionStatus::Approved).await?;
        self.bus.publish(DomainEvent::ActionApproved { action_id: id });
        Ok(action)
    }

    /// Reject a pending action
    pub async fn reject(&self, id: Uuid) -> Result<QueuedAction, AppError> {
        let action = self.transition(id, ActionStatus::Rejected).await?;
        self.bus.publish(DomainEvent::ActionRejected { action_id: id });
        Ok(action)
    }

    /// Bulk-approve every pending action; entries in other states are untouched
    pub async fn approve_all(&self) -> usize {
        self.bulk_transition(ActionStatus::Approved).await
    }

    /// Bulk-reject every pending action; entries in other states are untouched
    pub async fn reject_all(&self) -> usize {
        self.bulk_transition(ActionStatus::Rejected).await
    }

    async fn bulk_transition(&self, next: ActionStatus) -> usize {
        let mut actions = self.actions.write().await;
        let mut count = 0;
        for action in actions.iter_mut() {
            if action.status == ActionStatus::Pending && action.transition(next).is_ok() {
                let event = match next {
                    ActionStatus::Approved => DomainEvent::ActionApproved { action_id: action.id },
                    _ => DomainEvent::ActionRejected { action_id: action.id },
                };
                self.bus.publish(event);
                count += 1;
            }
        }
        info!("Bulk transition to {:?} touched {} actions", next, count);
        count
    }

    /// Remove a single entry. Manual cleanup works for any state except an
    /// in-flight execution, which must resolve first.
    pub async fn remove(&self, id: Uuid) -> Result<(), AppError> {
        let mut actions = self.actions.write().await;
        let idx = actions
            .iter()
            .position(|a| a.id == id)
            .ok_or_else(|| AppError::NotFound(format!("Queued action {} not found", id)))?;
        if actions[idx].status == ActionStatus::Executing {
            return Err(AppError::Conflict(
                "Cannot remove an action that is currently executing".to_string(),
            ));
        }
        actions.remove(idx);
        debug!("Removed queued action {}", id);
        Ok(())
    }

    /// Drop every entry in a terminal state (completed, rejected, failed)
    pub async fn clear_completed(&self) -> usize {
        let mut actions = self.actions.write().await;
        let before = actions.len();
        actions.retain(|a| !a.status.is_terminal());
        before - actions.len()
    }

    /// Empty the queue entirely
    pub async fn clear_all(&self) -> usize {
        let mut actions = self.actions.write().await;
        let count = actions.len();
        actions.clear();
        count
    }

    /// Count of entries still awaiting execution (pending or approved)
    pub async fn pending_count(&self) -> usize {
        let actions = self.actions.read().await;
        actions
            .iter()
            .filter(|a| matches!(a.status, ActionStatus::Pending | ActionStatus::Approved))
            .count()
    }

    pub async fn list(&self) -> Vec<QueuedAction> {
        self.actions.read().await.clone()
    }

    pub async fn get(&self, id: Uuid) -> Result<QueuedAction, AppError> {
        let actions = self.actions.read().await;
        actions
            .iter()
            .find(|a| a.id == id)
            .cloned()
            .ok_or_else(|| AppError::NotFound(format!("Queued action {} not found", id)))
    }

    /// Snapshot of approved entries in queue order, for the executor.
    /// Actions approved after this call wait for the next run.
    pub async fn snapshot_approved(&self) -> Vec<QueuedAction> {
        let actions = self.actions.read().await;
        actions
            .iter()
            .filter(|a| a.status == ActionStatus::Approved)
            .cloned()
            .collect()
    }

    /// Move an approved action to executing
    pub async fn begin_execution(&self, id: Uuid) -> Result<QueuedAction, AppError> {
        self.transition(id, ActionStatus::Executing).await
    }

    /// Resolve an executing action with its outcome
    pub async fn finish_execution(
        &self,
        id: Uuid,
        outcome: Result<(), String>,
    ) -> Result<QueuedAction, AppError> {
        let mut actions = self.actions.write().await;
        let action = actions
            .iter_mut()
            .find(|a| a.id == id)
            .ok_or_else(|| AppError::NotFound(format!("Queued action {} not found", id)))?;
        match outcome {
            Ok(()) => {
                action.transition(ActionStatus::Completed)?;
                action.executed_at = Some(Utc::now());
            }
            Err(error) => {
                action.transition(ActionStatus::Failed)?;
                action.executed_at = Some(Utc::now());
                action.error = Some(error);
            }
        }
        Ok(action.clone())
    }

    async fn transition(&self, id: Uuid, next: ActionStatus) -> Result<QueuedAction, AppError> {
        let mut actions = self.actions.write().await;
        let action = actions
            .iter_mut()
            .find(|a| a.id == id)
            .ok_or_else(|| AppError::NotFound(format!("Queued action {} not found", id)))?;
        action.transition(next)?;
        Ok(action.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::change::{ActionType, EntityType};
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn queue() -> ActionQueue {
        ActionQueue::new(EventBus::new(64))
    }

    fn change(name: &str) -> ProposedChange {
        ProposedChange {
            entity_type: EntityType::Campaign,
            entity_id: format!("c-{name}"),
            entity_name: name.to_string(),
            action_type: ActionType::Pause,
            field_name: "status".to_string(),
            current_value: json!("ENABLED"),
            new_value: json!("PAUSED"),
            account_id: "acct-1".to_string(),
        }
    }

    #[tokio::test]
    async fn enqueue_preserves_insertion_order() {
        let q = queue();
        let policy = RiskPolicy::default();
        for name in ["a", "b", "c"] {
            q.enqueue(change(name), None, &policy).await;
        }
        let names: Vec<_> = q
            .list()
            .await
            .into_iter()
            .map(|a| a.change.entity_name)
            .collect();
        assert_eq!(names, vec!["a", "b", "c"]);
    }

    #[tokio::test]
    async fn approve_all_only_touches_pending() {
        let q = queue();
        let policy = RiskPolicy::default();
        let mut ids = Vec::new();
        for name in ["a", "b", "c", "d", "e"] {
            ids.push(q.enqueue(change(name), None, &policy).await.id);
        }
        q.reject(ids[3]).await.unwrap();
        q.reject(ids[4]).await.unwrap();

        let approved = q.approve_all().await;
        assert_eq!(approved, 3);

        let actions = q.list().await;
        assert_eq!(
            actions.iter().filter(|a| a.status == ActionStatus::Approved).count(),
            3
        );
        assert_eq!(
            actions.iter().filter(|a| a.status == ActionStatus::Rejected).count(),
            2
        );
    }

    #[tokio::test]
    async fn double_approve_fails_without_mutation() {
        let q = queue();
        let id = q.enqueue(change("a"), None, &RiskPolicy::default()).await.id;
        q.approve(id).await.unwrap();
        let err = q.approve(id).await.unwrap_err();
        assert!(matches!(err, AppError::InvalidTransition { .. }));
        assert_eq!(q.get(id).await.unwrap().status, ActionStatus::Approved);
    }

    #[tokio::test]
    async fn pending_count_includes_approved() {
        let q = queue();
        let policy = RiskPolicy::default();
        let a = q.enqueue(change("a"), None, &policy).await.id;
        let b = q.enqueue(change("b"), None, &policy).await.id;
        q.enqueue(change("c"), None, &policy).await;
        q.approve(a).await.unwrap();
        q.reject(b).await.unwrap();
        assert_eq!(q.pending_count().await, 2);
    }

    #[tokio::test]
    async fn clear_completed_drops_terminal_entries_only() {
        let q = queue();
        let policy = RiskPolicy::default();
        let a = q.enqueue(change("a"), None, &policy).await.id;
        let b = q.enqueue(change("b"), None, &policy).await.id;
        q.enqueue(change("c"), None, &policy).await;
        q.approve(a).await.unwrap();
        q.begin_execution(a).await.unwrap();
        q.finish_execution(a, Ok(())).await.unwrap();
        q.reject(b).await.unwrap();

        let cleared = q.clear_completed().await;
        assert_eq!(cleared, 2);
        let remaining = q.list().await;
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].change.entity_name, "c");
    }

    #[tokio::test]
    async fn remove_refuses_executing_entries() {
        let q = queue();
        let id = q.enqueue(change("a"), None, &RiskPolicy::default()).await.id;
        q.approve(id).await.unwrap();
        q.begin_execution(id).await.unwrap();
        assert!(q.remove(id).await.is_err());
        q.finish_execution(id, Err("boom".to_string())).await.unwrap();
        q.remove(id).await.unwrap();
        assert!(q.get(id).await.is_err());
    }

    #[tokio::test]
    async fn snapshot_approved_keeps_queue_order() {
        let q = queue();
        let policy = RiskPolicy::default();
        let a = q.enqueue(change("a"), None, &policy).await.id;
        let b = q.enqueue(change("b"), None, &policy).await.id;
        let c = q.enqueue(change("c"), None, &policy).await.id;
        // Approve out of order; snapshot must still follow insertion order
        q.approve(c).await.unwrap();
        q.approve(a).await.unwrap();
        let snapshot = q.snapshot_approved().await;
        assert_eq!(snapshot.iter().map(|x| x.id).collect::<Vec<_>>(), vec![a, c]);
        let _ = b;
    }

    #[tokio::test]
    async fn failed_execution_records_error_and_timestamp() {
        let q = queue();
        let id = q.enqueue(change("a"), None, &RiskPolicy::default()).await.id;
        q.approve(id).await.unwrap();
        q.begin_execution(id).await.unwrap();
        let action = q
            .finish_execution(id, Err("timeout".to_string()))
            .await
            .unwrap();
        assert_eq!(action.status, ActionStatus::Failed);
        assert_eq!(action.error.as_deref(), Some("timeout"));
        assert!(action.executed_at.is_some());
    }
}
