//! Rollback engine
//!
//! Issues the inverse of a previously successful action. The original
//! audit entry is never touched; both successful and failed rollback
//! attempts append new entries.

use crate::audit::{AuditLog, AuditLogEntry, AuditStatus, ROLLBACK_PREFIX};
use crate::change::{ActionType, EntityType, ProposedChange};
use crate::error::AppError;
use crate::events::{DomainEvent, EventBus};
use crate::executor::Executor;
use crate::models::Actor;
use chrono::Utc;
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

pub struct RollbackEngine {
    audit: Arc<AuditLog>,
    executor: Arc<Executor>,
    bus: EventBus,
}

impl RollbackEngine {
    pub fn new(audit: Arc<AuditLog>, executor: Arc<Executor>, bus: EventBus) -> Self {
        Self { audit, executor, bus }
    }

    /// Whether an entry can be reversed: only successful entries that are
    /// not themselves rollbacks. Keyword mutations are excluded because
    /// batch fan-out edits make inversion ambiguous, and an account-wide
    /// pause has no single inverse action.
    pub fn can_rollback(entry: &AuditLogEntry) -> bool {
        entry.status == AuditStatus::Success
            && !entry.is_rollback()
            && entry.entity_type != EntityType::Keyword
            && ActionType::from_wire(&entry.action_type)
                .is_some_and(|a| a != ActionType::PauseAllCampaigns)
    }

    /// Build and execute the inverse of a successful entry.
    ///
    /// The inverse targets the original `before_value`; it runs through the
    /// executor's serialized single-flight path with the same timeout
    /// policy as queue execution.
    pub async fn rollback(&self, entry_id: Uuid, actor: &Actor) -> Result<AuditLogEntry, AppError> {
        if !actor.can_approve {
            return Err(AppError::Forbidden(format!(
                "User '{}' does not hold approve capability required for rollback",
                actor.id
            )));
        }

        let original = self.audit.get(entry_id).await?;
        if !Self::can_rollback(&original) {
            return Err(AppError::Conflict(format!(
                "Audit entry {} cannot be rolled back",
                entry_id
            )));
        }

        let inverse = Self::inverse_change(&original)?;
        let outcome = self.executor.execute_single(&inverse).await?;

        let (status, error_message) = match &outcome {
            Ok(()) => (AuditStatus::Success, None),
            Err(e) => (AuditStatus::Failed, Some(e.clone())),
        };

        let rollback_entry = self
            .audit
            .append(AuditLogEntry {
                id: Uuid::new_v4(),
                action_type: format!("{ROLLBACK_PREFIX}{}", original.action_type),
                entity_type: original.entity_type,
                entity_id: original.entity_id.clone(),
                entity_name: original.entity_name.clone(),
                before_value: original.after_value.clone(),
                after_value: original.before_value.clone(),
                status,
                error_message,
                source: "rollback".to_string(),
                account_id: original.account_id.clone(),
                rollback_of: Some(original.id),
                created_at: Utc::now(),
            })
            .await;

        match status {
            AuditStatus::Success => {
                info!(
                    "Rolled back entry {} via {} (rollback entry: {})",
                    original.id, rollback_entry.action_type, rollback_entry.id
                );
                self.bus.publish(DomainEvent::RolledBack {
                    original_entry_id: original.id,
                    rollback_entry_id: rollback_entry.id,
                });
            }
            AuditStatus::Failed => {
                info!(
                    "Rollback of entry {} failed: {:?}",
                    original.id, rollback_entry.error_message
                );
            }
        }

        Ok(rollback_entry)
    }

    /// Inverse proposed change: original before becomes the new target
    fn inverse_change(original: &AuditLogEntry) -> Result<ProposedChange, AppError> {
        let action_type = ActionType::from_wire(&original.action_type).ok_or_else(|| {
            AppError::Internal(format!(
                "Audit entry {} has unknown action type '{}'",
                original.id, original.action_type
            ))
        })?;
        Ok(ProposedChange {
            entity_type: original.entity_type,
            entity_id: original.entity_id.clone(),
            entity_name: original.entity_name.clone(),
            action_type: action_type.inverse(),
            field_name: String::new(),
            current_value: original.after_value.clone(),
            new_value: original.before_value.clone(),
            account_id: original.account_id.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::change::EntityType;
    use crate::events::EventBus;
    use crate::executor::{MutationBoundary, MutationError};
    use crate::queue::ActionQueue;
    use async_trait::async_trait;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;

    struct RecordingBoundary {
        fail: AtomicBool,
        last_change: Mutex<Option<ProposedChange>>,
    }

    impl RecordingBoundary {
        fn new() -> Self {
            Self { fail: AtomicBool::new(false), last_change: Mutex::new(None) }
        }
    }

    #[async_trait]
    impl MutationBoundary for RecordingBoundary {
        async fn execute(&self, change: &ProposedChange) -> Result<(), MutationError> {
            *self.last_change.lock().unwrap() = Some(change.clone());
            if self.fail.load(Ordering::SeqCst) {
                Err(MutationError::Platform("platform unavailable".to_string()))
            } else {
                Ok(())
            }
        }
    }

    struct Fixture {
        audit: Arc<AuditLog>,
        engine: RollbackEngine,
        boundary: Arc<RecordingBoundary>,
    }

    fn fixture() -> Fixture {
        let bus = EventBus::new(64);
        let queue = Arc::new(ActionQueue::new(bus.clone()));
        let audit = Arc::new(AuditLog::new());
        let boundary = Arc::new(RecordingBoundary::new());
        let executor = Arc::new(Executor::new(
            queue,
            audit.clone(),
            boundary.clone(),
            bus.clone(),
            Duration::from_secs(5),
        ));
        let engine = RollbackEngine::new(audit.clone(), executor, bus);
        Fixture { audit, engine, boundary }
    }

    fn approver() -> Actor {
        Actor { id: "lead@example.com".to_string(), name: "Lead".to_string(), can_approve: true }
    }

    fn success_entry(entity_type: EntityType, action: &str) -> AuditLogEntry {
        AuditLogEntry {
            id: Uuid::new_v4(),
            action_type: action.to_string(),
            entity_type,
            entity_id: "c-1".to_string(),
            entity_name: "Spring Sale".to_string(),
            before_value: json!(50),
            after_value: json!(100),
            status: AuditStatus::Success,
            error_message: None,
            source: "queue_executor".to_string(),
            account_id: "acct-1".to_string(),
            rollback_of: None,
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn rollback_round_trip() {
        let f = fixture();
        let original = f.audit.append(success_entry(EntityType::Campaign, "set_budget")).await;

        let rollback = f.engine.rollback(original.id, &approver()).await.unwrap();

        // The inverse change targets the original before value
        let issued = f.boundary.last_change.lock().unwrap().clone().unwrap();
        assert_eq!(issued.new_value, json!(50));
        assert_eq!(issued.current_value, json!(100));

        assert_eq!(rollback.action_type, "rollback_set_budget");
        assert_eq!(rollback.status, AuditStatus::Success);
        assert_eq!(rollback.rollback_of, Some(original.id));

        // A rollback entry can never be rolled back again
        assert!(!RollbackEngine::can_rollback(&rollback));

        // The original entry is untouched
        let stored = f.audit.get(original.id).await.unwrap();
        assert_eq!(stored.status, AuditStatus::Success);
        assert_eq!(stored.after_value, json!(100));
    }

    #[tokio::test]
    async fn account_wide_pause_is_not_rollbackable() {
        let f = fixture();
        let mut entry = success_entry(EntityType::Campaign, "pause_all_campaigns");
        entry.before_value = json!("ENABLED");
        entry.after_value = json!("PAUSED");
        let entry = f.audit.append(entry).await;

        assert!(!RollbackEngine::can_rollback(&entry));
        let err = f.engine.rollback(entry.id, &approver()).await.unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));

        // Nothing reached the boundary and nothing was appended
        assert!(f.boundary.last_change.lock().unwrap().is_none());
        assert_eq!(f.audit.len().await, 1);
    }

    #[tokio::test]
    async fn unknown_action_types_are_not_rollbackable() {
        let entry = success_entry(EntityType::Campaign, "migrate_legacy");
        assert!(!RollbackEngine::can_rollback(&entry));
    }

    #[tokio::test]
    async fn keyword_entries_are_never_rollbackable() {
        let mut entry = success_entry(EntityType::Keyword, "set_bid");
        assert!(!RollbackEngine::can_rollback(&entry));
        entry.status = AuditStatus::Failed;
        assert!(!RollbackEngine::can_rollback(&entry));
    }

    #[tokio::test]
    async fn failed_entries_are_not_rollbackable() {
        let f = fixture();
        let mut entry = success_entry(EntityType::Campaign, "set_budget");
        entry.status = AuditStatus::Failed;
        let entry = f.audit.append(entry).await;
        let err = f.engine.rollback(entry.id, &approver()).await.unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
        assert_eq!(f.audit.len().await, 1);
    }

    #[tokio::test]
    async fn pause_rolls_back_as_enable() {
        let f = fixture();
        let mut entry = success_entry(EntityType::Campaign, "pause");
        entry.before_value = json!("ENABLED");
        entry.after_value = json!("PAUSED");
        let entry = f.audit.append(entry).await;

        let rollback = f.engine.rollback(entry.id, &approver()).await.unwrap();
        assert_eq!(rollback.action_type, "rollback_pause");

        let issued = f.boundary.last_change.lock().unwrap().clone().unwrap();
        assert_eq!(issued.action_type, ActionType::Enable);
        assert_eq!(issued.new_value, json!("ENABLED"));
    }

    #[tokio::test]
    async fn failed_rollback_appends_failed_entry_and_preserves_original() {
        let f = fixture();
        let original = f.audit.append(success_entry(EntityType::Campaign, "set_budget")).await;
        f.boundary.fail.store(true, Ordering::SeqCst);

        let rollback = f.engine.rollback(original.id, &approver()).await.unwrap();
        assert_eq!(rollback.status, AuditStatus::Failed);
        assert!(rollback.error_message.as_deref().unwrap().contains("unavailable"));
        assert_eq!(rollback.rollback_of, Some(original.id));

        let stored = f.audit.get(original.id).await.unwrap();
        assert_eq!(stored.status, AuditStatus::Success);
        assert_eq!(f.audit.len().await, 2);
    }

    #[tokio::test]
    async fn rollback_requires_approve_capability() {
        let f = fixture();
        let original = f.audit.append(success_entry(EntityType::Campaign, "set_budget")).await;
        let viewer = Actor {
            id: "viewer@example.com".to_string(),
            name: "Viewer".to_string(),
            can_approve: false,
        };
        let err = f.engine.rollback(original.id, &viewer).await.unwrap_err();
        assert!(matches!(err, AppError::Forbidden(_)));
        assert_eq!(f.audit.len().await, 1);
    }
}
