//! Audit log store
//!
//! Append-only. The public surface exposes append, point lookup and a
//! filtered paged query; there is deliberately no update or delete.

use crate::audit::{AuditLogEntry, AuditQuery, AuditStatus, Page};
use crate::change::{EntityType, ProposedChange};
use crate::error::AppError;
use chrono::Utc;
use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

const DEFAULT_PAGE_LIMIT: usize = 50;

pub struct AuditLog {
    entries: RwLock<Vec<AuditLogEntry>>,
}

impl AuditLog {
    pub fn new() -> Self {
        Self { entries: RwLock::new(Vec::new()) }
    }

    /// Append an entry and return it with its assigned id
    pub async fn append(&self, entry: AuditLogEntry) -> AuditLogEntry {
        let mut entries = self.entries.write().await;
        entries.push(entry.clone());
        debug!(
            "Audit: {} on '{}' -> {:?} (id: {})",
            entry.action_type, entry.entity_name, entry.status, entry.id
        );
        entry
    }

    /// Record an execution outcome for a proposed change
    pub async fn record_execution(
        &self,
        change: &ProposedChange,
        outcome: Result<(), String>,
        source: &str,
    ) -> AuditLogEntry {
        let (status, error_message) = match outcome {
            Ok(()) => (AuditStatus::Success, None),
            Err(e) => (AuditStatus::Failed, Some(e)),
        };
        self.append(AuditLogEntry {
            id: Uuid::new_v4(),
            action_type: change.action_type.as_str().to_string(),
            entity_type: change.entity_type,
            entity_id: change.entity_id.clone(),
            entity_name: change.entity_name.clone(),
            before_value: change.current_value.clone(),
            after_value: change.new_value.clone(),
            status,
            error_message,
            source: source.to_string(),
            account_id: change.account_id.clone(),
            rollback_of: None,
            created_at: Utc::now(),
        })
        .await
    }

    pub async fn get(&self, id: Uuid) -> Result<AuditLogEntry, AppError> {
        let entries = self.entries.read().await;
        entries
            .iter()
            .find(|e| e.id == id)
            .cloned()
            .ok_or_else(|| AppError::NotFound(format!("Audit entry {} not found", id)))
    }

    /// Filtered query, most recent first, with limit/offset pagination
    pub async fn query(&self, filter: &AuditQuery) -> Page<AuditLogEntry> {
        let entries = self.entries.read().await;
        let matched: Vec<&AuditLogEntry> = entries
            .iter()
            .rev()
            .filter(|e| Self::matches(e, filter))
            .collect();

        let total = matched.len();
        let offset = filter.offset.unwrap_or(0);
        let limit = filter.limit.unwrap_or(DEFAULT_PAGE_LIMIT);
        let items: Vec<AuditLogEntry> = matched
            .into_iter()
            .skip(offset)
            .take(limit)
            .cloned()
            .collect();
        let has_more = offset + items.len() < total;

        Page { items, total, has_more }
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    fn matches(entry: &AuditLogEntry, filter: &AuditQuery) -> bool {
        if let Some(account_id) = &filter.account_id {
            if &entry.account_id != account_id {
                return false;
            }
        }
        if let Some(status) = filter.status {
            if entry.status != status {
                return false;
            }
        }
        if let Some(entity_type) = filter.entity_type {
            if entry.entity_type != entity_type {
                return false;
            }
        }
        if let Some(action_type) = &filter.action_type {
            if &entry.action_type != action_type {
                return false;
            }
        }
        if let Some(from) = filter.from {
            if entry.created_at < from {
                return false;
            }
        }
        if let Some(to) = filter.to {
            if entry.created_at > to {
                return false;
            }
        }
        true
    }
}

impl Default for AuditLog {
    fn default() -> Self {
        Self::new()
    }
}
