//! Audit log models

use crate::change::EntityType;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Prefix marking an entry as the record of a rollback
pub const ROLLBACK_PREFIX: &str = "rollback_";

/// Outcome recorded for an executed action
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuditStatus {
    Success,
    Failed,
}

/// Immutable record of one executed action's outcome.
///
/// Entries are never mutated or deleted after creation; a rollback creates
/// a new entry referencing the original via `rollback_of`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditLogEntry {
    pub id: Uuid,
    /// Action wire name; rollbacks use "rollback_" + the original name
    pub action_type: String,
    pub entity_type: EntityType,
    pub entity_id: String,
    pub entity_name: String,
    pub before_value: serde_json::Value,
    pub after_value: serde_json::Value,
    pub status: AuditStatus,
    pub error_message: Option<String>,
    /// Where the execution originated (queue_executor, rollback, ...)
    pub source: String,
    pub account_id: String,
    /// For rollback entries, the id of the original entry being reversed
    pub rollback_of: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

impl AuditLogEntry {
    /// Whether this entry itself records a rollback
    pub fn is_rollback(&self) -> bool {
        self.action_type.starts_with(ROLLBACK_PREFIX)
    }
}

/// Filtered, paginated query over audit entries
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditQuery {
    pub account_id: Option<String>,
    pub status: Option<AuditStatus>,
    pub entity_type: Option<EntityType>,
    /// Matches the wire action name, including `rollback_*` forms
    pub action_type: Option<String>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
    pub limit: Option<usize>,
    pub offset: Option<usize>,
}

/// One page of query results
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: usize,
    pub has_more: bool,
}
