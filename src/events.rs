//! Domain events
//!
//! The core emits events instead of rendering notifications; any subscriber
//! (UI gateway, webhook relay, log sink) can pick them up from the
//! broadcast bus. Publishing never fails: with no subscribers the event is
//! simply dropped.

use crate::risk::RiskLevel;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::broadcast;
use uuid::Uuid;

/// Events emitted by the governance core
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "snake_case", tag = "event")]
pub enum DomainEvent {
    ActionEnqueued {
        action_id: Uuid,
        entity_name: String,
        risk_level: RiskLevel,
    },
    ActionApproved {
        action_id: Uuid,
    },
    ActionRejected {
        action_id: Uuid,
    },
    ActionExecuted {
        action_id: Uuid,
        entity_name: String,
    },
    ActionFailed {
        action_id: Uuid,
        entity_name: String,
        error: String,
    },
    RequestCreated {
        request_id: Uuid,
        requested_by: String,
    },
    RequestReviewed {
        request_id: Uuid,
        approved: bool,
        reviewed_by: String,
    },
    RequestCancelled {
        request_id: Uuid,
    },
    RolledBack {
        original_entry_id: Uuid,
        rollback_entry_id: Uuid,
    },
    SettingsUpdated,
}

/// Timestamped envelope delivered to subscribers
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EventEnvelope {
    pub occurred_at: DateTime<Utc>,
    #[serde(flatten)]
    pub event: DomainEvent,
}

/// Fan-out bus for domain events
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<EventEnvelope>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish an event; lagging or absent subscribers never block the core
    pub fn publish(&self, event: DomainEvent) {
        let envelope = EventEnvelope { occurred_at: Utc::now(), event };
        let _ = self.sender.send(envelope);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<EventEnvelope> {
        self.sender.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}
