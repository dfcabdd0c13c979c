//! Queued action models
//!
//! The lifecycle state machine lives here. Transitions only move forward:
//! pending -> {approved, rejected}, approved -> executing,
//! executing -> {completed, failed}. Terminal states never transition
//! again; retrying means enqueueing a new action.

use crate::change::ProposedChange;
use crate::error::AppError;
use crate::risk::RiskLevel;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Lifecycle status of a queued action
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionStatus {
    Pending,
    Approved,
    Rejected,
    Executing,
    Completed,
    Failed,
}

impl ActionStatus {
    /// Whether moving from `self` to `next` is a legal forward transition
    pub fn can_transition(self, next: ActionStatus) -> bool {
        use ActionStatus::*;
        matches!(
            (self, next),
            (Pending, Approved) | (Pending, Rejected) | (Approved, Executing)
                | (Executing, Completed) | (Executing, Failed)
        )
    }

    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            ActionStatus::Rejected | ActionStatus::Completed | ActionStatus::Failed
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ActionStatus::Pending => "pending",
            ActionStatus::Approved => "approved",
            ActionStatus::Rejected => "rejected",
            ActionStatus::Executing => "executing",
            ActionStatus::Completed => "completed",
            ActionStatus::Failed => "failed",
        }
    }
}

/// A proposed change plus its risk classification and lifecycle status
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueuedAction {
    pub id: Uuid,
    pub change: ProposedChange,
    pub risk_level: RiskLevel,
    pub status: ActionStatus,
    pub created_at: DateTime<Utc>,
    pub executed_at: Option<DateTime<Utc>>,
    pub error: Option<String>,
}

impl QueuedAction {
    pub fn new(change: ProposedChange, risk_level: RiskLevel) -> Self {
        Self {
            id: Uuid::new_v4(),
            change,
            risk_level,
            status: ActionStatus::Pending,
            created_at: Utc::now(),
            executed_at: None,
            error: None,
        }
    }

    /// Apply a transition, failing without mutation when it is illegal
    pub fn transition(&mut self, next: ActionStatus) -> Result<(), AppError> {
        if !self.status.can_transition(next) {
            return Err(AppError::InvalidTransition {
                from: self.status.as_str().to_string(),
                to: next.as_str().to_string(),
            });
        }
        self.status = next;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::change::{ActionType, EntityType};
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn action() -> QueuedAction {
        QueuedAction::new(
            ProposedChange {
                entity_type: EntityType::Campaign,
                entity_id: "c-1".to_string(),
                entity_name: "Test".to_string(),
                action_type: ActionType::Pause,
                field_name: "status".to_string(),
                current_value: json!("ENABLED"),
                new_value: json!("PAUSED"),
                account_id: "acct-1".to_string(),
            },
            RiskLevel::Low,
        )
    }

    const ALL: [ActionStatus; 6] = [
        ActionStatus::Pending,
        ActionStatus::Approved,
        ActionStatus::Rejected,
        ActionStatus::Executing,
        ActionStatus::Completed,
        ActionStatus::Failed,
    ];

    #[test]
    fn only_forward_transitions_are_legal() {
        use ActionStatus::*;
        let legal = [
            (Pending, Approved),
            (Pending, Rejected),
            (Approved, Executing),
            (Executing, Completed),
            (Executing, Failed),
        ];
        for from in ALL {
            for to in ALL {
                let expected = legal.contains(&(from, to));
                assert_eq!(from.can_transition(to), expected, "{from:?} -> {to:?}");
            }
        }
    }

    #[test]
    fn terminal_states_never_transition() {
        for from in ALL.into_iter().filter(|s| s.is_terminal()) {
            for to in ALL {
                assert!(!from.can_transition(to), "{from:?} -> {to:?}");
            }
        }
    }

    #[test]
    fn illegal_transition_leaves_action_untouched() {
        let mut a = action();
        let err = a.transition(ActionStatus::Completed).unwrap_err();
        assert!(matches!(err, AppError::InvalidTransition { .. }));
        assert_eq!(a.status, ActionStatus::Pending);
    }

    #[test]
    fn randomized_transition_sequences_respect_the_machine() {
        use rand::{rngs::StdRng, Rng, SeedableRng};

        // Seeded walk over transition requests; the reachable set must
        // stay within the legal chains regardless of request order.
        let mut rng = StdRng::seed_from_u64(0x9E3779B97F4A7C15);
        for _ in 0..200 {
            let mut a = action();
            let mut history = vec![a.status];
            for _ in 0..12 {
                let next = ALL[rng.gen_range(0..ALL.len())];
                let before = a.status;
                match a.transition(next) {
                    Ok(()) => {
                        assert!(before.can_transition(next));
                        history.push(next);
                    }
                    Err(_) => assert_eq!(a.status, before),
                }
            }
            // Every adjacent pair in the realized history is a legal edge
            for pair in history.windows(2) {
                assert!(pair[0].can_transition(pair[1]));
            }
        }
    }
}
