//! Proposed change model
//!
//! A ProposedChange is a single intended mutation to one entity's field.
//! It is immutable once created; everything downstream (risk, guardrails,
//! queue, audit) works from it.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Entity kinds in the external ad account
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityType {
    Campaign,
    AdGroup,
    Keyword,
    Ad,
}

/// Kinds of mutations an operator can propose
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionType {
    Pause,
    Enable,
    SetBudget,
    SetBid,
    BulkEdit,
    PauseAllCampaigns,
}

impl ActionType {
    /// Whether this action stops delivery for the entity
    pub fn is_pause(self) -> bool {
        matches!(self, ActionType::Pause | ActionType::PauseAllCampaigns)
    }

    /// Wire name, matching the serde representation
    pub fn as_str(self) -> &'static str {
        match self {
            ActionType::Pause => "pause",
            ActionType::Enable => "enable",
            ActionType::SetBudget => "set_budget",
            ActionType::SetBid => "set_bid",
            ActionType::BulkEdit => "bulk_edit",
            ActionType::PauseAllCampaigns => "pause_all_campaigns",
        }
    }

    /// Parse a wire name back into an action type
    pub fn from_wire(name: &str) -> Option<Self> {
        match name {
            "pause" => Some(ActionType::Pause),
            "enable" => Some(ActionType::Enable),
            "set_budget" => Some(ActionType::SetBudget),
            "set_bid" => Some(ActionType::SetBid),
            "bulk_edit" => Some(ActionType::BulkEdit),
            "pause_all_campaigns" => Some(ActionType::PauseAllCampaigns),
            _ => None,
        }
    }

    /// Action that undoes this one; value-level changes invert by swapping
    /// values under the same action
    pub fn inverse(self) -> Self {
        match self {
            ActionType::Pause => ActionType::Enable,
            ActionType::Enable => ActionType::Pause,
            other => other,
        }
    }
}

/// A single intended mutation to one entity's field
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProposedChange {
    pub entity_type: EntityType,
    pub entity_id: String,
    pub entity_name: String,
    pub action_type: ActionType,
    pub field_name: String,
    /// Value before the change (number for budgets/bids, string for statuses)
    pub current_value: Value,
    /// Target value after the change
    pub new_value: Value,
    pub account_id: String,
}

impl ProposedChange {
    pub fn is_budget_change(&self) -> bool {
        self.action_type == ActionType::SetBudget
    }

    /// True when the change sets a budget to exactly zero
    pub fn sets_budget_to_zero(&self) -> bool {
        self.is_budget_change() && as_number(&self.new_value) == Some(0.0)
    }

    /// Signed percent delta between current and new budget, if both are numeric.
    /// Positive = increase, negative = decrease.
    pub fn budget_change_percent(&self) -> Option<f64> {
        if !self.is_budget_change() {
            return None;
        }
        let current = as_number(&self.current_value)?;
        let new = as_number(&self.new_value)?;
        if current == 0.0 {
            return None;
        }
        Some((new - current) / current * 100.0)
    }
}

/// Numeric view of a JSON value; accepts numbers and numeric strings
pub fn as_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}
