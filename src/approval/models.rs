//! Approval request models

use crate::change::EntityType;
use crate::risk::RiskLevel;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Days until a pending request expires
pub const EXPIRY_DAYS: i64 = 7;

/// Stored status of an approval request.
///
/// `Expired` is derived at read time from `expires_at`; the store never
/// writes it back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApprovalStatus {
    Pending,
    Approved,
    Rejected,
    Cancelled,
    Expired,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ApprovalPriority {
    Low,
    Medium,
    High,
}

/// Reviewer decision on a pending request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReviewDecision {
    Approve,
    Reject,
}

/// One field-level change inside a request
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangeDetail {
    pub field: String,
    pub current_value: serde_json::Value,
    pub new_value: serde_json::Value,
    pub label: Option<String>,
}

/// Estimated blast radius of the requested change
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EstimatedImpact {
    /// Signed budget swing percent, when the request touches budgets
    pub budget_delta_percent: Option<f64>,
    /// How many entities the change fans out to
    pub affected_entities: usize,
}

/// Input for creating a request
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateApproval {
    pub change_type: String,
    pub entity_type: EntityType,
    pub entity_ids: Vec<String>,
    pub changes: Vec<ChangeDetail>,
    pub reason: String,
    #[serde(default)]
    pub estimated_impact: EstimatedImpact,
    /// Risk level already assigned to the underlying change, if any
    #[serde(default)]
    pub risk_level: Option<RiskLevel>,
}

/// A persisted sign-off request
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApprovalRequest {
    pub id: Uuid,
    pub change_type: String,
    pub entity_type: EntityType,
    pub entity_ids: Vec<String>,
    pub entity_count: usize,
    pub requested_by: String,
    pub requested_at: DateTime<Utc>,
    pub status: ApprovalStatus,
    pub priority: ApprovalPriority,
    pub changes: Vec<ChangeDetail>,
    pub reason: String,
    pub estimated_impact: EstimatedImpact,
    pub reviewed_by: Option<String>,
    pub reviewed_at: Option<DateTime<Utc>>,
    pub review_comments: Option<String>,
    pub expires_at: DateTime<Utc>,
}

impl ApprovalRequest {
    pub fn new(input: CreateApproval, requested_by: String, policy: &PriorityPolicy) -> Self {
        let now = Utc::now();
        let priority = policy.compute(&input);
        Self {
            id: Uuid::new_v4(),
            change_type: input.change_type,
            entity_type: input.entity_type,
            entity_count: input.entity_ids.len().max(input.estimated_impact.affected_entities),
            entity_ids: input.entity_ids,
            requested_by,
            requested_at: now,
            status: ApprovalStatus::Pending,
            priority,
            changes: input.changes,
            reason: input.reason,
            estimated_impact: input.estimated_impact,
            reviewed_by: None,
            reviewed_at: None,
            review_comments: None,
            expires_at: now + Duration::days(EXPIRY_DAYS),
        }
    }

    /// Status with lazy expiry applied; never written back to the store
    pub fn effective_status(&self, now: DateTime<Utc>) -> ApprovalStatus {
        if self.status == ApprovalStatus::Pending && now > self.expires_at {
            ApprovalStatus::Expired
        } else {
            self.status
        }
    }
}

/// Thresholds for deriving request priority.
///
/// Priority is monotonic in sensitivity and impact: a large relative budget
/// swing or a wide fan-out escalates regardless of absolute dollar amount.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PriorityPolicy {
    pub high_budget_swing_percent: f64,
    pub high_entity_count: usize,
    pub medium_budget_swing_percent: f64,
    pub medium_entity_count: usize,
}

impl Default for PriorityPolicy {
    fn default() -> Self {
        Self {
            high_budget_swing_percent: 50.0,
            high_entity_count: 10,
            medium_budget_swing_percent: 20.0,
            medium_entity_count: 3,
        }
    }
}

impl PriorityPolicy {
    pub fn compute(&self, input: &CreateApproval) -> ApprovalPriority {
        let swing = input
            .estimated_impact
            .budget_delta_percent
            .map(f64::abs)
            .unwrap_or(0.0);
        let entities = input
            .entity_ids
            .len()
            .max(input.estimated_impact.affected_entities);

        if swing >= self.high_budget_swing_percent || entities >= self.high_entity_count {
            return ApprovalPriority::High;
        }
        if swing >= self.medium_budget_swing_percent
            || entities >= self.medium_entity_count
            || input.risk_level == Some(RiskLevel::High)
        {
            return ApprovalPriority::Medium;
        }
        ApprovalPriority::Low
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn input(swing: Option<f64>, entities: usize, risk: Option<RiskLevel>) -> CreateApproval {
        CreateApproval {
            change_type: "budget_change".to_string(),
            entity_type: EntityType::Campaign,
            entity_ids: (0..entities).map(|i| format!("c-{i}")).collect(),
            changes: Vec::new(),
            reason: "test".to_string(),
            estimated_impact: EstimatedImpact {
                budget_delta_percent: swing,
                affected_entities: entities,
            },
            risk_level: risk,
        }
    }

    #[test]
    fn priority_escalates_on_relative_swing_not_dollars() {
        let policy = PriorityPolicy::default();
        assert_eq!(policy.compute(&input(Some(60.0), 1, None)), ApprovalPriority::High);
        assert_eq!(policy.compute(&input(Some(-55.0), 1, None)), ApprovalPriority::High);
        assert_eq!(policy.compute(&input(Some(25.0), 1, None)), ApprovalPriority::Medium);
        assert_eq!(policy.compute(&input(Some(5.0), 1, None)), ApprovalPriority::Low);
    }

    #[test]
    fn priority_escalates_on_fanout() {
        let policy = PriorityPolicy::default();
        assert_eq!(policy.compute(&input(None, 12, None)), ApprovalPriority::High);
        assert_eq!(policy.compute(&input(None, 4, None)), ApprovalPriority::Medium);
        assert_eq!(policy.compute(&input(None, 1, None)), ApprovalPriority::Low);
    }

    #[test]
    fn high_risk_changes_are_at_least_medium() {
        let policy = PriorityPolicy::default();
        assert_eq!(
            policy.compute(&input(None, 1, Some(RiskLevel::High))),
            ApprovalPriority::Medium
        );
    }

    #[test]
    fn priority_is_monotonic_in_swing() {
        let policy = PriorityPolicy::default();
        let mut last = ApprovalPriority::Low;
        for swing in [0.0, 10.0, 20.0, 30.0, 50.0, 80.0, 200.0] {
            let p = policy.compute(&input(Some(swing), 1, None));
            assert!(p >= last, "priority regressed at swing {swing}");
            last = p;
        }
    }

    #[test]
    fn new_request_expires_in_seven_days() {
        let req = ApprovalRequest::new(
            input(None, 1, None),
            "ops@example.com".to_string(),
            &PriorityPolicy::default(),
        );
        let offset = req.expires_at - req.requested_at;
        assert_eq!(offset, Duration::days(7));
        assert_eq!(req.effective_status(Utc::now()), ApprovalStatus::Pending);
        assert_eq!(
            req.effective_status(req.expires_at + Duration::hours(1)),
            ApprovalStatus::Expired
        );
    }
}
