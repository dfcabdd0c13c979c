//! Risk classification
//!
//! Scores a proposed change before it enters the queue. Deterministic and
//! pure: fixed inputs always produce the same level, no I/O. Thresholds are
//! policy, not constants, so operators can tune them alongside the
//! guardrails.

use crate::change::{ActionType, EntityType, ProposedChange};
use crate::guardrail::GuardrailSettings;
use serde::{Deserialize, Serialize};

/// Risk level assigned to a queued action
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

/// Tunable thresholds for classification
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RiskPolicy {
    /// Performance score at or above which pausing/removing is high risk
    pub high_performer_threshold: f64,
    /// Absolute budget change percent beyond which the change escalates
    pub budget_change_threshold_percent: f64,
}

impl Default for RiskPolicy {
    fn default() -> Self {
        Self {
            high_performer_threshold: 70.0,
            budget_change_threshold_percent: 20.0,
        }
    }
}

impl From<&GuardrailSettings> for RiskPolicy {
    fn from(settings: &GuardrailSettings) -> Self {
        Self {
            high_performer_threshold: settings.high_performer_threshold,
            budget_change_threshold_percent: settings.budget_change_threshold_percent,
        }
    }
}

/// Classify a proposed change.
///
/// Rules, most severe first:
/// - pausing an entity whose performance score clears the threshold: high
/// - budget to zero, or a decrease beyond the threshold percent: high
/// - a budget increase beyond the threshold percent: medium
/// - account-wide pause or bulk edits: medium
/// - everything else (status/bid toggles on low-impact entities): low
pub fn classify(
    change: &ProposedChange,
    performance_score: Option<f64>,
    policy: &RiskPolicy,
) -> RiskLevel {
    if change.action_type.is_pause() {
        if let Some(score) = performance_score {
            if score >= policy.high_performer_threshold {
                return RiskLevel::High;
            }
        }
    }

    if change.sets_budget_to_zero() {
        return RiskLevel::High;
    }

    if let Some(pct) = change.budget_change_percent() {
        if pct <= -policy.budget_change_threshold_percent {
            return RiskLevel::High;
        }
        if pct >= policy.budget_change_threshold_percent {
            return RiskLevel::Medium;
        }
    }

    match change.action_type {
        ActionType::PauseAllCampaigns | ActionType::BulkEdit => RiskLevel::Medium,
        _ => RiskLevel::Low,
    }
}
