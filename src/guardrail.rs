//! Guardrail Policy Engine
//!
//! Configurable protective rules evaluated against every proposed change
//! before it can reach the queue or the approval store. Evaluation is pure
//! and stateless; settings are read fresh on every call so a settings
//! update takes effect immediately.

use crate::change::{ActionType, ProposedChange};
use crate::error::AppError;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::info;

/// Process-wide guardrail configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GuardrailSettings {
    /// Master switch; when false every evaluation returns allow
    pub enabled: bool,
    pub allow_pause_all_campaigns: bool,
    pub warn_on_high_performer_pause: bool,
    /// Performance score (0-100) at or above which an entity counts as a high performer
    pub high_performer_threshold: f64,
    pub allow_zero_budget: bool,
    /// Absolute budget change percent that triggers a warning; adjustable 10-100 in steps of 10
    pub budget_change_threshold_percent: f64,
}

impl Default for GuardrailSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            allow_pause_all_campaigns: false,
            warn_on_high_performer_pause: true,
            high_performer_threshold: 70.0,
            allow_zero_budget: false,
            budget_change_threshold_percent: 20.0,
        }
    }
}

impl GuardrailSettings {
    /// Validate configured ranges before accepting an update
    pub fn validate(&self) -> Result<(), AppError> {
        if !(0.0..=100.0).contains(&self.high_performer_threshold) {
            return Err(AppError::Validation(
                "highPerformerThreshold must be between 0 and 100".to_string(),
            ));
        }
        let pct = self.budget_change_threshold_percent;
        if !(10.0..=100.0).contains(&pct) || pct % 10.0 != 0.0 {
            return Err(AppError::Validation(
                "budgetChangeThresholdPercent must be between 10 and 100 in steps of 10"
                    .to_string(),
            ));
        }
        Ok(())
    }
}

/// Outcome of a guardrail evaluation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GuardrailDecision {
    Allow,
    Warn,
    Block,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GuardrailVerdict {
    pub decision: GuardrailDecision,
    pub reason: Option<String>,
}

impl GuardrailVerdict {
    pub fn allow() -> Self {
        Self { decision: GuardrailDecision::Allow, reason: None }
    }

    pub fn warn(reason: impl Into<String>) -> Self {
        Self { decision: GuardrailDecision::Warn, reason: Some(reason.into()) }
    }

    pub fn block(reason: impl Into<String>) -> Self {
        Self { decision: GuardrailDecision::Block, reason: Some(reason.into()) }
    }
}

/// Evaluate a proposed change against the guardrail settings.
///
/// Precedence is block > warn > allow: the first matching block rule wins,
/// then the first matching warn rule, otherwise allow.
pub fn evaluate(
    change: &ProposedChange,
    settings: &GuardrailSettings,
    performance_score: Option<f64>,
) -> GuardrailVerdict {
    if !settings.enabled {
        return GuardrailVerdict::allow();
    }

    // Block rules
    if change.action_type == ActionType::PauseAllCampaigns && !settings.allow_pause_all_campaigns {
        return GuardrailVerdict::block(
            "Pausing all campaigns is not permitted by the current guardrail settings",
        );
    }
    if change.sets_budget_to_zero() && !settings.allow_zero_budget {
        return GuardrailVerdict::block(format!(
            "Setting the budget of '{}' to 0 is not permitted by the current guardrail settings",
            change.entity_name
        ));
    }

    // Warn rules
    if change.action_type.is_pause() && settings.warn_on_high_performer_pause {
        if let Some(score) = performance_score {
            if score >= settings.high_performer_threshold {
                return GuardrailVerdict::warn(format!(
                    "'{}' is a high performer (score {:.0} >= threshold {:.0}); pausing it may hurt results",
                    change.entity_name, score, settings.high_performer_threshold
                ));
            }
        }
    }
    if let Some(pct) = change.budget_change_percent() {
        if pct.abs() >= settings.budget_change_threshold_percent {
            return GuardrailVerdict::warn(format!(
                "Budget change of {:.1}% on '{}' meets the {:.0}% threshold",
                pct, change.entity_name, settings.budget_change_threshold_percent
            ));
        }
    }

    GuardrailVerdict::allow()
}

/// Shared, updatable guardrail settings
///
/// Every evaluation reads the current settings; nothing is cached across
/// an update.
pub struct GuardrailStore {
    settings: RwLock<GuardrailSettings>,
}

impl GuardrailStore {
    pub fn new() -> Self {
        Self { settings: RwLock::new(GuardrailSettings::default()) }
    }

    pub async fn get(&self) -> GuardrailSettings {
        self.settings.read().await.clone()
    }

    /// Replace the settings after validating ranges
    pub async fn update(&self, new: GuardrailSettings) -> Result<GuardrailSettings, AppError> {
        new.validate()?;
        let mut settings = self.settings.write().await;
        *settings = new.clone();
        info!("Guardrail settings updated: {:?}", new);
        Ok(new)
    }

    /// Restore configuration defaults
    pub async fn reset(&self) -> GuardrailSettings {
        let defaults = GuardrailSettings::default();
        let mut settings = self.settings.write().await;
        *settings = defaults.clone();
        info!("Guardrail settings reset to defaults");
        defaults
    }

    /// Evaluate a change against the current settings
    pub async fn evaluate(
        &self,
        change: &ProposedChange,
        performance_score: Option<f64>,
    ) -> GuardrailVerdict {
        let settings = self.settings.read().await;
        evaluate(change, &settings, performance_score)
    }
}

impl Default for GuardrailStore {
    fn default() -> Self {
        Self::new()
    }
}
