//! Safe-apply negotiation
//!
//! Maps a batch of proposed changes plus a chosen apply mode onto queue,
//! schedule or experiment effects. Option validation happens before any
//! state is created; a guardrail block refuses the individual change and it
//! never reaches a store.

use crate::change::{as_number, ProposedChange};
use crate::error::AppError;
use crate::guardrail::{GuardrailDecision, GuardrailStore};
use crate::queue::{ActionQueue, QueuedAction};
use crate::risk::RiskPolicy;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::info;
use uuid::Uuid;

pub const TRAFFIC_SPLIT_MIN: u8 = 10;
pub const TRAFFIC_SPLIT_MAX: u8 = 50;
pub const TRAFFIC_SPLIT_DEFAULT: u8 = 30;
pub const ALLOWED_DURATIONS_DAYS: [u8; 4] = [7, 14, 21, 30];
pub const DURATION_DEFAULT_DAYS: u8 = 14;

/// Strategy for when/how a change takes effect
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApplyMode {
    /// Queue for execution now
    Direct,
    /// Queue for later human approval
    Draft,
    /// Persist with a target timestamp; executable only once released
    Scheduled,
    /// Record a constrained-traffic trial instead of mutating the entity
    Experiment,
}

/// Mode-specific options
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplyOptions {
    pub scheduled_at: Option<DateTime<Utc>>,
    pub experiment_name: Option<String>,
    pub traffic_split_percent: Option<u8>,
    pub duration_days: Option<u8>,
}

/// One change in an apply batch, with its optional performance context
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangeItem {
    pub change: ProposedChange,
    pub performance_score: Option<f64>,
}

/// A change refused by a guardrail, with the human-readable reason
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BlockedItem {
    pub entity_name: String,
    pub reason: String,
}

/// A change persisted for later release at its target timestamp
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduledChange {
    pub id: Uuid,
    pub change: ProposedChange,
    pub performance_score: Option<f64>,
    pub scheduled_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub released_at: Option<DateTime<Utc>>,
}

/// A constrained-traffic trial recorded instead of a full mutation.
/// Full rollout is a separate later decision outside this core.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExperimentTrial {
    pub id: Uuid,
    pub change: ProposedChange,
    pub experiment_name: String,
    pub traffic_split_percent: u8,
    pub duration_days: u8,
    pub created_at: DateTime<Utc>,
}

/// Effects produced by one apply call
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplyOutcome {
    pub mode: ApplyMode,
    pub queued: Vec<QueuedAction>,
    pub blocked: Vec<BlockedItem>,
    pub warnings: Vec<String>,
    pub scheduled: Vec<ScheduledChange>,
    pub experiments: Vec<ExperimentTrial>,
}

impl ApplyOutcome {
    fn empty(mode: ApplyMode) -> Self {
        Self {
            mode,
            queued: Vec::new(),
            blocked: Vec::new(),
            warnings: Vec::new(),
            scheduled: Vec::new(),
            experiments: Vec::new(),
        }
    }
}

/// Store for not-yet-released scheduled changes
pub struct ScheduledStore {
    entries: RwLock<Vec<ScheduledChange>>,
}

impl ScheduledStore {
    pub fn new() -> Self {
        Self { entries: RwLock::new(Vec::new()) }
    }

    pub async fn add(
        &self,
        change: ProposedChange,
        performance_score: Option<f64>,
        scheduled_at: DateTime<Utc>,
    ) -> ScheduledChange {
        let entry = ScheduledChange {
            id: Uuid::new_v4(),
            change,
            performance_score,
            scheduled_at,
            created_at: Utc::now(),
            released_at: None,
        };
        self.entries.write().await.push(entry.clone());
        entry
    }

    pub async fn list(&self) -> Vec<ScheduledChange> {
        self.entries.read().await.clone()
    }

    /// Move every due, unreleased entry into the queue as a pending action.
    /// Calling this on a cadence is the external scheduler's job.
    pub async fn release_due(
        &self,
        now: DateTime<Utc>,
        queue: &ActionQueue,
        policy: &RiskPolicy,
    ) -> Vec<QueuedAction> {
        let mut entries = self.entries.write().await;
        let mut released = Vec::new();
        for entry in entries.iter_mut() {
            if entry.released_at.is_none() && entry.scheduled_at <= now {
                let action = queue
                    .enqueue(entry.change.clone(), entry.performance_score, policy)
                    .await;
                entry.released_at = Some(now);
                released.push(action);
            }
        }
        if !released.is_empty() {
            info!("Released {} scheduled change(s) into the queue", released.len());
        }
        released
    }
}

impl Default for ScheduledStore {
    fn default() -> Self {
        Self::new()
    }
}

/// Store for recorded experiment trials
pub struct ExperimentStore {
    trials: RwLock<Vec<ExperimentTrial>>,
}

impl ExperimentStore {
    pub fn new() -> Self {
        Self { trials: RwLock::new(Vec::new()) }
    }

    pub async fn add(&self, trial: ExperimentTrial) -> ExperimentTrial {
        self.trials.write().await.push(trial.clone());
        trial
    }

    pub async fn list(&self) -> Vec<ExperimentTrial> {
        self.trials.read().await.clone()
    }
}

impl Default for ExperimentStore {
    fn default() -> Self {
        Self::new()
    }
}

pub struct SafeApplyNegotiator {
    queue: Arc<ActionQueue>,
    guardrails: Arc<GuardrailStore>,
    scheduled: Arc<ScheduledStore>,
    experiments: Arc<ExperimentStore>,
}

impl SafeApplyNegotiator {
    pub fn new(
        queue: Arc<ActionQueue>,
        guardrails: Arc<GuardrailStore>,
        scheduled: Arc<ScheduledStore>,
        experiments: Arc<ExperimentStore>,
    ) -> Self {
        Self { queue, guardrails, scheduled, experiments }
    }

    /// Resolve a batch of change items under the chosen mode.
    ///
    /// Option violations fail the whole call before any state exists; a
    /// guardrail block refuses only the offending item.
    pub async fn apply(
        &self,
        items: Vec<ChangeItem>,
        mode: ApplyMode,
        options: ApplyOptions,
    ) -> Result<ApplyOutcome, AppError> {
        let resolved = ResolvedOptions::validate(mode, &options)?;
        if items.is_empty() {
            return Err(AppError::Validation("At least one change is required".to_string()));
        }
        // Budget values must be numeric before anything is classified or
        // stored; a malformed value must not degrade into a no-op change
        for item in &items {
            let change = &item.change;
            if change.is_budget_change()
                && (as_number(&change.current_value).is_none()
                    || as_number(&change.new_value).is_none())
            {
                return Err(AppError::Validation(format!(
                    "Budget values for '{}' must be numeric",
                    change.entity_name
                )));
            }
        }

        let settings = self.guardrails.get().await;
        let policy = RiskPolicy::from(&settings);
        let mut outcome = ApplyOutcome::empty(mode);

        for item in items {
            let verdict = self
                .guardrails
                .evaluate(&item.change, item.performance_score)
                .await;
            match verdict.decision {
                GuardrailDecision::Block => {
                    outcome.blocked.push(BlockedItem {
                        entity_name: item.change.entity_name.clone(),
                        reason: verdict.reason.unwrap_or_default(),
                    });
                    continue;
                }
                GuardrailDecision::Warn => {
                    if let Some(reason) = verdict.reason {
                        outcome.warnings.push(reason);
                    }
                }
                GuardrailDecision::Allow => {}
            }

            match mode {
                ApplyMode::Direct | ApplyMode::Draft => {
                    let action = self
                        .queue
                        .enqueue(item.change, item.performance_score, &policy)
                        .await;
                    outcome.queued.push(action);
                }
                ApplyMode::Scheduled => {
                    let entry = self
                        .scheduled
                        .add(item.change, item.performance_score, resolved.scheduled_at)
                        .await;
                    outcome.scheduled.push(entry);
                }
                ApplyMode::Experiment => {
                    let trial = self
                        .experiments
                        .add(ExperimentTrial {
                            id: Uuid::new_v4(),
                            change: item.change,
                            experiment_name: resolved.experiment_name.clone(),
                            traffic_split_percent: resolved.traffic_split_percent,
                            duration_days: resolved.duration_days,
                            created_at: Utc::now(),
                        })
                        .await;
                    outcome.experiments.push(trial);
                }
            }
        }

        info!(
            "Apply ({:?}): {} queued, {} scheduled, {} experiments, {} blocked, {} warnings",
            mode,
            outcome.queued.len(),
            outcome.scheduled.len(),
            outcome.experiments.len(),
            outcome.blocked.len(),
            outcome.warnings.len()
        );
        Ok(outcome)
    }
}

/// Mode options after validation and default filling
struct ResolvedOptions {
    scheduled_at: DateTime<Utc>,
    experiment_name: String,
    traffic_split_percent: u8,
    duration_days: u8,
}

impl ResolvedOptions {
    fn validate(mode: ApplyMode, options: &ApplyOptions) -> Result<Self, AppError> {
        let mut resolved = Self {
            scheduled_at: Utc::now(),
            experiment_name: String::new(),
            traffic_split_percent: TRAFFIC_SPLIT_DEFAULT,
            duration_days: DURATION_DEFAULT_DAYS,
        };

        if mode == ApplyMode::Scheduled {
            resolved.scheduled_at = options.scheduled_at.ok_or_else(|| {
                AppError::Validation("Scheduled mode requires scheduledAt".to_string())
            })?;
        }

        if mode == ApplyMode::Experiment {
            resolved.experiment_name = options
                .experiment_name
                .as_deref()
                .filter(|n| !n.trim().is_empty())
                .ok_or_else(|| {
                    AppError::Validation("Experiment mode requires experimentName".to_string())
                })?
                .to_string();

            let split = options.traffic_split_percent.unwrap_or(TRAFFIC_SPLIT_DEFAULT);
            if !(TRAFFIC_SPLIT_MIN..=TRAFFIC_SPLIT_MAX).contains(&split) {
                return Err(AppError::Validation(format!(
                    "trafficSplitPercent must be between {} and {}",
                    TRAFFIC_SPLIT_MIN, TRAFFIC_SPLIT_MAX
                )));
            }
            resolved.traffic_split_percent = split;

            let duration = options.duration_days.unwrap_or(DURATION_DEFAULT_DAYS);
            if !ALLOWED_DURATIONS_DAYS.contains(&duration) {
                return Err(AppError::Validation(format!(
                    "durationDays must be one of {:?}",
                    ALLOWED_DURATIONS_DAYS
                )));
            }
            resolved.duration_days = duration;
        }

        Ok(resolved)
    }
}
