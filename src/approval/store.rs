//! Approval request store
//!
//! Thread-safe store with creation-ordered entries. Review and cancel hold
//! the write lock across the permission check and the transition, so two
//! reviewers cannot both land a decision on the same request.

use crate::approval::{
    ApprovalRequest, ApprovalStatus, CreateApproval, PriorityPolicy, ReviewDecision,
};
use crate::audit::Page;
use crate::error::AppError;
use crate::events::{DomainEvent, EventBus};
use crate::models::Actor;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use tokio::sync::RwLock;
use tracing::info;
use uuid::Uuid;

const DEFAULT_PAGE_LIMIT: usize = 50;

/// Filtered, paginated query over approval requests
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApprovalQuery {
    /// Matches the effective status, so `expired` finds lapsed pending requests
    pub status: Option<ApprovalStatus>,
    pub requested_by: Option<String>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
    pub limit: Option<usize>,
    pub offset: Option<usize>,
}

pub struct ApprovalStore {
    requests: RwLock<Vec<ApprovalRequest>>,
    policy: PriorityPolicy,
    bus: EventBus,
}

impl ApprovalStore {
    pub fn new(bus: EventBus) -> Self {
        Self::with_policy(bus, PriorityPolicy::default())
    }

    pub fn with_policy(bus: EventBus, policy: PriorityPolicy) -> Self {
        Self {
            requests: RwLock::new(Vec::new()),
            policy,
            bus,
        }
    }

    /// Create a pending request; priority derives from the policy
    pub async fn create(&self, input: CreateApproval, requester: &Actor) -> ApprovalRequest {
        let request = ApprovalRequest::new(input, requester.id.clone(), &self.policy);
        let mut requests = self.requests.write().await;
        requests.push(request.clone());
        info!(
            "Approval request created: '{}' by {} (priority: {:?}, id: {})",
            request.change_type, request.requested_by, request.priority, request.id
        );
        self.bus.publish(DomainEvent::RequestCreated {
            request_id: request.id,
            requested_by: request.requested_by.clone(),
        });
        request
    }

    /// Record a reviewer decision.
    ///
    /// Fails with `Forbidden` without approve capability, and with
    /// `InvalidTransition` when the request is no longer pending (including
    /// lapsed requests). The check and the transition share one lock scope.
    pub async fn review(
        &self,
        id: Uuid,
        decision: ReviewDecision,
        reviewer: &Actor,
        comments: Option<String>,
    ) -> Result<ApprovalRequest, AppError> {
        if !reviewer.can_approve {
            return Err(AppError::Forbidden(format!(
                "User '{}' does not hold approve capability",
                reviewer.id
            )));
        }

        let mut requests = self.requests.write().await;
        let request = Self::find_mut(&mut requests, id)?;

        let now = Utc::now();
        let effective = request.effective_status(now);
        if effective != ApprovalStatus::Pending {
            return Err(AppError::InvalidTransition {
                from: format!("{effective:?}").to_lowercase(),
                to: match decision {
                    ReviewDecision::Approve => "approved".to_string(),
                    ReviewDecision::Reject => "rejected".to_string(),
                },
            });
        }

        request.status = match decision {
            ReviewDecision::Approve => ApprovalStatus::Approved,
            ReviewDecision::Reject => ApprovalStatus::Rejected,
        };
        request.reviewed_by = Some(reviewer.id.clone());
        request.reviewed_at = Some(now);
        request.review_comments = comments;

        info!(
            "Approval request {} {:?} by {}",
            request.id, request.status, reviewer.id
        );
        self.bus.publish(DomainEvent::RequestReviewed {
            request_id: request.id,
            approved: request.status == ApprovalStatus::Approved,
            reviewed_by: reviewer.id.clone(),
        });
        Ok(request.clone())
    }

    /// Withdraw a pending request. Allowed for the original requester or an
    /// approve-capable user; anything else is a typed failure.
    pub async fn cancel(&self, id: Uuid, actor: &Actor) -> Result<ApprovalRequest, AppError> {
        let mut requests = self.requests.write().await;
        let request = Self::find_mut(&mut requests, id)?;

        if request.requested_by != actor.id && !actor.can_approve {
            return Err(AppError::Forbidden(format!(
                "User '{}' may not cancel a request owned by '{}'",
                actor.id, request.requested_by
            )));
        }

        let effective = request.effective_status(Utc::now());
        if effective != ApprovalStatus::Pending {
            return Err(AppError::InvalidTransition {
                from: format!("{effective:?}").to_lowercase(),
                to: "cancelled".to_string(),
            });
        }

        request.status = ApprovalStatus::Cancelled;
        info!("Approval request {} cancelled by {}", request.id, actor.id);
        self.bus.publish(DomainEvent::RequestCancelled { request_id: request.id });
        Ok(request.clone())
    }

    /// Point lookup with lazy expiry applied to the reported status
    pub async fn get(&self, id: Uuid) -> Result<ApprovalRequest, AppError> {
        let requests = self.requests.read().await;
        requests
            .iter()
            .find(|r| r.id == id)
            .map(|r| Self::with_effective_status(r, Utc::now()))
            .ok_or_else(|| AppError::NotFound(format!("Approval request {} not found", id)))
    }

    /// Filtered query, most recent first
    pub async fn query(&self, filter: &ApprovalQuery) -> Page<ApprovalRequest> {
        let requests = self.requests.read().await;
        let now = Utc::now();
        let matched: Vec<ApprovalRequest> = requests
            .iter()
            .rev()
            .map(|r| Self::with_effective_status(r, now))
            .filter(|r| Self::matches(r, filter))
            .collect();

        let total = matched.len();
        let offset = filter.offset.unwrap_or(0);
        let limit = filter.limit.unwrap_or(DEFAULT_PAGE_LIMIT);
        let items: Vec<ApprovalRequest> =
            matched.into_iter().skip(offset).take(limit).collect();
        let has_more = offset + items.len() < total;

        Page { items, total, has_more }
    }

    fn find_mut(requests: &mut [ApprovalRequest], id: Uuid) -> Result<&mut ApprovalRequest, AppError> {
        requests
            .iter_mut()
            .find(|r| r.id == id)
            .ok_or_else(|| AppError::NotFound(format!("Approval request {} not found", id)))
    }

    fn with_effective_status(request: &ApprovalRequest, now: DateTime<Utc>) -> ApprovalRequest {
        let mut view = request.clone();
        view.status = request.effective_status(now);
        view
    }

    fn matches(request: &ApprovalRequest, filter: &ApprovalQuery) -> bool {
        if let Some(status) = filter.status {
            if request.status != status {
                return false;
            }
        }
        if let Some(requested_by) = &filter.requested_by {
            if &request.requested_by != requested_by {
                return false;
            }
        }
        if let Some(from) = filter.from {
            if request.requested_at < from {
                return false;
            }
        }
        if let Some(to) = filter.to {
            if request.requested_at > to {
                return false;
            }
        }
        true
    }

    /// Test hook: force a request's expiry into the past
    #[cfg(test)]
    pub async fn force_expire(&self, id: Uuid) {
        let mut requests = self.requests.write().await;
        if let Some(r) = requests.iter_mut().find(|r| r.id == id) {
            r.expires_at = Utc::now() - chrono::Duration::hours(1);
        }
    }
}
