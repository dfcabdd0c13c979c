//! Approval workflow
//!
//! Persisted sign-off process for higher-impact changes, distinct from the
//! queue's per-action approve/reject.

mod models;
mod store;

pub use models::{
    ApprovalPriority, ApprovalRequest, ApprovalStatus, ChangeDetail, CreateApproval,
    EstimatedImpact, PriorityPolicy, ReviewDecision,
};
pub use store::{ApprovalQuery, ApprovalStore};
