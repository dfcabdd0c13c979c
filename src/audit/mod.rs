//! Audit log & rollback
//!
//! Immutable record of executed outcomes and the mechanism to issue an
//! inverse action for a previously successful one.

mod models;
mod rollback;
mod store;

pub use models::{AuditLogEntry, AuditQuery, AuditStatus, Page, ROLLBACK_PREFIX};
pub use rollback::RollbackEngine;
pub use store::AuditLog;
