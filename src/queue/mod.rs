//! Action queue
//!
//! Ordered collection of proposed changes with a forward-only lifecycle.
//! Insertion order is execution order.

mod models;
mod store;

pub use models::{ActionStatus, QueuedAction};
pub use store::ActionQueue;
