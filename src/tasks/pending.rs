//! # Read-only view of queued work.

use std::time::Duration;

use crate::tasks::Priority;

/// Snapshot of one queue entry, for introspection only.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PendingClusterTask {
    /// Global submission counter; lower means earlier.
    pub insertion_order: u64,
    pub priority: Priority,
    pub source: String,
    pub time_in_queue: Duration,
    /// True for the entry the update worker is running right now.
    pub executing: bool,
}
