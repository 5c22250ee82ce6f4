//! # Listener contract and notification tiers.

use std::fmt;

use crate::state::ClusterChangedEvent;

/// Observer of applied cluster state changes.
///
/// Called on the update worker; a slow listener delays every later batch.
pub trait ClusterStateListener: Send + Sync + 'static {
    fn cluster_changed(&self, event: &ClusterChangedEvent);
}

/// Notification tier a listener is registered in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ListenerTier {
    /// Notified first, before the state is marked applied.
    First,
    /// Default pre-applied tier.
    Normal,
    /// Notified last among the pre-applied tiers.
    Last,
    /// Notified after the state is marked applied.
    PostApplied,
}

impl ListenerTier {
    /// Tiers notified before the state is marked applied, in order.
    pub const PRE_APPLIED: [ListenerTier; 3] =
        [ListenerTier::First, ListenerTier::Normal, ListenerTier::Last];

    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            ListenerTier::First => "first",
            ListenerTier::Normal => "normal",
            ListenerTier::Last => "last",
            ListenerTier::PostApplied => "post_applied",
        }
    }
}

impl fmt::Display for ListenerTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_label())
    }
}
