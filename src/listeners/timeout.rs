//! # Post-applied listeners with a registration timeout.

use std::time::Duration;

use crate::listeners::ClusterStateListener;

/// Listener registered through `ClusterService::add_timeout_listener`.
///
/// It lives in the post-applied tier. If a timeout was given, `on_timeout`
/// fires once it elapses unless the listener was removed first; the listener
/// is expected to remove itself when it no longer cares.
pub trait TimeoutClusterStateListener: ClusterStateListener {
    /// Called on the update worker right after registration.
    fn post_added(&self) {}

    /// The service stopped before the listener was registered or timed out.
    fn on_close(&self);

    /// The registration timeout elapsed.
    fn on_timeout(&self, timeout: Duration);
}
