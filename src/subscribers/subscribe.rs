//! # Core subscriber trait
//!
//! `Subscribe` is the extension point for plugging custom runtime-event handlers
//! (metrics, audit, alerts) into the service. Each subscriber is driven by a
//! dedicated worker loop fed by a bounded queue owned by the
//! [`SubscriberSet`](crate::subscribers::SubscriberSet).
//!
//! This is **not** the cluster state listener API: subscribers observe the
//! pipeline asynchronously and can never delay or reorder state application.
//! Use [`ClusterStateListener`](crate::ClusterStateListener) for that.
//!
//! ## Contract
//! - Implementations may be slow; they do **not** block the update worker nor other subscribers.
//! - If a subscriber's queue overflows, events for that subscriber are **dropped**.

use async_trait::async_trait;

use crate::events::Event;

/// Contract for runtime event subscribers.
#[async_trait]
pub trait Subscribe: Send + Sync + 'static {
    /// Handle a single event for this subscriber.
    async fn on_event(&self, event: &Event);

    /// Human-readable name (for logs/metrics).
    fn name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }

    /// Preferred capacity of this subscriber's queue.
    fn queue_capacity(&self) -> usize {
        1024
    }
}
