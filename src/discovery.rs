//! # Publish collaborator.
//!
//! The master hands every changed state to a [`Publisher`] before applying it
//! locally. The publisher distributes the state to the other nodes and reports
//! per-node acknowledgements through the supplied [`AckListener`], from any
//! task and in any order.
//!
//! ## Contract
//! - `Ok(())` means the state is committed; the master then applies it.
//! - `Err(PublishError)` fails every task of the batch and the master keeps the
//!   previous state.
//! - The master acknowledges itself after applying; publishers must not.

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::{NodeAckError, PublishError};
use crate::state::{ClusterChangedEvent, Node};

/// Receives per-node acknowledgements of a published state.
pub trait AckListener: Send + Sync {
    /// `node` applied the state (`failure == None`) or reported an error.
    fn on_node_ack(&self, node: &Node, failure: Option<NodeAckError>);
}

/// Distributes a new cluster state to the other nodes.
#[async_trait]
pub trait Publisher: Send + Sync + 'static {
    async fn publish(
        &self,
        event: &ClusterChangedEvent,
        ack_listener: Arc<dyn AckListener>,
    ) -> Result<(), PublishError>;
}

/// Single-node publisher: every state commits and no remote node acknowledges.
#[derive(Debug, Default, Clone, Copy)]
pub struct LocalPublisher;

#[async_trait]
impl Publisher for LocalPublisher {
    async fn publish(
        &self,
        event: &ClusterChangedEvent,
        _ack_listener: Arc<dyn AckListener>,
    ) -> Result<(), PublishError> {
        tracing::trace!(
            version = event.state().version(),
            "local publish of [{}]",
            event.source()
        );
        Ok(())
    }
}
