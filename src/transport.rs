//! # Connection collaborator.
//!
//! The update worker connects to nodes that joined and disconnects from nodes
//! that left; the reconnect loop retries nodes that dropped. Failures are
//! logged, never fatal.

use async_trait::async_trait;

use crate::error::TransportError;
use crate::state::Node;

/// Node connection management.
#[async_trait]
pub trait Transport: Send + Sync + 'static {
    async fn connect_to_node(&self, node: &Node) -> Result<(), TransportError>;

    async fn disconnect_from_node(&self, node: &Node) -> Result<(), TransportError>;

    fn is_connected(&self, node: &Node) -> bool;
}

/// Transport that considers every node connected.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopTransport;

#[async_trait]
impl Transport for NoopTransport {
    async fn connect_to_node(&self, _node: &Node) -> Result<(), TransportError> {
        Ok(())
    }

    async fn disconnect_from_node(&self, _node: &Node) -> Result<(), TransportError> {
        Ok(())
    }

    fn is_connected(&self, _node: &Node) -> bool {
        true
    }
}
