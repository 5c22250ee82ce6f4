use std::sync::Arc;

use crate::core::config::ServiceConfig;
use crate::core::service::ClusterService;
use crate::discovery::{LocalPublisher, Publisher};
use crate::state::{ClusterBlock, ClusterBlocks, Node};
use crate::subscribers::Subscribe;
use crate::transport::{NoopTransport, Transport};

/// Builder for constructing a [`ClusterService`] with its collaborators.
pub struct ClusterServiceBuilder {
    cfg: ServiceConfig,
    local_node: Node,
    publisher: Arc<dyn Publisher>,
    transport: Arc<dyn Transport>,
    subscribers: Vec<Arc<dyn Subscribe>>,
    initial_blocks: ClusterBlocks,
}

impl ClusterServiceBuilder {
    /// Creates a builder with default configuration, a [`LocalPublisher`] and a
    /// [`NoopTransport`]. The initial state carries the "no master" block.
    pub fn new(local_node: Node) -> Self {
        Self {
            cfg: ServiceConfig::default(),
            local_node,
            publisher: Arc::new(LocalPublisher),
            transport: Arc::new(NoopTransport),
            subscribers: Vec::new(),
            initial_blocks: ClusterBlocks::default().with_global_block(ClusterBlock::no_master()),
        }
    }

    pub fn with_config(mut self, cfg: ServiceConfig) -> Self {
        self.cfg = cfg;
        self
    }

    /// Sets the collaborator that distributes new states and reports acks.
    pub fn with_publisher(mut self, publisher: Arc<dyn Publisher>) -> Self {
        self.publisher = publisher;
        self
    }

    /// Sets the collaborator that manages node connections.
    pub fn with_transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = transport;
        self
    }

    /// Sets event subscribers for observability.
    ///
    /// Subscribers receive runtime events through dedicated workers with
    /// bounded queues, starting with `start()`.
    pub fn with_subscribers(mut self, subscribers: Vec<Arc<dyn Subscribe>>) -> Self {
        self.subscribers = subscribers;
        self
    }

    /// Replaces the blocks the service starts with.
    pub fn with_initial_blocks(mut self, blocks: ClusterBlocks) -> Self {
        self.initial_blocks = blocks;
        self
    }

    /// Builds the service. Nothing runs until [`ClusterService::start`].
    pub fn build(self) -> ClusterService {
        ClusterService::from_parts(
            self.cfg,
            self.local_node,
            self.publisher,
            self.transport,
            self.subscribers,
            self.initial_blocks,
        )
    }
}
