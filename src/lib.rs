//! # clustervisor
//!
//! **Clustervisor** is a single-writer coordination pipeline for a cluster-wide,
//! versioned, immutable cluster state.
//!
//! Every mutation of the state passes through one priority-ordered queue and is
//! applied by one update worker. Tasks sharing an executor are batched into a
//! single transition. On the elected master each new state gets the next
//! version, is handed to a publisher and acknowledged by the other nodes; then
//! it becomes current and tiered listeners hear about it. A background loop
//! keeps the local node connected to every known node.
//!
//! ## Architecture
//! ### Overview
//! ```text
//!     ┌──────────────┐   ┌──────────────┐   ┌──────────────┐
//!     │  producer A  │   │  producer B  │   │  producer C  │
//!     │ (executor X) │   │ (executor X) │   │ (executor Y) │
//!     └──────┬───────┘   └──────┬───────┘   └──────┬───────┘
//!            ▼ submit_state_update_task(source, payload, config, executor, listener)
//! ┌───────────────────────────────────────────────────────────────────┐
//! │  ClusterService                                                   │
//! │  - Batcher (pending tasks per executor identity)                  │
//! │  - UpdateQueue (priority desc, insertion asc; queue timers)       │
//! │  - ArcSwap<ClusterState> (lock-free reads of the current state)   │
//! │  - ListenerRegistry (First / Normal / Last / PostApplied)         │
//! │  - AckTrackers, NotifyTimeouts                                    │
//! └──────┬──────────────────────────────────────────────┬─────────────┘
//!        ▼                                              ▼
//!  ┌──────────────────────────┐               ┌───────────────────────┐
//!  │      update worker       │               │   ReconnectToNodes    │
//!  │ pop ─► batch ─► execute  │               │ (every interval, via  │
//!  │ ─► version ─► publish    │               │  Transport)           │
//!  │ ─► swap ─► listeners     │               └───────────┬───────────┘
//!  └──────┬───────────────────┘                           │
//!         │ Publishes Events: TaskSubmitted, StateApplied, │ NodeReconnectFailed
//!         │ PublishFailed, SlowTask, AckTimeout, ...        │
//!         ▼                                                ▼
//! ┌───────────────────────────────────────────────────────────────────┐
//! │                        Bus (broadcast channel)                    │
//! │              (capacity: ServiceConfig::bus_capacity)              │
//! └─────────────────────────────────┬─────────────────────────────────┘
//!                                   ▼
//!                       ┌────────────────────────┐
//!                       │  subscriber listener   │
//!                       └───────────┬────────────┘
//!                                   ▼
//!                             SubscriberSet
//!                           (per-sub queues)
//!                       ┌───────────┼───────────┐
//!                       ▼           ▼           ▼
//!                   sub1.on     sub2.on     subN.on
//!                   _event()    _event()    _event()
//! ```
//!
//! ### Batch lifecycle
//! ```text
//! queue head ──► Batcher::drain_and_claim(executor)
//!   ├─ not master && master-only ─► on_no_longer_master
//!   ├─ executor Err / panic      ─► on_failure(Executor) for all
//!   ├─ same Arc returned         ─► on_all_nodes_acked(None), cluster_state_processed(S, S)
//!   └─ changed:
//!        master: version + 1, AckCountDown per acked task, Publisher::publish
//!          └─ Err ─► on_failure(Publish), previous state stays current
//!        ArcSwap::store ─► First ─► Normal ─► Last ─► Applied ─► PostApplied
//!        master self-ack ─► cluster_state_processed(previous, new)
//! ```
//!
//! ## Features
//! | Area              | Description                                                      | Key types / traits                                   |
//! |-------------------|------------------------------------------------------------------|------------------------------------------------------|
//! | **Service**       | Queue, worker, lifecycle and introspection.                      | [`ClusterService`], [`ClusterServiceBuilder`]        |
//! | **Tasks**         | Transition functions, batching and per-task outcomes.            | [`ClusterStateTaskExecutor`], [`TaskListener`]       |
//! | **State**         | Immutable, versioned snapshot compared by identity.              | [`ClusterState`], [`Nodes`], [`ClusterChangedEvent`] |
//! | **Listeners**     | Tiered state-change observers, timeouts, master transitions.     | [`ClusterStateListener`], [`ListenerTier`]           |
//! | **Collaborators** | Publishing/acks and node connections.                            | [`Publisher`], [`AckListener`], [`Transport`]        |
//! | **Subscriber API**| Hook into runtime events (logging, metrics, custom subscribers). | [`Subscribe`]                                        |
//! | **Errors**        | Typed errors for task outcomes and lifecycle calls.              | [`TaskFailure`], [`RuntimeError`]                    |
//! | **Configuration** | Centralize runtime settings.                                     | [`ServiceConfig`]                                    |
//!
//! ## Optional features
//! - `logging`: exports a simple built-in [`LogWriter`] _(demo/reference only)_.
//!
//! ## Example
//! ```rust
//! use std::sync::Arc;
//! use clustervisor::{
//!     BatchResult, ClusterService, ClusterState, ExecutorError, ExecutorFn, ListenerFn,
//!     Node, Nodes, TaskConfig,
//! };
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let service = ClusterService::builder(Node::new("n1", "node-1", "127.0.0.1:9300")).build();
//!     service.start()?;
//!
//!     // Elect the local node; this executor may run before a master exists.
//!     let elect = ExecutorFn::arc_any_node(|state: &Arc<ClusterState>, tasks: &[&()]| {
//!         let nodes: Nodes = state
//!             .nodes()
//!             .to_builder()
//!             .master_node_id(state.nodes().local_node_id().map(Into::into))
//!             .build();
//!         let next = ClusterState::builder_from(state).nodes(nodes).build();
//!         Ok::<_, ExecutorError>(BatchResult::builder().successes(0..tasks.len()).build(next))
//!     });
//!
//!     let (tx, rx) = tokio::sync::oneshot::channel();
//!     let tx = std::sync::Mutex::new(Some(tx));
//!     service.submit_state_update_task(
//!         "elect-local",
//!         (),
//!         TaskConfig::default(),
//!         elect,
//!         ListenerFn::new()
//!             .on_processed(move |_, _, new| {
//!                 if let Some(tx) = tx.lock().unwrap().take() {
//!                     let _ = tx.send(new.version());
//!                 }
//!             })
//!             .into_ref(),
//!     );
//!
//!     assert_eq!(rx.await?, 1);
//!     assert!(service.state().nodes().local_node_master());
//!     service.stop().await?;
//!     Ok(())
//! }
//! ```
mod core;
mod discovery;
mod error;
mod events;
mod listeners;
mod state;
mod subscribers;
mod tasks;
mod transport;

// ---- Public re-exports ----

pub use core::{ClusterService, ClusterServiceBuilder, LifecycleState, ServiceConfig};
pub use discovery::{AckListener, LocalPublisher, Publisher};
pub use error::{
    ExecutorError, NodeAckError, PublishError, RuntimeError, TaskFailure, TransportError,
};
pub use events::{Bus, Event, EventKind};
pub use listeners::{
    ClusterStateListener, ListenerRegistry, ListenerTier, LocalNodeMasterListener,
    TimeoutClusterStateListener,
};
pub use state::{
    ClusterBlock, ClusterBlocks, ClusterChangedEvent, ClusterState, ClusterStateBuilder,
    ClusterStateStatus, IndexMetaData, MetaData, Node, Nodes, NodesBuilder, NodesDelta,
    RoutingTable, ShardRouting,
};
pub use subscribers::{Subscribe, SubscriberSet};
pub use tasks::{
    AckedListenerFn, AckedTaskListener, BatchResult, BatchResultBuilder, ClusterStateTaskExecutor,
    ClusterStateUpdateTask, ExecutorFn, ListenerFn, PendingClusterTask, Priority, TaskConfig,
    TaskListener, TaskListenerRef, TaskResult,
};
pub use transport::{NoopTransport, Transport};

// Optional: expose a simple built-in logger subscriber (demo/reference).
// Enable with: `--features logging`
#[cfg(feature = "logging")]
pub use subscribers::LogWriter;
