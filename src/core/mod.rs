//! Runtime core: the update pipeline and its lifecycle.
//!
//! The only public API from this module is [`ClusterService`] (with its
//! [`ClusterServiceBuilder`]), [`ServiceConfig`] and [`LifecycleState`].
//!
//! Internal modules:
//! - [`queue`]: priority queue feeding the single update worker;
//! - [`task`]: queued update task with its exactly-once claim and queue timer;
//! - [`batcher`]: groups pending tasks by executor identity;
//! - [`runner`]: executes one batch, publishes and applies the result;
//! - [`ack`]: ack countdowns and their registry;
//! - [`notify`]: registration timeouts of timeout listeners;
//! - [`reconnect`]: background node reachability loop;
//! - [`lifecycle`]: start/stop/close state machine;
//! - [`service`]: public facade and worker loop.

mod ack;
mod batcher;
mod builder;
mod config;
mod lifecycle;
mod notify;
mod queue;
mod reconnect;
mod runner;
mod service;
mod task;

pub use builder::ClusterServiceBuilder;
pub use config::ServiceConfig;
pub use lifecycle::LifecycleState;
pub use service::ClusterService;
