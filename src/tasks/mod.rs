//! # Task model: what producers submit and how they hear back.
//!
//! - [`Priority`] / [`TaskConfig`] scheduling of a submission
//! - [`ClusterStateTaskExecutor`] / [`ExecutorFn`] transition function, [`BatchResult`], [`TaskResult`]
//! - [`TaskListener`] / [`AckedTaskListener`] / [`TaskListenerRef`] completion callbacks
//! - [`ListenerFn`] / [`AckedListenerFn`] closure-backed listeners
//! - [`ClusterStateUpdateTask`] self-executing single task
//! - [`PendingClusterTask`] queue introspection record

mod config;
mod executor;
mod listener;
mod listener_fn;
mod pending;
mod priority;
mod update;

pub use config::TaskConfig;
pub use executor::{BatchResult, BatchResultBuilder, ClusterStateTaskExecutor, ExecutorFn, TaskResult};
pub use listener::{AckedTaskListener, TaskListener, TaskListenerRef};
pub use listener_fn::{AckedListenerFn, ListenerFn};
pub use pending::PendingClusterTask;
pub use priority::Priority;
pub use update::ClusterStateUpdateTask;

pub(crate) use update::UpdateTaskExecutor;
