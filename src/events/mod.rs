//! Runtime events: types and broadcast bus.
//!
//! This module groups the event **data model** and the **bus** used to
//! publish/subscribe to events emitted by the cluster state pipeline.
//!
//! ## Contents
//! - [`EventKind`], [`Event`] event classification and payload metadata
//! - [`Bus`] thin wrapper over `tokio::sync::broadcast`
//!
//! ## Quick reference
//! - **Publishers**: update worker (runner), task timers, ack trackers, reconnect loop,
//!   `SubscriberSet` workers (overflow/panic).
//! - **Consumers**: the service's subscriber listener (fans out to `SubscriberSet`) and
//!   any receiver obtained from `ClusterService::subscribe()`.

mod bus;
mod event;

pub use bus::Bus;
pub use event::{Event, EventKind};
