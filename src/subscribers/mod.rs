//! # Event subscribers for the cluster state service.
//!
//! This module provides the [`Subscribe`] trait and the [`SubscriberSet`] fan-out
//! that feeds runtime events from the [`Bus`](crate::events::Bus) to user handlers.
//!
//! ## Architecture
//! ```text
//! Event flow:
//!   update worker ── publish(Event) ──► Bus ──► subscriber listener
//!                                                     │
//!                                                     ▼
//!                                               SubscriberSet::emit
//!                                                     │
//!                                        ┌────────────┼────────────┐
//!                                        ▼            ▼            ▼
//!                                    LogWriter     Metrics      Custom
//! ```
//!
//! ## Implementing custom subscribers
//! ```no_run
//! use clustervisor::{Subscribe, Event, EventKind};
//! use async_trait::async_trait;
//!
//! struct PublishAlerts;
//!
//! #[async_trait]
//! impl Subscribe for PublishAlerts {
//!     async fn on_event(&self, event: &Event) {
//!         if event.kind == EventKind::PublishFailed {
//!             // page someone
//!         }
//!     }
//! }
//! ```

#[cfg(feature = "logging")]
mod embedded;
mod subscribe;
mod subscriber_set;

#[cfg(feature = "logging")]
pub use embedded::LogWriter;
pub use subscribe::Subscribe;
pub use subscriber_set::SubscriberSet;
pub(crate) use subscriber_set::panic_message;
