//! # Event bus for broadcasting runtime events.
//!
//! [`Bus`] is a thin wrapper around [`tokio::sync::broadcast`] that provides
//! non-blocking event publishing from the update worker, timers and the
//! reconnect loop.
//!
//! ## Architecture
//! ```text
//! Publishers (many):                       Consumers:
//!   update worker ──┐
//!   task timers   ──┼──────► Bus ───────► subscriber listener ────► SubscriberSet
//!   ack trackers  ──┤  (broadcast chan)
//!   reconnect loop──┘                 └──► ClusterService::subscribe() receivers
//! ```
//!
//! ## Rules
//! - **Non-blocking publish**: `publish()` never blocks; it calls `broadcast::Sender::send`.
//! - **Bounded capacity**: a single ring buffer stores recent events for all receivers.
//! - **Lag handling**: slow receivers get `RecvError::Lagged(n)` and skip `n` oldest items.
//! - **No persistence**: events are lost if there are no active receivers at send time.
//!
//! The service owns one bus. A single internal receiver feeds the
//! [`SubscriberSet`](crate::SubscriberSet); every `ClusterService::subscribe()`
//! call adds an independent receiver next to it.
//!
//! ## Capacity behavior
//! Capacity comes from `ServiceConfig::bus_capacity`. Once it is reached:
//! - only the newest `capacity` events stay buffered;
//! - a receiver that fell behind sees `RecvError::Lagged(n)` on its next `recv()`
//!   and resumes at the oldest event still buffered.

use tokio::sync::broadcast;

use super::event::Event;

/// Broadcast channel for runtime events.
///
/// Every component that reports something (worker, task timers, ack
/// trackers, reconnect loop, listener isolation) holds a clone and publishes
/// into it concurrently; each receiver gets its own clone of every event.
///
/// ### Properties
/// - **Non-blocking**: `publish()` returns immediately, even from sync callbacks.
/// - **Fire-and-forget**: no delivery or durability guarantees.
/// - **Cloneable**: cheap to clone (internally holds an `Arc`-backed sender).
#[derive(Clone, Debug)]
pub struct Bus {
    tx: broadcast::Sender<Event>,
}

impl Bus {
    /// Creates a new bus with the given channel capacity.
    ///
    /// ### Notes
    /// - Capacity is **shared** by all receivers, not per receiver.
    /// - Zero is clamped to 1.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        let (tx, _rx) = broadcast::channel::<Event>(capacity);
        Self { tx }
    }

    /// Publishes an event to all active receivers.
    ///
    /// - Takes ownership; the channel clones it once per receiver.
    /// - With no receivers the event is dropped and the call still returns at once.
    pub fn publish(&self, ev: Event) {
        let _ = self.tx.send(ev);
    }

    /// Creates a new receiver that will observe subsequent events.
    ///
    /// - Each call creates an **independent** receiver.
    /// - Events published before the call are never seen by it.
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.tx.subscribe()
    }
}
