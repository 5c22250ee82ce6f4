//! # Cluster state listeners.
//!
//! Listeners observe every applied state change **synchronously** on the
//! update worker, in tier order:
//!
//! ```text
//! state pointer swapped
//!   ├──► First        (pre-applied, e.g. infrastructure that others depend on)
//!   ├──► Normal       (pre-applied, default; includes the local master tracker)
//!   ├──► Last         (pre-applied)
//!   │    ...removed nodes disconnected, status = Applied...
//!   └──► PostApplied  (timeout listeners live here)
//! ```
//!
//! A listener is registered in at most one tier. Panics are caught per listener
//! and reported as [`EventKind::ListenerPanicked`](crate::EventKind::ListenerPanicked).

mod listener;
mod master;
mod registry;
mod timeout;

pub use listener::{ClusterStateListener, ListenerTier};
pub use master::LocalNodeMasterListener;
pub use registry::ListenerRegistry;
pub use timeout::TimeoutClusterStateListener;

pub(crate) use master::LocalNodeMasterListeners;
pub(crate) use registry::{isolated, listener_key};
