//! # Service lifecycle.
//!
//! ```text
//! Initialized ──start()──► Started ──stop()──► Stopped ──close()──► Closed
//!      └────────────────────close()───────────────────────────────────┘
//! ```
//!
//! Transitions are single compare-and-swap steps, so exactly one caller wins
//! each of them.

use std::sync::atomic::{AtomicU8, Ordering};

/// Lifecycle phase of the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    Initialized,
    Started,
    Stopped,
    Closed,
}

impl LifecycleState {
    fn from_u8(v: u8) -> Self {
        match v {
            0 => LifecycleState::Initialized,
            1 => LifecycleState::Started,
            2 => LifecycleState::Stopped,
            _ => LifecycleState::Closed,
        }
    }

    fn as_u8(self) -> u8 {
        match self {
            LifecycleState::Initialized => 0,
            LifecycleState::Started => 1,
            LifecycleState::Stopped => 2,
            LifecycleState::Closed => 3,
        }
    }
}

pub(crate) struct Lifecycle {
    state: AtomicU8,
}

impl Lifecycle {
    pub(crate) fn new() -> Self {
        Self {
            state: AtomicU8::new(LifecycleState::Initialized.as_u8()),
        }
    }

    pub(crate) fn state(&self) -> LifecycleState {
        LifecycleState::from_u8(self.state.load(Ordering::Acquire))
    }

    #[inline]
    pub(crate) fn is_started(&self) -> bool {
        self.state() == LifecycleState::Started
    }

    #[inline]
    pub(crate) fn stopped_or_closed(&self) -> bool {
        matches!(self.state(), LifecycleState::Stopped | LifecycleState::Closed)
    }

    fn transition(&self, from: LifecycleState, to: LifecycleState) -> bool {
        self.state
            .compare_exchange(from.as_u8(), to.as_u8(), Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    pub(crate) fn move_to_started(&self) -> bool {
        self.transition(LifecycleState::Initialized, LifecycleState::Started)
    }

    pub(crate) fn move_to_stopped(&self) -> bool {
        self.transition(LifecycleState::Started, LifecycleState::Stopped)
    }

    /// Closes from `Initialized` or `Stopped`; `false` if already closed or still started.
    pub(crate) fn move_to_closed(&self) -> bool {
        self.transition(LifecycleState::Stopped, LifecycleState::Closed)
            || self.transition(LifecycleState::Initialized, LifecycleState::Closed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_happy_path() {
        let lc = Lifecycle::new();
        assert_eq!(lc.state(), LifecycleState::Initialized);
        assert!(!lc.move_to_stopped());

        assert!(lc.move_to_started());
        assert!(lc.is_started());
        assert!(!lc.move_to_started());
        assert!(!lc.move_to_closed());

        assert!(lc.move_to_stopped());
        assert!(lc.stopped_or_closed());
        assert!(!lc.move_to_started());

        assert!(lc.move_to_closed());
        assert_eq!(lc.state(), LifecycleState::Closed);
        assert!(!lc.move_to_closed());
    }

    #[test]
    fn test_close_without_start() {
        let lc = Lifecycle::new();
        assert!(lc.move_to_closed());
        assert!(lc.stopped_or_closed());
        assert!(!lc.move_to_started());
    }
}
