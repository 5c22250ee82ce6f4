//! # Per-task scheduling configuration.

use std::time::Duration;

use crate::tasks::Priority;

/// Priority and optional queue timeout of a submitted task.
///
/// The timeout bounds the time a task may wait in the queue. It never
/// interrupts a batch that already started.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TaskConfig {
    priority: Priority,
    timeout: Option<Duration>,
}

impl TaskConfig {
    pub fn new(priority: Priority, timeout: Option<Duration>) -> Self {
        Self { priority, timeout }
    }

    pub fn with_priority(priority: Priority) -> Self {
        Self::new(priority, None)
    }

    pub fn priority(&self) -> Priority {
        self.priority
    }

    /// Returns the timeout; `Some(0s)` is treated as no timeout.
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout.filter(|d| *d > Duration::ZERO)
    }

    pub fn timeout_after(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_timeout_is_none() {
        let cfg = TaskConfig::new(Priority::High, Some(Duration::ZERO));
        assert_eq!(cfg.timeout(), None);
        assert_eq!(cfg.priority(), Priority::High);

        let cfg = TaskConfig::default().timeout_after(Duration::from_millis(5));
        assert_eq!(cfg.timeout(), Some(Duration::from_millis(5)));
        assert_eq!(cfg.priority(), Priority::Normal);
    }
}
