//! # Service configuration.
//!
//! Provides [`ServiceConfig`], the settings of one [`ClusterService`](crate::ClusterService).
//!
//! ## Sentinel values
//! - `reconnect_failure_log_every = 0` → treated as `1` (log every failure)
//! - `bus_capacity = 0` → treated as `1` (clamped by `Bus`)

use std::time::Duration;

/// Configuration of the cluster state service.
///
/// ## Field semantics
/// - `cluster_name`: name stamped on the initial state
/// - `slow_task_logging_threshold`: batches running longer are logged at warn
/// - `reconnect_interval`: period of the node reachability check
/// - `reconnect_failure_log_every`: log every Nth consecutive reconnect failure
/// - `bus_capacity`: event bus ring buffer size
/// - `stop_grace`: maximum wait for the in-flight batch on `stop()`
///
/// ## Notes
/// All fields are public for flexibility. Prefer using helper accessors to avoid
/// sprinkling sentinel checks (`0`) across the codebase.
#[derive(Clone, Debug)]
pub struct ServiceConfig {
    /// Cluster name of the initial (empty) state.
    pub cluster_name: String,

    /// Batches whose execution took longer than this are logged at warn and
    /// published as `SlowTask`. They are never aborted.
    ///
    /// Can be changed at runtime with `ClusterService::set_slow_task_logging_threshold`.
    pub slow_task_logging_threshold: Duration,

    /// How often known nodes are checked and reconnected.
    pub reconnect_interval: Duration,

    /// A warning is logged on every Nth consecutive failure to reconnect a node,
    /// after which the node's counter resets.
    pub reconnect_failure_log_every: u32,

    /// Capacity of the event bus broadcast channel ring buffer.
    pub bus_capacity: usize,

    /// Maximum wait for the in-flight batch when stopping.
    ///
    /// If exceeded, `stop()` returns `RuntimeError::GraceExceeded`.
    pub stop_grace: Duration,
}

impl ServiceConfig {
    /// Returns the reconnect failure log cadence clamped to a minimum of 1.
    #[inline]
    pub fn reconnect_failure_log_every_clamped(&self) -> u32 {
        self.reconnect_failure_log_every.max(1)
    }

    /// Returns a bus capacity clamped to a minimum of 1.
    #[inline]
    pub fn bus_capacity_clamped(&self) -> usize {
        self.bus_capacity.max(1)
    }
}

impl Default for ServiceConfig {
    /// Default configuration:
    ///
    /// - `cluster_name = "clustervisor"`
    /// - `slow_task_logging_threshold = 30s`
    /// - `reconnect_interval = 10s`
    /// - `reconnect_failure_log_every = 6` (one warning per minute at the default interval)
    /// - `bus_capacity = 1024`
    /// - `stop_grace = 10s`
    fn default() -> Self {
        Self {
            cluster_name: "clustervisor".to_string(),
            slow_task_logging_threshold: Duration::from_secs(30),
            reconnect_interval: Duration::from_secs(10),
            reconnect_failure_log_every: 6,
            bus_capacity: 1024,
            stop_grace: Duration::from_secs(10),
        }
    }
}
