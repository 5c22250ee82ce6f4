//! # LogWriter: event printer
//!
//! A minimal subscriber that renders incoming [`Event`]s as `tracing` records
//! under the `clustervisor::events` target. Use it for tests or demos.
//!
//! ## Example output
//! ```text
//! INFO  [submitted] source="create-index [logs]" priority=NORMAL
//! INFO  [applied] source="create-index [logs]" version=3 took_ms=2
//! WARN  [publish-failed] source="create-index [logs]" version=4 reason="failed to commit ..."
//! WARN  [slow-task] source="create-index [logs]" took_ms=31250
//! DEBUG [unchanged] source="noop" version=3
//! ```

use async_trait::async_trait;
use tracing::{debug, info, warn};

use crate::events::{Event, EventKind};
use crate::subscribers::Subscribe;

/// Event writer subscriber.
#[derive(Default)]
pub struct LogWriter;

impl LogWriter {
    /// Construct a new [`LogWriter`].
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

fn or_dash(v: Option<&str>) -> &str {
    v.unwrap_or("-")
}

#[async_trait]
impl Subscribe for LogWriter {
    async fn on_event(&self, e: &Event) {
        let source = or_dash(e.source.as_deref());
        let reason = or_dash(e.reason.as_deref());
        let node = or_dash(e.node.as_deref());

        match e.kind {
            EventKind::ServiceStarted => info!(target: "clustervisor::events", "[service-started]"),
            EventKind::ServiceStopped => info!(target: "clustervisor::events", "[service-stopped]"),
            EventKind::TaskSubmitted => {
                info!(target: "clustervisor::events", "[submitted] source={source:?} priority={reason}");
            }
            EventKind::TaskRejected => {
                warn!(target: "clustervisor::events", "[rejected] source={source:?}");
            }
            EventKind::TaskTimedOut => {
                warn!(
                    target: "clustervisor::events",
                    "[timed-out] source={source:?} timeout_ms={:?}", e.took_ms
                );
            }
            EventKind::NoLongerMaster => {
                debug!(target: "clustervisor::events", "[no-longer-master] source={source:?}");
            }
            EventKind::ExecutorFailed => {
                warn!(
                    target: "clustervisor::events",
                    "[executor-failed] source={source:?} version={:?} reason={reason:?}", e.version
                );
            }
            EventKind::StateUnchanged => {
                debug!(
                    target: "clustervisor::events",
                    "[unchanged] source={source:?} version={:?}", e.version
                );
            }
            EventKind::PublishFailed => {
                warn!(
                    target: "clustervisor::events",
                    "[publish-failed] source={source:?} version={:?} reason={reason:?}", e.version
                );
            }
            EventKind::StateApplied => {
                info!(
                    target: "clustervisor::events",
                    "[applied] source={source:?} version={:?} took_ms={:?}", e.version, e.took_ms
                );
            }
            EventKind::SlowTask => {
                warn!(
                    target: "clustervisor::events",
                    "[slow-task] source={source:?} took_ms={:?}", e.took_ms
                );
            }
            EventKind::AllNodesAcked => {
                debug!(
                    target: "clustervisor::events",
                    "[all-acked] version={:?} last_failure={reason:?}", e.version
                );
            }
            EventKind::AckTimeout => {
                warn!(target: "clustervisor::events", "[ack-timeout] version={:?}", e.version);
            }
            EventKind::NodeReconnectFailed => {
                warn!(
                    target: "clustervisor::events",
                    "[reconnect-failed] node={node} reason={reason:?}"
                );
            }
            EventKind::ListenerPanicked => {
                warn!(
                    target: "clustervisor::events",
                    "[listener-panicked] source={source:?} info={reason}"
                );
            }
            EventKind::SubscriberOverflow => {
                warn!(
                    target: "clustervisor::events",
                    "[subscriber-overflow] subscriber={source} reason={reason:?}"
                );
            }
            EventKind::SubscriberPanicked => {
                warn!(
                    target: "clustervisor::events",
                    "[subscriber-panicked] subscriber={source} info={reason}"
                );
            }
        }
    }

    fn name(&self) -> &'static str {
        "LogWriter"
    }
}
