//! # Example: Single Node
//!
//! Starts a one-node cluster, elects the local node as master, creates an
//! index through a batched executor and prints every applied version.
//!
//! ```text
//! cargo run --example single_node --features logging
//! ```

use std::{sync::Arc, time::Duration};

use tokio::sync::mpsc;

use clustervisor::{
    BatchResult, ClusterBlock, ClusterChangedEvent, ClusterService, ClusterState,
    ClusterStateListener, ClusterStateTaskExecutor, ExecutorError, ExecutorFn, IndexMetaData,
    ListenerFn, ListenerTier, LogWriter, Node, Priority, ServiceConfig, TaskConfig,
};

/// Prints each applied cluster state.
struct Printer;

impl ClusterStateListener for Printer {
    fn cluster_changed(&self, event: &ClusterChangedEvent) {
        let state = event.state();
        println!(
            "[printer] version {} from [{}] (master: {:?}, indices: {})",
            state.version(),
            event.source(),
            state.nodes().master_node_id(),
            state.metadata().indices().count(),
        );
    }
}

/// Makes the local node master and lifts the no-master block.
fn elect_local() -> Arc<dyn ClusterStateTaskExecutor<()>> {
    ExecutorFn::arc_any_node(|state: &Arc<ClusterState>, tasks: &[&()]| {
        let nodes = state
            .nodes()
            .to_builder()
            .master_node_id(state.nodes().local_node_id().map(Arc::<str>::from))
            .build();
        let next = ClusterState::builder_from(state)
            .nodes(nodes)
            .blocks(state.blocks().without_global_block(&ClusterBlock::no_master()))
            .build();
        Ok::<_, ExecutorError>(BatchResult::builder().successes(0..tasks.len()).build(next))
    })
}

/// Creates one index per task; an existing name fails only that task.
fn create_indices() -> Arc<dyn ClusterStateTaskExecutor<String>> {
    ExecutorFn::arc(|state: &Arc<ClusterState>, names: &[&String]| {
        let mut metadata = state.metadata().as_ref().clone();
        let mut result = BatchResult::builder();
        for (i, name) in names.iter().enumerate() {
            if metadata.has_index(name) {
                result = result.failure(i, ExecutorError::IllegalState(format!("index [{name}] already exists")));
                continue;
            }
            metadata = metadata.with_index(IndexMetaData {
                name: (*name).clone(),
                number_of_shards: 1,
                number_of_replicas: 0,
            });
            result = result.success(i);
        }
        let next = ClusterState::builder_from(state).metadata(metadata).build();
        Ok::<_, ExecutorError>(result.build(next))
    })
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,clustervisor=debug".into()),
        )
        .init();

    let cfg = ServiceConfig {
        cluster_name: "demo".into(),
        stop_grace: Duration::from_secs(2),
        ..ServiceConfig::default()
    };
    let service = ClusterService::builder(Node::new("n1", "node-1", "127.0.0.1:9300"))
        .with_config(cfg)
        .with_subscribers(vec![Arc::new(LogWriter)])
        .build();
    service.add_listener(ListenerTier::Normal, Arc::new(Printer));
    service.start()?;

    let (tx, mut done) = mpsc::unbounded_channel::<String>();
    let listener = |tx: mpsc::UnboundedSender<String>| {
        let failed = tx.clone();
        ListenerFn::new()
            .on_processed(move |source, _, new| {
                let _ = tx.send(format!("[{source}] applied as version {}", new.version()));
            })
            .on_failure(move |source, err| {
                let _ = failed.send(format!("[{source}] failed: {err}"));
            })
            .into_ref()
    };

    service.submit_state_update_task(
        "elect-local",
        (),
        TaskConfig::with_priority(Priority::Immediate),
        elect_local(),
        listener(tx.clone()),
    );

    // Submitted back to back: one executor call, one new version.
    let create = create_indices();
    for name in ["logs", "metrics", "logs"] {
        service.submit_state_update_task(
            format!("create-index [{name}]"),
            name.to_string(),
            TaskConfig::default().timeout_after(Duration::from_secs(5)),
            create.clone(),
            listener(tx.clone()),
        );
    }
    drop(tx);

    for _ in 0..4 {
        match done.recv().await {
            Some(line) => println!("{line}"),
            None => break,
        }
    }

    let state = service.state();
    println!(
        "final: version {}, indices {:?}",
        state.version(),
        state.metadata().indices().map(|i| i.name.as_str()).collect::<Vec<_>>()
    );

    service.close().await?;
    Ok(())
}
