//! CompiledGraph struct and builder methods

use crate::config::RunConfig;
use crate::error::{GraphError, Result};
use crate::graph::EdgeTable;
use crate::interrupt::InterruptConfig;
use crate::node::NodeRegistry;
use crate::state::StateSchema;
use flowstate_checkpoint::{CheckpointSaver, InMemoryCheckpointSaver};
use std::collections::HashSet;
use std::sync::{Arc, Mutex};

/// An immutable, validated graph ready to run
///
/// Cheap to clone; clones share the node registry, the checkpointer and the
/// set of threads currently being driven, so two clones cannot run the same
/// thread at once either.
///
/// ```rust
/// use flowstate_core::{RunConfig, StateGraph, END, START};
/// use flowstate_checkpoint::InMemoryCheckpointSaver;
/// use serde_json::Value;
/// use std::sync::Arc;
///
/// let mut graph = StateGraph::new();
/// graph.add_node("work", |_| Box::pin(async { Ok(Value::Null) }));
/// graph.add_edge(START, "work").add_edge("work", END);
///
/// let compiled = graph
///     .compile()
///     .unwrap()
///     .with_checkpointer(Arc::new(InMemoryCheckpointSaver::new()))
///     .with_config(RunConfig::new().with_recursion_limit(50));
/// assert_eq!(compiled.config().recursion_limit, 50);
/// ```
#[derive(Clone)]
pub struct CompiledGraph {
    pub(crate) schema: Arc<StateSchema>,
    pub(crate) nodes: Arc<NodeRegistry>,
    pub(crate) edges: Arc<EdgeTable>,
    pub(crate) interrupt_config: Arc<InterruptConfig>,
    pub(crate) checkpointer: Arc<dyn CheckpointSaver>,
    pub(crate) config: RunConfig,
    active_threads: Arc<Mutex<HashSet<String>>>,
}

impl CompiledGraph {
    pub(crate) fn new(
        schema: StateSchema,
        nodes: NodeRegistry,
        edges: EdgeTable,
        interrupt_config: InterruptConfig,
    ) -> Self {
        Self {
            schema: Arc::new(schema),
            nodes: Arc::new(nodes),
            edges: Arc::new(edges),
            interrupt_config: Arc::new(interrupt_config),
            checkpointer: Arc::new(InMemoryCheckpointSaver::new()),
            config: RunConfig::default(),
            active_threads: Arc::new(Mutex::new(HashSet::new())),
        }
    }

    /// Replace the checkpointer (the default keeps threads in memory)
    pub fn with_checkpointer(mut self, saver: Arc<dyn CheckpointSaver>) -> Self {
        self.checkpointer = saver;
        self
    }

    pub fn with_config(mut self, config: RunConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_recursion_limit(mut self, limit: usize) -> Self {
        self.config.recursion_limit = limit;
        self
    }

    pub fn checkpointer(&self) -> &Arc<dyn CheckpointSaver> {
        &self.checkpointer
    }

    pub fn config(&self) -> &RunConfig {
        &self.config
    }

    pub fn interrupt_config(&self) -> &InterruptConfig {
        &self.interrupt_config
    }

    pub fn schema(&self) -> &StateSchema {
        &self.schema
    }

    pub fn nodes(&self) -> &NodeRegistry {
        &self.nodes
    }

    pub fn edges(&self) -> &EdgeTable {
        &self.edges
    }

    /// Claim `thread_id` for the duration of one call
    pub(crate) fn acquire_thread(&self, thread_id: &str) -> Result<ThreadGuard> {
        let mut active = self
            .active_threads
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if !active.insert(thread_id.to_string()) {
            tracing::warn!(thread_id = %thread_id, "Thread is busy");
            return Err(GraphError::ThreadBusy(thread_id.to_string()));
        }
        Ok(ThreadGuard {
            active_threads: Arc::clone(&self.active_threads),
            thread_id: thread_id.to_string(),
        })
    }
}

impl std::fmt::Debug for CompiledGraph {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompiledGraph")
            .field("nodes", &self.nodes.names())
            .field("edges", &self.edges)
            .field("interrupt_config", &self.interrupt_config)
            .field("config", &self.config)
            .finish()
    }
}

/// Releases a thread claim on drop
pub(crate) struct ThreadGuard {
    active_threads: Arc<Mutex<HashSet<String>>>,
    thread_id: String,
}

impl Drop for ThreadGuard {
    fn drop(&mut self) {
        let mut active = self
            .active_threads
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        active.remove(&self.thread_id);
    }
}
