//! Main execution loop.
//!
//! One iteration is one step:
//!
//! ```text
//! frontier ──► pause-before? ──► run nodes ──► merge (frontier order)
//!                  │                               │
//!                  ▼                               ▼
//!             interrupted              route on merged state ──► checkpoint
//!                                                                  │
//!                               interrupted ◄── pause-after? ◄─────┤
//!                               completed ◄── empty frontier ◄─────┘
//! ```
//!
//! Every step ends with exactly one appended checkpoint. A failing step
//! commits nothing from its nodes: the failure checkpoint carries the
//! pre-step values and the failed frontier as its pending list.

use super::executor::{Task, TaskExecutor};
use crate::compiled::{CompiledGraph, RunResult, StateSnapshot};
use crate::error::{GraphError, Result};
use crate::graph::NodeId;
use crate::node::NodeContext;
use crate::state::State;
use flowstate_checkpoint::{Checkpoint, CheckpointMetadata, CheckpointSource, InterruptWhen, ThreadStatus};
use serde_json::Value;
use std::collections::{HashMap, HashSet};

pub(crate) struct ExecutionLoop<'g> {
    graph: &'g CompiledGraph,
    /// Last checkpoint written for this thread
    head: Checkpoint,
    state: State,
    frontier: Vec<NodeId>,
    /// Nodes whose pause-before point was already taken
    skip_before: HashSet<NodeId>,
    resume_value: Option<Value>,
    node_outputs: HashMap<NodeId, Value>,
}

impl<'g> ExecutionLoop<'g> {
    /// Continue from `head`, running its pending nodes next
    pub fn new(graph: &'g CompiledGraph, head: Checkpoint) -> Self {
        Self {
            graph,
            state: head.values.clone(),
            frontier: head.pending.clone(),
            head,
            skip_before: HashSet::new(),
            resume_value: None,
            node_outputs: HashMap::new(),
        }
    }

    pub fn skip_interrupt_before(mut self, nodes: impl IntoIterator<Item = NodeId>) -> Self {
        self.skip_before.extend(nodes);
        self
    }

    pub fn with_resume_value(mut self, value: Option<Value>) -> Self {
        self.resume_value = value;
        self
    }

    pub fn with_node_outputs(mut self, outputs: HashMap<NodeId, Value>) -> Self {
        self.node_outputs = outputs;
        self
    }

    pub async fn run(mut self) -> Result<RunResult> {
        let limit = self.graph.config.recursion_limit;
        let mut steps = 0usize;

        loop {
            if self.frontier.is_empty() {
                return Ok(self.completed());
            }

            let paused: Vec<NodeId> = self
                .frontier
                .iter()
                .filter(|n| !self.skip_before.contains(*n) && self.graph.interrupt_config.should_interrupt_before(n))
                .cloned()
                .collect();
            if !paused.is_empty() {
                let metadata = CheckpointMetadata::new()
                    .with_source(CheckpointSource::Loop)
                    .with_interrupt(InterruptWhen::Before, paused.clone());
                let checkpoint = self
                    .head
                    .child()
                    .with_values(self.state.clone())
                    .with_pending(self.frontier.clone())
                    .with_status(ThreadStatus::Interrupted)
                    .with_metadata(metadata);
                self.commit(checkpoint).await?;
                tracing::info!(thread_id = %self.head.thread_id, step = self.head.step, nodes = ?paused, "Interrupted before nodes");
                return Ok(self.interrupted());
            }
            self.skip_before.clear();

            if steps >= limit {
                tracing::warn!(thread_id = %self.head.thread_id, limit = limit, "Recursion limit reached");
                return self.fail(GraphError::RecursionLimit { limit }).await;
            }

            let step = self.head.step + 1;
            tracing::debug!(thread_id = %self.head.thread_id, step = step, frontier = ?self.frontier, "Starting step");

            let ctx = NodeContext::new(self.head.thread_id.clone(), step).with_resume(self.resume_value.take());
            let tasks: Vec<Task> = self
                .frontier
                .iter()
                .map(|node| Task {
                    node: node.clone(),
                    ctx: ctx.clone(),
                    preset: self.node_outputs.remove(node),
                })
                .collect();
            let results = TaskExecutor::new(&self.graph.nodes).execute_all(tasks, &self.state).await;

            let mut next_state = self.state.clone();
            for (node, result) in results {
                let update = match result {
                    Ok(update) => update,
                    Err(error) => return self.fail(error).await,
                };
                if let Err(error) = self.graph.schema.apply(&mut next_state, &update) {
                    return self.fail(GraphError::invalid_update(node, error.to_string())).await;
                }
            }

            let next = match self.graph.edges.next_frontier(&self.frontier, &next_state) {
                Ok(next) => next,
                Err(error) => return self.fail(error).await,
            };

            // A pause-after point holds even when nothing follows; resuming
            // such a checkpoint only records completion.
            let paused_after: Vec<NodeId> = self
                .frontier
                .iter()
                .filter(|n| self.graph.interrupt_config.should_interrupt_after(n))
                .cloned()
                .collect();

            let mut metadata = CheckpointMetadata::new()
                .with_source(CheckpointSource::Loop)
                .with_writes(self.frontier.clone());
            let status = if !paused_after.is_empty() {
                metadata = metadata.with_interrupt(InterruptWhen::After, paused_after.clone());
                ThreadStatus::Interrupted
            } else if next.is_empty() {
                ThreadStatus::Completed
            } else {
                ThreadStatus::Running
            };

            let checkpoint = self
                .head
                .child()
                .with_values(next_state.clone())
                .with_pending(next.clone())
                .with_status(status)
                .with_metadata(metadata);
            self.commit(checkpoint).await?;
            self.state = next_state;
            self.frontier = next;
            steps += 1;

            match status {
                ThreadStatus::Completed => {
                    tracing::info!(thread_id = %self.head.thread_id, step = self.head.step, steps = steps, "Run completed");
                    return Ok(self.completed());
                }
                ThreadStatus::Interrupted => {
                    tracing::info!(thread_id = %self.head.thread_id, step = self.head.step, nodes = ?paused_after, "Interrupted after nodes");
                    return Ok(self.interrupted());
                }
                _ => {}
            }
        }
    }

    async fn commit(&mut self, checkpoint: Checkpoint) -> Result<()> {
        self.graph.checkpointer.append(checkpoint.clone()).await?;
        self.head = checkpoint;
        Ok(())
    }

    /// Record the failed step and report it
    async fn fail(mut self, error: GraphError) -> Result<RunResult> {
        tracing::error!(thread_id = %self.head.thread_id, frontier = ?self.frontier, error = %error, "Step failed");
        let checkpoint = self
            .head
            .child()
            .with_values(self.state.clone())
            .with_pending(self.frontier.clone())
            .with_status(ThreadStatus::Failed)
            .with_metadata(
                CheckpointMetadata::new()
                    .with_source(CheckpointSource::Loop)
                    .with_error(error.to_string()),
            );
        self.commit(checkpoint).await?;
        Ok(RunResult::Failed {
            error,
            snapshot: StateSnapshot::from(self.head),
        })
    }

    fn completed(self) -> RunResult {
        RunResult::Completed {
            state: self.state,
            snapshot: StateSnapshot::from(self.head),
        }
    }

    fn interrupted(self) -> RunResult {
        RunResult::Interrupted {
            pending: self.frontier,
            snapshot: StateSnapshot::from(self.head),
        }
    }
}
