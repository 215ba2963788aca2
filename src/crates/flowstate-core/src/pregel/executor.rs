//! Task executor for frontier nodes.
//!
//! Runs every task of a step concurrently on the current task and hands the
//! results back in task order, so merging stays deterministic regardless of
//! which node finishes first.

use crate::error::{GraphError, Result};
use crate::graph::NodeId;
use crate::node::{NodeContext, NodeRegistry, NodeSpec};
use crate::state::{State, StateUpdate};
use futures::future::join_all;
use serde_json::Value;

/// One node invocation within a step
pub(crate) struct Task {
    pub node: NodeId,
    pub ctx: NodeContext,
    /// Output supplied by the caller instead of running the node
    pub preset: Option<Value>,
}

pub(crate) struct TaskExecutor<'g> {
    nodes: &'g NodeRegistry,
}

impl<'g> TaskExecutor<'g> {
    pub fn new(nodes: &'g NodeRegistry) -> Self {
        Self { nodes }
    }

    /// Execute all tasks against the same input state
    pub async fn execute_all(&self, tasks: Vec<Task>, state: &State) -> Vec<(NodeId, Result<StateUpdate>)> {
        join_all(tasks.into_iter().map(|task| self.execute(task, state.clone()))).await
    }

    pub async fn execute(&self, task: Task, state: State) -> (NodeId, Result<StateUpdate>) {
        let result = match self.nodes.get(&task.node) {
            None => Err(GraphError::UnknownNode(task.node.clone())),
            Some(spec) => match task.preset {
                Some(output) => {
                    tracing::debug!(node = %task.node, "Using supplied node output");
                    spec.output_to_update(output)
                }
                None => self.execute_with_retry(spec, state, task.ctx).await,
            },
        };
        (task.node, result)
    }

    async fn execute_with_retry(&self, spec: &NodeSpec, state: State, ctx: NodeContext) -> Result<StateUpdate> {
        let policy = &spec.retry;
        let mut attempts = 0;

        loop {
            attempts += 1;
            tracing::debug!(
                node = %spec.name,
                step = ctx.step(),
                attempt = attempts,
                max_attempts = policy.max_attempts,
                "Executing node"
            );

            match spec.node.run(state.clone(), ctx.clone()).await {
                Ok(output) => {
                    if attempts > 1 {
                        tracing::info!(node = %spec.name, attempts = attempts, "Node succeeded after retry");
                    }
                    return spec.output_to_update(output);
                }
                Err(error) if policy.should_retry(attempts) => {
                    let delay = policy.calculate_delay(attempts - 1);
                    tracing::warn!(
                        node = %spec.name,
                        attempt = attempts,
                        max_attempts = policy.max_attempts,
                        delay_ms = delay.as_millis() as u64,
                        error = %error,
                        "Node failed, retrying after delay"
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(error) => {
                    tracing::error!(node = %spec.name, attempts = attempts, error = %error, "Node failed");
                    return Err(GraphError::node_execution(&spec.name, error));
                }
            }
        }
    }
}
