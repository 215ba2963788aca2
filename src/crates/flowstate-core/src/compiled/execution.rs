//! Run entry points: `invoke` and `resume`

use super::{CompiledGraph, RunResult, StateSnapshot};
use crate::error::{GraphError, Result};
use crate::graph::{NodeId, START};
use crate::interrupt::{InterruptWhen, ResumeMode};
use crate::node::json_type;
use crate::pregel::ExecutionLoop;
use crate::state::{State, StateUpdate};
use flowstate_checkpoint::{Checkpoint, CheckpointMetadata, CheckpointSource, ThreadStatus};
use serde_json::Value;
use std::collections::HashMap;

/// Caller-supplied values must be an object (or null for "nothing")
pub(super) fn input_to_update(input: Value) -> Result<StateUpdate> {
    match input {
        Value::Object(map) => Ok(map),
        Value::Null => Ok(StateUpdate::new()),
        other => Err(GraphError::InvalidInput(format!(
            "expected a JSON object, got {}",
            json_type(&other)
        ))),
    }
}

impl CompiledGraph {
    /// Run a thread with new input.
    ///
    /// What happens depends on the thread's latest checkpoint:
    ///
    /// - **no checkpoint**: schema defaults merged with `input`, run from `START`
    /// - **running or failed** with pending nodes: `input` is applied as a
    ///   repair patch and the recorded frontier runs again
    /// - **completed or interrupted**: a new turn from `START` on top of the
    ///   latest values merged with `input`
    ///
    /// Failures inside a step are returned as [`RunResult::Failed`]; `Err` is
    /// reserved for bad input, a busy thread and checkpointer failures.
    ///
    /// ```rust
    /// use flowstate_core::{StateGraph, END, START};
    /// use serde_json::json;
    ///
    /// # #[tokio::main]
    /// # async fn main() -> flowstate_core::Result<()> {
    /// let mut graph = StateGraph::new();
    /// graph.add_node("greet", |state| {
    ///     Box::pin(async move {
    ///         let name = state.get("name").and_then(|v| v.as_str()).unwrap_or("world").to_string();
    ///         Ok(json!({ "greeting": format!("Hello, {}!", name) }))
    ///     })
    /// });
    /// graph.add_edge(START, "greet").add_edge("greet", END);
    ///
    /// let compiled = graph.compile()?;
    /// let result = compiled.invoke(json!({"name": "Ada"}), "thread-1").await?;
    /// assert_eq!(result.values()["greeting"], "Hello, Ada!");
    /// # Ok(())
    /// # }
    /// ```
    #[tracing::instrument(skip(self, input), fields(run_id = %uuid::Uuid::new_v4()))]
    pub async fn invoke(&self, input: Value, thread_id: &str) -> Result<RunResult> {
        let _guard = self.acquire_thread(thread_id)?;
        let patch = input_to_update(input)?;
        let latest = self.checkpointer.latest(thread_id).await?;

        let (base, values, continued) = match latest {
            None => {
                let values = self.merge_input(&self.schema.initial_state(), &patch)?;
                (None, values, None)
            }
            Some(head)
                if matches!(head.status, ThreadStatus::Running | ThreadStatus::Failed)
                    && !head.pending.is_empty() =>
            {
                tracing::info!(
                    thread_id = %thread_id,
                    step = head.step,
                    status = %head.status,
                    pending = ?head.pending,
                    "Continuing pending frontier"
                );
                let values = self.merge_input(&head.values, &patch)?;
                let pending = head.pending.clone();
                (Some(head), values, Some(pending))
            }
            Some(head) => {
                tracing::debug!(thread_id = %thread_id, step = head.step, status = %head.status, "Starting new turn");
                let values = self.merge_input(&head.values, &patch)?;
                (Some(head), values, None)
            }
        };

        let start = |base: Option<&Checkpoint>| match base {
            Some(head) => head.child(),
            None => Checkpoint::new(thread_id, State::new()),
        };

        let frontier = match continued {
            Some(pending) => pending,
            None => match self.edges.next_frontier(&[START.to_string()], &values) {
                Ok(frontier) => frontier,
                Err(error) => {
                    tracing::error!(thread_id = %thread_id, error = %error, "Entry routing failed");
                    let checkpoint = start(base.as_ref())
                        .with_values(values)
                        .with_pending(Vec::new())
                        .with_status(ThreadStatus::Failed)
                        .with_metadata(
                            CheckpointMetadata::new()
                                .with_source(CheckpointSource::Input)
                                .with_error(error.to_string()),
                        );
                    self.checkpointer.append(checkpoint.clone()).await?;
                    return Ok(RunResult::Failed {
                        error,
                        snapshot: StateSnapshot::from(checkpoint),
                    });
                }
            },
        };

        let status = if frontier.is_empty() {
            ThreadStatus::Completed
        } else {
            ThreadStatus::Running
        };
        let checkpoint = start(base.as_ref())
            .with_values(values)
            .with_pending(frontier)
            .with_status(status)
            .with_metadata(CheckpointMetadata::new().with_source(CheckpointSource::Input));
        self.checkpointer.append(checkpoint.clone()).await?;

        ExecutionLoop::new(self, checkpoint).run().await
    }

    /// Continue an interrupted thread.
    ///
    /// How `value` is used is decided by the [`ResumeMode`] of the node that
    /// triggered the interrupt:
    ///
    /// - [`ResumeMode::PassToNode`]: delivered to the nodes of the first step
    ///   through [`NodeContext::resume_value`](crate::NodeContext::resume_value)
    /// - [`ResumeMode::ApplyAsPatch`]: merged into the state (object or null)
    /// - [`ResumeMode::AsNodeOutput`]: used as the output of the paused nodes,
    ///   which are then not invoked
    ///
    /// A thread paused after its last node has nothing left to run; resuming
    /// it appends the completed checkpoint.
    ///
    /// Returns [`GraphError::InvalidResume`] when the thread does not exist or
    /// is not interrupted.
    #[tracing::instrument(skip(self, value), fields(run_id = %uuid::Uuid::new_v4()))]
    pub async fn resume(&self, thread_id: &str, value: Value) -> Result<RunResult> {
        let _guard = self.acquire_thread(thread_id)?;
        let head = match self.checkpointer.latest(thread_id).await? {
            Some(head) if head.status == ThreadStatus::Interrupted => head,
            other => {
                return Err(GraphError::InvalidResume {
                    thread_id: thread_id.to_string(),
                    status: other.map(|c| c.status),
                })
            }
        };

        let (when, paused) = match &head.metadata.interrupt {
            Some(record) => (record.when, record.nodes.clone()),
            None => (InterruptWhen::After, Vec::new()),
        };
        let mode = paused
            .first()
            .map(|node| self.interrupt_config.resume_mode(node))
            .unwrap_or_default();

        let mut values = head.values.clone();
        let mut resume_value = None;
        let mut node_outputs: HashMap<NodeId, Value> = HashMap::new();
        match mode {
            ResumeMode::ApplyAsPatch => {
                let patch = input_to_update(value.clone())?;
                values = self.merge_input(&values, &patch)?;
            }
            ResumeMode::AsNodeOutput if when == InterruptWhen::Before => {
                for node in &paused {
                    node_outputs.insert(node.clone(), value.clone());
                }
            }
            _ => resume_value = Some(value.clone()),
        }

        tracing::info!(
            thread_id = %thread_id,
            step = head.step,
            mode = ?mode,
            pending = ?head.pending,
            "Resuming thread"
        );

        let status = if head.pending.is_empty() {
            ThreadStatus::Completed
        } else {
            ThreadStatus::Running
        };
        let checkpoint = head
            .child()
            .with_values(values)
            .with_status(status)
            .with_metadata(
                CheckpointMetadata::new()
                    .with_source(CheckpointSource::Resume)
                    .with_resume(value),
            );
        self.checkpointer.append(checkpoint.clone()).await?;

        let skip_before = if when == InterruptWhen::Before {
            paused
        } else {
            Vec::new()
        };
        ExecutionLoop::new(self, checkpoint)
            .skip_interrupt_before(skip_before)
            .with_resume_value(resume_value)
            .with_node_outputs(node_outputs)
            .run()
            .await
    }

    fn merge_input(&self, values: &State, patch: &StateUpdate) -> Result<State> {
        self.schema
            .merge(values, patch)
            .map_err(|e| GraphError::InvalidInput(e.to_string()))
    }
}
