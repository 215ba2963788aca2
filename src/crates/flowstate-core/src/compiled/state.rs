//! Thread inspection and manual state edits

use super::execution::input_to_update;
use super::{CompiledGraph, StateSnapshot};
use crate::error::{GraphError, Result};
use flowstate_checkpoint::{CheckpointMetadata, CheckpointSource, InterruptWhen, ThreadStatus};
use serde_json::Value;

impl CompiledGraph {
    /// Current head of a thread, `None` for an unknown thread.
    ///
    /// Only reads the checkpointer; calling it repeatedly returns the same
    /// snapshot until the thread moves on.
    pub async fn get_state(&self, thread_id: &str) -> Result<Option<StateSnapshot>> {
        Ok(self
            .checkpointer
            .latest(thread_id)
            .await?
            .map(StateSnapshot::from))
    }

    /// Snapshot of a past step
    pub async fn get_state_at(&self, thread_id: &str, step: u64) -> Result<StateSnapshot> {
        Ok(StateSnapshot::from(self.checkpointer.get(thread_id, step).await?))
    }

    /// Every checkpoint of a thread, oldest first
    pub async fn get_state_history(&self, thread_id: &str) -> Result<Vec<StateSnapshot>> {
        Ok(self
            .checkpointer
            .history(thread_id)
            .await?
            .into_iter()
            .map(StateSnapshot::from)
            .collect())
    }

    /// Threads known to the checkpointer
    pub async fn threads(&self) -> Result<Vec<String>> {
        Ok(self.checkpointer.threads().await?)
    }

    /// Merge `values` into the head of a thread and append the result.
    ///
    /// With `as_node`, the update is treated as that node's output: the
    /// node's declared writes apply, and the pending frontier is recomputed
    /// from the node's outgoing edges. The thread becomes interrupted after
    /// `as_node` (so `resume` continues it) or completed if nothing follows.
    /// Without `as_node`, status and pending nodes are left as they were.
    ///
    /// ```rust
    /// use flowstate_core::{StateGraph, END, START};
    /// use serde_json::json;
    ///
    /// # #[tokio::main]
    /// # async fn main() -> flowstate_core::Result<()> {
    /// let mut graph = StateGraph::new();
    /// graph.add_node("draft", |_| Box::pin(async { Ok(json!({"text": "v1"})) }));
    /// graph.add_edge(START, "draft").add_edge("draft", END);
    /// let compiled = graph.compile()?;
    ///
    /// compiled.invoke(json!({}), "doc").await?;
    /// let snapshot = compiled.update_state("doc", json!({"text": "v2"}), None).await?;
    /// assert_eq!(snapshot.values["text"], "v2");
    /// # Ok(())
    /// # }
    /// ```
    #[tracing::instrument(skip(self, values))]
    pub async fn update_state(&self, thread_id: &str, values: Value, as_node: Option<&str>) -> Result<StateSnapshot> {
        let _guard = self.acquire_thread(thread_id)?;
        let head = self
            .checkpointer
            .latest(thread_id)
            .await?
            .ok_or_else(|| GraphError::ThreadNotFound(thread_id.to_string()))?;

        let mut next = head.child();
        let mut metadata = CheckpointMetadata::new().with_source(CheckpointSource::Update);

        match as_node {
            Some(node) => {
                let spec = self
                    .nodes
                    .get(node)
                    .ok_or_else(|| GraphError::UnknownNode(node.to_string()))?;
                let update = spec.output_to_update(values)?;
                self.schema
                    .apply(&mut next.values, &update)
                    .map_err(|e| GraphError::invalid_update(node, e.to_string()))?;

                let pending = self.edges.next_frontier(&[node.to_string()], &next.values)?;
                if pending.is_empty() {
                    next.status = ThreadStatus::Completed;
                } else {
                    next.status = ThreadStatus::Interrupted;
                    metadata = metadata.with_interrupt(InterruptWhen::After, vec![node.to_string()]);
                }
                next.pending = pending;
                metadata = metadata.with_writes(vec![node.to_string()]);
            }
            None => {
                let update = input_to_update(values)?;
                self.schema
                    .apply(&mut next.values, &update)
                    .map_err(|e| GraphError::InvalidInput(e.to_string()))?;
                if let Some(record) = &head.metadata.interrupt {
                    if head.status == ThreadStatus::Interrupted {
                        metadata = metadata.with_interrupt(record.when, record.nodes.clone());
                    }
                }
            }
        }

        let checkpoint = next.with_metadata(metadata);
        self.checkpointer.append(checkpoint.clone()).await?;
        tracing::info!(
            thread_id = %thread_id,
            step = checkpoint.step,
            as_node = ?as_node,
            status = %checkpoint.status,
            "State updated"
        );
        Ok(StateSnapshot::from(checkpoint))
    }

    /// Make a past checkpoint the thread's head again.
    ///
    /// Appends a copy of step `step` (values, pending nodes and status) on
    /// top of the log; nothing is removed. An interrupted copy can be resumed
    /// and any other copy continued with `invoke`.
    #[tracing::instrument(skip(self))]
    pub async fn fork(&self, thread_id: &str, step: u64) -> Result<StateSnapshot> {
        let _guard = self.acquire_thread(thread_id)?;
        let target = self.checkpointer.get(thread_id, step).await?;
        let head = self
            .checkpointer
            .latest(thread_id)
            .await?
            .ok_or_else(|| GraphError::ThreadNotFound(thread_id.to_string()))?;

        let mut metadata = target.metadata.clone();
        metadata.source = Some(CheckpointSource::Fork);
        let metadata = metadata.with_extra("forked_from", Value::from(step));

        let checkpoint = head
            .child()
            .with_values(target.values)
            .with_pending(target.pending)
            .with_status(target.status)
            .with_metadata(metadata);
        self.checkpointer.append(checkpoint.clone()).await?;
        tracing::info!(thread_id = %thread_id, from_step = step, step = checkpoint.step, "Forked thread");
        Ok(StateSnapshot::from(checkpoint))
    }
}

#[cfg(test)]
mod tests {
    use crate::builder::StateGraph;
    use crate::error::GraphError;
    use crate::graph::{END, START};
    use crate::interrupt::InterruptConfig;
    use crate::node::{NodeContext, NodeFuture};
    use crate::state::State;
    use flowstate_checkpoint::{CheckpointError, CheckpointSource, InterruptWhen, ThreadStatus};
    use serde_json::{json, Value};

    fn append(name: &'static str) -> impl Fn(State) -> NodeFuture + Send + Sync {
        move |state: State| -> NodeFuture {
            Box::pin(async move {
                let mut trail = state.get("trail").and_then(|v| v.as_str()).unwrap_or("").to_string();
                trail.push_str(name);
                Ok(json!({ "trail": trail }))
            })
        }
    }

    fn pipeline() -> StateGraph {
        let mut graph = StateGraph::new();
        graph.add_node("a", append("a"));
        graph.add_node("b", append("b"));
        graph.add_edge(START, "a").add_edge("a", "b").add_edge("b", END);
        graph
    }

    #[tokio::test]
    async fn test_get_state_unknown_thread() {
        let compiled = pipeline().compile().unwrap();
        assert!(compiled.get_state("nope").await.unwrap().is_none());
        assert!(compiled.get_state_history("nope").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_get_state_at_missing_step() {
        let compiled = pipeline().compile().unwrap();
        compiled.invoke(Value::Null, "t").await.unwrap();

        let first = compiled.get_state_at("t", 0).await.unwrap();
        assert_eq!(first.next, vec!["a".to_string()]);
        let err = compiled.get_state_at("t", 99).await.unwrap_err();
        assert!(matches!(err, GraphError::Checkpoint(CheckpointError::NotFound { .. })));
    }

    #[tokio::test]
    async fn test_update_state_unknown_thread() {
        let compiled = pipeline().compile().unwrap();
        let err = compiled.update_state("nope", json!({}), None).await.unwrap_err();
        assert!(matches!(err, GraphError::ThreadNotFound(_)));
    }

    #[tokio::test]
    async fn test_update_state_keeps_status_without_node() {
        let compiled = pipeline()
            .compile_with_interrupts(InterruptConfig::new().with_interrupt_before(vec!["b".to_string()]))
            .unwrap();
        compiled.invoke(Value::Null, "t").await.unwrap();

        let snapshot = compiled.update_state("t", json!({"trail": "x"}), None).await.unwrap();
        assert_eq!(snapshot.status, ThreadStatus::Interrupted);
        assert_eq!(snapshot.next, vec!["b".to_string()]);
        assert_eq!(snapshot.metadata.source, Some(CheckpointSource::Update));
        assert_eq!(snapshot.interrupt().map(|r| r.when), Some(InterruptWhen::Before));

        let done = compiled.resume("t", Value::Null).await.unwrap();
        assert_eq!(done.values()["trail"], json!("xb"));
    }

    #[tokio::test]
    async fn test_update_state_as_node_recomputes_pending() {
        let compiled = pipeline()
            .compile_with_interrupts(InterruptConfig::new().with_interrupt_before(vec!["a".to_string()]))
            .unwrap();
        compiled.invoke(Value::Null, "t").await.unwrap();

        let snapshot = compiled
            .update_state("t", json!({"trail": "manual"}), Some("a"))
            .await
            .unwrap();
        assert_eq!(snapshot.status, ThreadStatus::Interrupted);
        assert_eq!(snapshot.next, vec!["b".to_string()]);
        assert_eq!(snapshot.metadata.writes, vec!["a".to_string()]);

        let done = compiled.resume("t", Value::Null).await.unwrap();
        assert!(done.is_completed());
        assert_eq!(done.values()["trail"], json!("manualb"));
    }

    #[tokio::test]
    async fn test_update_state_as_last_node_completes() {
        let compiled = pipeline().compile().unwrap();
        compiled.invoke(Value::Null, "t").await.unwrap();

        let snapshot = compiled.update_state("t", json!({"trail": "z"}), Some("b")).await.unwrap();
        assert_eq!(snapshot.status, ThreadStatus::Completed);
        assert!(snapshot.next.is_empty());
    }

    #[tokio::test]
    async fn test_update_state_as_unknown_node() {
        let compiled = pipeline().compile().unwrap();
        compiled.invoke(Value::Null, "t").await.unwrap();
        let err = compiled.update_state("t", json!({}), Some("ghost")).await.unwrap_err();
        assert!(matches!(err, GraphError::UnknownNode(_)));
    }

    #[tokio::test]
    async fn test_fork_replays_from_past_step() {
        let compiled = pipeline().compile().unwrap();
        compiled.invoke(Value::Null, "t").await.unwrap();
        // steps: 0 input, 1 after a, 2 after b
        let forked = compiled.fork("t", 1).await.unwrap();
        assert_eq!(forked.step, 3);
        assert_eq!(forked.parent_step, Some(2));
        assert_eq!(forked.next, vec!["b".to_string()]);
        assert_eq!(forked.metadata.source, Some(CheckpointSource::Fork));
        assert_eq!(forked.metadata.extra.get("forked_from"), Some(&json!(1)));

        let rerun = compiled.invoke(Value::Null, "t").await.unwrap();
        assert!(rerun.is_completed());
        assert_eq!(rerun.values()["trail"], json!("ab"));
        assert_eq!(compiled.get_state_history("t").await.unwrap().len(), 6);
    }

    #[tokio::test]
    async fn test_threads_lists_known_threads() {
        let mut graph = StateGraph::new();
        graph.add_node_with_context("id", |_state: State, ctx: NodeContext| -> NodeFuture {
            let thread = ctx.thread_id().to_string();
            Box::pin(async move { Ok(json!({ "thread": thread })) })
        });
        graph.add_edge(START, "id").add_edge("id", END);
        let compiled = graph.compile().unwrap();

        compiled.invoke(Value::Null, "one").await.unwrap();
        let two = compiled.invoke(Value::Null, "two").await.unwrap();
        assert_eq!(two.values()["thread"], json!("two"));

        let mut threads = compiled.threads().await.unwrap();
        threads.sort();
        assert_eq!(threads, vec!["one".to_string(), "two".to_string()]);
    }
}
