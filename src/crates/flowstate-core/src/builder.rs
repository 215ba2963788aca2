//! Graph builder
//!
//! [`StateGraph`] collects channels, nodes and edges, then
//! [`compile`](StateGraph::compile)s them into an immutable
//! [`CompiledGraph`]. Compilation rejects, all at once:
//!
//! - reserved (`__start__`, `__end__`), empty or duplicate node names
//! - edges whose source or target is not a node
//! - edges out of END or into START
//! - a START without outgoing edges
//! - nodes without outgoing edges
//! - nodes unreachable from START
//! - interrupt points naming unknown nodes
//!
//! ```rust
//! use flowstate_core::{StateGraph, END, START};
//! use serde_json::json;
//!
//! # async fn example() -> Result<(), flowstate_core::GraphError> {
//! let mut graph = StateGraph::with_messages();
//! graph.add_node("greet", |_state| {
//!     Box::pin(async move { Ok(json!({"messages": [{"role": "ai", "content": "hello"}]})) })
//! });
//! graph.add_edge(START, "greet");
//! graph.add_edge("greet", END);
//!
//! let compiled = graph.compile()?;
//! let result = compiled.invoke(json!({}), "thread-1").await?;
//! assert!(result.is_completed());
//! # Ok(())
//! # }
//! ```

use crate::compiled::CompiledGraph;
use crate::error::{GraphError, Result};
use crate::graph::{EdgeTable, NodeId, PathMap, END, START};
use crate::interrupt::InterruptConfig;
use crate::messages::MESSAGES;
use crate::node::{Node, NodeContext, NodeFuture, NodeRegistry, NodeSpec};
use crate::state::{AppendReducer, Reducer, State, StateSchema};
use serde_json::Value;
use std::sync::Arc;

/// Builder for executable graphs
#[derive(Default)]
pub struct StateGraph {
    schema: StateSchema,
    nodes: NodeRegistry,
    edges: EdgeTable,
    /// Registration errors, reported by `compile`
    problems: Vec<String>,
}

impl StateGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder with an append-only `messages` channel, for chat agents
    pub fn with_messages() -> Self {
        let mut graph = Self::new();
        graph.add_channel_with_default(MESSAGES, Arc::new(AppendReducer), Value::Array(Vec::new()));
        graph
    }

    /// Builder over an existing schema
    pub fn with_schema(schema: StateSchema) -> Self {
        Self {
            schema,
            ..Self::default()
        }
    }

    pub fn add_channel(&mut self, name: impl Into<String>, reducer: Arc<dyn Reducer>) -> &mut Self {
        self.schema.add_field(name, reducer);
        self
    }

    pub fn add_channel_with_default(
        &mut self,
        name: impl Into<String>,
        reducer: Arc<dyn Reducer>,
        default: Value,
    ) -> &mut Self {
        self.schema.add_field_with_default(name, reducer, default);
        self
    }

    /// Adds a node that only needs the state
    ///
    /// ```rust
    /// use flowstate_core::StateGraph;
    /// use serde_json::{json, Value};
    ///
    /// let mut graph = StateGraph::new();
    /// graph.add_node("uppercase", |state| {
    ///     Box::pin(async move {
    ///         let text = state.get("text").and_then(Value::as_str).unwrap_or("");
    ///         Ok(json!({"text": text.to_uppercase()}))
    ///     })
    /// });
    ///
    /// graph.add_node("validate", |state| {
    ///     Box::pin(async move {
    ///         if state.get("value").and_then(Value::as_i64).unwrap_or(0) < 0 {
    ///             return Err("value cannot be negative".into());
    ///         }
    ///         Ok(Value::Null)
    ///     })
    /// });
    /// ```
    pub fn add_node<F>(&mut self, id: impl Into<NodeId>, executor: F) -> &mut Self
    where
        F: Fn(State) -> NodeFuture + Send + Sync + 'static,
    {
        self.add_node_spec(NodeSpec::from_fn(id, move |state, _ctx| executor(state)))
    }

    /// Adds a node that also receives the [`NodeContext`] (thread id, step,
    /// resume value)
    pub fn add_node_with_context<F>(&mut self, id: impl Into<NodeId>, executor: F) -> &mut Self
    where
        F: Fn(State, NodeContext) -> NodeFuture + Send + Sync + 'static,
    {
        self.add_node_spec(NodeSpec::from_fn(id, executor))
    }

    /// Adds a node implemented as a [`Node`] value
    pub fn add_node_instance(&mut self, id: impl Into<NodeId>, node: impl Node + 'static) -> &mut Self {
        self.add_node_spec(NodeSpec::new(id, Arc::new(node)))
    }

    /// Adds a node with full specification (declared writes, retry policy)
    pub fn add_node_spec(&mut self, spec: NodeSpec) -> &mut Self {
        if let Err(GraphError::Validation(problem)) = self.nodes.register(spec) {
            self.problems.push(problem);
        }
        self
    }

    pub fn add_edge(&mut self, from: impl Into<NodeId>, to: impl Into<NodeId>) -> &mut Self {
        self.edges.add_direct(from, to);
        self
    }

    /// Adds a conditional edge
    ///
    /// `router` returns a key of `path_map`. An array of names maps every
    /// name to itself:
    ///
    /// ```rust
    /// use flowstate_core::{StateGraph, END};
    ///
    /// let mut graph = StateGraph::new();
    /// graph.add_conditional_edges(
    ///     "agent",
    ///     |state| {
    ///         if state.contains_key("pending_call") { "tools".to_string() } else { END.to_string() }
    ///     },
    ///     ["tools", END],
    /// );
    /// graph.add_conditional_edges("grade", |_| "good".to_string(), [("good", "publish"), ("bad", "rewrite")]);
    /// ```
    pub fn add_conditional_edges<F>(
        &mut self,
        from: impl Into<NodeId>,
        router: F,
        path_map: impl Into<PathMap>,
    ) -> &mut Self
    where
        F: Fn(&State) -> String + Send + Sync + 'static,
    {
        self.edges.add_conditional(from, Arc::new(router), path_map.into());
        self
    }

    /// Shorthand for `add_edge(START, node)`
    pub fn set_entry(&mut self, node: impl Into<NodeId>) -> &mut Self {
        self.add_edge(START, node)
    }

    /// Shorthand for `add_edge(node, END)`
    pub fn add_finish(&mut self, node: impl Into<NodeId>) -> &mut Self {
        self.add_edge(node, END)
    }

    pub fn schema(&self) -> &StateSchema {
        &self.schema
    }

    pub fn nodes(&self) -> &NodeRegistry {
        &self.nodes
    }

    /// Check the structure without consuming the builder
    pub fn validate(&self) -> Result<()> {
        self.validate_with(&InterruptConfig::default())
    }

    fn validate_with(&self, interrupts: &InterruptConfig) -> Result<()> {
        let mut problems = self.problems.clone();
        problems.extend(self.edges.validate(&self.nodes));
        problems.extend(interrupts.validate(|name| self.nodes.contains(name)));

        if problems.is_empty() {
            Ok(())
        } else {
            Err(GraphError::Validation(problems.join("; ")))
        }
    }

    /// Validate and freeze the graph
    ///
    /// The compiled graph starts with an in-memory checkpointer; use
    /// [`CompiledGraph::with_checkpointer`] for durable threads.
    pub fn compile(self) -> Result<CompiledGraph> {
        self.compile_with_interrupts(InterruptConfig::default())
    }

    /// Validate and freeze the graph with interrupt points
    ///
    /// ```rust
    /// use flowstate_core::{InterruptConfig, StateGraph, END, START};
    /// use serde_json::Value;
    ///
    /// let mut graph = StateGraph::new();
    /// graph.add_node("agent", |_| Box::pin(async { Ok(Value::Null) }));
    /// graph.add_node("human_review", |_| Box::pin(async { Ok(Value::Null) }));
    /// graph.add_edge(START, "agent");
    /// graph.add_edge("agent", "human_review");
    /// graph.add_edge("human_review", END);
    ///
    /// let compiled = graph
    ///     .compile_with_interrupts(
    ///         InterruptConfig::new().with_interrupt_before(vec!["human_review".to_string()]),
    ///     )
    ///     .unwrap();
    /// assert!(compiled.interrupt_config().should_interrupt_before("human_review"));
    /// ```
    pub fn compile_with_interrupts(self, interrupts: InterruptConfig) -> Result<CompiledGraph> {
        self.validate_with(&interrupts)?;
        tracing::debug!(
            nodes = self.nodes.len(),
            channels = self.schema.fields().len(),
            "Graph compiled"
        );
        Ok(CompiledGraph::new(self.schema, self.nodes, self.edges, interrupts))
    }
}
