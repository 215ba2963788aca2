//! Nodes and the node registry
//!
//! A node is an async unit of work: it receives a copy of the current state
//! plus a [`NodeContext`] and returns a *partial* update, a JSON object whose
//! keys are channels. `null` means "no update".
//!
//! Most nodes are closures registered through
//! [`StateGraph::add_node`](crate::StateGraph::add_node). Anything with
//! internal state (tool executors, model wrappers) implements [`Node`]
//! directly and is registered with
//! [`StateGraph::add_node_instance`](crate::StateGraph::add_node_instance).
//!
//! ```rust
//! use async_trait::async_trait;
//! use flowstate_core::{BoxError, Node, NodeContext, State};
//! use serde_json::{json, Value};
//!
//! struct Counter;
//!
//! #[async_trait]
//! impl Node for Counter {
//!     async fn run(&self, state: State, ctx: NodeContext) -> Result<Value, BoxError> {
//!         let count = state.get("count").and_then(Value::as_i64).unwrap_or(0);
//!         Ok(json!({"count": count + 1, "last_step": ctx.step()}))
//!     }
//! }
//! ```
//!
//! The registry is frozen once the graph is compiled; the executor only
//! dispatches to names that passed validation.

use crate::error::{BoxError, GraphError, Result};
use crate::graph::{NodeId, END, START};
use crate::retry::RetryPolicy;
use crate::state::{State, StateUpdate};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

/// Boxed future returned by closure nodes
pub type NodeFuture = Pin<Box<dyn Future<Output = std::result::Result<Value, BoxError>> + Send>>;

/// Per-invocation information handed to a node
#[derive(Debug, Clone, Default)]
pub struct NodeContext {
    thread_id: String,
    step: u64,
    resume: Option<Value>,
}

impl NodeContext {
    pub fn new(thread_id: impl Into<String>, step: u64) -> Self {
        Self {
            thread_id: thread_id.into(),
            step,
            resume: None,
        }
    }

    pub fn with_resume(mut self, value: Option<Value>) -> Self {
        self.resume = value;
        self
    }

    pub fn thread_id(&self) -> &str {
        &self.thread_id
    }

    /// Step number of the checkpoint this invocation will produce
    pub fn step(&self) -> u64 {
        self.step
    }

    /// Value passed to `resume`, present only in the first step after a
    /// resume whose interrupt point uses [`ResumeMode::PassToNode`](crate::ResumeMode::PassToNode)
    pub fn resume_value(&self) -> Option<&Value> {
        self.resume.as_ref()
    }
}

#[async_trait]
pub trait Node: Send + Sync {
    async fn run(&self, state: State, ctx: NodeContext) -> std::result::Result<Value, BoxError>;
}

/// Adapter turning a closure into a [`Node`]
pub(crate) struct FnNode<F>(pub(crate) F);

#[async_trait]
impl<F> Node for FnNode<F>
where
    F: Fn(State, NodeContext) -> NodeFuture + Send + Sync,
{
    async fn run(&self, state: State, ctx: NodeContext) -> std::result::Result<Value, BoxError> {
        (self.0)(state, ctx).await
    }
}

/// A registered node: its implementation plus execution options
#[derive(Clone)]
pub struct NodeSpec {
    pub name: NodeId,
    pub node: Arc<dyn Node>,
    /// Channels this node may write; `None` allows any channel
    pub writes: Option<Vec<String>>,
    pub retry: RetryPolicy,
}

impl NodeSpec {
    pub fn new(name: impl Into<NodeId>, node: Arc<dyn Node>) -> Self {
        Self {
            name: name.into(),
            node,
            writes: None,
            retry: RetryPolicy::default(),
        }
    }

    pub fn from_fn<F>(name: impl Into<NodeId>, func: F) -> Self
    where
        F: Fn(State, NodeContext) -> NodeFuture + Send + Sync + 'static,
    {
        Self::new(name, Arc::new(FnNode(func)))
    }

    /// Restrict the channels this node is allowed to write
    pub fn with_writes<I, S>(mut self, channels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.writes = Some(channels.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Normalize a node output into a state update and enforce declared writes
    pub fn output_to_update(&self, output: Value) -> Result<StateUpdate> {
        let update = match output {
            Value::Object(map) => map,
            Value::Null => StateUpdate::new(),
            other => {
                return Err(GraphError::invalid_update(
                    &self.name,
                    format!("expected an object, got {}", json_type(&other)),
                ))
            }
        };

        if let Some(allowed) = &self.writes {
            if let Some(channel) = update.keys().find(|k| !allowed.contains(k)) {
                return Err(GraphError::invalid_update(
                    &self.name,
                    format!("channel '{}' is not in the declared writes {:?}", channel, allowed),
                ));
            }
        }
        Ok(update)
    }
}

impl fmt::Debug for NodeSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NodeSpec")
            .field("name", &self.name)
            .field("node", &"<node>")
            .field("writes", &self.writes)
            .field("retry", &self.retry)
            .finish()
    }
}

pub(crate) fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Name-indexed set of nodes, in registration order
#[derive(Clone, Default, Debug)]
pub struct NodeRegistry {
    nodes: HashMap<NodeId, NodeSpec>,
    order: Vec<NodeId>,
}

impl NodeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a node; reserved and duplicate names are rejected
    pub fn register(&mut self, spec: NodeSpec) -> Result<()> {
        if spec.name == START || spec.name == END {
            return Err(GraphError::Validation(format!("'{}' is a reserved node name", spec.name)));
        }
        if spec.name.is_empty() {
            return Err(GraphError::Validation("node names cannot be empty".to_string()));
        }
        if self.nodes.contains_key(&spec.name) {
            return Err(GraphError::Validation(format!("node '{}' is already registered", spec.name)));
        }
        self.order.push(spec.name.clone());
        self.nodes.insert(spec.name.clone(), spec);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&NodeSpec> {
        self.nodes.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.nodes.contains_key(name)
    }

    /// Node names in registration order
    pub fn names(&self) -> &[NodeId] {
        &self.order
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Run a node once and normalize its output
    pub async fn invoke(&self, name: &str, state: State, ctx: NodeContext) -> Result<StateUpdate> {
        let spec = self
            .get(name)
            .ok_or_else(|| GraphError::UnknownNode(name.to_string()))?;
        let output = spec
            .node
            .run(state, ctx)
            .await
            .map_err(|e| GraphError::node_execution(name, e))?;
        spec.output_to_update(output)
    }
}
