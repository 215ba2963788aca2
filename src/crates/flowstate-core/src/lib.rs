//! # flowstate-core - Stateful Directed-Graph Execution
//!
//! Build workflows as directed graphs of async nodes that share one JSON
//! state, run them step by step, and persist every step so a run can pause
//! for a human, survive a crash, or be replayed from any point.
//!
//! ## Overview
//!
//! - **Shared state with reducers** - nodes return partial updates; each
//!   channel decides how writes combine (overwrite, append, custom)
//! - **Direct and conditional edges** - routers pick a branch from a declared
//!   path map, checked at compile time and at run time
//! - **Concurrent fan-out** - all nodes of a step run together and their
//!   outputs are merged in a fixed order
//! - **Checkpointing** - one checkpoint per step, in memory or SQLite
//! - **Human-in-the-loop** - pause before or after nodes, inspect, edit and
//!   resume
//!
//! ## Core Concepts
//!
//! ### 1. StateGraph - building
//!
//! [`StateGraph`] collects channels, nodes and edges. [`StateGraph::compile`]
//! validates the structure (unknown targets, dangling nodes, unreachable
//! nodes, empty branch maps) and produces a [`CompiledGraph`].
//!
//! ### 2. Execution model
//!
//! A run advances in steps. Each step takes the *frontier* (the nodes
//! scheduled to run), invokes them concurrently against the same state,
//! folds their updates into the state in frontier order, then evaluates the
//! outgoing edges of every executed node on the merged state to get the next
//! frontier. The run completes when the frontier is empty, meaning every path
//! reached [`END`].
//!
//! ```text
//!   START ──► agent ──(router)──► tools ──► agent ──(router)──► END
//!   step:       1                   2         3
//! ```
//!
//! ### 3. Checkpoints and threads
//!
//! Runs are keyed by a thread id. Each step appends one checkpoint to the
//! thread's log (see [`flowstate_checkpoint`]), carrying the values, the
//! pending frontier and a [`ThreadStatus`]. All run state lives in that log,
//! so any process holding the same checkpointer can pick a thread up again.
//!
//! ### 4. Human-in-the-loop
//!
//! An [`InterruptConfig`] names nodes to pause before or after. A paused run
//! returns [`RunResult::Interrupted`]; the caller inspects it with
//! [`CompiledGraph::get_state`], optionally edits it with
//! [`CompiledGraph::update_state`], and continues with
//! [`CompiledGraph::resume`]. Per-node [`ResumeMode`]s decide whether the
//! resume value is handed to the node, merged into state, or used as the
//! paused node's output.
//!
//! ## Quick Start
//!
//! ```rust
//! use flowstate_core::{messages, Message, StateGraph, END, START};
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let mut graph = StateGraph::with_messages();
//!
//! graph.add_node("echo", |state| {
//!     Box::pin(async move {
//!         let last = messages::last(&state)
//!             .ok()
//!             .flatten()
//!             .map(|m| m.content_string())
//!             .unwrap_or_default();
//!         Ok(messages::update(vec![Message::ai(format!("you said: {}", last))]))
//!     })
//! });
//! graph.add_edge(START, "echo").add_edge("echo", END);
//!
//! let compiled = graph.compile()?;
//! let input = messages::update(vec![Message::human("hi")]);
//! let result = compiled.invoke(input, "chat-1").await?;
//!
//! let history = messages::read(result.values())?;
//! assert_eq!(history.len(), 2);
//! assert_eq!(history[1].content_string(), "you said: hi");
//! # Ok(())
//! # }
//! ```
//!
//! ## Conditional routing
//!
//! ```rust
//! use flowstate_core::{StateGraph, END, START};
//! use serde_json::json;
//!
//! let mut graph = StateGraph::new();
//! graph.add_node("classify", |_| Box::pin(async { Ok(json!({"kind": "question"})) }));
//! graph.add_node("answer", |_| Box::pin(async { Ok(json!({"reply": "42"})) }));
//! graph.add_edge(START, "classify");
//! graph.add_conditional_edges(
//!     "classify",
//!     |state| state["kind"].as_str().unwrap_or("other").to_string(),
//!     [("question", "answer"), ("other", END)],
//! );
//! graph.add_edge("answer", END);
//! assert!(graph.compile().is_ok());
//! ```
//!
//! ## Errors
//!
//! Construction problems surface from `compile` as
//! [`GraphError::Validation`]. Failures inside a run are recorded in the
//! thread and returned as [`RunResult::Failed`]; calling `invoke` again on
//! the failed thread re-runs the failed step, optionally with a repair patch.
//!
//! ## Module Organization
//!
//! - [`builder`] - [`StateGraph`] and compilation
//! - [`compiled`] - [`CompiledGraph`], run results and snapshots
//! - [`graph`] - edges, path maps, `START`/`END`
//! - [`node`] - the [`Node`] trait, node specs and the registry
//! - [`state`] - state schema and reducers
//! - [`messages`] - chat message type and helpers for the `messages` channel
//! - [`interrupt`] - pause points and resume modes
//! - [`retry`] - per-node retry policies
//! - [`config`] - run configuration
//! - [`error`] - error types

pub mod builder;
pub mod compiled;
pub mod config;
pub mod error;
pub mod graph;
pub mod interrupt;
pub mod messages;
pub mod node;
mod pregel;
pub mod retry;
pub mod state;

pub use builder::StateGraph;
pub use compiled::{CompiledGraph, RunResult, StateSnapshot};
pub use config::{RunConfig, DEFAULT_RECURSION_LIMIT};
pub use error::{BoxError, GraphError, Result};
pub use graph::{Edge, EdgeTable, NodeId, PathMap, RouterFn, END, START};
pub use interrupt::{InterruptConfig, InterruptRecord, InterruptWhen, ResumeMode};
pub use messages::{Message, MessageContent, MessageRole, ToolCall};
pub use node::{Node, NodeContext, NodeFuture, NodeRegistry, NodeSpec};
pub use retry::RetryPolicy;
pub use state::{
    AppendReducer, ChannelSpec, FnReducer, OverwriteReducer, Reducer, State, StateError, StateSchema,
    StateUpdate,
};

pub use flowstate_checkpoint::ThreadStatus;
