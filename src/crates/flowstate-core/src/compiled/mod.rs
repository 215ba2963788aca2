//! Compiled graphs and the run API
//!
//! A [`CompiledGraph`] is what [`StateGraph::compile`](crate::StateGraph::compile)
//! produces: the validated node registry and edge table, the state schema,
//! the interrupt points and a checkpointer. It is immutable and can be shared
//! between tasks; all run state lives in the checkpointer, keyed by thread id.
//!
//! # Entry points
//!
//! | method | effect |
//! |---|---|
//! | [`invoke`](CompiledGraph::invoke) | start or continue a thread with new input |
//! | [`resume`](CompiledGraph::resume) | continue an interrupted thread with a value |
//! | [`get_state`](CompiledGraph::get_state) | read the thread's head (no side effects) |
//! | [`get_state_history`](CompiledGraph::get_state_history) | every checkpoint, oldest first |
//! | [`update_state`](CompiledGraph::update_state) | patch the head, optionally as a node |
//! | [`fork`](CompiledGraph::fork) | copy a past checkpoint forward as the new head |
//!
//! # Thread lifecycle
//!
//! ```text
//!            invoke                 pause point               resume
//!   (none) ─────────► running ─────────────────► interrupted ─────────► running
//!                       │  │                                              │
//!          empty frontier  step failure                                   ▼
//!                       ▼  ▼                                             ...
//!               completed  failed ── invoke (repair patch) ──► running
//! ```
//!
//! Calling `invoke` on a completed or interrupted thread starts a new turn
//! from `START` on top of the latest values.

mod execution;
mod graph;
mod state;
mod types;

pub use graph::CompiledGraph;
pub use types::{RunResult, StateSnapshot};
