//! Error types for graph construction and execution
//!
//! Everything fallible in this crate returns [`GraphError`]. The variants
//! fall into three groups:
//!
//! ```text
//! GraphError
//! ├── Validation        - compile-time structural problems
//! ├── NodeExecution     - a node returned an error (after retries)
//! ├── RouterTarget      - a router picked a branch outside its declared map
//! ├── InvalidUpdate     - a node wrote something the schema rejects
//! ├── InvalidInput      - invoke/update_state input was not an object
//! ├── InvalidResume     - resume called on a thread that is not interrupted
//! ├── UnknownNode       - a node name that is not registered
//! ├── ThreadNotFound    - a thread with no checkpoints
//! ├── ThreadBusy        - another run holds the thread
//! ├── RecursionLimit    - the step budget of a single call ran out
//! ├── Checkpoint        - persistence failures
//! ├── Serialization     - JSON encode/decode failures
//! └── Configuration     - invalid run configuration
//! ```
//!
//! Errors raised *inside* a run (node failures, bad router keys, rejected
//! updates, exhausted step budgets) are recorded in a `failed` checkpoint and
//! reported through [`RunResult::Failed`](crate::RunResult::Failed). The
//! remaining variants are returned as `Err` from the call itself.
//!
//! # Matching errors
//!
//! ```rust
//! use flowstate_core::GraphError;
//!
//! fn describe(err: &GraphError) -> String {
//!     match err {
//!         GraphError::Validation(msg) => format!("fix the graph: {}", msg),
//!         GraphError::NodeExecution { node, .. } => format!("node {} failed", node),
//!         GraphError::ThreadBusy(thread) => format!("{} is already running", thread),
//!         other => other.to_string(),
//!     }
//! }
//! ```

use flowstate_checkpoint::{CheckpointError, ThreadStatus};
use thiserror::Error;

/// Boxed error returned by node functions
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Result type for graph operations
pub type Result<T> = std::result::Result<T, GraphError>;

#[derive(Error, Debug)]
pub enum GraphError {
    /// The graph failed compile-time validation
    #[error("Graph validation failed: {0}")]
    Validation(String),

    /// A node returned an error on its final attempt
    #[error("Node '{node}' execution failed: {source}")]
    NodeExecution {
        node: String,
        #[source]
        source: BoxError,
    },

    /// A router returned a key that is not in its branch map
    #[error("Router on '{node}' returned '{target}', expected one of {allowed:?}")]
    RouterTarget {
        node: String,
        target: String,
        allowed: Vec<String>,
    },

    /// A node output could not be merged into the state
    #[error("Invalid update from '{node}': {reason}")]
    InvalidUpdate { node: String, reason: String },

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Resume was requested for a thread that is not paused
    #[error("Thread '{thread_id}' cannot be resumed (status: {})", status_label(.status))]
    InvalidResume {
        thread_id: String,
        status: Option<ThreadStatus>,
    },

    #[error("Unknown node: {0}")]
    UnknownNode(String),

    /// The thread has no checkpoints yet
    #[error("Thread '{0}' not found")]
    ThreadNotFound(String),

    /// Another invoke/resume/update currently owns the thread
    #[error("Thread '{0}' is busy")]
    ThreadBusy(String),

    /// The run executed `limit` steps without finishing or pausing
    #[error("Recursion limit of {limit} steps reached")]
    RecursionLimit { limit: usize },

    #[error("Checkpoint error: {0}")]
    Checkpoint(#[from] CheckpointError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Configuration(String),
}

fn status_label(status: &Option<ThreadStatus>) -> &'static str {
    status.map(|s| s.as_str()).unwrap_or("none")
}

impl GraphError {
    pub fn node_execution(node: impl Into<String>, source: impl Into<BoxError>) -> Self {
        GraphError::NodeExecution {
            node: node.into(),
            source: source.into(),
        }
    }

    pub fn invalid_update(node: impl Into<String>, reason: impl Into<String>) -> Self {
        GraphError::InvalidUpdate {
            node: node.into(),
            reason: reason.into(),
        }
    }

    /// True for errors that come from a single run step rather than from
    /// the caller or the infrastructure
    pub fn is_step_failure(&self) -> bool {
        matches!(
            self,
            GraphError::NodeExecution { .. }
                | GraphError::RouterTarget { .. }
                | GraphError::InvalidUpdate { .. }
                | GraphError::RecursionLimit { .. }
        )
    }
}
