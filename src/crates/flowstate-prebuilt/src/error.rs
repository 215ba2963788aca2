//! Error types for agents, tools and models
//!
//! Agent nodes run inside a graph, so an [`AgentError`] raised there reaches
//! the caller as the `source` of
//! [`GraphError::NodeExecution`](flowstate_core::GraphError::NodeExecution):
//!
//! ```rust
//! use flowstate_prebuilt::AgentError;
//!
//! fn explain(err: &AgentError) -> String {
//!     match err {
//!         AgentError::UnknownTool(name) => format!("the model asked for '{}', which is not registered", name),
//!         AgentError::ModelInvocation(msg) => format!("model call failed: {}", msg),
//!         other => other.to_string(),
//!     }
//! }
//! ```

use thiserror::Error;

pub type Result<T> = std::result::Result<T, AgentError>;

#[derive(Error, Debug)]
pub enum AgentError {
    /// A tool call named a tool that is not registered
    #[error("Unknown tool: {0}")]
    UnknownTool(String),

    /// The chat model failed to produce a response
    #[error("Model invocation failed: {0}")]
    ModelInvocation(String),

    /// A tool returned an error
    #[error("Tool '{tool}' failed: {message}")]
    ToolExecution { tool: String, message: String },

    /// Tool arguments did not match the tool's parameter schema
    #[error("Invalid arguments for tool '{tool}': {reason}")]
    InvalidToolArguments { tool: String, reason: String },

    #[error("Retrieval failed: {0}")]
    Retrieval(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Graph error: {0}")]
    Graph(#[from] flowstate_core::GraphError),
}

impl AgentError {
    pub fn tool_execution(tool: impl Into<String>, message: impl Into<String>) -> Self {
        AgentError::ToolExecution {
            tool: tool.into(),
            message: message.into(),
        }
    }

    pub fn invalid_arguments(tool: impl Into<String>, reason: impl Into<String>) -> Self {
        AgentError::InvalidToolArguments {
            tool: tool.into(),
            reason: reason.into(),
        }
    }
}
