//! Tools - actions a model can request
//!
//! A [`Tool`] is a named async function over JSON arguments. The model sees
//! each tool as a [`ToolSpec`] (name, description, JSON-schema parameters)
//! and answers with [`ToolCall`](flowstate_core::ToolCall)s;
//! [`ToolNode`](crate::ToolNode) looks the calls up in a [`ToolRegistry`] and
//! runs them.
//!
//! # Implementing a tool
//!
//! ```rust
//! use async_trait::async_trait;
//! use flowstate_prebuilt::{Result, Tool, ToolOutput};
//! use serde_json::{json, Value};
//!
//! struct Calculator;
//!
//! #[async_trait]
//! impl Tool for Calculator {
//!     fn name(&self) -> &str {
//!         "add"
//!     }
//!
//!     fn description(&self) -> &str {
//!         "Add two numbers"
//!     }
//!
//!     fn parameters(&self) -> Value {
//!         json!({
//!             "type": "object",
//!             "properties": {"a": {"type": "number"}, "b": {"type": "number"}},
//!             "required": ["a", "b"]
//!         })
//!     }
//!
//!     async fn invoke(&self, args: Value) -> Result<ToolOutput> {
//!         let a = args["a"].as_f64().unwrap_or(0.0);
//!         let b = args["b"].as_f64().unwrap_or(0.0);
//!         Ok(json!(a + b))
//!     }
//! }
//! ```
//!
//! # Closure tools
//!
//! ```rust
//! use flowstate_prebuilt::{FnTool, ToolRegistry};
//! use serde_json::json;
//!
//! let search = FnTool::new("search_tool", "Search the web for information.", |args| {
//!     Box::pin(async move {
//!         let query = args["query"].as_str().unwrap_or_default().to_string();
//!         Ok(json!(format!("results for {}", query)))
//!     })
//! })
//! .with_parameters(json!({
//!     "type": "object",
//!     "properties": {"query": {"type": "string"}},
//!     "required": ["query"]
//! }));
//!
//! let mut registry = ToolRegistry::new();
//! registry.register(search);
//! assert_eq!(registry.names(), vec!["search_tool"]);
//! ```

use crate::error::{AgentError, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

pub mod validation;

pub use validation::validate_arguments;

/// Tool result; a string becomes the tool message text, anything else is
/// rendered as JSON
pub type ToolOutput = Value;

/// Boxed future returned by closure tools
pub type ToolFuture = Pin<Box<dyn Future<Output = Result<ToolOutput>> + Send>>;

/// What the model is told about a tool
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolSpec {
    pub name: String,
    pub description: String,
    /// JSON schema of the arguments object
    pub parameters: Value,
}

#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &str;

    fn description(&self) -> &str;

    /// JSON schema of the arguments (an unconstrained object by default)
    fn parameters(&self) -> Value {
        json!({"type": "object"})
    }

    async fn invoke(&self, args: Value) -> Result<ToolOutput>;

    /// Check arguments before [`invoke`](Tool::invoke); the default checks
    /// them against [`parameters`](Tool::parameters)
    fn validate_args(&self, args: &Value) -> Result<()> {
        validate_arguments(self.name(), &self.parameters(), args)
    }

    fn spec(&self) -> ToolSpec {
        ToolSpec {
            name: self.name().to_string(),
            description: self.description().to_string(),
            parameters: self.parameters(),
        }
    }
}

/// Tool backed by a closure
pub struct FnTool {
    name: String,
    description: String,
    parameters: Value,
    func: Box<dyn Fn(Value) -> ToolFuture + Send + Sync>,
}

impl FnTool {
    pub fn new<F>(name: impl Into<String>, description: impl Into<String>, func: F) -> Self
    where
        F: Fn(Value) -> ToolFuture + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            description: description.into(),
            parameters: json!({"type": "object"}),
            func: Box::new(func),
        }
    }

    pub fn with_parameters(mut self, parameters: Value) -> Self {
        self.parameters = parameters;
        self
    }
}

#[async_trait]
impl Tool for FnTool {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn parameters(&self) -> Value {
        self.parameters.clone()
    }

    async fn invoke(&self, args: Value) -> Result<ToolOutput> {
        (self.func)(args).await
    }
}

/// Tools by name, listed in registration order
#[derive(Clone, Default)]
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn Tool>>,
    order: Vec<String>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a tool, replacing any tool with the same name
    pub fn register(&mut self, tool: impl Tool + 'static) -> &mut Self {
        self.register_arc(Arc::new(tool))
    }

    pub fn register_arc(&mut self, tool: Arc<dyn Tool>) -> &mut Self {
        let name = tool.name().to_string();
        if self.tools.insert(name.clone(), tool).is_none() {
            self.order.push(name);
        } else {
            tracing::warn!(tool = %name, "Replacing registered tool");
        }
        self
    }

    pub fn get(&self, name: &str) -> Option<&Arc<dyn Tool>> {
        self.tools.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    pub fn names(&self) -> Vec<&str> {
        self.order.iter().map(String::as_str).collect()
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Specs for the model, in registration order
    pub fn specs(&self) -> Vec<ToolSpec> {
        self.order
            .iter()
            .filter_map(|name| self.tools.get(name))
            .map(|tool| tool.spec())
            .collect()
    }

    /// Validate the arguments and run the named tool
    pub async fn invoke(&self, name: &str, args: Value) -> Result<ToolOutput> {
        let tool = self
            .get(name)
            .ok_or_else(|| AgentError::UnknownTool(name.to_string()))?;
        tool.validate_args(&args)?;
        tool.invoke(args).await
    }
}

impl std::fmt::Debug for ToolRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolRegistry").field("tools", &self.order).finish()
    }
}

impl<T: Tool + 'static> FromIterator<T> for ToolRegistry {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        let mut registry = Self::new();
        for tool in iter {
            registry.register(tool);
        }
        registry
    }
}
