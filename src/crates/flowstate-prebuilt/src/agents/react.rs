//! ReAct agent - reasoning and acting loop
//!
//! The model is called with the conversation; if its reply carries tool calls
//! they are executed and the results appended, and the model is called again.
//! The loop ends at the first reply without tool calls.
//!
//! ```text
//!   START → agent ──(tool calls)──→ tools
//!             ↑                       │
//!             └───────────────────────┘
//!           agent ──(no tool calls)──→ END
//! ```
//!
//! A question needing one lookup produces four messages: the human question,
//! the AI tool request, the tool result and the final AI answer.
//!
//! ```rust
//! use flowstate_core::{messages, Message, ToolCall};
//! use flowstate_prebuilt::{create_react_agent, FnTool, ScriptedChatModel, ToolRegistry};
//! use serde_json::json;
//! use std::sync::Arc;
//!
//! # #[tokio::main]
//! # async fn main() -> flowstate_prebuilt::Result<()> {
//! let model = ScriptedChatModel::new()
//!     .reply(Message::ai("").with_tool_calls(vec![
//!         ToolCall::new("call_1", "lookup_policy", json!({"query": "inspiration"})),
//!     ]))
//!     .reply(Message::ai("LangGraph is inspired by Pregel and Apache Beam."));
//!
//! let mut tools = ToolRegistry::new();
//! tools.register(FnTool::new("lookup_policy", "Ask questions about LangGraph.", |_| {
//!     Box::pin(async { Ok(json!("LangGraph is inspired by Pregel and Apache Beam.")) })
//! }));
//!
//! let agent = create_react_agent(Arc::new(model), tools).build()?;
//! let result = agent
//!     .invoke(messages::update(vec![Message::human("What is LangGraph inspired by?")]), "thread-1")
//!     .await?;
//!
//! let history = messages::read(result.values())?;
//! assert_eq!(history.len(), 4);
//! # Ok(())
//! # }
//! ```

use super::{AgentNode, GraphOptions};
use crate::error::Result;
use crate::model::ChatModel;
use crate::tool_node::{tools_condition, ToolNode};
use crate::tools::ToolRegistry;
use flowstate_checkpoint::CheckpointSaver;
use flowstate_core::{CompiledGraph, StateGraph, END, START};
use std::sync::Arc;

/// Builder for a ReAct agent graph
pub struct ReactAgentConfig {
    model: Arc<dyn ChatModel>,
    tools: ToolRegistry,
    system_prompt: Option<String>,
    handle_tool_errors: bool,
    options: GraphOptions,
}

impl ReactAgentConfig {
    pub fn new(model: Arc<dyn ChatModel>, tools: ToolRegistry) -> Self {
        Self {
            model,
            tools,
            system_prompt: None,
            handle_tool_errors: true,
            options: GraphOptions::default(),
        }
    }

    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = Some(prompt.into());
        self
    }

    /// See [`ToolNode::with_error_handling`]
    pub fn with_tool_error_handling(mut self, handle: bool) -> Self {
        self.handle_tool_errors = handle;
        self
    }

    pub fn with_checkpointer(mut self, saver: Arc<dyn CheckpointSaver>) -> Self {
        self.options.checkpointer = Some(saver);
        self
    }

    /// Bounds the agent/tools round trips: each round trip costs two steps
    pub fn with_recursion_limit(mut self, limit: usize) -> Self {
        self.options.recursion_limit = Some(limit);
        self
    }

    pub fn build(self) -> Result<CompiledGraph> {
        let mut agent = AgentNode::new(self.model).with_tools(self.tools.specs());
        if let Some(prompt) = self.system_prompt {
            agent = agent.with_system_prompt(prompt);
        }
        let tools = ToolNode::new(Arc::new(self.tools)).with_error_handling(self.handle_tool_errors);

        let mut graph = StateGraph::with_messages();
        graph.add_node_instance("agent", agent);
        graph.add_node_instance("tools", tools);
        graph.add_edge(START, "agent");
        graph.add_conditional_edges("agent", tools_condition, ["tools", END]);
        graph.add_edge("tools", "agent");

        Ok(self.options.apply(graph.compile()?))
    }
}

/// Start configuring a ReAct agent over `model` and `tools`
pub fn create_react_agent(model: Arc<dyn ChatModel>, tools: ToolRegistry) -> ReactAgentConfig {
    ReactAgentConfig::new(model, tools)
}
