//! Single-turn chat: one model call under a system prompt, no tools
//!
//! ```text
//!   START → agent → END
//! ```
//!
//! Each invoke on the same thread is a new turn on top of the stored
//! conversation.

use super::{AgentNode, GraphOptions};
use crate::error::Result;
use crate::model::ChatModel;
use flowstate_checkpoint::CheckpointSaver;
use flowstate_core::{CompiledGraph, StateGraph, END, START};
use std::sync::Arc;

pub const DEFAULT_SYSTEM_PROMPT: &str = "You are a helpful assistant.";

/// Builder for the chat graph
pub struct ChatAgentConfig {
    model: Arc<dyn ChatModel>,
    system_prompt: String,
    options: GraphOptions,
}

impl ChatAgentConfig {
    pub fn new(model: Arc<dyn ChatModel>) -> Self {
        Self {
            model,
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
            options: GraphOptions::default(),
        }
    }

    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = prompt.into();
        self
    }

    pub fn with_checkpointer(mut self, saver: Arc<dyn CheckpointSaver>) -> Self {
        self.options.checkpointer = Some(saver);
        self
    }

    pub fn with_recursion_limit(mut self, limit: usize) -> Self {
        self.options.recursion_limit = Some(limit);
        self
    }

    pub fn build(self) -> Result<CompiledGraph> {
        let mut graph = StateGraph::with_messages();
        graph.add_node_instance("agent", AgentNode::new(self.model).with_system_prompt(self.system_prompt));
        graph.add_edge(START, "agent");
        graph.add_edge("agent", END);
        Ok(self.options.apply(graph.compile()?))
    }
}

/// Start configuring a chat graph answering with `model`
pub fn create_chat_agent(model: Arc<dyn ChatModel>) -> ChatAgentConfig {
    ChatAgentConfig::new(model)
}
