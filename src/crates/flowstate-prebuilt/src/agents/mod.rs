//! Agent nodes and prebuilt agent graphs
//!
//! Every graph here runs over the `messages` channel of
//! [`StateGraph::with_messages`](flowstate_core::StateGraph::with_messages)
//! and is mostly assembled from two building blocks: an [`AgentNode`] that
//! asks a [`ChatModel`] for the next message, and a
//! [`ToolNode`](crate::ToolNode) that executes the tool calls in it.
//!
//! | factory | shape | pauses |
//! |---------|-------|--------|
//! | [`create_chat_agent`] | agent → END | no |
//! | [`create_rag_chain`] | retrieve → answer → END | no |
//! | [`create_react_agent`] | agent ⇄ tools → END | no |
//! | [`create_research_team`] | researcher ⇄ tools, researcher → writer → END | no |
//! | [`create_review_workflow`] | agent → human_review → END | before `human_review` |
//!
//! # Choosing a graph
//!
//! ```text
//! Model needs tools? ──[yes]──→ one role?  ──[yes]──→ create_react_agent
//!        │                         │
//!       [no]                      [no] ───────────→ create_research_team
//!        │
//! Output needs sign-off? ──[yes]──→ create_review_workflow
//!        │
//!       [no] ──→ answer from documents? ──[yes]──→ create_rag_chain
//!                          │
//!                         [no] ──────────────────→ create_chat_agent
//! ```
//!
//! For other shapes, add [`AgentNode`]s to a `StateGraph` directly.

use crate::model::ChatModel;
use crate::tools::ToolSpec;
use async_trait::async_trait;
use flowstate_checkpoint::CheckpointSaver;
use flowstate_core::{messages, BoxError, CompiledGraph, Message, Node, NodeContext, State};
use serde_json::Value;
use std::sync::Arc;

pub mod chat;
pub mod rag;
pub mod react;
pub mod review;
pub mod team;

pub use chat::{create_chat_agent, ChatAgentConfig, DEFAULT_SYSTEM_PROMPT};
pub use rag::{create_rag_chain, RagChainConfig, RAG_PROMPT};
pub use react::{create_react_agent, ReactAgentConfig};
pub use review::{create_review_workflow, ReviewWorkflowConfig, HUMAN_REVIEW};
pub use team::{create_research_team, ResearchTeamConfig};

/// Node calling a chat model on the conversation so far
///
/// The system prompt, when set, is prepended to the messages sent to the
/// model on every call; it is never written to state. The model's reply is
/// appended to `messages`.
#[derive(Clone)]
pub struct AgentNode {
    model: Arc<dyn ChatModel>,
    system_prompt: Option<String>,
    tools: Vec<ToolSpec>,
    name: Option<String>,
}

impl AgentNode {
    pub fn new(model: Arc<dyn ChatModel>) -> Self {
        Self {
            model,
            system_prompt: None,
            tools: Vec::new(),
            name: None,
        }
    }

    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = Some(prompt.into());
        self
    }

    /// Tools offered to the model
    pub fn with_tools(mut self, tools: Vec<ToolSpec>) -> Self {
        self.tools = tools;
        self
    }

    /// Stamp replies with `name`, so multi-agent histories show who spoke
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    fn prompt(&self, history: Vec<Message>) -> Vec<Message> {
        match &self.system_prompt {
            Some(prompt) => std::iter::once(Message::system(prompt.as_str()))
                .chain(history)
                .collect(),
            None => history,
        }
    }
}

#[async_trait]
impl Node for AgentNode {
    async fn run(&self, state: State, ctx: NodeContext) -> std::result::Result<Value, BoxError> {
        let history = messages::read(&state)?;
        let prompt = self.prompt(history);

        tracing::debug!(
            model = self.model.name(),
            messages = prompt.len(),
            tools = self.tools.len(),
            step = ctx.step(),
            "Calling chat model"
        );
        let mut reply = self.model.complete(&prompt, &self.tools).await?;
        if let (Some(name), None) = (&self.name, &reply.name) {
            reply.name = Some(name.clone());
        }
        Ok(messages::update(vec![reply]))
    }
}

/// Agent node factory: `model` with an optional system prompt and the tools
/// it may call
pub fn agent_node(
    model: Arc<dyn ChatModel>,
    system_prompt: Option<&str>,
    tools: Vec<ToolSpec>,
) -> AgentNode {
    let node = AgentNode::new(model).with_tools(tools);
    match system_prompt {
        Some(prompt) => node.with_system_prompt(prompt),
        None => node,
    }
}

/// Options shared by the graph factories
#[derive(Clone, Default)]
pub(crate) struct GraphOptions {
    pub(crate) checkpointer: Option<Arc<dyn CheckpointSaver>>,
    pub(crate) recursion_limit: Option<usize>,
}

impl GraphOptions {
    pub(crate) fn apply(self, mut graph: CompiledGraph) -> CompiledGraph {
        if let Some(saver) = self.checkpointer {
            graph = graph.with_checkpointer(saver);
        }
        if let Some(limit) = self.recursion_limit {
            graph = graph.with_recursion_limit(limit);
        }
        graph
    }
}
