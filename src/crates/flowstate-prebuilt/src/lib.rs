//! # flowstate-prebuilt - Agents, Tools and Models
//!
//! Ready-made graphs for model-driven agents on top of `flowstate-core`:
//!
//! - **[Models](model)** - the [`ChatModel`] interface and a
//!   [`ScriptedChatModel`] for demos and tests
//! - **[Tools](tools)** - the [`Tool`] trait, closure tools and a
//!   [`ToolRegistry`] with argument validation
//! - **[Retrieval](retriever)** - the [`Retriever`] interface, a keyword
//!   retriever and [`RetrieverTool`]
//! - **[ToolNode](tool_node)** - executes the tool calls of the last AI
//!   message; [`tools_condition`] routes to it
//! - **[Agents](agents)** - [`agent_node`] plus graph factories for
//!   chat, retrieval chains, ReAct, research teams and human review
//!
//! Model providers, embedding pipelines and concrete tools are not part of
//! this crate. They plug in through the traits above.
//!
//! # Quick Start
//!
//! A retrieval-backed ReAct agent answering from a policy text:
//!
//! ```rust
//! use flowstate_core::{messages, Message, ToolCall};
//! use flowstate_prebuilt::{
//!     create_react_agent, KeywordRetriever, RetrieverTool, ScriptedChatModel, ToolRegistry,
//! };
//! use serde_json::json;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let retriever = KeywordRetriever::from_text(
//!         "LangGraph is inspired by Pregel and Apache Beam.\n\nIts interface draws from NetworkX.",
//!     );
//!     let mut tools = ToolRegistry::new();
//!     tools.register(RetrieverTool::new(
//!         "lookup_policy",
//!         "Ask this tool questions about LangGraph.",
//!         Arc::new(retriever),
//!     ));
//!
//!     let model = ScriptedChatModel::new()
//!         .reply(Message::ai("").with_tool_calls(vec![ToolCall::new(
//!             "call_1",
//!             "lookup_policy",
//!             json!({"query": "What is LangGraph inspired by?"}),
//!         )]))
//!         .respond(|history| {
//!             let found = history.last().map(|m| m.content_string()).unwrap_or_default();
//!             Message::ai(format!("According to the docs: {}", found))
//!         });
//!
//!     let agent = create_react_agent(Arc::new(model), tools).build()?;
//!     let result = agent
//!         .invoke(messages::update(vec![Message::human("What is LangGraph inspired by?")]), "demo")
//!         .await?;
//!
//!     if let Some(answer) = messages::last(result.values())? {
//!         println!("{}", answer.content_string());
//!     }
//!     Ok(())
//! }
//! ```
//!
//! # Errors
//!
//! Tool and model failures are [`AgentError`]s. Raised inside a node they
//! surface as the source of the graph's node failure, and the thread keeps
//! a `Failed` checkpoint that a later invoke can repair.

pub mod agents;
pub mod error;
pub mod model;
pub mod retriever;
pub mod tool_node;
pub mod tools;

pub use agents::{
    agent_node, create_chat_agent, create_rag_chain, create_react_agent, create_research_team,
    create_review_workflow, AgentNode, ChatAgentConfig, RagChainConfig, ReactAgentConfig, ResearchTeamConfig,
    ReviewWorkflowConfig, HUMAN_REVIEW,
};
pub use error::{AgentError, Result};
pub use model::{ChatModel, RecordedCall, ScriptedChatModel};
pub use retriever::{KeywordRetriever, Passage, Retriever, RetrieverTool};
pub use tool_node::{tools_condition, ToolNode};
pub use tools::{FnTool, Tool, ToolFuture, ToolOutput, ToolRegistry, ToolSpec};
