//! Retrieval chain: fetch passages for the question, then answer from them
//!
//! ```text
//!   START → retrieve → answer → END
//! ```
//!
//! `retrieve` stores the passages for the latest human message in the
//! `context` channel. `answer` fills them into a prompt template and appends
//! the model's reply. The model sees only the filled prompt, not the
//! conversation.
//!
//! ```rust
//! use flowstate_core::{messages, Message};
//! use flowstate_prebuilt::{create_rag_chain, KeywordRetriever, ScriptedChatModel};
//! use std::sync::Arc;
//!
//! # #[tokio::main]
//! # async fn main() -> flowstate_prebuilt::Result<()> {
//! let retriever = KeywordRetriever::from_text(
//!     "LangGraph is inspired by Pregel and Apache Beam.\n\nRefunds take 14 days.",
//! );
//! let model = ScriptedChatModel::new().reply(Message::ai("Pregel and Apache Beam."));
//! let chain = create_rag_chain(Arc::new(model), Arc::new(retriever)).build()?;
//!
//! let result = chain
//!     .invoke(messages::update(vec![Message::human("What is LangGraph inspired by?")]), "t")
//!     .await?;
//! assert_eq!(result.values()["context"][0]["text"], "LangGraph is inspired by Pregel and Apache Beam.");
//! # Ok(())
//! # }
//! ```

use super::GraphOptions;
use crate::error::{AgentError, Result};
use crate::model::ChatModel;
use crate::retriever::{Passage, Retriever};
use async_trait::async_trait;
use flowstate_checkpoint::CheckpointSaver;
use flowstate_core::{
    messages, BoxError, CompiledGraph, Message, MessageRole, Node, NodeContext, OverwriteReducer, State,
    StateGraph, END, START,
};
use serde_json::{json, Value};
use std::sync::Arc;

/// Channel holding the passages retrieved for the current question
pub const CONTEXT: &str = "context";

/// Template for the answering call; `{context}` and `{input}` are replaced
pub const RAG_PROMPT: &str = "Answer the user's question based only on the following context:

<context>
{context}
</context>

Question: {input}";

fn question(state: &State) -> std::result::Result<String, AgentError> {
    messages::read(state)?
        .into_iter()
        .rev()
        .find(|m| m.role == MessageRole::Human)
        .map(|m| m.content_string())
        .ok_or_else(|| AgentError::Retrieval("no human message to answer".to_string()))
}

struct RetrieveNode {
    retriever: Arc<dyn Retriever>,
}

#[async_trait]
impl Node for RetrieveNode {
    async fn run(&self, state: State, ctx: NodeContext) -> std::result::Result<Value, BoxError> {
        let query = question(&state)?;
        let passages = self.retriever.retrieve(&query).await?;
        tracing::debug!(step = ctx.step(), passages = passages.len(), "Retrieved context");
        Ok(json!({ CONTEXT: passages }))
    }
}

struct AnswerNode {
    model: Arc<dyn ChatModel>,
    template: String,
}

impl AnswerNode {
    fn render(&self, passages: &[Passage], input: &str) -> String {
        let context = passages
            .iter()
            .map(|p| p.text.as_str())
            .collect::<Vec<_>>()
            .join("\n\n");
        self.template.replace("{input}", input).replace("{context}", &context)
    }
}

#[async_trait]
impl Node for AnswerNode {
    async fn run(&self, state: State, _ctx: NodeContext) -> std::result::Result<Value, BoxError> {
        let input = question(&state)?;
        let passages: Vec<Passage> = match state.get(CONTEXT) {
            Some(value) => serde_json::from_value(value.clone())?,
            None => Vec::new(),
        };

        let prompt = Message::human(self.render(&passages, &input));
        let reply = self.model.complete(&[prompt], &[]).await?;
        Ok(messages::update(vec![reply]))
    }
}

/// Builder for the retrieve-then-answer graph
pub struct RagChainConfig {
    model: Arc<dyn ChatModel>,
    retriever: Arc<dyn Retriever>,
    template: String,
    options: GraphOptions,
}

impl RagChainConfig {
    pub fn new(model: Arc<dyn ChatModel>, retriever: Arc<dyn Retriever>) -> Self {
        Self {
            model,
            retriever,
            template: RAG_PROMPT.to_string(),
            options: GraphOptions::default(),
        }
    }

    /// Replace [`RAG_PROMPT`]; the template should mention `{context}` and `{input}`
    pub fn with_prompt(mut self, template: impl Into<String>) -> Self {
        self.template = template.into();
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
        graph.add_channel(CONTEXT, Arc::new(OverwriteReducer));
        graph.add_node_instance(
            "retrieve",
            RetrieveNode {
                retriever: self.retriever,
            },
        );
        graph.add_node_instance(
            "answer",
            AnswerNode {
                model: self.model,
                template: self.template,
            },
        );
        graph.add_edge(START, "retrieve");
        graph.add_edge("retrieve", "answer");
        graph.add_edge("answer", END);
        Ok(self.options.apply(graph.compile()?))
    }
}

/// Start configuring a retrieval chain over `retriever`, answering with `model`
pub fn create_rag_chain(model: Arc<dyn ChatModel>, retriever: Arc<dyn Retriever>) -> RagChainConfig {
    RagChainConfig::new(model, retriever)
}
