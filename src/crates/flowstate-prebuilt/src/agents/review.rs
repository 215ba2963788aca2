//! Human review workflow
//!
//! An agent drafts a reply, then the run pauses before `human_review` so a
//! person can read the draft. Resuming delivers their verdict to the review
//! node, which records it in the `feedback` channel.
//!
//! ```text
//!   START → agent → ⏸ human_review → END
//! ```
//!
//! ```rust
//! use flowstate_core::{messages, Message};
//! use flowstate_prebuilt::{create_review_workflow, ScriptedChatModel, HUMAN_REVIEW};
//! use serde_json::json;
//! use std::sync::Arc;
//!
//! # #[tokio::main]
//! # async fn main() -> flowstate_prebuilt::Result<()> {
//! let model = ScriptedChatModel::new().reply(Message::ai("LangGraph: graphs for agents."));
//! let workflow = create_review_workflow(Arc::new(model)).build()?;
//!
//! let paused = workflow
//!     .invoke(messages::update(vec![Message::human("Draft a tweet about LangGraph.")]), "thread-1")
//!     .await?;
//! assert_eq!(paused.pending(), [HUMAN_REVIEW.to_string()]);
//!
//! let done = workflow.resume("thread-1", json!("Approved")).await?;
//! assert_eq!(done.values()["feedback"], json!("Approved"));
//! # Ok(())
//! # }
//! ```

use super::{AgentNode, GraphOptions};
use crate::error::Result;
use crate::model::ChatModel;
use flowstate_checkpoint::CheckpointSaver;
use flowstate_core::{
    CompiledGraph, InterruptConfig, NodeContext, NodeFuture, OverwriteReducer, ResumeMode, State, StateGraph,
    END, START,
};
use serde_json::{json, Value};
use std::sync::Arc;

pub const HUMAN_REVIEW: &str = "human_review";

/// Channel holding the reviewer's verdict
pub const FEEDBACK: &str = "feedback";

/// Builder for the draft-and-review graph
pub struct ReviewWorkflowConfig {
    model: Arc<dyn ChatModel>,
    system_prompt: Option<String>,
    options: GraphOptions,
}

impl ReviewWorkflowConfig {
    pub fn new(model: Arc<dyn ChatModel>) -> Self {
        Self {
            model,
            system_prompt: None,
            options: GraphOptions::default(),
        }
    }

    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = Some(prompt.into());
        self
    }

    /// Needed for reviews that happen in another process
    pub fn with_checkpointer(mut self, saver: Arc<dyn CheckpointSaver>) -> Self {
        self.options.checkpointer = Some(saver);
        self
    }

    pub fn build(self) -> Result<CompiledGraph> {
        let mut agent = AgentNode::new(self.model);
        if let Some(prompt) = self.system_prompt {
            agent = agent.with_system_prompt(prompt);
        }

        let mut graph = StateGraph::with_messages();
        graph.add_channel(FEEDBACK, Arc::new(OverwriteReducer));
        graph.add_node_instance("agent", agent);
        graph.add_node_with_context(HUMAN_REVIEW, record_feedback);
        graph.add_edge(START, "agent");
        graph.add_edge("agent", HUMAN_REVIEW);
        graph.add_edge(HUMAN_REVIEW, END);

        let interrupts = InterruptConfig::new()
            .with_interrupt_before(vec![HUMAN_REVIEW.to_string()])
            .with_resume_mode(HUMAN_REVIEW, ResumeMode::PassToNode);
        Ok(self.options.apply(graph.compile_with_interrupts(interrupts)?))
    }
}

fn record_feedback(_state: State, ctx: NodeContext) -> NodeFuture {
    let verdict = ctx.resume_value().cloned();
    Box::pin(async move {
        tracing::debug!(thread_id = %ctx.thread_id(), verdict = ?verdict, "Human review");
        Ok(match verdict {
            Some(value) => json!({ FEEDBACK: value }),
            None => Value::Null,
        })
    })
}

/// Start configuring a review workflow drafting with `model`
pub fn create_review_workflow(model: Arc<dyn ChatModel>) -> ReviewWorkflowConfig {
    ReviewWorkflowConfig::new(model)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ScriptedChatModel;
    use flowstate_core::{messages, Message, ThreadStatus};

    fn workflow() -> CompiledGraph {
        let model = ScriptedChatModel::new().reply(Message::ai("LangGraph makes agents stateful. #rust"));
        create_review_workflow(Arc::new(model)).build().unwrap()
    }

    #[tokio::test]
    async fn test_pauses_with_draft_visible() {
        let workflow = workflow();
        let result = workflow
            .invoke(messages::update(vec![Message::human("Draft a tweet about LangGraph.")]), "t")
            .await
            .unwrap();
        assert!(result.is_interrupted());

        let snapshot = workflow.get_state("t").await.unwrap().unwrap();
        assert_eq!(snapshot.status, ThreadStatus::Interrupted);
        assert_eq!(snapshot.next, vec![HUMAN_REVIEW.to_string()]);
        let draft = messages::last(&snapshot.values).unwrap().unwrap();
        assert_eq!(draft.content_string(), "LangGraph makes agents stateful. #rust");
        assert!(!snapshot.values.contains_key(FEEDBACK));
    }

    #[tokio::test]
    async fn test_resume_records_verdict() {
        let workflow = workflow();
        workflow
            .invoke(messages::update(vec![Message::human("Draft a tweet about LangGraph.")]), "t")
            .await
            .unwrap();

        let result = workflow.resume("t", json!("Approved")).await.unwrap();
        assert!(result.is_completed());
        assert_eq!(result.values()[FEEDBACK], json!("Approved"));
        assert_eq!(messages::read(result.values()).unwrap().len(), 2);
    }
}
