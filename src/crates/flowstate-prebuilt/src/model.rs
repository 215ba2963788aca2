//! Chat model interface
//!
//! The engine never talks to a model provider itself. Anything that can turn
//! a conversation plus a list of tool specs into the next AI message
//! implements [`ChatModel`]; provider clients live outside this crate.
//!
//! [`ScriptedChatModel`] replays a fixed script and records what it was
//! asked, which is what the demos and tests run against.

use crate::error::{AgentError, Result};
use crate::tools::ToolSpec;
use async_trait::async_trait;
use flowstate_core::Message;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

#[async_trait]
pub trait ChatModel: Send + Sync {
    /// Produce the next AI message for `messages`, optionally requesting
    /// calls to `tools`
    async fn complete(&self, messages: &[Message], tools: &[ToolSpec]) -> Result<Message>;

    fn name(&self) -> &str {
        "chat-model"
    }
}

/// Function computing a reply from the conversation so far
pub type Responder = Arc<dyn Fn(&[Message]) -> Message + Send + Sync>;

enum Turn {
    Reply(Message),
    Respond(Responder),
}

/// One call the scripted model received
#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub messages: Vec<Message>,
    pub tools: Vec<String>,
}

/// Model that answers from a script, one entry per call
///
/// ```rust
/// use flowstate_core::{Message, ToolCall};
/// use flowstate_prebuilt::{ChatModel, ScriptedChatModel};
/// use serde_json::json;
///
/// # #[tokio::main]
/// # async fn main() -> flowstate_prebuilt::Result<()> {
/// let model = ScriptedChatModel::new()
///     .reply(Message::ai("").with_tool_calls(vec![ToolCall::new("c1", "search", json!({"query": "rust"}))]))
///     .respond(|history| Message::ai(format!("saw {} messages", history.len())));
///
/// let first = model.complete(&[Message::human("hi")], &[]).await?;
/// assert!(first.has_tool_calls());
/// let second = model.complete(&[Message::human("hi"), first], &[]).await?;
/// assert_eq!(second.content_string(), "saw 2 messages");
/// assert!(model.complete(&[], &[]).await.is_err());
/// # Ok(())
/// # }
/// ```
#[derive(Clone, Default)]
pub struct ScriptedChatModel {
    turns: Arc<Mutex<VecDeque<Turn>>>,
    calls: Arc<Mutex<Vec<RecordedCall>>>,
}

impl ScriptedChatModel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a fixed reply
    pub fn reply(self, message: Message) -> Self {
        self.push(Turn::Reply(message));
        self
    }

    /// Queue a reply computed from the messages of that call
    pub fn respond<F>(self, responder: F) -> Self
    where
        F: Fn(&[Message]) -> Message + Send + Sync + 'static,
    {
        self.push(Turn::Respond(Arc::new(responder)));
        self
    }

    fn push(&self, turn: Turn) {
        self.turns
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push_back(turn);
    }

    /// Replies still queued
    pub fn remaining(&self) -> usize {
        self.turns.lock().unwrap_or_else(|poisoned| poisoned.into_inner()).len()
    }

    /// Calls received so far, oldest first
    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().unwrap_or_else(|poisoned| poisoned.into_inner()).clone()
    }
}

#[async_trait]
impl ChatModel for ScriptedChatModel {
    async fn complete(&self, messages: &[Message], tools: &[ToolSpec]) -> Result<Message> {
        self.calls
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(RecordedCall {
                messages: messages.to_vec(),
                tools: tools.iter().map(|t| t.name.clone()).collect(),
            });

        let turn = self
            .turns
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .pop_front()
            .ok_or_else(|| AgentError::ModelInvocation("script exhausted".to_string()))?;

        Ok(match turn {
            Turn::Reply(message) => message,
            Turn::Respond(responder) => responder(messages),
        })
    }

    fn name(&self) -> &str {
        "scripted"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_records_calls_and_tools() {
        let model = ScriptedChatModel::new().reply(Message::ai("done"));
        let tools = vec![ToolSpec {
            name: "search".to_string(),
            description: "Search".to_string(),
            parameters: json!({"type": "object"}),
        }];

        let reply = model.complete(&[Message::human("q")], &tools).await.unwrap();
        assert_eq!(reply.content_string(), "done");

        let calls = model.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].messages[0].content_string(), "q");
        assert_eq!(calls[0].tools, vec!["search".to_string()]);
        assert_eq!(model.remaining(), 0);
    }

    #[tokio::test]
    async fn test_exhausted_script_is_model_error() {
        let model = ScriptedChatModel::new();
        let err = model.complete(&[], &[]).await.unwrap_err();
        assert_eq!(err.to_string(), "Model invocation failed: script exhausted");
    }

    #[tokio::test]
    async fn test_clones_share_script() {
        let model = ScriptedChatModel::new().reply(Message::ai("one")).reply(Message::ai("two"));
        let clone = model.clone();

        assert_eq!(clone.complete(&[], &[]).await.unwrap().content_string(), "one");
        assert_eq!(model.complete(&[], &[]).await.unwrap().content_string(), "two");
        assert_eq!(model.calls().len(), 2);
    }
}
