//! Conversation messages carried in the `messages` channel
//!
//! Agent graphs keep their history as an append-only list of [`Message`]
//! values under the [`MESSAGES`] channel. Messages serialize to plain JSON so
//! they survive checkpointing unchanged:
//!
//! ```json
//! {"id": "…", "role": "ai", "content": "", "tool_calls": [{"id": "call_1", "name": "lookup_policy", "args": {"query": "refunds"}}]}
//! ```
//!
//! # Example
//!
//! ```rust
//! use flowstate_core::messages::{self, Message, MessageRole, ToolCall};
//! use serde_json::json;
//!
//! let question = Message::human("Can I get a refund?");
//! let call = Message::ai("").with_tool_calls(vec![ToolCall::new(
//!     "call_1",
//!     "lookup_policy",
//!     json!({"query": "refund"}),
//! )]);
//!
//! let update = messages::update(vec![question, call]);
//! let state = update.as_object().unwrap().clone();
//!
//! let history = messages::read(&state).unwrap();
//! assert_eq!(history.len(), 2);
//! assert_eq!(history[1].role, MessageRole::Ai);
//! assert!(messages::last(&state).unwrap().unwrap().has_tool_calls());
//! ```

use crate::state::State;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use uuid::Uuid;

/// Channel name used for message history
pub const MESSAGES: &str = "messages";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    /// Instructions prepended by the application
    System,
    Human,
    /// Model output, possibly carrying tool calls
    Ai,
    /// Result of one tool call, linked by `tool_call_id`
    Tool,
}

/// Message payload: plain text or an arbitrary structured value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MessageContent {
    Text(String),
    Structured(Value),
}

impl From<String> for MessageContent {
    fn from(s: String) -> Self {
        Self::Text(s)
    }
}

impl From<&str> for MessageContent {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}

impl From<Value> for MessageContent {
    fn from(value: Value) -> Self {
        match value {
            Value::String(s) => Self::Text(s),
            other => Self::Structured(other),
        }
    }
}

/// A model's request to invoke a tool
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    pub id: String,
    pub name: String,
    /// Tool arguments (JSON object)
    pub args: Value,
}

impl ToolCall {
    pub fn new(id: impl Into<String>, name: impl Into<String>, args: Value) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            args,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    pub role: MessageRole,

    pub content: MessageContent,

    /// Name of the agent or tool that produced the message
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolCall>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
}

impl Message {
    pub fn new(role: MessageRole, content: impl Into<MessageContent>) -> Self {
        Self {
            id: Some(Uuid::new_v4().to_string()),
            role,
            content: content.into(),
            name: None,
            tool_calls: Vec::new(),
            tool_call_id: None,
        }
    }

    pub fn system(content: impl Into<MessageContent>) -> Self {
        Self::new(MessageRole::System, content)
    }

    pub fn human(content: impl Into<MessageContent>) -> Self {
        Self::new(MessageRole::Human, content)
    }

    pub fn ai(content: impl Into<MessageContent>) -> Self {
        Self::new(MessageRole::Ai, content)
    }

    /// Create a tool result answering the call with `tool_call_id`
    pub fn tool(content: impl Into<MessageContent>, tool_call_id: impl Into<String>) -> Self {
        let mut message = Self::new(MessageRole::Tool, content);
        message.tool_call_id = Some(tool_call_id.into());
        message
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_tool_calls(mut self, tool_calls: Vec<ToolCall>) -> Self {
        self.tool_calls = tool_calls;
        self
    }

    /// Text content, if this is a text message
    pub fn text(&self) -> Option<&str> {
        match &self.content {
            MessageContent::Text(s) => Some(s),
            MessageContent::Structured(_) => None,
        }
    }

    /// Content rendered as a string (structured content as compact JSON)
    pub fn content_string(&self) -> String {
        match &self.content {
            MessageContent::Text(s) => s.clone(),
            MessageContent::Structured(value) => value.to_string(),
        }
    }

    pub fn has_tool_calls(&self) -> bool {
        !self.tool_calls.is_empty()
    }
}

/// Decode the message history of a state (empty when the channel is absent)
pub fn read(state: &State) -> Result<Vec<Message>, serde_json::Error> {
    match state.get(MESSAGES) {
        Some(value) if !value.is_null() => serde_json::from_value(value.clone()),
        _ => Ok(Vec::new()),
    }
}

/// Last message of the history
pub fn last(state: &State) -> Result<Option<Message>, serde_json::Error> {
    Ok(read(state)?.pop())
}

/// Node output appending `messages` to the history
pub fn update(messages: Vec<Message>) -> Value {
    json!({ MESSAGES: messages })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_wire_names() {
        let message = Message::ai("hello").with_id("m1");
        let encoded = serde_json::to_value(&message).unwrap();
        assert_eq!(encoded, json!({"id": "m1", "role": "ai", "content": "hello"}));
    }

    #[test]
    fn test_structured_content_round_trips() {
        let message = Message::tool(json!({"passages": ["a", "b"]}), "call_1");
        let decoded: Message = serde_json::from_value(serde_json::to_value(&message).unwrap()).unwrap();
        assert_eq!(decoded, message);
        assert_eq!(decoded.text(), None);
        assert_eq!(decoded.content_string(), r#"{"passages":["a","b"]}"#);
    }

    #[test]
    fn test_read_missing_channel() {
        let state = State::new();
        assert!(read(&state).unwrap().is_empty());
        assert!(last(&state).unwrap().is_none());
    }

    #[test]
    fn test_read_rejects_malformed_history() {
        let mut state = State::new();
        state.insert(MESSAGES.to_string(), json!([{"role": "robot", "content": "?"}]));
        assert!(read(&state).is_err());
    }
}
