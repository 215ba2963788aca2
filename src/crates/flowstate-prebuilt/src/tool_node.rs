//! ToolNode - graph node executing tool calls
//!
//! [`ToolNode`] bridges model tool calling and tool execution. When it runs,
//! it reads the last message of the `messages` channel, executes every tool
//! call on it concurrently and appends one `tool` message per call, in the
//! order the calls were made.
//!
//! ```text
//!   messages: [human "weather in Paris?",
//!              ai tool_calls=[{id: c1, name: weather, args: {...}}]]
//!                      │
//!                      ↓ ToolNode
//!   messages: [..., tool "18°C, sunny" (tool_call_id: c1, name: weather)]
//! ```
//!
//! Paired with [`tools_condition`] this gives the usual agent loop:
//!
//! ```rust
//! use flowstate_core::{StateGraph, END, START};
//! use flowstate_prebuilt::{tools_condition, ToolNode, ToolRegistry};
//! use serde_json::Value;
//! use std::sync::Arc;
//!
//! let mut graph = StateGraph::with_messages();
//! graph.add_node("agent", |_| Box::pin(async { Ok(Value::Null) }));
//! graph.add_node_instance("tools", ToolNode::new(Arc::new(ToolRegistry::new())));
//! graph.add_edge(START, "agent");
//! graph.add_conditional_edges("agent", tools_condition, ["tools", END]);
//! graph.add_edge("tools", "agent");
//! assert!(graph.compile().is_ok());
//! ```

use crate::error::{AgentError, Result};
use crate::tools::{ToolOutput, ToolRegistry};
use async_trait::async_trait;
use flowstate_core::{messages, BoxError, Message, MessageRole, Node, NodeContext, State, ToolCall, END};
use futures::future::join_all;
use serde_json::Value;
use std::sync::Arc;

/// Node running the tool calls of the last AI message
#[derive(Debug, Clone)]
pub struct ToolNode {
    registry: Arc<ToolRegistry>,
    /// Report tool failures to the model instead of failing the step
    handle_errors: bool,
}

impl ToolNode {
    pub fn new(registry: Arc<ToolRegistry>) -> Self {
        Self {
            registry,
            handle_errors: true,
        }
    }

    /// Default `true`: a failing call becomes an `Error: ...` tool message.
    /// With `false` the first failure fails the node.
    pub fn with_error_handling(mut self, handle_errors: bool) -> Self {
        self.handle_errors = handle_errors;
        self
    }

    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }

    /// Execute the calls and build the tool messages, in call order
    pub async fn execute(&self, calls: &[ToolCall]) -> Result<Vec<Message>> {
        let results = join_all(calls.iter().map(|call| async move {
            tracing::debug!(tool = %call.name, call_id = %call.id, "Executing tool call");
            (call, self.registry.invoke(&call.name, call.args.clone()).await)
        }))
        .await;

        let mut messages = Vec::with_capacity(results.len());
        for (call, result) in results {
            let content = match result {
                Ok(output) => render_output(output),
                Err(err) if self.handle_errors => {
                    tracing::warn!(tool = %call.name, error = %err, "Tool call failed");
                    format!("Error: {}", err)
                }
                Err(err) => return Err(err),
            };
            messages.push(Message::tool(content, call.id.clone()).with_name(call.name.clone()));
        }
        Ok(messages)
    }
}

fn render_output(output: ToolOutput) -> String {
    match output {
        Value::String(text) => text,
        other => other.to_string(),
    }
}

fn pending_calls(state: &State) -> std::result::Result<Vec<ToolCall>, serde_json::Error> {
    Ok(match messages::last(state)? {
        Some(message) if message.role == MessageRole::Ai => message.tool_calls,
        _ => Vec::new(),
    })
}

#[async_trait]
impl Node for ToolNode {
    async fn run(&self, state: State, _ctx: NodeContext) -> std::result::Result<Value, BoxError> {
        let calls = pending_calls(&state).map_err(AgentError::from)?;
        if calls.is_empty() {
            return Ok(Value::Null);
        }
        let results = self.execute(&calls).await?;
        Ok(messages::update(results))
    }
}

/// Router sending the graph to `"tools"` when the last message is an AI
/// message with tool calls, and to `END` otherwise
pub fn tools_condition(state: &State) -> String {
    match pending_calls(state) {
        Ok(calls) if !calls.is_empty() => "tools".to_string(),
        _ => END.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::FnTool;
    use serde_json::json;

    fn registry() -> Arc<ToolRegistry> {
        let mut registry = ToolRegistry::new();
        registry.register(FnTool::new("slow_echo", "Echo after a delay", |args| {
            Box::pin(async move {
                tokio::time::sleep(std::time::Duration::from_millis(20)).await;
                Ok(args["text"].clone())
            })
        }));
        registry.register(FnTool::new("count", "Count keys", |args| {
            Box::pin(async move { Ok(json!({"keys": args.as_object().map(|o| o.len()).unwrap_or(0)})) })
        }));
        registry.register(FnTool::new("broken", "Always fails", |_| {
            Box::pin(async { Err(AgentError::tool_execution("broken", "disk full")) })
        }));
        Arc::new(registry)
    }

    fn state_with(messages: Vec<Message>) -> State {
        let mut state = State::new();
        state.insert("messages".to_string(), serde_json::to_value(messages).unwrap());
        state
    }

    fn ai_calling(calls: Vec<ToolCall>) -> Message {
        Message::ai("").with_tool_calls(calls)
    }

    #[tokio::test]
    async fn test_results_in_call_order() {
        let node = ToolNode::new(registry());
        let state = state_with(vec![
            Message::human("go"),
            ai_calling(vec![
                ToolCall::new("c1", "slow_echo", json!({"text": "first"})),
                ToolCall::new("c2", "count", json!({"a": 1, "b": 2})),
            ]),
        ]);

        let output = node.run(state, NodeContext::new("t", 1)).await.unwrap();
        let results: Vec<Message> = serde_json::from_value(output["messages"].clone()).unwrap();

        assert_eq!(results.len(), 2);
        assert_eq!(results[0].tool_call_id.as_deref(), Some("c1"));
        assert_eq!(results[0].content_string(), "first");
        assert_eq!(results[0].name.as_deref(), Some("slow_echo"));
        assert_eq!(results[1].tool_call_id.as_deref(), Some("c2"));
        assert_eq!(results[1].content_string(), r#"{"keys":2}"#);
        assert!(results.iter().all(|m| m.role == MessageRole::Tool));
    }

    #[tokio::test]
    async fn test_errors_become_messages() {
        let node = ToolNode::new(registry());
        let calls = vec![
            ToolCall::new("c1", "broken", json!({})),
            ToolCall::new("c2", "missing", json!({})),
        ];

        let results = node.execute(&calls).await.unwrap();
        assert_eq!(results[0].content_string(), "Error: Tool 'broken' failed: disk full");
        assert_eq!(results[1].content_string(), "Error: Unknown tool: missing");
    }

    #[tokio::test]
    async fn test_errors_propagate_without_handling() {
        let node = ToolNode::new(registry()).with_error_handling(false);
        let state = state_with(vec![ai_calling(vec![ToolCall::new("c1", "broken", json!({}))])]);

        let err = node.run(state, NodeContext::new("t", 1)).await.unwrap_err();
        let agent_err = err.downcast_ref::<AgentError>().unwrap();
        assert!(matches!(agent_err, AgentError::ToolExecution { .. }));
    }

    #[tokio::test]
    async fn test_no_calls_no_update() {
        let node = ToolNode::new(registry());
        let state = state_with(vec![Message::human("hello")]);
        assert_eq!(node.run(state, NodeContext::new("t", 1)).await.unwrap(), Value::Null);
    }

    #[test]
    fn test_tools_condition() {
        let calling = state_with(vec![ai_calling(vec![ToolCall::new("c1", "count", json!({}))])]);
        assert_eq!(tools_condition(&calling), "tools");

        let answered = state_with(vec![Message::ai("done")]);
        assert_eq!(tools_condition(&answered), END);

        assert_eq!(tools_condition(&State::new()), END);
    }
}
