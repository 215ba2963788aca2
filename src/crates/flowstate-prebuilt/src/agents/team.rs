//! Research team: a researcher with tools hands over to a writer

use super::{AgentNode, GraphOptions};
use crate::error::Result;
use crate::model::ChatModel;
use crate::tool_node::{tools_condition, ToolNode};
use crate::tools::ToolRegistry;
use flowstate_checkpoint::CheckpointSaver;
use flowstate_core::{CompiledGraph, State, StateGraph, END, START};
use std::sync::Arc;

pub const RESEARCHER_PROMPT: &str = "You are a researcher. You have access to a search tool. \
     Find information about the user's topic.";

pub const WRITER_PROMPT: &str = "You are a writer. Write a short blog post based on the research \
     provided in the conversation history. Do not use tools.";

/// Builder for the researcher/writer graph
///
/// ```text
///   START → researcher ──(tool calls)──→ tools ──→ researcher
///           researcher ──(otherwise)───→ writer ──→ END
/// ```
///
/// Both roles may share one model; the writer is never offered tools.
pub struct ResearchTeamConfig {
    researcher: Arc<dyn ChatModel>,
    writer: Arc<dyn ChatModel>,
    tools: ToolRegistry,
    researcher_prompt: String,
    writer_prompt: String,
    options: GraphOptions,
}

impl ResearchTeamConfig {
    pub fn new(model: Arc<dyn ChatModel>, tools: ToolRegistry) -> Self {
        Self {
            researcher: model.clone(),
            writer: model,
            tools,
            researcher_prompt: RESEARCHER_PROMPT.to_string(),
            writer_prompt: WRITER_PROMPT.to_string(),
            options: GraphOptions::default(),
        }
    }

    /// Use a separate model for the writer
    pub fn with_writer_model(mut self, model: Arc<dyn ChatModel>) -> Self {
        self.writer = model;
        self
    }

    pub fn with_researcher_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.researcher_prompt = prompt.into();
        self
    }

    pub fn with_writer_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.writer_prompt = prompt.into();
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
        let researcher = AgentNode::new(self.researcher)
            .with_system_prompt(self.researcher_prompt)
            .with_tools(self.tools.specs())
            .with_name("researcher");
        let writer = AgentNode::new(self.writer)
            .with_system_prompt(self.writer_prompt)
            .with_name("writer");

        let mut graph = StateGraph::with_messages();
        graph.add_node_instance("researcher", researcher);
        graph.add_node_instance("tools", ToolNode::new(Arc::new(self.tools)));
        graph.add_node_instance("writer", writer);

        graph.add_edge(START, "researcher");
        graph.add_conditional_edges("researcher", route_researcher, ["tools", "writer"]);
        graph.add_edge("tools", "researcher");
        graph.add_edge("writer", END);

        Ok(self.options.apply(graph.compile()?))
    }
}

fn route_researcher(state: &State) -> String {
    match tools_condition(state).as_str() {
        "tools" => "tools".to_string(),
        _ => "writer".to_string(),
    }
}

/// Start configuring a research team sharing `model` between both roles
pub fn create_research_team(model: Arc<dyn ChatModel>, tools: ToolRegistry) -> ResearchTeamConfig {
    ResearchTeamConfig::new(model, tools)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ScriptedChatModel;
    use crate::tools::FnTool;
    use flowstate_core::{messages, Message, MessageRole, ToolCall};
    use serde_json::json;

    fn search_tool() -> ToolRegistry {
        let mut tools = ToolRegistry::new();
        tools.register(FnTool::new("search_tool", "Search the web for information.", |_| {
            Box::pin(async {
                Ok(json!("LangGraph is a library for building stateful, multi-actor applications with LLMs."))
            })
        }));
        tools
    }

    #[tokio::test]
    async fn test_research_then_write() {
        let researcher = ScriptedChatModel::new()
            .reply(Message::ai("").with_tool_calls(vec![ToolCall::new("c1", "search_tool", json!({"query": "LangGraph"}))]))
            .reply(Message::ai("LangGraph builds stateful multi-actor apps."));
        let writer = ScriptedChatModel::new().reply(Message::ai("# LangGraph in five minutes"));

        let team = create_research_team(Arc::new(researcher.clone()), search_tool())
            .with_writer_model(Arc::new(writer.clone()))
            .build()
            .unwrap();

        let result = team
            .invoke(messages::update(vec![Message::human("Research LangGraph and write a blog post.")]), "t")
            .await
            .unwrap();
        assert!(result.is_completed());

        let history = messages::read(result.values()).unwrap();
        let speakers: Vec<(MessageRole, Option<&str>)> =
            history.iter().map(|m| (m.role, m.name.as_deref())).collect();
        assert_eq!(
            speakers,
            vec![
                (MessageRole::Human, None),
                (MessageRole::Ai, Some("researcher")),
                (MessageRole::Tool, Some("search_tool")),
                (MessageRole::Ai, Some("researcher")),
                (MessageRole::Ai, Some("writer")),
            ]
        );

        let writer_call = &writer.calls()[0];
        assert_eq!(writer_call.messages[0].content_string(), WRITER_PROMPT);
        assert!(writer_call.tools.is_empty());
        assert_eq!(researcher.calls()[0].tools, vec!["search_tool".to_string()]);
    }

    #[tokio::test]
    async fn test_writer_follows_researcher_without_tools() {
        let model = ScriptedChatModel::new()
            .reply(Message::ai("Nothing to look up."))
            .reply(Message::ai("Short post."));
        let team = create_research_team(Arc::new(model), search_tool()).build().unwrap();

        let result = team.invoke(messages::update(vec![Message::human("Write")]), "t").await.unwrap();
        let last = messages::last(result.values()).unwrap().unwrap();
        assert_eq!(last.content_string(), "Short post.");
        assert_eq!(last.name.as_deref(), Some("writer"));
    }
}
