//! Demo scenarios run by the CLI
//!
//! Each scenario is one of the prebuilt graphs driven by a scripted model, so
//! it runs offline and always takes the same path:
//!
//! | scenario | graph | model script |
//! |----------|-------|--------------|
//! | `chat` | agent | answer without documents |
//! | `rag` | retrieve → answer | answer from the first passage in the prompt |
//! | `react` | agent ⇄ tools | look the question up, then answer from the passages |
//! | `team` | researcher ⇄ tools → writer | search the topic, take notes, write a post |
//! | `review` | agent → ⏸ human_review | draft a reply, wait for a verdict |

use flowstate_checkpoint::CheckpointSaver;
use flowstate_core::{messages, CompiledGraph, Message, MessageRole, ToolCall};
use flowstate_prebuilt::{
    create_chat_agent, create_rag_chain, create_react_agent, create_research_team, create_review_workflow,
    KeywordRetriever, Result, RetrieverTool, ScriptedChatModel, ToolRegistry,
};
use serde_json::{json, Value};
use std::fmt;
use std::sync::Arc;

/// Reference text the demo tools search
pub const KNOWLEDGE: &str = "\
LangGraph is a library for building stateful, multi-actor applications with LLMs. \
It is built on top of LangChain.

LangGraph is inspired by Pregel and Apache Beam. \
The public interface draws inspiration from NetworkX.

Graphs are made of nodes connected by edges. Conditional edges pick the next node from the current state.

A checkpointer saves the state after every step, so a run can pause for human review and resume later, \
even in another process.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum Scenario {
    /// One model call under a system prompt
    Chat,
    /// Retrieve passages, then answer from them
    Rag,
    /// Single agent answering with a lookup tool
    React,
    /// Researcher with a search tool handing over to a writer
    Team,
    /// Agent draft paused for human approval
    Review,
}

impl fmt::Display for Scenario {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Scenario::Chat => "chat",
            Scenario::Rag => "rag",
            Scenario::React => "react",
            Scenario::Team => "team",
            Scenario::Review => "review",
        };
        write!(f, "{}", name)
    }
}

impl Scenario {
    /// Compile the scenario's graph over `saver`
    pub fn build(self, saver: Arc<dyn CheckpointSaver>, recursion_limit: usize) -> Result<CompiledGraph> {
        let graph = match self {
            Scenario::Chat => create_chat_agent(Arc::new(chat_model()))
                .with_checkpointer(saver)
                .with_recursion_limit(recursion_limit)
                .build()?,
            Scenario::Rag => create_rag_chain(Arc::new(rag_model()), knowledge())
                .with_checkpointer(saver)
                .with_recursion_limit(recursion_limit)
                .build()?,
            Scenario::React => create_react_agent(Arc::new(react_model()), lookup_tools())
                .with_checkpointer(saver)
                .with_recursion_limit(recursion_limit)
                .build()?,
            Scenario::Team => create_research_team(Arc::new(researcher_model()), search_tools())
                .with_writer_model(Arc::new(writer_model()))
                .with_checkpointer(saver)
                .with_recursion_limit(recursion_limit)
                .build()?,
            Scenario::Review => create_review_workflow(Arc::new(review_model()))
                .with_checkpointer(saver)
                .build()?
                .with_recursion_limit(recursion_limit),
        };
        tracing::debug!(scenario = %self, "Scenario graph ready");
        Ok(graph)
    }
}

/// Input appending one human message
pub fn human_input(text: &str) -> Value {
    messages::update(vec![Message::human(text)])
}

fn knowledge() -> Arc<KeywordRetriever> {
    Arc::new(KeywordRetriever::from_text(KNOWLEDGE))
}

fn lookup_tools() -> ToolRegistry {
    let mut tools = ToolRegistry::new();
    tools.register(RetrieverTool::new(
        "lookup_policy",
        "Ask this tool questions about LangGraph.",
        knowledge(),
    ));
    tools
}

fn search_tools() -> ToolRegistry {
    let mut tools = ToolRegistry::new();
    let retriever = RetrieverTool::new("search_tool", "Search the web for information.", knowledge());
    tools.register(retriever);
    tools
}

fn last_text(history: &[Message], role: MessageRole) -> String {
    history
        .iter()
        .rev()
        .find(|m| m.role == role)
        .map(|m| m.content_string())
        .unwrap_or_default()
}

fn call(tool: &str, query: String) -> Message {
    Message::ai("").with_tool_calls(vec![ToolCall::new("call_1", tool, json!({ "query": query }))])
}

fn chat_model() -> ScriptedChatModel {
    ScriptedChatModel::new().respond(|history| {
        let question = last_text(history, MessageRole::Human);
        Message::ai(format!(
            "I have no documents to answer \"{}\" from. Try `flowstate rag` for answers from the knowledge base.",
            question
        ))
    })
}

fn rag_model() -> ScriptedChatModel {
    ScriptedChatModel::new().respond(|history| {
        let prompt = last_text(history, MessageRole::Human);
        let context = prompt
            .split_once("<context>\n")
            .and_then(|(_, rest)| rest.split_once("\n</context>"))
            .map(|(context, _)| context.trim())
            .unwrap_or_default();
        match context.split("\n\n").next().filter(|p| !p.is_empty()) {
            Some(passage) => Message::ai(format!("Based on the context: {}", passage)),
            None => Message::ai("The context does not cover that."),
        }
    })
}

fn react_model() -> ScriptedChatModel {
    ScriptedChatModel::new()
        .respond(|history| call("lookup_policy", last_text(history, MessageRole::Human)))
        .respond(|history| {
            let found = last_text(history, MessageRole::Tool);
            if found.is_empty() {
                Message::ai("I could not find anything about that.")
            } else {
                Message::ai(format!("Here is what I found:\n{}", found))
            }
        })
}

fn researcher_model() -> ScriptedChatModel {
    ScriptedChatModel::new()
        .respond(|history| call("search_tool", last_text(history, MessageRole::Human)))
        .respond(|history| Message::ai(format!("Research notes: {}", last_text(history, MessageRole::Tool))))
}

fn writer_model() -> ScriptedChatModel {
    ScriptedChatModel::new().respond(|history| {
        let topic = last_text(history, MessageRole::Human);
        let notes = last_text(history, MessageRole::Ai);
        let body = notes.strip_prefix("Research notes: ").unwrap_or(&notes).to_string();
        Message::ai(format!("# {}\n\n{}", topic.trim_end_matches('.'), body))
    })
}

fn review_model() -> ScriptedChatModel {
    ScriptedChatModel::new().respond(|history| {
        let request = last_text(history, MessageRole::Human);
        Message::ai(format!(
            "Draft ({}): Stateful agents that pause for a human and pick up where they left off. #LangGraph",
            request.trim_end_matches('.')
        ))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use flowstate_checkpoint::InMemoryCheckpointSaver;

    fn saver() -> Arc<dyn CheckpointSaver> {
        Arc::new(InMemoryCheckpointSaver::new())
    }

    #[tokio::test]
    async fn test_react_answers_from_knowledge() {
        let graph = Scenario::React.build(saver(), 25).unwrap();
        let result = graph.invoke(human_input("What is LangGraph inspired by?"), "t").await.unwrap();

        let answer = messages::last(result.values()).unwrap().unwrap();
        assert!(answer.content_string().starts_with("Here is what I found:"));
        assert!(answer.content_string().contains("Pregel"));
        assert_eq!(messages::read(result.values()).unwrap().len(), 4);
    }

    #[tokio::test]
    async fn test_team_writes_post() {
        let graph = Scenario::Team.build(saver(), 25).unwrap();
        let result = graph
            .invoke(human_input("Research LangGraph and write a blog post."), "t")
            .await
            .unwrap();

        let post = messages::last(result.values()).unwrap().unwrap();
        assert_eq!(post.name.as_deref(), Some("writer"));
        assert!(post.content_string().starts_with("# Research LangGraph and write a blog post\n\n"));
    }

    #[tokio::test]
    async fn test_review_pauses() {
        let graph = Scenario::Review.build(saver(), 25).unwrap();
        let result = graph.invoke(human_input("Draft a tweet about LangGraph."), "t").await.unwrap();
        assert!(result.is_interrupted());
        assert_eq!(graph.config().recursion_limit, 25);
    }

    #[tokio::test]
    async fn test_chat_answers_without_tools() {
        let graph = Scenario::Chat.build(saver(), 25).unwrap();
        let result = graph.invoke(human_input("What is LangGraph?"), "t").await.unwrap();

        let history = messages::read(result.values()).unwrap();
        assert_eq!(history.len(), 2);
        assert!(history[1].content_string().contains("\"What is LangGraph?\""));
    }

    #[tokio::test]
    async fn test_rag_answers_from_retrieved_passage() {
        let graph = Scenario::Rag.build(saver(), 25).unwrap();
        let result = graph.invoke(human_input("What is LangGraph inspired by?"), "t").await.unwrap();

        let answer = messages::last(result.values()).unwrap().unwrap();
        assert_eq!(
            answer.content_string(),
            "Based on the context: LangGraph is inspired by Pregel and Apache Beam. \
             The public interface draws inspiration from NetworkX."
        );
        assert!(result.values()["context"].is_array());
    }

    #[test]
    fn test_scenario_names() {
        assert_eq!(Scenario::React.to_string(), "react");
        assert_eq!(Scenario::Review.to_string(), "review");
        assert_eq!(Scenario::Rag.to_string(), "rag");
    }
}
