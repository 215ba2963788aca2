//! Human-in-the-loop example
//!
//! The run pauses before `review`; the snapshot shows the draft, and
//! `resume` hands the reviewer's verdict to the node.

use flowstate_core::{InterruptConfig, NodeContext, NodeFuture, State, StateGraph, END, START};
use serde_json::{json, Value};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let mut graph = StateGraph::new();
    graph.add_node("draft", |state: State| -> NodeFuture {
        Box::pin(async move {
            let topic = state.get("topic").and_then(Value::as_str).unwrap_or("something").to_string();
            Ok(json!({ "draft": format!("A short note about {}", topic) }))
        })
    });
    graph.add_node_with_context("review", |_state: State, ctx: NodeContext| -> NodeFuture {
        let verdict = ctx.resume_value().cloned().unwrap_or(Value::Null);
        Box::pin(async move { Ok(json!({ "verdict": verdict })) })
    });
    graph.add_edge(START, "draft");
    graph.add_edge("draft", "review");
    graph.add_edge("review", END);

    let compiled =
        graph.compile_with_interrupts(InterruptConfig::new().with_interrupt_before(vec!["review".to_string()]))?;

    let paused = compiled.invoke(json!({ "topic": "graphs" }), "review-1").await?;
    println!("paused before {:?}", paused.pending());

    if let Some(snapshot) = compiled.get_state("review-1").await? {
        println!("draft: {}", snapshot.values["draft"]);
    }

    let done = compiled.resume("review-1", json!("Approved")).await?;
    println!("verdict: {}", done.values()["verdict"]);
    Ok(())
}
