//! Conditional routing example
//!
//! A counter loops through `increment` until it reaches a target, then the
//! router sends it to `finish`.

use flowstate_core::{NodeFuture, State, StateGraph, END, START};
use serde_json::{json, Value};

fn count(state: &State) -> i64 {
    state.get("count").and_then(Value::as_i64).unwrap_or(0)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let mut graph = StateGraph::new();

    graph.add_node("increment", |state: State| -> NodeFuture {
        Box::pin(async move { Ok(json!({ "count": count(&state) + 1 })) })
    });
    graph.add_node("finish", |state: State| -> NodeFuture {
        Box::pin(async move { Ok(json!({ "summary": format!("counted to {}", count(&state)) })) })
    });

    graph.add_edge(START, "increment");
    graph.add_conditional_edges(
        "increment",
        |state: &State| {
            if count(state) < 3 { "again".to_string() } else { "done".to_string() }
        },
        [("again", "increment"), ("done", "finish")],
    );
    graph.add_edge("finish", END);

    let compiled = graph.compile()?;
    let state = compiled.invoke(json!({}), "counter").await?.into_state()?;
    println!("{}", state["summary"]);
    Ok(())
}
