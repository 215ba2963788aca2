//! Simple graph example
//!
//! A two-step pipeline over a `value` channel, run on one thread.

use flowstate_core::{NodeFuture, State, StateGraph, END, START};
use serde_json::{json, Value};

fn value(state: &State) -> i64 {
    state.get("value").and_then(Value::as_i64).unwrap_or(0)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("=== Simple Graph Example ===\n");

    let mut graph = StateGraph::new();

    graph.add_node("add_ten", |state: State| -> NodeFuture {
        Box::pin(async move { Ok(json!({ "value": value(&state) + 10 })) })
    });
    graph.add_node("double", |state: State| -> NodeFuture {
        Box::pin(async move { Ok(json!({ "value": value(&state) * 2 })) })
    });

    graph.add_edge(START, "add_ten");
    graph.add_edge("add_ten", "double");
    graph.add_edge("double", END);

    let compiled = graph.compile()?;
    let result = compiled.invoke(json!({ "value": 5 }), "simple").await?;
    println!("Final value: {}", result.values()["value"]);

    for snapshot in compiled.get_state_history("simple").await? {
        println!(
            "step {} {:<9} writes={:?} value={}",
            snapshot.step, snapshot.status, snapshot.metadata.writes, snapshot.values["value"]
        );
    }
    Ok(())
}
