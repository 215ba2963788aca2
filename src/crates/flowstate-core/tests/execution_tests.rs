//! End-to-end execution behavior of compiled graphs

use flowstate_core::{
    messages, AppendReducer, GraphError, Message, NodeContext, NodeFuture, NodeSpec, RetryPolicy, RunResult,
    State, StateGraph, ThreadStatus, ToolCall, END, START,
};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

fn write(key: &'static str, value: Value) -> impl Fn(State) -> NodeFuture + Send + Sync {
    move |_state: State| -> NodeFuture {
        let value = value.clone();
        Box::pin(async move { Ok(json!({ key: value })) })
    }
}

fn log_entry(entry: &'static str) -> impl Fn(State) -> NodeFuture + Send + Sync {
    move |_state: State| -> NodeFuture { Box::pin(async move { Ok(json!({ "log": [entry] })) }) }
}

#[tokio::test]
async fn test_linear_graph_completes() {
    let mut graph = StateGraph::new();
    graph.add_node("a", write("a", json!(1)));
    graph.add_node("b", write("b", json!(2)));
    graph.add_edge(START, "a").add_edge("a", "b").add_edge("b", END);

    let compiled = graph.compile().unwrap();
    let result = compiled.invoke(json!({"input": "x"}), "linear").await.unwrap();

    assert!(result.is_completed());
    assert_eq!(result.values()["input"], json!("x"));
    assert_eq!(result.values()["a"], json!(1));
    assert_eq!(result.values()["b"], json!(2));

    let history = compiled.get_state_history("linear").await.unwrap();
    let steps: Vec<u64> = history.iter().map(|s| s.step).collect();
    assert_eq!(steps, vec![0, 1, 2]);
    assert_eq!(history[1].metadata.writes, vec!["a".to_string()]);
    assert_eq!(history[2].status, ThreadStatus::Completed);
    assert!(history[2].next.is_empty());
}

#[tokio::test]
async fn test_fan_out_merges_in_frontier_order() {
    let mut graph = StateGraph::new();
    graph.add_channel("log", Arc::new(AppendReducer));
    graph.add_node("split", log_entry("split"));
    graph.add_node_spec(NodeSpec::from_fn("slow", |_state, _ctx| {
        Box::pin(async {
            tokio::time::sleep(Duration::from_millis(30)).await;
            Ok(json!({ "log": ["slow"], "winner": "slow" }))
        })
    }));
    graph.add_node("fast", |_state: State| -> NodeFuture {
        Box::pin(async { Ok(json!({ "log": ["fast"], "winner": "fast" })) })
    });
    graph.add_node("join", log_entry("join"));
    graph.add_edge(START, "split");
    graph.add_edge("split", "slow").add_edge("split", "fast");
    graph.add_edge("slow", "join").add_edge("fast", "join");
    graph.add_edge("join", END);

    let compiled = graph.compile().unwrap();
    let result = compiled.invoke(json!({"log": []}), "fan").await.unwrap();

    assert_eq!(result.values()["log"], json!(["split", "slow", "fast", "join"]));
    // overwrite channel: the later node in frontier order wins
    assert_eq!(result.values()["winner"], json!("fast"));

    // join was scheduled once even though both branches lead to it
    let history = compiled.get_state_history("fan").await.unwrap();
    assert_eq!(history[2].next, vec!["join".to_string()]);
}

#[tokio::test]
async fn test_conditional_routing_uses_merged_state() {
    let mut graph = StateGraph::new();
    graph.add_node("count", |state: State| -> NodeFuture {
        Box::pin(async move {
            let n = state.get("n").and_then(Value::as_i64).unwrap_or(0);
            Ok(json!({ "n": n + 1 }))
        })
    });
    graph.add_edge(START, "count");
    graph.add_conditional_edges(
        "count",
        |state| {
            if state.get("n").and_then(Value::as_i64).unwrap_or(0) < 3 {
                "again".to_string()
            } else {
                "done".to_string()
            }
        },
        [("again", "count"), ("done", END)],
    );

    let compiled = graph.compile().unwrap();
    let result = compiled.invoke(json!({"n": 0}), "loop").await.unwrap();
    assert_eq!(result.values()["n"], json!(3));
    assert_eq!(result.snapshot().step, 3);
}

#[tokio::test]
async fn test_unreachable_node_rejected_at_compile() {
    let mut graph = StateGraph::new();
    graph.add_node("a", write("a", json!(1)));
    graph.add_node("orphan", write("o", json!(1)));
    graph.add_edge(START, "a").add_edge("a", END);
    graph.add_edge("orphan", END);

    let err = graph.compile().unwrap_err();
    assert!(matches!(err, GraphError::Validation(_)));
    assert!(err.to_string().contains("node 'orphan' is unreachable from START"));
}

#[tokio::test]
async fn test_branch_to_unknown_node_rejected_at_compile() {
    let mut graph = StateGraph::new();
    graph.add_node("a", write("a", json!(1)));
    graph.add_edge(START, "a");
    graph.add_conditional_edges("a", |_| "x".to_string(), [("x", "missing"), ("y", END)]);

    let err = graph.compile().unwrap_err();
    assert!(err.to_string().contains("edge target 'missing' from 'a' is not a node"));
}

#[tokio::test]
async fn test_router_outside_path_map_fails_run() {
    let mut graph = StateGraph::new();
    graph.add_node("a", write("a", json!(1)));
    graph.add_node("b", write("b", json!(1)));
    graph.add_edge(START, "a");
    graph.add_conditional_edges("a", |_| "sideways".to_string(), [("next", "b"), ("stop", END)]);
    graph.add_edge("b", END);

    let compiled = graph.compile().unwrap();
    let result = compiled.invoke(json!({}), "router").await.unwrap();

    match &result {
        RunResult::Failed { error, snapshot } => {
            assert!(matches!(error, GraphError::RouterTarget { target, .. } if target == "sideways"));
            assert_eq!(snapshot.status, ThreadStatus::Failed);
            // the failed step committed nothing
            assert!(snapshot.values.get("a").is_none());
            assert_eq!(snapshot.next, vec!["a".to_string()]);
        }
        other => panic!("expected failure, got {:?}", other),
    }
}

#[tokio::test]
async fn test_node_failure_checkpoint_and_repair() {
    let mut graph = StateGraph::new();
    graph.add_node("prepare", write("prepared", json!(true)));
    graph.add_node("charge", |state: State| -> NodeFuture {
        Box::pin(async move {
            match state.get("card").and_then(Value::as_str) {
                Some(card) => Ok(json!({ "receipt": format!("charged {}", card) })),
                None => Err("no card on file".into()),
            }
        })
    });
    graph.add_edge(START, "prepare").add_edge("prepare", "charge").add_edge("charge", END);
    let compiled = graph.compile().unwrap();

    let failed = compiled.invoke(json!({}), "order").await.unwrap();
    assert!(failed.is_failed());
    assert_eq!(failed.pending(), &["charge".to_string()]);
    let head = compiled.get_state("order").await.unwrap().unwrap();
    assert_eq!(head.status, ThreadStatus::Failed);
    assert_eq!(head.values["prepared"], json!(true));
    let error = head.metadata.error.clone().unwrap();
    assert!(error.contains("no card on file"));

    // a second invoke merges the patch and re-runs the failed frontier only
    let repaired = compiled.invoke(json!({"card": "visa"}), "order").await.unwrap();
    assert!(repaired.is_completed());
    assert_eq!(repaired.values()["receipt"], json!("charged visa"));

    let writes: Vec<Vec<String>> = compiled
        .get_state_history("order")
        .await
        .unwrap()
        .into_iter()
        .map(|s| s.metadata.writes)
        .collect();
    assert_eq!(
        writes,
        vec![
            vec![],
            vec!["prepare".to_string()],
            vec![],
            vec![],
            vec!["charge".to_string()]
        ]
    );
}

#[tokio::test]
async fn test_failed_fan_out_commits_no_sibling_writes() {
    let mut graph = StateGraph::new();
    graph.add_node("split", write("split", json!(true)));
    graph.add_node("ok", write("ok", json!(true)));
    graph.add_node("boom", |_state: State| -> NodeFuture { Box::pin(async { Err("boom".into()) }) });
    graph.add_edge(START, "split");
    graph.add_edge("split", "ok").add_edge("split", "boom");
    graph.add_edge("ok", END).add_edge("boom", END);

    let compiled = graph.compile().unwrap();
    let result = compiled.invoke(json!({}), "t").await.unwrap();

    assert!(result.is_failed());
    assert!(result.values().get("ok").is_none());
    assert_eq!(result.pending(), &["ok".to_string(), "boom".to_string()]);
}

#[tokio::test]
async fn test_non_object_output_is_invalid_update() {
    let mut graph = StateGraph::new();
    graph.add_node("bad", |_state: State| -> NodeFuture { Box::pin(async { Ok(json!(42)) }) });
    graph.add_edge(START, "bad").add_edge("bad", END);

    let result = graph.compile().unwrap().invoke(json!({}), "t").await.unwrap();
    match result {
        RunResult::Failed { error, .. } => {
            assert!(matches!(error, GraphError::InvalidUpdate { ref node, .. } if node == "bad"))
        }
        other => panic!("expected failure, got {:?}", other),
    }
}

#[tokio::test]
async fn test_declared_writes_are_enforced() {
    let mut graph = StateGraph::new();
    graph.add_node_spec(
        NodeSpec::from_fn("scoped", |_state, _ctx| Box::pin(async { Ok(json!({"secret": 1})) }))
            .with_writes(["public"]),
    );
    graph.add_edge(START, "scoped").add_edge("scoped", END);

    let result = graph.compile().unwrap().invoke(json!({}), "t").await.unwrap();
    let err = result.into_state().unwrap_err();
    assert!(err.to_string().contains("'secret' is not in the declared writes"));
}

#[tokio::test]
async fn test_recursion_limit() {
    let mut graph = StateGraph::new();
    graph.add_node("spin", |state: State| -> NodeFuture {
        Box::pin(async move {
            let n = state.get("n").and_then(Value::as_i64).unwrap_or(0);
            Ok(json!({ "n": n + 1 }))
        })
    });
    graph.add_edge(START, "spin");
    graph.add_conditional_edges("spin", |_| "more".to_string(), [("more", "spin"), ("stop", END)]);

    let compiled = graph.compile().unwrap().with_recursion_limit(5);
    let result = compiled.invoke(json!({"n": 0}), "spin").await.unwrap();

    match &result {
        RunResult::Failed { error, snapshot } => {
            assert!(matches!(error, GraphError::RecursionLimit { limit: 5 }));
            assert_eq!(snapshot.values["n"], json!(5));
            assert_eq!(snapshot.next, vec!["spin".to_string()]);
        }
        other => panic!("expected recursion failure, got {:?}", other),
    }
}

#[tokio::test]
async fn test_retry_policy_recovers_transient_failure() {
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = calls.clone();

    let mut graph = StateGraph::new();
    graph.add_node_spec(
        NodeSpec::from_fn("fetch", move |_state, _ctx| {
            let attempt = counter.fetch_add(1, Ordering::SeqCst);
            Box::pin(async move {
                if attempt == 0 {
                    Err("timeout".into())
                } else {
                    Ok(json!({"data": "ok"}))
                }
            })
        })
        .with_retry(RetryPolicy::new(3).with_initial_interval(0.001).with_jitter(false)),
    );
    graph.add_edge(START, "fetch").add_edge("fetch", END);

    let result = graph.compile().unwrap().invoke(json!({}), "t").await.unwrap();
    assert_eq!(result.values()["data"], json!("ok"));
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_concurrent_invoke_on_same_thread_is_busy() {
    let started = Arc::new(tokio::sync::Notify::new());
    let release = Arc::new(tokio::sync::Notify::new());
    let (started_tx, release_rx) = (started.clone(), release.clone());

    let mut graph = StateGraph::new();
    graph.add_node("wait", move |_state: State| -> NodeFuture {
        let started = started_tx.clone();
        let release = release_rx.clone();
        Box::pin(async move {
            started.notify_one();
            release.notified().await;
            Ok(json!({"done": true}))
        })
    });
    graph.add_edge(START, "wait").add_edge("wait", END);
    let compiled = graph.compile().unwrap();

    let runner = compiled.clone();
    let first = tokio::spawn(async move { runner.invoke(json!({}), "shared").await });
    started.notified().await;

    let err = compiled.invoke(json!({}), "shared").await.unwrap_err();
    assert!(matches!(err, GraphError::ThreadBusy(ref t) if t == "shared"));
    let err = compiled.update_state("shared", json!({}), None).await.unwrap_err();
    assert!(matches!(err, GraphError::ThreadBusy(_)));

    release.notify_one();
    let result = first.await.unwrap().unwrap();
    assert!(result.is_completed());

    // the claim is released once the first run returns
    let again = compiled.invoke(json!({}), "shared");
    release.notify_one();
    assert!(again.await.unwrap().is_completed());
}

/// Agent → tools → agent → end, driven by a scripted model
#[tokio::test]
async fn test_react_loop_produces_four_messages() {
    let turns = Arc::new(AtomicUsize::new(0));
    let agent_turns = turns.clone();

    let mut graph = StateGraph::with_messages();
    graph.add_node("agent", move |_state: State| -> NodeFuture {
        let turn = agent_turns.fetch_add(1, Ordering::SeqCst);
        Box::pin(async move {
            let reply = if turn == 0 {
                Message::ai("").with_tool_calls(vec![ToolCall::new(
                    "call-1",
                    "get_weather",
                    json!({"city": "Paris"}),
                )])
            } else {
                Message::ai("It is sunny in Paris.")
            };
            Ok(messages::update(vec![reply]))
        })
    });
    graph.add_node("tools", |state: State| -> NodeFuture {
        Box::pin(async move {
            let last = messages::last(&state)?.ok_or("no messages")?;
            let results = last
                .tool_calls
                .iter()
                .map(|call| Message::tool(format!("sunny in {}", call.args["city"].as_str().unwrap_or("?")), &call.id))
                .collect();
            Ok::<Value, flowstate_core::BoxError>(messages::update(results))
        })
    });
    graph.add_edge(START, "agent");
    graph.add_conditional_edges(
        "agent",
        |state| match messages::last(state) {
            Ok(Some(message)) if message.has_tool_calls() => "tools".to_string(),
            _ => END.to_string(),
        },
        ["tools", END],
    );
    graph.add_edge("tools", "agent");

    let compiled = graph.compile().unwrap();
    let input = messages::update(vec![Message::human("What's the weather in Paris?")]);
    let result = compiled.invoke(input, "react").await.unwrap();

    let history = messages::read(result.values()).unwrap();
    assert_eq!(history.len(), 4);
    assert_eq!(history[0].content_string(), "What's the weather in Paris?");
    assert!(history[1].has_tool_calls());
    assert_eq!(history[2].tool_call_id.as_deref(), Some("call-1"));
    assert_eq!(history[2].content_string(), "sunny in Paris");
    assert_eq!(history[3].content_string(), "It is sunny in Paris.");
    assert_eq!(turns.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_node_context_reports_step() {
    let mut graph = StateGraph::new();
    graph.add_node_with_context("first", |_state: State, ctx: NodeContext| -> NodeFuture {
        let step = ctx.step();
        Box::pin(async move { Ok(json!({ "first_step": step })) })
    });
    graph.add_node_with_context("second", |_state: State, ctx: NodeContext| -> NodeFuture {
        let step = ctx.step();
        Box::pin(async move { Ok(json!({ "second_step": step })) })
    });
    graph.add_edge(START, "first").add_edge("first", "second").add_edge("second", END);

    let result = graph.compile().unwrap().invoke(json!({}), "t").await.unwrap();
    assert_eq!(result.values()["first_step"], json!(1));
    assert_eq!(result.values()["second_step"], json!(2));
}
