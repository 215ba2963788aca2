//! Pausing, inspecting and resuming threads

use flowstate_core::{
    CompiledGraph, GraphError, InterruptConfig, InterruptWhen, NodeContext, NodeFuture, ResumeMode, State,
    StateGraph, ThreadStatus, END, START,
};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// START → a → b → END; `b` records how many times it ran and what it saw
fn two_step_graph(interrupts: InterruptConfig, b_runs: Arc<AtomicUsize>) -> CompiledGraph {
    let mut graph = StateGraph::new();
    graph.add_node("a", |_state: State| -> NodeFuture { Box::pin(async { Ok(json!({"a": "done"})) }) });
    graph.add_node_with_context("b", move |state: State, ctx: NodeContext| -> NodeFuture {
        b_runs.fetch_add(1, Ordering::SeqCst);
        let resume = ctx.resume_value().cloned().unwrap_or(Value::Null);
        Box::pin(async move {
            let approved = state.get("approved").cloned().unwrap_or(Value::Null);
            Ok(json!({ "b": "done", "b_resume": resume, "b_saw_approved": approved }))
        })
    });
    graph.add_edge(START, "a").add_edge("a", "b").add_edge("b", END);
    graph.compile_with_interrupts(interrupts).unwrap()
}

fn before_b() -> InterruptConfig {
    InterruptConfig::new().with_interrupt_before(vec!["b".to_string()])
}

#[tokio::test]
async fn test_interrupt_before_pauses_and_resumes() {
    let runs = Arc::new(AtomicUsize::new(0));
    let compiled = two_step_graph(before_b(), runs.clone());

    let paused = compiled.invoke(json!({}), "t").await.unwrap();
    assert!(paused.is_interrupted());
    assert_eq!(paused.pending(), &["b".to_string()]);
    assert_eq!(paused.values()["a"], json!("done"));
    assert_eq!(runs.load(Ordering::SeqCst), 0);

    let snapshot = compiled.get_state("t").await.unwrap().unwrap();
    assert_eq!(snapshot.status, ThreadStatus::Interrupted);
    assert_eq!(snapshot.next, vec!["b".to_string()]);
    let record = snapshot.interrupt().unwrap();
    assert_eq!(record.when, InterruptWhen::Before);
    assert_eq!(record.nodes, vec!["b".to_string()]);

    let done = compiled.resume("t", json!("go")).await.unwrap();
    assert!(done.is_completed());
    assert_eq!(done.values()["b"], json!("done"));
    assert_eq!(done.values()["b_resume"], json!("go"));
    assert_eq!(runs.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_get_state_is_side_effect_free() {
    let compiled = two_step_graph(before_b(), Arc::new(AtomicUsize::new(0)));
    compiled.invoke(json!({}), "t").await.unwrap();

    let first = compiled.get_state("t").await.unwrap();
    for _ in 0..5 {
        assert_eq!(compiled.get_state("t").await.unwrap(), first);
    }
    assert_eq!(compiled.get_state_history("t").await.unwrap().len(), 3);
}

#[tokio::test]
async fn test_resume_on_completed_thread_fails() {
    let compiled = two_step_graph(before_b(), Arc::new(AtomicUsize::new(0)));
    compiled.invoke(json!({}), "t").await.unwrap();
    compiled.resume("t", Value::Null).await.unwrap();

    let err = compiled.resume("t", Value::Null).await.unwrap_err();
    match err {
        GraphError::InvalidResume { thread_id, status } => {
            assert_eq!(thread_id, "t");
            assert_eq!(status, Some(ThreadStatus::Completed));
        }
        other => panic!("expected InvalidResume, got {}", other),
    }
}

#[tokio::test]
async fn test_resume_checkpoint_records_value() {
    let compiled = two_step_graph(before_b(), Arc::new(AtomicUsize::new(0)));
    compiled.invoke(json!({}), "t").await.unwrap();
    compiled.resume("t", json!({"note": "ok"})).await.unwrap();

    let history = compiled.get_state_history("t").await.unwrap();
    let resume = history
        .iter()
        .find(|s| s.metadata.resume.is_some())
        .expect("resume checkpoint");
    assert_eq!(resume.metadata.resume, Some(json!({"note": "ok"})));
    assert_eq!(resume.status, ThreadStatus::Running);
    assert_eq!(resume.next, vec!["b".to_string()]);
}

#[tokio::test]
async fn test_apply_as_patch_merges_into_state() {
    let runs = Arc::new(AtomicUsize::new(0));
    let compiled = two_step_graph(before_b().with_resume_mode("b", ResumeMode::ApplyAsPatch), runs);

    compiled.invoke(json!({}), "t").await.unwrap();
    let done = compiled.resume("t", json!({"approved": true})).await.unwrap();

    assert_eq!(done.values()["approved"], json!(true));
    assert_eq!(done.values()["b_saw_approved"], json!(true));
    assert_eq!(done.values()["b_resume"], Value::Null);
}

#[tokio::test]
async fn test_apply_as_patch_rejects_non_object() {
    let compiled = two_step_graph(
        before_b().with_resume_mode("b", ResumeMode::ApplyAsPatch),
        Arc::new(AtomicUsize::new(0)),
    );
    compiled.invoke(json!({}), "t").await.unwrap();

    let err = compiled.resume("t", json!("yes")).await.unwrap_err();
    assert!(matches!(err, GraphError::InvalidInput(_)));
    // still paused
    let snapshot = compiled.get_state("t").await.unwrap().unwrap();
    assert_eq!(snapshot.status, ThreadStatus::Interrupted);
}

#[tokio::test]
async fn test_as_node_output_skips_paused_node() {
    let runs = Arc::new(AtomicUsize::new(0));
    let compiled = two_step_graph(
        before_b().with_resume_mode("b", ResumeMode::AsNodeOutput),
        runs.clone(),
    );

    compiled.invoke(json!({}), "t").await.unwrap();
    let done = compiled.resume("t", json!({"b": "supplied by human"})).await.unwrap();

    assert!(done.is_completed());
    assert_eq!(done.values()["b"], json!("supplied by human"));
    assert!(done.values().get("b_resume").is_none());
    assert_eq!(runs.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_as_node_output_requires_pause_before() {
    let mut graph = StateGraph::new();
    graph.add_node("a", |_state: State| -> NodeFuture { Box::pin(async { Ok(Value::Null) }) });
    graph.add_edge(START, "a").add_edge("a", END);

    let err = graph
        .compile_with_interrupts(
            InterruptConfig::new()
                .with_interrupt_after(vec!["a".to_string()])
                .with_resume_mode("a", ResumeMode::AsNodeOutput),
        )
        .unwrap_err();
    assert!(matches!(err, GraphError::Validation(_)));
}

#[tokio::test]
async fn test_interrupt_after_pauses_following_step() {
    let runs = Arc::new(AtomicUsize::new(0));
    let compiled = two_step_graph(
        InterruptConfig::new().with_interrupt_after(vec!["a".to_string()]),
        runs.clone(),
    );

    let paused = compiled.invoke(json!({}), "t").await.unwrap();
    assert!(paused.is_interrupted());
    assert_eq!(paused.values()["a"], json!("done"));
    assert_eq!(paused.pending(), &["b".to_string()]);
    let record = paused.snapshot().interrupt().unwrap().clone();
    assert_eq!(record.when, InterruptWhen::After);
    assert_eq!(record.nodes, vec!["a".to_string()]);

    let done = compiled.resume("t", json!(7)).await.unwrap();
    assert!(done.is_completed());
    assert_eq!(done.values()["b_resume"], json!(7));
    assert_eq!(runs.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_interrupt_after_last_node_pauses_then_completes() {
    let runs = Arc::new(AtomicUsize::new(0));
    let compiled = two_step_graph(InterruptConfig::new().with_interrupt_after(vec!["b".to_string()]), runs.clone());

    let paused = compiled.invoke(json!({}), "t").await.unwrap();
    assert!(paused.is_interrupted());
    assert!(paused.pending().is_empty());
    assert_eq!(paused.values()["b"], json!("done"));
    let record = paused.snapshot().interrupt().unwrap().clone();
    assert_eq!(record.when, InterruptWhen::After);
    assert_eq!(record.nodes, vec!["b".to_string()]);

    let snapshot = compiled.get_state("t").await.unwrap().unwrap();
    assert_eq!(snapshot.status, ThreadStatus::Interrupted);
    assert!(snapshot.next.is_empty());

    let done = compiled.resume("t", json!("ok")).await.unwrap();
    assert!(done.is_completed());
    assert_eq!(done.values()["b"], json!("done"));
    assert_eq!(runs.load(Ordering::SeqCst), 1);

    let history = compiled.get_state_history("t").await.unwrap();
    let last = history.last().unwrap();
    assert_eq!(last.status, ThreadStatus::Completed);
    assert_eq!(last.step, paused.snapshot().step + 1);
    assert_eq!(last.metadata.resume, Some(json!("ok")));

    assert!(matches!(
        compiled.resume("t", Value::Null).await,
        Err(GraphError::InvalidResume { .. })
    ));
}

#[tokio::test]
async fn test_interrupt_before_all() {
    let runs = Arc::new(AtomicUsize::new(0));
    let compiled = two_step_graph(InterruptConfig::new().with_interrupt_before_all(), runs);

    let first = compiled.invoke(json!({}), "t").await.unwrap();
    assert_eq!(first.pending(), &["a".to_string()]);
    let second = compiled.resume("t", Value::Null).await.unwrap();
    assert_eq!(second.pending(), &["b".to_string()]);
    let third = compiled.resume("t", Value::Null).await.unwrap();
    assert!(third.is_completed());
}

#[tokio::test]
async fn test_invoke_on_interrupted_thread_starts_new_turn() {
    let runs = Arc::new(AtomicUsize::new(0));
    let compiled = two_step_graph(before_b(), runs.clone());

    compiled.invoke(json!({}), "t").await.unwrap();
    let again = compiled.invoke(json!({"turn": 2}), "t").await.unwrap();

    // pending `b` was abandoned and the new turn paused before it again
    assert!(again.is_interrupted());
    assert_eq!(again.values()["turn"], json!(2));
    assert_eq!(runs.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_human_edit_then_resume() {
    let compiled = two_step_graph(before_b(), Arc::new(AtomicUsize::new(0)));
    compiled.invoke(json!({}), "t").await.unwrap();

    compiled
        .update_state("t", json!({"approved": "edited"}), None)
        .await
        .unwrap();
    let done = compiled.resume("t", Value::Null).await.unwrap();
    assert_eq!(done.values()["b_saw_approved"], json!("edited"));
}

#[tokio::test]
async fn test_fork_before_interrupt_replays_pause() {
    let runs = Arc::new(AtomicUsize::new(0));
    let compiled = two_step_graph(before_b(), runs.clone());

    compiled.invoke(json!({}), "t").await.unwrap();
    compiled.resume("t", json!("first")).await.unwrap();
    assert_eq!(runs.load(Ordering::SeqCst), 1);

    // step 2 is the interrupted checkpoint
    let forked = compiled.fork("t", 2).await.unwrap();
    assert_eq!(forked.status, ThreadStatus::Interrupted);
    let replay = compiled.resume("t", json!("second")).await.unwrap();
    assert_eq!(replay.values()["b_resume"], json!("second"));
    assert_eq!(runs.load(Ordering::SeqCst), 2);
}
