//! Plain-text rendering of messages, runs and checkpoints

use flowstate_core::{Message, MessageRole, RunResult, StateSnapshot};
use flowstate_checkpoint::CheckpointSource;

pub fn message_line(message: &Message) -> String {
    let speaker = match (&message.role, &message.name) {
        (MessageRole::System, _) => "system".to_string(),
        (MessageRole::Human, _) => "human".to_string(),
        (MessageRole::Ai, Some(name)) => format!("ai[{}]", name),
        (MessageRole::Ai, None) => "ai".to_string(),
        (MessageRole::Tool, Some(name)) => format!("tool[{}]", name),
        (MessageRole::Tool, None) => "tool".to_string(),
    };

    if message.has_tool_calls() {
        let calls: Vec<String> = message
            .tool_calls
            .iter()
            .map(|call| format!("{}({})", call.name, call.args))
            .collect();
        return format!("{}: -> {}", speaker, calls.join(", "));
    }
    format!("{}: {}", speaker, message.content_string())
}

/// One line per checkpoint: step, status, source, nodes written, next
pub fn history_line(snapshot: &StateSnapshot) -> String {
    let source = match snapshot.metadata.source {
        Some(CheckpointSource::Input) => "input",
        Some(CheckpointSource::Loop) => "loop",
        Some(CheckpointSource::Update) => "update",
        Some(CheckpointSource::Resume) => "resume",
        Some(CheckpointSource::Fork) => "fork",
        None => "-",
    };
    let mut line = format!(
        "{:>4}  {:<11} {:<6} writes={:?} next={:?}",
        snapshot.step, snapshot.status, source, snapshot.metadata.writes, snapshot.next
    );
    if let Some(error) = &snapshot.metadata.error {
        line.push_str(&format!(" error={}", error));
    }
    line
}

/// Closing line describing how a run ended
pub fn outcome_line(thread_id: &str, result: &RunResult) -> String {
    match result {
        RunResult::Completed { snapshot, .. } => {
            format!("thread {} completed at step {}", thread_id, snapshot.step)
        }
        RunResult::Interrupted { snapshot, pending } => format!(
            "thread {} paused at step {} before {:?}; continue with `flowstate resume {} <value>`",
            thread_id, snapshot.step, pending, thread_id
        ),
        RunResult::Failed { error, snapshot } => {
            format!("thread {} failed at step {}: {}", thread_id, snapshot.step, error)
        }
    }
}
