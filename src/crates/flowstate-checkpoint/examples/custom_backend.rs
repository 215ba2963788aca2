//! Example of implementing a custom checkpoint backend
//!
//! `JsonLinesSaver` keeps one append-only `<thread>.jsonl` file per thread,
//! one serialized checkpoint per line. It follows the same contract as the
//! bundled backends: steps must strictly increase within a thread.

use async_trait::async_trait;
use flowstate_checkpoint::{
    ChannelValues, Checkpoint, CheckpointError, CheckpointSaver, CheckpointStream, JsonSerializer, Result,
    SerializerProtocol,
};
use futures::stream;
use serde_json::json;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

struct JsonLinesSaver {
    dir: PathBuf,
    serializer: JsonSerializer,
    /// Serializes appends so the head check and the write cannot interleave
    write_lock: Mutex<()>,
}

impl JsonLinesSaver {
    async fn open(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(|e| CheckpointError::Storage(e.to_string()))?;
        Ok(Self {
            dir,
            serializer: JsonSerializer::new(),
            write_lock: Mutex::new(()),
        })
    }

    fn path(&self, thread_id: &str) -> PathBuf {
        self.dir.join(format!("{}.jsonl", thread_id))
    }

    async fn read_log(&self, thread_id: &str) -> Result<Vec<Checkpoint>> {
        let content = match tokio::fs::read_to_string(self.path(thread_id)).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(CheckpointError::Storage(e.to_string())),
        };
        content
            .lines()
            .filter(|line| !line.trim().is_empty())
            .map(|line| self.serializer.loads(line.as_bytes()))
            .collect()
    }
}

#[async_trait]
impl CheckpointSaver for JsonLinesSaver {
    async fn append(&self, checkpoint: Checkpoint) -> Result<()> {
        let _guard = self.write_lock.lock().await;

        if let Some(head) = self.read_log(&checkpoint.thread_id).await?.last() {
            if checkpoint.step <= head.step {
                return Err(CheckpointError::Conflict {
                    thread_id: checkpoint.thread_id.clone(),
                    step: checkpoint.step,
                    latest: head.step,
                });
            }
        }

        let mut line = self.serializer.dumps(&checkpoint)?;
        line.push(b'\n');
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.path(&checkpoint.thread_id))
            .await
            .map_err(|e| CheckpointError::Storage(e.to_string()))?;
        file.write_all(&line)
            .await
            .map_err(|e| CheckpointError::Storage(e.to_string()))?;
        file.sync_data()
            .await
            .map_err(|e| CheckpointError::Storage(e.to_string()))
    }

    async fn latest(&self, thread_id: &str) -> Result<Option<Checkpoint>> {
        Ok(self.read_log(thread_id).await?.pop())
    }

    async fn get(&self, thread_id: &str, step: u64) -> Result<Checkpoint> {
        self.read_log(thread_id)
            .await?
            .into_iter()
            .find(|c| c.step == step)
            .ok_or_else(|| CheckpointError::NotFound {
                thread_id: thread_id.to_string(),
                step,
            })
    }

    async fn list(&self, thread_id: &str, before: Option<u64>, limit: Option<usize>) -> Result<CheckpointStream> {
        let entries: Vec<Result<Checkpoint>> = self
            .read_log(thread_id)
            .await?
            .into_iter()
            .rev()
            .filter(|c| before.map_or(true, |b| c.step < b))
            .take(limit.unwrap_or(usize::MAX))
            .map(Ok)
            .collect();
        Ok(Box::pin(stream::iter(entries)))
    }

    async fn threads(&self) -> Result<Vec<String>> {
        let mut threads = Vec::new();
        let mut entries = tokio::fs::read_dir(&self.dir)
            .await
            .map_err(|e| CheckpointError::Storage(e.to_string()))?;
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| CheckpointError::Storage(e.to_string()))?
        {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) == Some("jsonl") {
                if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                    threads.push(stem.to_string());
                }
            }
        }
        threads.sort();
        Ok(threads)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let dir = std::env::temp_dir().join(format!("flowstate-jsonl-{}", std::process::id()));
    let saver = JsonLinesSaver::open(&dir).await?;

    let mut values = ChannelValues::new();
    values.insert("draft".to_string(), json!("first version"));
    let first = Checkpoint::new("essay", values);
    saver.append(first.clone()).await?;

    let second = first.child().with_values({
        let mut values = ChannelValues::new();
        values.insert("draft".to_string(), json!("second version"));
        values
    });
    saver.append(second).await?;

    match saver.append(first).await {
        Err(CheckpointError::Conflict { step, latest, .. }) => {
            println!("rejected step {} after head {}", step, latest)
        }
        other => println!("unexpected: {:?}", other),
    }

    for checkpoint in saver.history("essay").await? {
        println!("step {}: {}", checkpoint.step, checkpoint.values["draft"]);
    }
    println!("threads: {:?}", saver.threads().await?);

    let _ = tokio::fs::remove_dir_all(&dir).await;
    Ok(())
}
