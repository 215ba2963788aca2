//! In-memory checkpoint storage for development and testing
//!
//! [`InMemoryCheckpointSaver`] keeps every thread's log in a
//! `Arc<RwLock<HashMap<thread_id, Vec<Checkpoint>>>>`. Entries live for the
//! lifetime of the process; use [`SqliteCheckpointSaver`](crate::SqliteCheckpointSaver)
//! when threads must survive a restart.
//!
//! ```text
//! thread_id: "session-1"
//!   ├─ [0] step 0
//!   ├─ [1] step 1
//!   └─ [2] step 2   <- latest
//! thread_id: "session-2"
//!   └─ [0] step 0   <- latest
//! ```
//!
//! Cloning the saver is cheap and every clone shares the same storage.

use crate::{
    checkpoint::Checkpoint,
    error::{CheckpointError, Result},
    traits::{CheckpointSaver, CheckpointStream},
};
use async_trait::async_trait;
use futures::stream;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

type CheckpointStorage = Arc<RwLock<HashMap<String, Vec<Checkpoint>>>>;

/// In-memory checkpoint saver
///
/// # Example
///
/// ```rust
/// use flowstate_checkpoint::{ChannelValues, Checkpoint, CheckpointSaver, InMemoryCheckpointSaver};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let saver = InMemoryCheckpointSaver::new();
///     let first = Checkpoint::new("thread-1", ChannelValues::new());
///     saver.append(first.clone()).await?;
///     saver.append(first.child()).await?;
///
///     let latest = saver.latest("thread-1").await?.unwrap();
///     assert_eq!(latest.step, 1);
///     Ok(())
/// }
/// ```
#[derive(Debug, Clone)]
pub struct InMemoryCheckpointSaver {
    storage: CheckpointStorage,
}

impl InMemoryCheckpointSaver {
    pub fn new() -> Self {
        Self {
            storage: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Number of threads with at least one checkpoint
    pub async fn thread_count(&self) -> usize {
        self.storage.read().await.len()
    }

    /// Total number of checkpoints across all threads
    pub async fn checkpoint_count(&self) -> usize {
        self.storage
            .read()
            .await
            .values()
            .map(|entries| entries.len())
            .sum()
    }
}

impl Default for InMemoryCheckpointSaver {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CheckpointSaver for InMemoryCheckpointSaver {
    async fn append(&self, checkpoint: Checkpoint) -> Result<()> {
        let mut storage = self.storage.write().await;
        let entries = storage.entry(checkpoint.thread_id.clone()).or_default();

        if let Some(head) = entries.last() {
            if checkpoint.step <= head.step {
                return Err(CheckpointError::Conflict {
                    thread_id: checkpoint.thread_id,
                    step: checkpoint.step,
                    latest: head.step,
                });
            }
        }

        tracing::trace!(thread_id = %checkpoint.thread_id, step = checkpoint.step, "Appending checkpoint");
        entries.push(checkpoint);
        Ok(())
    }

    async fn latest(&self, thread_id: &str) -> Result<Option<Checkpoint>> {
        let storage = self.storage.read().await;
        Ok(storage.get(thread_id).and_then(|entries| entries.last().cloned()))
    }

    async fn get(&self, thread_id: &str, step: u64) -> Result<Checkpoint> {
        let storage = self.storage.read().await;
        storage
            .get(thread_id)
            .and_then(|entries| entries.iter().find(|c| c.step == step).cloned())
            .ok_or_else(|| CheckpointError::NotFound {
                thread_id: thread_id.to_string(),
                step,
            })
    }

    async fn list(
        &self,
        thread_id: &str,
        before: Option<u64>,
        limit: Option<usize>,
    ) -> Result<CheckpointStream> {
        let storage = self.storage.read().await;
        let results: Vec<Result<Checkpoint>> = storage
            .get(thread_id)
            .map(|entries| {
                entries
                    .iter()
                    .rev()
                    .filter(|c| before.map_or(true, |b| c.step < b))
                    .take(limit.unwrap_or(usize::MAX))
                    .cloned()
                    .map(Ok)
                    .collect()
            })
            .unwrap_or_default();

        Ok(Box::pin(stream::iter(results)))
    }

    async fn threads(&self) -> Result<Vec<String>> {
        let mut threads: Vec<String> = self.storage.read().await.keys().cloned().collect();
        threads.sort();
        Ok(threads)
    }
}
