//! Checkpoint persistence trait
//!
//! [`CheckpointSaver`] is the capability boundary between the executor and a
//! storage backend. The executor only ever appends to a thread's log and reads
//! from it; it never edits or deletes an entry. Any backend that keeps a
//! per-thread, strictly step-ordered, append-only log satisfies the contract:
//!
//! - [`append`](CheckpointSaver::append) must reject a checkpoint whose step is
//!   not greater than the thread's current head with
//!   [`CheckpointError::Conflict`], and must have durably recorded the entry
//!   when it returns `Ok`.
//! - [`latest`](CheckpointSaver::latest) returns the head, or `None` for an
//!   unknown thread.
//! - [`history`](CheckpointSaver::history) returns the log oldest first; its
//!   last element equals `latest`.
//! - [`get`](CheckpointSaver::get) fails with [`CheckpointError::NotFound`] for
//!   a missing step.
//!
//! # Implementing a backend
//!
//! ```rust,ignore
//! use async_trait::async_trait;
//! use flowstate_checkpoint::{Checkpoint, CheckpointSaver, CheckpointStream, Result};
//!
//! struct RedisCheckpointSaver { /* ... */ }
//!
//! #[async_trait]
//! impl CheckpointSaver for RedisCheckpointSaver {
//!     async fn append(&self, checkpoint: Checkpoint) -> Result<()> { todo!() }
//!     async fn latest(&self, thread_id: &str) -> Result<Option<Checkpoint>> { todo!() }
//!     async fn get(&self, thread_id: &str, step: u64) -> Result<Checkpoint> { todo!() }
//!     async fn list(&self, thread_id: &str, before: Option<u64>, limit: Option<usize>)
//!         -> Result<CheckpointStream> { todo!() }
//!     async fn threads(&self) -> Result<Vec<String>> { todo!() }
//! }
//! ```

use crate::{checkpoint::Checkpoint, error::Result};
use async_trait::async_trait;
use futures::stream::{Stream, TryStreamExt};
use std::pin::Pin;

/// Stream of checkpoints, newest first
pub type CheckpointStream = Pin<Box<dyn Stream<Item = Result<Checkpoint>> + Send + 'static>>;

/// Append-only, per-thread checkpoint log
#[async_trait]
pub trait CheckpointSaver: Send + Sync {
    /// Append a checkpoint to its thread's log
    async fn append(&self, checkpoint: Checkpoint) -> Result<()>;

    /// Latest checkpoint of a thread
    async fn latest(&self, thread_id: &str) -> Result<Option<Checkpoint>>;

    /// Checkpoint at a given step of a thread
    async fn get(&self, thread_id: &str, step: u64) -> Result<Checkpoint>;

    /// Checkpoints of a thread, newest first.
    ///
    /// `before` keeps only steps strictly lower than the given one; `limit`
    /// caps the number of returned entries.
    async fn list(
        &self,
        thread_id: &str,
        before: Option<u64>,
        limit: Option<usize>,
    ) -> Result<CheckpointStream>;

    /// Identifiers of every thread with at least one checkpoint
    async fn threads(&self) -> Result<Vec<String>>;

    /// Full log of a thread, oldest first
    async fn history(&self, thread_id: &str) -> Result<Vec<Checkpoint>> {
        let mut entries: Vec<Checkpoint> = self.list(thread_id, None, None).await?.try_collect().await?;
        entries.reverse();
        Ok(entries)
    }
}
