//! # flowstate-checkpoint - State Persistence for Graph Execution
//!
//! Append-only checkpoint logs for the flowstate executor. Every step of a run
//! produces one [`Checkpoint`] holding the merged channel values, the nodes
//! scheduled next and the run status. Logs are keyed by a caller-chosen
//! thread id, and each thread's entries form a strictly increasing sequence of
//! steps.
//!
//! The log is what makes these features possible:
//!
//! - **Human-in-the-loop**: an interrupted thread is nothing more than a head
//!   checkpoint with status [`ThreadStatus::Interrupted`] and a pending list.
//! - **Crash recovery**: a node whose checkpoint was never written is treated
//!   as not having run, and re-executes on the next invoke.
//! - **Time travel**: any historical entry can be read back with
//!   [`CheckpointSaver::get`] and copied forward as a new head.
//! - **Audit**: [`CheckpointSaver::history`] returns the full evolution of a
//!   thread, including failures.
//!
//! ## Backends
//!
//! | backend | lifetime | feature |
//! |---|---|---|
//! | [`InMemoryCheckpointSaver`] | process | always |
//! | [`SqliteCheckpointSaver`] | durable | `sqlite` (default) |
//!
//! Both implement [`CheckpointSaver`]; the executor only sees
//! `Arc<dyn CheckpointSaver>`.
//!
//! ## Quick Start
//!
//! ```rust
//! use flowstate_checkpoint::{
//!     ChannelValues, Checkpoint, CheckpointMetadata, CheckpointSaver, CheckpointSource,
//!     InMemoryCheckpointSaver,
//! };
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let saver = InMemoryCheckpointSaver::new();
//!
//!     let first = Checkpoint::new("thread-123", ChannelValues::new())
//!         .with_metadata(CheckpointMetadata::new().with_source(CheckpointSource::Input));
//!     saver.append(first.clone()).await?;
//!     saver.append(first.child()).await?;
//!
//!     for checkpoint in saver.history("thread-123").await? {
//!         println!("step {} -> {}", checkpoint.step, checkpoint.status);
//!     }
//!     Ok(())
//! }
//! ```

pub mod checkpoint;
pub mod error;
pub mod memory;
pub mod serializer;
#[cfg(feature = "sqlite")]
pub mod sqlite;
pub mod traits;

pub use checkpoint::{
    ChannelValues, Checkpoint, CheckpointId, CheckpointMetadata, CheckpointSource, InterruptRecord,
    InterruptWhen, ThreadStatus,
};
pub use error::{CheckpointError, Result};
pub use memory::InMemoryCheckpointSaver;
pub use serializer::{JsonSerializer, SerializerProtocol};
#[cfg(feature = "sqlite")]
pub use sqlite::SqliteCheckpointSaver;
pub use traits::{CheckpointSaver, CheckpointStream};
