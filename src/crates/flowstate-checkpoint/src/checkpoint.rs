//! Checkpoint data model
//!
//! A [`Checkpoint`] is one immutable entry in a thread's append-only log. Each
//! entry carries the full channel values after a step, the nodes that are
//! scheduled next, the run status at that point and a link to the previous
//! entry of the same thread.
//!
//! ```text
//! thread "session-1"
//!   step 0  input        status=running      pending=[agent]
//!   step 1  loop         status=interrupted  pending=[human_review]
//!   step 2  update       status=interrupted  pending=[human_review]
//!   step 3  loop         status=completed    pending=[]
//! ```
//!
//! Steps are strictly increasing per thread; backends reject an append whose
//! step does not follow the current head.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

/// Unique checkpoint identifier
pub type CheckpointId = String;

/// Channel name to value mapping stored in each checkpoint
pub type ChannelValues = serde_json::Map<String, serde_json::Value>;

/// Run status recorded with every checkpoint
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ThreadStatus {
    /// Pending nodes remain and nothing is blocking them
    Running,
    /// Execution paused at an interrupt point, waiting for `resume`
    Interrupted,
    /// The frontier resolved to the end node
    Completed,
    /// A node or router failed; the pending nodes are the failed frontier
    Failed,
}

impl ThreadStatus {
    /// Returns the lowercase name used in storage and logs
    pub fn as_str(&self) -> &'static str {
        match self {
            ThreadStatus::Running => "running",
            ThreadStatus::Interrupted => "interrupted",
            ThreadStatus::Completed => "completed",
            ThreadStatus::Failed => "failed",
        }
    }
}

impl std::fmt::Display for ThreadStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What produced a checkpoint
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum CheckpointSource {
    /// Input merged at the start of an invoke
    Input,
    /// A step of the execution loop
    Loop,
    /// A manual state update
    Update,
    /// A resume of an interrupted thread
    Resume,
    /// A copy of a historical checkpoint made the new head
    Fork,
}

/// Which side of a node boundary an interrupt was taken on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InterruptWhen {
    Before,
    After,
}

/// Interrupt descriptor persisted with an interrupted checkpoint
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct InterruptRecord {
    pub when: InterruptWhen,
    /// Nodes whose boundary triggered the pause
    pub nodes: Vec<String>,
}

/// Metadata associated with a checkpoint
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct CheckpointMetadata {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<CheckpointSource>,

    /// Nodes whose output was merged into this checkpoint
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub writes: Vec<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub interrupt: Option<InterruptRecord>,

    /// Value supplied by the caller when this checkpoint was produced by a resume
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resume: Option<serde_json::Value>,

    /// Failure description for `Failed` checkpoints
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    /// Additional custom metadata
    #[serde(flatten)]
    pub extra: HashMap<String, serde_json::Value>,
}

impl CheckpointMetadata {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_source(mut self, source: CheckpointSource) -> Self {
        self.source = Some(source);
        self
    }

    pub fn with_writes(mut self, writes: Vec<String>) -> Self {
        self.writes = writes;
        self
    }

    pub fn with_interrupt(mut self, when: InterruptWhen, nodes: Vec<String>) -> Self {
        self.interrupt = Some(InterruptRecord { when, nodes });
        self
    }

    pub fn with_resume(mut self, value: serde_json::Value) -> Self {
        self.resume = Some(value);
        self
    }

    pub fn with_error(mut self, error: impl Into<String>) -> Self {
        self.error = Some(error.into());
        self
    }

    pub fn with_extra(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.extra.insert(key.into(), value);
        self
    }
}

/// State snapshot of one thread at one step
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Checkpoint {
    /// The version of the checkpoint format
    pub v: i32,

    pub id: CheckpointId,

    pub thread_id: String,

    /// Position in the thread's log, strictly increasing
    pub step: u64,

    pub ts: DateTime<Utc>,

    /// Channel values after the step
    pub values: ChannelValues,

    /// Nodes scheduled to run next, in frontier order
    pub pending: Vec<String>,

    /// Step of the checkpoint this one was derived from
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_step: Option<u64>,

    pub status: ThreadStatus,

    pub metadata: CheckpointMetadata,
}

impl Checkpoint {
    /// Current checkpoint format version
    pub const CURRENT_VERSION: i32 = 1;

    /// Create the first checkpoint of a thread (step 0, no parent)
    pub fn new(thread_id: impl Into<String>, values: ChannelValues) -> Self {
        Self {
            v: Self::CURRENT_VERSION,
            id: Uuid::new_v4().to_string(),
            thread_id: thread_id.into(),
            step: 0,
            ts: Utc::now(),
            values,
            pending: Vec::new(),
            parent_step: None,
            status: ThreadStatus::Running,
            metadata: CheckpointMetadata::default(),
        }
    }

    /// Derive the next checkpoint of the same thread.
    ///
    /// The child gets a fresh id and timestamp, `step + 1`, and this
    /// checkpoint as its parent. Values, pending nodes and status are carried
    /// over; metadata starts empty.
    pub fn child(&self) -> Self {
        Self {
            v: Self::CURRENT_VERSION,
            id: Uuid::new_v4().to_string(),
            thread_id: self.thread_id.clone(),
            step: self.step + 1,
            ts: Utc::now(),
            values: self.values.clone(),
            pending: self.pending.clone(),
            parent_step: Some(self.step),
            status: self.status,
            metadata: CheckpointMetadata::default(),
        }
    }

    pub fn with_values(mut self, values: ChannelValues) -> Self {
        self.values = values;
        self
    }

    pub fn with_pending(mut self, pending: Vec<String>) -> Self {
        self.pending = pending;
        self
    }

    pub fn with_status(mut self, status: ThreadStatus) -> Self {
        self.status = status;
        self
    }

    pub fn with_metadata(mut self, metadata: CheckpointMetadata) -> Self {
        self.metadata = metadata;
        self
    }
}
