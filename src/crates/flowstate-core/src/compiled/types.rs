//! Result and snapshot types returned by a compiled graph

use crate::error::{GraphError, Result};
use crate::graph::NodeId;
use crate::state::State;
use chrono::{DateTime, Utc};
use flowstate_checkpoint::{Checkpoint, CheckpointId, CheckpointMetadata, InterruptRecord, ThreadStatus};
use serde::{Deserialize, Serialize};

/// Point-in-time view of a thread, built from one checkpoint
///
/// `next` lists the nodes that will run when the thread continues; it is
/// empty once the thread has completed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateSnapshot {
    pub values: State,

    pub next: Vec<NodeId>,

    pub status: ThreadStatus,

    pub step: u64,

    pub checkpoint_id: CheckpointId,

    pub parent_step: Option<u64>,

    pub metadata: CheckpointMetadata,

    pub created_at: DateTime<Utc>,
}

impl StateSnapshot {
    /// Interrupt descriptor, present on interrupted snapshots
    pub fn interrupt(&self) -> Option<&InterruptRecord> {
        self.metadata.interrupt.as_ref()
    }

    pub fn is_interrupted(&self) -> bool {
        self.status == ThreadStatus::Interrupted
    }
}

impl From<Checkpoint> for StateSnapshot {
    fn from(checkpoint: Checkpoint) -> Self {
        Self {
            values: checkpoint.values,
            next: checkpoint.pending,
            status: checkpoint.status,
            step: checkpoint.step,
            checkpoint_id: checkpoint.id,
            parent_step: checkpoint.parent_step,
            metadata: checkpoint.metadata,
            created_at: checkpoint.ts,
        }
    }
}

/// Outcome of [`invoke`](crate::CompiledGraph::invoke) or
/// [`resume`](crate::CompiledGraph::resume)
///
/// Pausing is not an error: an interrupted run returns
/// [`RunResult::Interrupted`] and is continued with `resume`. A run that
/// failed inside a step returns [`RunResult::Failed`] with the failure
/// already recorded in the thread's log.
#[derive(Debug)]
pub enum RunResult {
    Completed {
        state: State,
        snapshot: StateSnapshot,
    },

    Interrupted {
        snapshot: StateSnapshot,
        /// Nodes that will run on resume
        pending: Vec<NodeId>,
    },

    Failed {
        error: GraphError,
        /// The failure checkpoint: pre-step values, the failed frontier as `next`
        snapshot: StateSnapshot,
    },
}

impl RunResult {
    pub fn is_completed(&self) -> bool {
        matches!(self, RunResult::Completed { .. })
    }

    pub fn is_interrupted(&self) -> bool {
        matches!(self, RunResult::Interrupted { .. })
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, RunResult::Failed { .. })
    }

    pub fn snapshot(&self) -> &StateSnapshot {
        match self {
            RunResult::Completed { snapshot, .. }
            | RunResult::Interrupted { snapshot, .. }
            | RunResult::Failed { snapshot, .. } => snapshot,
        }
    }

    /// State values of the last checkpoint written by the run
    pub fn values(&self) -> &State {
        match self {
            RunResult::Completed { state, .. } => state,
            other => &other.snapshot().values,
        }
    }

    pub fn status(&self) -> ThreadStatus {
        self.snapshot().status
    }

    /// Pending nodes (empty unless interrupted or failed)
    pub fn pending(&self) -> &[NodeId] {
        match self {
            RunResult::Completed { .. } => &[],
            RunResult::Interrupted { pending, .. } => pending,
            RunResult::Failed { snapshot, .. } => &snapshot.next,
        }
    }

    /// Final state of a completed run; a failure becomes its error.
    ///
    /// An interrupted run is returned as `GraphError::Configuration`, since the
    /// caller expected the graph to finish without pausing.
    pub fn into_state(self) -> Result<State> {
        match self {
            RunResult::Completed { state, .. } => Ok(state),
            RunResult::Failed { error, .. } => Err(error),
            RunResult::Interrupted { pending, .. } => Err(GraphError::Configuration(format!(
                "run paused before completion, pending {:?}",
                pending
            ))),
        }
    }
}
