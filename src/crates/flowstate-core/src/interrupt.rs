//! Interrupt points and resume policy
//!
//! An interrupt pauses a run at a node boundary so a human (or another
//! system) can inspect the state before execution continues:
//!
//! - **before** a node: the node has not run; it is in the pending list of
//!   the interrupted checkpoint and runs first on resume.
//! - **after** a node: the node's output is merged and persisted; the
//!   pending list holds its successors.
//!
//! Interrupt points are fixed when the graph is compiled
//! ([`StateGraph::compile_with_interrupts`](crate::StateGraph::compile_with_interrupts))
//! and every named node must exist.
//!
//! # Resume values
//!
//! [`CompiledGraph::resume`](crate::CompiledGraph::resume) takes a value.
//! What the executor does with it is decided per interrupt point by a
//! [`ResumeMode`]:
//!
//! | Mode | Effect |
//! |------|--------|
//! | [`ResumeMode::PassToNode`] (default) | Delivered to the first nodes that run, via [`NodeContext::resume_value`](crate::NodeContext::resume_value) |
//! | [`ResumeMode::ApplyAsPatch`] | Merged into the state through the reducers; must be an object or null |
//! | [`ResumeMode::AsNodeOutput`] | Used as the output of the paused node, which is not executed (before-points only) |
//!
//! When several nodes trigger the same pause, the mode of the first one in
//! frontier order applies.
//!
//! # Example
//!
//! ```rust
//! use flowstate_core::{InterruptConfig, ResumeMode};
//!
//! let config = InterruptConfig::new()
//!     .with_interrupt_before(vec!["human_review".to_string()])
//!     .with_resume_mode("human_review", ResumeMode::AsNodeOutput);
//!
//! assert!(config.should_interrupt_before("human_review"));
//! assert!(!config.should_interrupt_after("human_review"));
//! assert_eq!(config.resume_mode("human_review"), ResumeMode::AsNodeOutput);
//! assert_eq!(config.resume_mode("agent"), ResumeMode::PassToNode);
//! ```

use crate::graph::NodeId;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

pub use flowstate_checkpoint::{InterruptRecord, InterruptWhen};

/// How a resume value is applied
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResumeMode {
    #[default]
    PassToNode,
    ApplyAsPatch,
    AsNodeOutput,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InterruptConfig {
    /// Nodes to pause before
    pub interrupt_before: Vec<NodeId>,

    /// Nodes to pause after
    pub interrupt_after: Vec<NodeId>,

    pub interrupt_before_all: bool,

    pub interrupt_after_all: bool,

    /// Resume handling per node; nodes not listed use `default_resume_mode`
    #[serde(default)]
    pub resume_modes: HashMap<NodeId, ResumeMode>,

    #[serde(default)]
    pub default_resume_mode: ResumeMode,
}

impl InterruptConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_interrupt_before(mut self, nodes: Vec<NodeId>) -> Self {
        self.interrupt_before = nodes;
        self
    }

    pub fn with_interrupt_after(mut self, nodes: Vec<NodeId>) -> Self {
        self.interrupt_after = nodes;
        self
    }

    pub fn with_interrupt_before_all(mut self) -> Self {
        self.interrupt_before_all = true;
        self
    }

    pub fn with_interrupt_after_all(mut self) -> Self {
        self.interrupt_after_all = true;
        self
    }

    pub fn with_resume_mode(mut self, node: impl Into<NodeId>, mode: ResumeMode) -> Self {
        self.resume_modes.insert(node.into(), mode);
        self
    }

    pub fn with_default_resume_mode(mut self, mode: ResumeMode) -> Self {
        self.default_resume_mode = mode;
        self
    }

    pub fn should_interrupt_before(&self, node: &str) -> bool {
        self.interrupt_before_all || self.interrupt_before.iter().any(|n| n == node)
    }

    pub fn should_interrupt_after(&self, node: &str) -> bool {
        self.interrupt_after_all || self.interrupt_after.iter().any(|n| n == node)
    }

    pub fn resume_mode(&self, node: &str) -> ResumeMode {
        self.resume_modes
            .get(node)
            .copied()
            .unwrap_or(self.default_resume_mode)
    }

    pub fn is_empty(&self) -> bool {
        !self.interrupt_before_all
            && !self.interrupt_after_all
            && self.interrupt_before.is_empty()
            && self.interrupt_after.is_empty()
    }

    /// Check the config against the registered node names
    pub(crate) fn validate(&self, mut is_node: impl FnMut(&str) -> bool) -> Vec<String> {
        let mut problems = Vec::new();

        let named = self
            .interrupt_before
            .iter()
            .chain(self.interrupt_after.iter())
            .chain(self.resume_modes.keys());
        for node in named {
            if !is_node(node) {
                problems.push(format!("interrupt point '{}' is not a node", node));
            }
        }

        for node in self.interrupt_after.iter().chain(self.resume_modes.keys()) {
            if self.resume_mode(node) == ResumeMode::AsNodeOutput && !self.should_interrupt_before(node) {
                problems.push(format!(
                    "resume mode as_node_output on '{}' requires an interrupt before it",
                    node
                ));
            }
        }

        problems.sort();
        problems.dedup();
        problems
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_interrupt_all() {
        let config = InterruptConfig::new().with_interrupt_after_all();
        assert!(config.should_interrupt_after("anything"));
        assert!(!config.should_interrupt_before("anything"));
        assert!(!config.is_empty());
        assert!(InterruptConfig::new().is_empty());
    }

    #[test]
    fn test_validate_unknown_node() {
        let config = InterruptConfig::new().with_interrupt_before(vec!["ghost".to_string()]);
        let problems = config.validate(|n| n == "agent");
        assert_eq!(problems, vec!["interrupt point 'ghost' is not a node".to_string()]);
    }

    #[test]
    fn test_validate_as_node_output_needs_before_point() {
        let config = InterruptConfig::new()
            .with_interrupt_after(vec!["review".to_string()])
            .with_resume_mode("review", ResumeMode::AsNodeOutput);
        let problems = config.validate(|_| true);
        assert_eq!(problems.len(), 1);
        assert!(problems[0].contains("requires an interrupt before"));

        let ok = InterruptConfig::new()
            .with_interrupt_before(vec!["review".to_string()])
            .with_resume_mode("review", ResumeMode::AsNodeOutput);
        assert!(ok.validate(|_| true).is_empty());
    }

    #[test]
    fn test_resume_mode_serde() {
        let encoded = serde_json::to_string(&ResumeMode::ApplyAsPatch).unwrap();
        assert_eq!(encoded, "\"apply_as_patch\"");
    }
}
