//! Edges, routing and structural validation
//!
//! Control flow between nodes is described by an [`EdgeTable`]: for each
//! source, an ordered list of [`Edge`]s. Two special names bound the graph:
//! [`START`] (only a source) and [`END`] (only a target).
//!
//! ```text
//!   START ──► agent ──┬─ "tools" ──► tools ──► agent
//!                     └─ "__end__" ─► END
//! ```
//!
//! After a step, the successors of every executed node are resolved against
//! the *merged* state:
//!
//! - a direct edge contributes its target
//! - a conditional edge calls its router and looks the returned key up in
//!   its [`PathMap`]; a key outside the map is a
//!   [`GraphError::RouterTarget`] failure
//!
//! Successors are concatenated in frontier order, duplicates are dropped
//! (first occurrence wins) and [`END`] is removed. An empty result means the
//! run is complete.
//!
//! # Example
//!
//! ```rust
//! use flowstate_core::graph::{EdgeTable, PathMap, END, START};
//! use flowstate_core::State;
//! use serde_json::json;
//! use std::sync::Arc;
//!
//! let mut edges = EdgeTable::new();
//! edges.add_direct(START, "agent");
//! edges.add_conditional(
//!     "agent",
//!     Arc::new(|state: &State| {
//!         if state.get("done") == Some(&json!(true)) { END.to_string() } else { "tools".to_string() }
//!     }),
//!     PathMap::from(["tools", END]),
//! );
//!
//! let state = json!({"done": false}).as_object().unwrap().clone();
//! assert_eq!(edges.resolve("agent", &state).unwrap(), vec!["tools".to_string()]);
//! ```

use crate::error::{GraphError, Result};
use crate::node::NodeRegistry;
use crate::state::State;
use std::collections::{HashMap, HashSet, VecDeque};
use std::fmt;
use std::sync::Arc;

/// Node identifier - unique name for each node in the graph
pub type NodeId = String;

/// Virtual entry node
pub const START: &str = "__start__";

/// Virtual exit node
pub const END: &str = "__end__";

/// Router of a conditional edge: inspects the state and returns a branch key
pub type RouterFn = Arc<dyn Fn(&State) -> String + Send + Sync>;

/// Branch keys of a conditional edge and the nodes they lead to
///
/// Keys keep their declaration order so error messages list them the way
/// they were written.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PathMap(Vec<(String, NodeId)>);

impl PathMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl Into<String>, target: impl Into<NodeId>) {
        let key = key.into();
        let target = target.into();
        match self.0.iter_mut().find(|(k, _)| *k == key) {
            Some(entry) => entry.1 = target,
            None => self.0.push((key, target)),
        }
    }

    pub fn get(&self, key: &str) -> Option<&NodeId> {
        self.0.iter().find(|(k, _)| k == key).map(|(_, t)| t)
    }

    pub fn keys(&self) -> Vec<String> {
        self.0.iter().map(|(k, _)| k.clone()).collect()
    }

    pub fn targets(&self) -> impl Iterator<Item = &NodeId> {
        self.0.iter().map(|(_, t)| t)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Each name is both the key and the target
impl<const N: usize> From<[&str; N]> for PathMap {
    fn from(targets: [&str; N]) -> Self {
        targets.into_iter().map(|t| (t, t)).collect()
    }
}

impl From<Vec<&str>> for PathMap {
    fn from(targets: Vec<&str>) -> Self {
        targets.into_iter().map(|t| (t, t)).collect()
    }
}

impl<const N: usize> From<[(&str, &str); N]> for PathMap {
    fn from(pairs: [(&str, &str); N]) -> Self {
        pairs.into_iter().collect()
    }
}

impl From<HashMap<String, NodeId>> for PathMap {
    fn from(map: HashMap<String, NodeId>) -> Self {
        let mut pairs: Vec<_> = map.into_iter().collect();
        pairs.sort();
        Self(pairs)
    }
}

impl<K: Into<String>, V: Into<NodeId>> FromIterator<(K, V)> for PathMap {
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        let mut map = PathMap::new();
        for (k, v) in iter {
            map.insert(k, v);
        }
        map
    }
}

#[derive(Clone)]
pub enum Edge {
    /// Always continue to the target
    Direct(NodeId),

    /// Continue to the branch chosen by the router
    Conditional { router: RouterFn, branches: PathMap },
}

impl Edge {
    /// Every node this edge can lead to
    pub fn targets(&self) -> Vec<&NodeId> {
        match self {
            Edge::Direct(target) => vec![target],
            Edge::Conditional { branches, .. } => branches.targets().collect(),
        }
    }
}

impl fmt::Debug for Edge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Edge::Direct(target) => f.debug_tuple("Direct").field(target).finish(),
            Edge::Conditional { branches, .. } => f
                .debug_struct("Conditional")
                .field("router", &"<function>")
                .field("branches", branches)
                .finish(),
        }
    }
}

/// Outgoing edges of every source, in declaration order
#[derive(Clone, Debug, Default)]
pub struct EdgeTable {
    edges: Vec<(NodeId, Edge)>,
}

impl EdgeTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_direct(&mut self, from: impl Into<NodeId>, to: impl Into<NodeId>) {
        self.edges.push((from.into(), Edge::Direct(to.into())));
    }

    pub fn add_conditional(&mut self, from: impl Into<NodeId>, router: RouterFn, branches: PathMap) {
        self.edges.push((from.into(), Edge::Conditional { router, branches }));
    }

    pub fn outgoing<'a>(&'a self, from: &'a str) -> impl Iterator<Item = &'a Edge> + 'a {
        self.edges.iter().filter(move |(src, _)| src == from).map(|(_, e)| e)
    }

    pub fn has_outgoing(&self, from: &str) -> bool {
        self.outgoing(from).next().is_some()
    }

    /// Successors of one node for the given state, in edge order.
    ///
    /// May contain [`END`] and duplicates.
    pub fn resolve(&self, from: &str, state: &State) -> Result<Vec<NodeId>> {
        let mut targets = Vec::new();
        for edge in self.outgoing(from) {
            match edge {
                Edge::Direct(target) => targets.push(target.clone()),
                Edge::Conditional { router, branches } => {
                    let key = router(state);
                    let target = branches.get(&key).ok_or_else(|| GraphError::RouterTarget {
                        node: from.to_string(),
                        target: key.clone(),
                        allowed: branches.keys(),
                    })?;
                    tracing::trace!(from = %from, key = %key, target = %target, "Router selected branch");
                    targets.push(target.clone());
                }
            }
        }
        Ok(targets)
    }

    /// Frontier following `executed`: successors concatenated in order,
    /// first occurrence kept, [`END`] removed
    pub fn next_frontier(&self, executed: &[NodeId], state: &State) -> Result<Vec<NodeId>> {
        let mut seen = HashSet::new();
        let mut frontier = Vec::new();
        for node in executed {
            for target in self.resolve(node, state)? {
                if target != END && seen.insert(target.clone()) {
                    frontier.push(target);
                }
            }
        }
        Ok(frontier)
    }

    /// Structural problems of this table against a node registry
    pub(crate) fn validate(&self, nodes: &NodeRegistry) -> Vec<String> {
        let mut problems = Vec::new();

        for (source, edge) in &self.edges {
            if source == END {
                problems.push("END cannot have outgoing edges".to_string());
            } else if source != START && !nodes.contains(source) {
                problems.push(format!("edge source '{}' is not a node", source));
            }

            if let Edge::Conditional { branches, .. } = edge {
                if branches.is_empty() {
                    problems.push(format!("conditional edge from '{}' declares no branches", source));
                }
            }

            for target in edge.targets() {
                if target == START {
                    problems.push(format!("edge from '{}' targets START", source));
                } else if target != END && !nodes.contains(target) {
                    problems.push(format!("edge target '{}' from '{}' is not a node", target, source));
                }
            }
        }

        if !self.has_outgoing(START) {
            problems.push("START has no outgoing edge".to_string());
        }

        for node in nodes.names() {
            if !self.has_outgoing(node) {
                problems.push(format!("node '{}' has no outgoing edge", node));
            }
        }

        let reachable = self.reachable_from(START);
        for node in nodes.names() {
            if !reachable.contains(node.as_str()) {
                problems.push(format!("node '{}' is unreachable from START", node));
            }
        }

        let mut seen = HashSet::new();
        problems.retain(|p| seen.insert(p.clone()));
        problems
    }

    /// Every name reachable from `origin` over any branch
    pub fn reachable_from(&self, origin: &str) -> HashSet<&str> {
        let mut reached: HashSet<&str> = HashSet::new();
        let mut queue: VecDeque<&str> = VecDeque::from([origin]);
        while let Some(current) = queue.pop_front() {
            for (_, edge) in self.edges.iter().filter(|(source, _)| source == current) {
                for target in edge.targets() {
                    if reached.insert(target.as_str()) {
                        queue.push_back(target.as_str());
                    }
                }
            }
        }
        reached
    }
}
