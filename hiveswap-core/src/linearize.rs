//! Ordering the nodes of an outcome sequence.
//!
//! A sequence stores its actions as a node graph wired through `input` and
//! `output` connection slots, sometimes routed through connector nodes. The
//! game may fire several branches at once, so there is no single true order.
//! The linearization here is an approximation: connectors are pruned, nodes
//! without inputs hang off a virtual start, and a depth-first walk emits a
//! node every time an edge leads to it, taking each edge at most once.

use crate::node::TypedNode;
use crate::outcome::OutcomeKind;
use crate::resolver::RawRef;
use crate::schema::NodeKind;
use crate::store::RecordKey;
use serde_json::Value;
use std::collections::{btree_set, BTreeSet, HashMap, HashSet};

/// Execution graph over the nodes of one sequence, by position.
#[derive(Debug, Clone, Default)]
pub struct ExecutionGraph {
    successors: Vec<BTreeSet<usize>>,
    connectors: Vec<bool>,
}

impl ExecutionGraph {
    /// A graph of `len` unconnected nodes.
    pub fn new(len: usize) -> Self {
        Self {
            successors: vec![BTreeSet::new(); len],
            connectors: vec![false; len],
        }
    }

    /// Build the graph from a sequence's nodes and their connection slots.
    pub fn from_nodes(nodes: &[&TypedNode<'_>]) -> Self {
        let mut graph = Self::new(nodes.len());
        let positions: HashMap<&RecordKey, usize> = nodes
            .iter()
            .enumerate()
            .filter_map(|(index, node)| node.key().map(|key| (key, index)))
            .collect();

        for (index, node) in nodes.iter().enumerate() {
            if node.kind() == NodeKind::Outcome(OutcomeKind::Connector) {
                graph.mark_connector(index);
            }
            for key in slot_targets(node.get("output").as_value()) {
                if let Some(&target) = positions.get(&key) {
                    graph.add_edge(index, target);
                }
            }
            for key in slot_targets(node.get("input").as_value()) {
                if let Some(&source) = positions.get(&key) {
                    graph.add_edge(source, index);
                }
            }
        }
        graph
    }

    pub fn len(&self) -> usize {
        self.successors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.successors.is_empty()
    }

    pub fn add_edge(&mut self, from: usize, to: usize) {
        if from < self.len() && to < self.len() {
            self.successors[from].insert(to);
        }
    }

    pub fn mark_connector(&mut self, index: usize) {
        if let Some(flag) = self.connectors.get_mut(index) {
            *flag = true;
        }
    }

    /// Successors with connectors collapsed into direct edges.
    fn pruned(&self) -> Vec<BTreeSet<usize>> {
        (0..self.len())
            .map(|node| {
                let mut reached = BTreeSet::new();
                let mut seen = HashSet::new();
                let mut stack: Vec<usize> = self.successors[node].iter().rev().copied().collect();
                while let Some(next) = stack.pop() {
                    if !seen.insert(next) {
                        continue;
                    }
                    if self.connectors[next] {
                        stack.extend(self.successors[next].iter().rev().copied());
                    } else {
                        reached.insert(next);
                    }
                }
                reached
            })
            .collect()
    }

    /// Non-connector nodes with no incoming edges, in position order.
    pub fn roots(&self) -> Vec<usize> {
        let pruned = self.pruned();
        let mut has_input = vec![false; self.len()];
        for (node, successors) in pruned.iter().enumerate() {
            if self.connectors[node] {
                continue;
            }
            for &next in successors {
                has_input[next] = true;
            }
        }
        (0..self.len())
            .filter(|&node| !self.connectors[node] && !has_input[node])
            .collect()
    }

    /// Node positions in emission order; a node appears once per traversal.
    pub fn linearize(&self) -> Vec<usize> {
        let pruned = self.pruned();
        let mut walk = Walk {
            successors: &pruned,
            traversed: HashSet::new(),
            visited: vec![false; self.len()],
            order: Vec::new(),
        };

        for root in self.roots() {
            walk.enter(None, root);
        }
        // Nodes caught in cycles with no way in from a root.
        for node in 0..self.len() {
            if !self.connectors[node] && !walk.visited[node] {
                walk.enter(None, node);
            }
        }
        walk.order
    }
}

struct Walk<'g> {
    successors: &'g [BTreeSet<usize>],
    /// Edges already taken; `None` is the virtual start.
    traversed: HashSet<(Option<usize>, usize)>,
    visited: Vec<bool>,
    order: Vec<usize>,
}

impl<'g> Walk<'g> {
    /// Depth-first from `node`, emitting a node each time an untaken edge
    /// reaches it. The pending successors live on an explicit stack, so
    /// long chains cannot exhaust the call stack.
    fn enter(&mut self, from: Option<usize>, node: usize) {
        if !self.arrive(from, node) {
            return;
        }
        let successors = self.successors;
        let mut stack: Vec<(usize, btree_set::Iter<'g, usize>)> =
            vec![(node, successors[node].iter())];
        while let Some((current, pending)) = stack.last_mut() {
            let current = *current;
            match pending.next() {
                Some(&next) => {
                    if self.arrive(Some(current), next) {
                        stack.push((next, successors[next].iter()));
                    }
                }
                None => {
                    stack.pop();
                }
            }
        }
    }

    /// Take the edge `from -> node`; false when it was already taken.
    fn arrive(&mut self, from: Option<usize>, node: usize) -> bool {
        if !self.traversed.insert((from, node)) {
            return false;
        }
        self.visited[node] = true;
        self.order.push(node);
        true
    }
}

/// Record keys named by a connection slot.
///
/// A slot is `{"connections": [{"node": <reference>, ..}]}`; some exports
/// store a list of slots instead.
fn slot_targets(slot: Option<&Value>) -> Vec<RecordKey> {
    let slots: Vec<&Value> = match slot {
        Some(Value::Array(slots)) => slots.iter().collect(),
        Some(slot) if slot.is_object() => vec![slot],
        _ => Vec::new(),
    };
    slots
        .into_iter()
        .filter_map(|slot| slot.get("connections").and_then(Value::as_array))
        .flatten()
        .filter_map(|connection| connection.get("node"))
        .filter_map(RawRef::parse)
        .filter(|reference| !reference.is_null())
        .filter_map(|reference| reference.key())
        .collect()
}
