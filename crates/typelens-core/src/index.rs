//! Lookup indices over the type graph.
//!
//! Both indices are pure projections: they never mutate the graph and only
//! react to node events delivered while the write lock is held, so they are
//! always consistent with the node set by the time the lock is released.

use std::collections::{BTreeMap, HashMap};
use std::ops::Bound;

use crate::events::{NodeEvent, NodeEventDetail, NodeEventKind};
use crate::model::{TypeId, TypeNode};
use crate::pattern::MatchPattern;

/// Exact and wildcard lookup by fully qualified name.
///
/// Sorted storage makes wildcard scans with a literal prefix cheap: only
/// the key range starting with the prefix is visited.
#[derive(Debug, Default)]
pub struct FqnIndex {
    map: BTreeMap<String, TypeId>,
}

impl FqnIndex {
    pub fn new() -> Self {
        FqnIndex::default()
    }

    pub fn get(&self, fqn: &str) -> Option<TypeId> {
        self.map.get(fqn).copied()
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// All indexed nodes, in FQN order.
    pub fn all(&self) -> Vec<TypeId> {
        self.map.values().copied().collect()
    }

    /// All nodes whose FQN matches the pattern, in FQN order.
    pub fn find_by_pattern(&self, pattern: &MatchPattern) -> Vec<TypeId> {
        match pattern {
            MatchPattern::Exact(fqn) => self.get(fqn).into_iter().collect(),
            MatchPattern::Wildcard(wildcard) => {
                let prefix = wildcard.prefix();
                let range = self
                    .map
                    .range::<str, _>((Bound::Included(prefix), Bound::Unbounded));
                let mut result = Vec::new();
                for (fqn, &id) in range {
                    if !fqn.starts_with(prefix) {
                        break;
                    }
                    if wildcard.matches(fqn) {
                        result.push(id);
                    }
                }
                result
            }
        }
    }

    /// Maintain the index from a node event. The node is the event's
    /// subject, still present in the arena.
    pub(crate) fn apply_node_event(&mut self, event: &NodeEvent, node: &TypeNode) {
        match event.kind {
            NodeEventKind::New => {
                self.map.insert(node.fqn.clone(), event.id);
            }
            NodeEventKind::Removed => {
                // Only drop the entry while it still points at the removed
                // node; an annotation installed over an interface owns the
                // FQN slot from its NEW event on.
                if self.map.get(&event.fqn) == Some(&event.id) {
                    self.map.remove(&event.fqn);
                }
            }
            NodeEventKind::Changed => {}
        }
    }
}

/// Exact lookup by content hash.
#[derive(Debug, Default)]
pub struct HashIndex {
    map: HashMap<String, TypeId>,
}

impl HashIndex {
    pub fn new() -> Self {
        HashIndex::default()
    }

    pub fn get(&self, hash: &str) -> Option<TypeId> {
        self.map.get(hash).copied()
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// Maintain the index from a node event. Hashes only ever appear on
    /// initialization or hash addition, and disappear with the node.
    pub(crate) fn apply_node_event(&mut self, event: &NodeEvent, node: &TypeNode) {
        match (event.kind, event.detail) {
            (NodeEventKind::New, Some(NodeEventDetail::Initialized))
            | (NodeEventKind::Changed, Some(NodeEventDetail::Initialized))
            | (NodeEventKind::Changed, Some(NodeEventDetail::HashAdded)) => {
                for hash in &node.hashes {
                    self.map.insert(hash.clone(), event.id);
                }
            }
            (NodeEventKind::Removed, _) => {
                self.map.retain(|_, id| *id != event.id);
            }
            _ => {}
        }
    }
}
