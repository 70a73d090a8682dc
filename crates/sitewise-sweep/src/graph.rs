//! Dependency graph over resource nodes
//!
//! Nodes live in an arena indexed by `usize`; each node keeps the set of
//! nodes that must be deleted before it (its blocking set).

use crate::api::ResourceNode;
use crate::scanner::Inventory;
use std::collections::{BTreeSet, HashMap};
use tracing::trace;

/// Resources plus "delete before" constraints between them
#[derive(Debug, Clone, Default)]
pub struct DependencyGraph {
    nodes: Vec<ResourceNode>,
    index: HashMap<String, usize>,
    blockers: Vec<BTreeSet<usize>>,
}

impl DependencyGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a node, returning its arena index. Re-adding an id is a no-op.
    pub fn add_node(&mut self, node: ResourceNode) -> usize {
        if let Some(&idx) = self.index.get(&node.id) {
            return idx;
        }
        let idx = self.nodes.len();
        self.index.insert(node.id.clone(), idx);
        self.nodes.push(node);
        self.blockers.push(BTreeSet::new());
        idx
    }

    /// Require `before` to be deleted before `after`.
    ///
    /// Returns false (and records nothing) when either id is not in the graph.
    pub fn add_edge(&mut self, before: &str, after: &str) -> bool {
        match (self.index.get(before), self.index.get(after)) {
            (Some(&b), Some(&a)) => {
                self.blockers[a].insert(b);
                true
            }
            _ => {
                trace!(before, after, "Ignoring edge to out-of-scope resource");
                false
            }
        }
    }

    /// Build from nodes paired with the ids that must be deleted before them
    pub fn from_blocking_sets<I, S>(entries: I) -> Self
    where
        I: IntoIterator<Item = (ResourceNode, Vec<S>)>,
        S: AsRef<str>,
    {
        let entries: Vec<_> = entries.into_iter().collect();
        let mut graph = Self::new();
        for (node, _) in &entries {
            graph.add_node(node.clone());
        }
        for (node, blocking) in &entries {
            for before in blocking {
                graph.add_edge(before.as_ref(), &node.id);
            }
        }
        graph
    }

    /// Build from a scanned inventory
    pub fn from_inventory(inventory: &Inventory) -> Self {
        let mut graph = Self::new();
        for node in inventory.nodes() {
            graph.add_node(node);
        }

        for model in &inventory.models {
            for hierarchy in &model.hierarchies {
                graph.add_edge(&hierarchy.child_model_id, &model.id);
            }
            for interface_id in &model.interface_ids {
                graph.add_edge(&model.id, interface_id);
            }
        }

        for owned in inventory
            .assets
            .iter()
            .chain(&inventory.projects)
            .chain(&inventory.dashboards)
            .chain(&inventory.access_policies)
        {
            if let Some(parent) = &owned.parent {
                graph.add_edge(&owned.node.id, parent);
            }
        }

        for series in &inventory.time_series {
            if let Some(asset_id) = &series.parent {
                graph.add_edge(asset_id, &series.node.id);
            }
        }

        graph
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.index.contains_key(id)
    }

    pub fn nodes(&self) -> &[ResourceNode] {
        &self.nodes
    }

    pub fn node(&self, id: &str) -> Option<&ResourceNode> {
        self.index.get(id).map(|&idx| &self.nodes[idx])
    }

    /// Ids that must be deleted before `id`, sorted
    pub fn blockers_of(&self, id: &str) -> Vec<&str> {
        let Some(&idx) = self.index.get(id) else {
            return Vec::new();
        };
        let mut ids: Vec<&str> = self.blockers[idx]
            .iter()
            .map(|&b| self.nodes[b].id.as_str())
            .collect();
        ids.sort_unstable();
        ids
    }

    pub(crate) fn node_at(&self, idx: usize) -> &ResourceNode {
        &self.nodes[idx]
    }

    pub(crate) fn blockers_at(&self, idx: usize) -> &BTreeSet<usize> {
        &self.blockers[idx]
    }
}
