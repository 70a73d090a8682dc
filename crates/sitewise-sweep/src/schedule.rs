//! Topological batch scheduling (Kahn's algorithm, one layer per batch)

use crate::api::ResourceNode;
use crate::graph::DependencyGraph;
use serde::Serialize;
use thiserror::Error;

/// Nodes that may be deleted together once every earlier batch is done
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeletionBatch {
    pub index: usize,
    /// Members sorted by id
    pub nodes: Vec<ResourceNode>,
}

impl DeletionBatch {
    pub fn ids(&self) -> Vec<&str> {
        self.nodes.iter().map(|n| n.id.as_str()).collect()
    }
}

/// The graph has a cycle; no deletion order exists
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("Dependency cycle among resources: {}", .nodes.join(", "))]
pub struct CyclicDependencyError {
    /// Ids of every node that could not be scheduled, sorted
    pub nodes: Vec<String>,
}

/// Order the graph into deletion batches.
///
/// Every node appears in exactly one batch, after all of its blockers.
pub fn schedule(graph: &DependencyGraph) -> Result<Vec<DeletionBatch>, CyclicDependencyError> {
    let count = graph.len();
    let mut remaining: Vec<usize> = (0..count).map(|i| graph.blockers_at(i).len()).collect();
    let mut dependents: Vec<Vec<usize>> = vec![Vec::new(); count];
    for after in 0..count {
        for &before in graph.blockers_at(after) {
            dependents[before].push(after);
        }
    }

    let by_id = |a: &usize, b: &usize| graph.node_at(*a).id.cmp(&graph.node_at(*b).id);

    let mut ready: Vec<usize> = (0..count).filter(|&i| remaining[i] == 0).collect();
    let mut scheduled = 0;
    let mut batches = Vec::new();

    while !ready.is_empty() {
        ready.sort_by(by_id);
        scheduled += ready.len();

        let mut next = Vec::new();
        for &idx in &ready {
            for &dependent in &dependents[idx] {
                remaining[dependent] -= 1;
                if remaining[dependent] == 0 {
                    next.push(dependent);
                }
            }
        }

        batches.push(DeletionBatch {
            index: batches.len(),
            nodes: ready.iter().map(|&i| graph.node_at(i).clone()).collect(),
        });
        ready = next;
    }

    if scheduled < count {
        let mut nodes: Vec<String> = (0..count)
            .filter(|&i| remaining[i] > 0)
            .map(|i| graph.node_at(i).id.clone())
            .collect();
        nodes.sort_unstable();
        return Err(CyclicDependencyError { nodes });
    }

    Ok(batches)
}
