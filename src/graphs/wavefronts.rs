use rustc_hash::FxHashMap;

use super::AgentGraph;
use crate::types::NodeId;

/// Compute the dependency layering of a graph.
///
/// Kahn-style layering: wavefront zero holds every node with no incoming
/// edge; each subsequent wavefront holds the nodes whose dependencies all
/// sit in earlier wavefronts. Within a wavefront, node declaration order is
/// preserved, so scheduling is deterministic.
///
/// Returns `Err` with the nodes trapped in a cycle when the graph is not a
/// DAG. Callers normally reach this through
/// [`validate`](super::validation::validate), which turns the error into a
/// [`ValidationError::Cycle`](super::validation::ValidationError::Cycle).
pub fn wavefronts(graph: &AgentGraph) -> Result<Vec<Vec<NodeId>>, Vec<NodeId>> {
    let mut indegree: FxHashMap<&NodeId, usize> = graph.nodes.iter().map(|n| (&n.id, 0)).collect();
    for edge in &graph.edges {
        if let Some(count) = indegree.get_mut(&edge.to) {
            *count += 1;
        }
    }
    let dependents = graph.dependents();

    let mut waves: Vec<Vec<NodeId>> = Vec::new();
    let mut frontier: Vec<&NodeId> = graph
        .nodes
        .iter()
        .map(|n| &n.id)
        .filter(|id| indegree[*id] == 0)
        .collect();
    let mut placed = 0usize;

    while !frontier.is_empty() {
        placed += frontier.len();
        let mut next: Vec<&NodeId> = Vec::new();
        for id in &frontier {
            for dependent in dependents.get(*id).into_iter().flatten() {
                // Edges into unknown nodes are ignored here; validation
                // rejects them as dangling.
                if let Some(count) = indegree.get_mut(dependent) {
                    *count -= 1;
                    if *count == 0 {
                        next.push(dependent);
                    }
                }
            }
        }
        // Keep declaration order within the wave for determinism.
        next.sort_by_key(|id| graph.nodes.iter().position(|n| &&n.id == id));
        waves.push(frontier.iter().map(|id| (*id).clone()).collect());
        frontier = next;
    }

    if placed < graph.nodes.len() {
        let stuck = graph
            .nodes
            .iter()
            .map(|n| &n.id)
            .filter(|id| indegree[*id] > 0)
            .cloned()
            .collect();
        return Err(stuck);
    }
    Ok(waves)
}
