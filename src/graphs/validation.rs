use miette::Diagnostic;
use rustc_hash::FxHashSet;
use thiserror::Error;

use super::{AgentGraph, wavefronts};
use crate::registry::ExecutorRegistry;
use crate::types::NodeId;

/// Structural defects that make a graph unrunnable.
///
/// Validation is fatal to the whole run: when any variant is produced, no
/// node executes. Per-node runtime failures are represented by
/// [`NodeError`](crate::node::NodeError) in the result map instead.
#[derive(Debug, Error, Diagnostic)]
pub enum ValidationError {
    #[error("agent graph contains a cycle involving nodes: {nodes:?}")]
    #[diagnostic(
        code(agentloom::graphs::cycle),
        help("Agent graphs must be acyclic; break the loop in the editor.")
    )]
    Cycle { nodes: Vec<NodeId> },

    #[error("duplicate node id `{0}`")]
    #[diagnostic(code(agentloom::graphs::duplicate_node))]
    DuplicateNode(NodeId),

    #[error("node `{node}` has unknown type `{kind}`")]
    #[diagnostic(
        code(agentloom::graphs::unknown_node_type),
        help("Register an executor for this tag before running the agent.")
    )]
    UnknownNodeType { node: NodeId, kind: String },

    #[error("edge references unknown node `{node}`")]
    #[diagnostic(code(agentloom::graphs::dangling_edge))]
    DanglingEdge { node: NodeId },

    #[error("edge into `{node}` targets undeclared input slot `{slot}`")]
    #[diagnostic(
        code(agentloom::graphs::unknown_slot),
        help("The target node's executor enumerates its input slots; use one of them.")
    )]
    UnknownSlot { node: NodeId, slot: String },

    #[error("input slot `{slot}` on node `{node}` is bound more than once")]
    #[diagnostic(code(agentloom::graphs::duplicate_slot_binding))]
    DuplicateSlotBinding { node: NodeId, slot: String },
}

/// Validate a graph against an executor registry.
///
/// Checks, in order: duplicate node ids, unknown node types, dangling
/// edges, undeclared input slots (only when the target's executor
/// enumerates its slots), duplicate slot bindings, and cycles. The first
/// defect found is returned.
pub fn validate(graph: &AgentGraph, registry: &ExecutorRegistry) -> Result<(), ValidationError> {
    let mut ids: FxHashSet<&NodeId> = FxHashSet::default();
    for node in &graph.nodes {
        if !ids.insert(&node.id) {
            return Err(ValidationError::DuplicateNode(node.id.clone()));
        }
        if !registry.contains(&node.kind) {
            return Err(ValidationError::UnknownNodeType {
                node: node.id.clone(),
                kind: node.kind.clone(),
            });
        }
    }

    let mut bound: FxHashSet<(&NodeId, &str)> = FxHashSet::default();
    for edge in &graph.edges {
        for endpoint in [&edge.from, &edge.to] {
            if !ids.contains(endpoint) {
                return Err(ValidationError::DanglingEdge {
                    node: endpoint.clone(),
                });
            }
        }
        // Endpoint existence was checked above.
        if let Some(target) = graph.node(&edge.to) {
            if let Some(slots) = registry
                .get(&target.kind)
                .and_then(|executor| executor.input_slots())
            {
                if !slots.contains(&edge.slot.as_str()) {
                    return Err(ValidationError::UnknownSlot {
                        node: edge.to.clone(),
                        slot: edge.slot.clone(),
                    });
                }
            }
        }
        if !bound.insert((&edge.to, edge.slot.as_str())) {
            return Err(ValidationError::DuplicateSlotBinding {
                node: edge.to.clone(),
                slot: edge.slot.clone(),
            });
        }
    }

    wavefronts(graph).map_err(|nodes| ValidationError::Cycle { nodes })?;
    Ok(())
}
