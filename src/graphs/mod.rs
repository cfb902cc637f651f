//! Agent graph definition: nodes, slot-addressed edges, and a builder.
//!
//! Graphs are authored and persisted by an external editor; this module owns
//! only their shape and the structural analyses the engine needs:
//! [`validate`](crate::graphs::validation::validate) and
//! [`wavefronts`](crate::graphs::wavefronts::wavefronts).
//!
//! # Core Concepts
//!
//! - **Nodes**: one step of an agent graph, with a type tag resolved through
//!   the [`ExecutorRegistry`](crate::registry::ExecutorRegistry) and a static
//!   JSON configuration.
//! - **Edges**: directed connections mapping a source node's output value to
//!   a named input slot on the target node.
//! - **Wavefronts**: dependency layers; nodes within one wavefront have no
//!   data relation and may execute concurrently.
//!
//! # Quick Start
//!
//! ```
//! use agentloom::graphs::AgentGraphBuilder;
//! use serde_json::json;
//!
//! let graph = AgentGraphBuilder::new()
//!     .node("extract", "script", json!({"source": "return input.message"}))
//!     .node("respond", "inference", json!({"model_id": "gpt-local"}))
//!     .edge("extract", "respond", "prompt")
//!     .build();
//!
//! assert_eq!(graph.nodes.len(), 2);
//! assert_eq!(graph.dependencies(&"respond".into()), vec![&"extract".into()]);
//! ```

pub mod validation;
pub mod wavefronts;

pub use validation::{ValidationError, validate};
pub use wavefronts::wavefronts;

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::types::NodeId;

/// One step of an agent graph.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NodeSpec {
    /// Stable id, unique within the graph.
    pub id: NodeId,
    /// Node-type tag, resolved against the executor registry.
    pub kind: String,
    /// Static configuration interpreted by the executor.
    #[serde(default)]
    pub config: Value,
}

/// Directed edge binding a source node's output to a named input slot.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Edge {
    pub from: NodeId,
    pub to: NodeId,
    /// Input slot name on the target node.
    pub slot: String,
}

/// A directed graph of typed steps owned by an [`Agent`](crate::agents::Agent).
///
/// Must be acyclic; cyclicity is a [`ValidationError`], not a runtime one.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct AgentGraph {
    #[serde(default)]
    pub nodes: Vec<NodeSpec>,
    #[serde(default)]
    pub edges: Vec<Edge>,
}

impl AgentGraph {
    /// Look up a node by id.
    #[must_use]
    pub fn node(&self, id: &NodeId) -> Option<&NodeSpec> {
        self.nodes.iter().find(|n| &n.id == id)
    }

    /// Edges terminating at `id`, in declaration order.
    pub fn incoming(&self, id: &NodeId) -> impl Iterator<Item = &Edge> {
        self.edges.iter().filter(move |e| &e.to == id)
    }

    /// Ids of the nodes `id` depends on, in edge declaration order.
    #[must_use]
    pub fn dependencies(&self, id: &NodeId) -> Vec<&NodeId> {
        self.incoming(id).map(|e| &e.from).collect()
    }

    /// Nodes with no incoming edges; they receive the run's seed inputs.
    #[must_use]
    pub fn roots(&self) -> Vec<&NodeId> {
        self.nodes
            .iter()
            .filter(|n| self.incoming(&n.id).next().is_none())
            .map(|n| &n.id)
            .collect()
    }

    /// Adjacency map from each node to its direct dependents.
    #[must_use]
    pub fn dependents(&self) -> FxHashMap<&NodeId, Vec<&NodeId>> {
        let mut map: FxHashMap<&NodeId, Vec<&NodeId>> = FxHashMap::default();
        for edge in &self.edges {
            map.entry(&edge.from).or_default().push(&edge.to);
        }
        map
    }
}

/// Builder for constructing agent graphs with a fluent API.
///
/// Intended for tests and embedded configuration; production graphs arrive
/// through serde from the external editor. The builder performs no
/// validation — the engine validates before any node executes.
#[derive(Debug, Default)]
pub struct AgentGraphBuilder {
    graph: AgentGraph,
}

impl AgentGraphBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a node with the given id, type tag, and static configuration.
    #[must_use]
    pub fn node(mut self, id: impl Into<NodeId>, kind: impl Into<String>, config: Value) -> Self {
        self.graph.nodes.push(NodeSpec {
            id: id.into(),
            kind: kind.into(),
            config,
        });
        self
    }

    /// Connect `from`'s output to the named input slot on `to`.
    #[must_use]
    pub fn edge(
        mut self,
        from: impl Into<NodeId>,
        to: impl Into<NodeId>,
        slot: impl Into<String>,
    ) -> Self {
        self.graph.edges.push(Edge {
            from: from.into(),
            to: to.into(),
            slot: slot.into(),
        });
        self
    }

    #[must_use]
    pub fn build(self) -> AgentGraph {
        self.graph
    }
}
