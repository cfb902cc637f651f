//! Shared fixtures for integration tests.

use agentloom::graphs::{AgentGraph, AgentGraphBuilder};
use agentloom::registry::ExecutorRegistry;
use rustc_hash::FxHashMap;
use serde_json::{Value, json};
use std::sync::Arc;

use super::nodes::{DoublerNode, EchoNode, FailingNode, SlowNode, StrictSlotsNode};

/// Registry with every reusable test executor registered.
pub fn make_test_registry() -> ExecutorRegistry {
    ExecutorRegistry::builder()
        .register(Arc::new(EchoNode))
        .register(Arc::new(DoublerNode))
        .register(Arc::new(FailingNode))
        .register(Arc::new(SlowNode::default()))
        .register(Arc::new(StrictSlotsNode))
        .build()
}

/// Seed map with a single `input` entry.
pub fn seed_with(value: Value) -> FxHashMap<String, Value> {
    let mut seed = FxHashMap::default();
    seed.insert("input".to_string(), value);
    seed
}

/// a -> (b, c) -> d, all doublers.
pub fn diamond_graph() -> AgentGraph {
    AgentGraphBuilder::new()
        .node("a", "double", json!({}))
        .node("b", "double", json!({}))
        .node("c", "double", json!({}))
        .node("d", "double", json!({}))
        .edge("a", "b", "n")
        .edge("a", "c", "x")
        .edge("b", "d", "left")
        .edge("c", "d", "right")
        .build()
}
