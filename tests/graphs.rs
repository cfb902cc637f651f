mod common;

use agentloom::graphs::{AgentGraphBuilder, ValidationError, validate, wavefronts};
use agentloom::types::NodeId;
use common::make_test_registry;
use serde_json::json;

#[test]
fn valid_diamond_passes() {
    let registry = make_test_registry();
    assert!(validate(&common::diamond_graph(), &registry).is_ok());
}

#[test]
fn duplicate_node_id_is_rejected() {
    let graph = AgentGraphBuilder::new()
        .node("a", "echo", json!({}))
        .node("a", "double", json!({}))
        .build();
    let err = validate(&graph, &make_test_registry()).unwrap_err();
    assert!(matches!(err, ValidationError::DuplicateNode(id) if id == NodeId::from("a")));
}

#[test]
fn unknown_node_type_is_rejected() {
    let graph = AgentGraphBuilder::new()
        .node("a", "teleport", json!({}))
        .build();
    let err = validate(&graph, &make_test_registry()).unwrap_err();
    assert!(matches!(err, ValidationError::UnknownNodeType { kind, .. } if kind == "teleport"));
}

#[test]
fn dangling_edge_is_rejected() {
    let graph = AgentGraphBuilder::new()
        .node("a", "echo", json!({}))
        .edge("a", "ghost", "x")
        .build();
    let err = validate(&graph, &make_test_registry()).unwrap_err();
    assert!(matches!(err, ValidationError::DanglingEdge { node } if node == NodeId::from("ghost")));
}

#[test]
fn undeclared_slot_is_rejected_when_executor_enumerates() {
    let graph = AgentGraphBuilder::new()
        .node("a", "echo", json!({}))
        .node("b", "strict", json!({}))
        .edge("a", "b", "middle")
        .build();
    let err = validate(&graph, &make_test_registry()).unwrap_err();
    assert!(matches!(err, ValidationError::UnknownSlot { slot, .. } if slot == "middle"));
}

#[test]
fn declared_slot_is_accepted() {
    let graph = AgentGraphBuilder::new()
        .node("a", "echo", json!({}))
        .node("b", "strict", json!({}))
        .edge("a", "b", "left")
        .build();
    assert!(validate(&graph, &make_test_registry()).is_ok());
}

#[test]
fn any_slot_is_accepted_when_executor_declares_none() {
    let graph = AgentGraphBuilder::new()
        .node("a", "echo", json!({}))
        .node("b", "echo", json!({}))
        .edge("a", "b", "anything_goes")
        .build();
    assert!(validate(&graph, &make_test_registry()).is_ok());
}

#[test]
fn duplicate_slot_binding_is_rejected() {
    let graph = AgentGraphBuilder::new()
        .node("a", "echo", json!({}))
        .node("b", "echo", json!({}))
        .node("c", "echo", json!({}))
        .edge("a", "c", "x")
        .edge("b", "c", "x")
        .build();
    let err = validate(&graph, &make_test_registry()).unwrap_err();
    assert!(matches!(err, ValidationError::DuplicateSlotBinding { slot, .. } if slot == "x"));
}

#[test]
fn cycle_is_rejected() {
    let graph = AgentGraphBuilder::new()
        .node("a", "echo", json!({}))
        .node("b", "echo", json!({}))
        .node("c", "echo", json!({}))
        .edge("a", "b", "x")
        .edge("b", "c", "x")
        .edge("c", "a", "x")
        .build();
    let err = validate(&graph, &make_test_registry()).unwrap_err();
    assert!(matches!(err, ValidationError::Cycle { nodes } if nodes.len() == 3));
}

#[test]
fn wavefronts_are_deterministic_in_declaration_order() {
    let graph = common::diamond_graph();
    let first = wavefronts(&graph).unwrap();
    let second = wavefronts(&graph).unwrap();
    assert_eq!(first, second);
    assert_eq!(
        first,
        vec![
            vec![NodeId::from("a")],
            vec![NodeId::from("b"), NodeId::from("c")],
            vec![NodeId::from("d")],
        ]
    );
}

#[test]
fn disconnected_components_share_wavefronts() {
    let graph = AgentGraphBuilder::new()
        .node("a", "echo", json!({}))
        .node("x", "echo", json!({}))
        .node("b", "echo", json!({}))
        .edge("a", "b", "n")
        .build();
    let waves = wavefronts(&graph).unwrap();
    assert_eq!(
        waves,
        vec![
            vec![NodeId::from("a"), NodeId::from("x")],
            vec![NodeId::from("b")],
        ]
    );
}
