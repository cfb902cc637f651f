//! Property tests for wavefront layering over randomly generated DAGs.

use agentloom::graphs::{AgentGraph, AgentGraphBuilder, wavefronts};
use agentloom::types::NodeId;
use proptest::prelude::*;
use rustc_hash::FxHashMap;
use serde_json::json;

/// Random DAG: nodes `n0..nk`, edges only from lower to higher index, so the
/// result is acyclic by construction.
fn dag_strategy() -> impl Strategy<Value = AgentGraph> {
    (2usize..10).prop_flat_map(|n| {
        let max_edges = n * (n - 1) / 2;
        prop::collection::vec(any::<bool>(), max_edges).prop_map(move |mask| {
            let mut builder = AgentGraphBuilder::new();
            for i in 0..n {
                builder = builder.node(format!("n{i}"), "echo", json!({}));
            }
            let mut k = 0;
            let mut slot = 0usize;
            for i in 0..n {
                for j in (i + 1)..n {
                    if mask[k] {
                        builder =
                            builder.edge(format!("n{i}"), format!("n{j}"), format!("s{slot}"));
                        slot += 1;
                    }
                    k += 1;
                }
            }
            builder.build()
        })
    })
}

fn wave_index(waves: &[Vec<NodeId>]) -> FxHashMap<&NodeId, usize> {
    waves
        .iter()
        .enumerate()
        .flat_map(|(i, wave)| wave.iter().map(move |id| (id, i)))
        .collect()
}

proptest! {
    #[test]
    fn prop_every_node_is_placed_exactly_once(graph in dag_strategy()) {
        let waves = wavefronts(&graph).unwrap();
        let placed: Vec<&NodeId> = waves.iter().flatten().collect();
        prop_assert_eq!(placed.len(), graph.nodes.len());
        let index = wave_index(&waves);
        prop_assert_eq!(index.len(), graph.nodes.len());
    }

    #[test]
    fn prop_dependencies_land_in_earlier_waves(graph in dag_strategy()) {
        let waves = wavefronts(&graph).unwrap();
        let index = wave_index(&waves);
        for edge in &graph.edges {
            prop_assert!(index[&edge.from] < index[&edge.to]);
        }
    }

    #[test]
    fn prop_layering_is_deterministic(graph in dag_strategy()) {
        prop_assert_eq!(wavefronts(&graph).unwrap(), wavefronts(&graph).unwrap());
    }

    #[test]
    fn prop_any_back_edge_makes_layering_fail(graph in dag_strategy()) {
        prop_assume!(!graph.edges.is_empty());
        let mut cyclic = graph.clone();
        let first = cyclic.edges[0].clone();
        // Close a cycle over the first edge.
        cyclic.edges.push(agentloom::graphs::Edge {
            from: first.to,
            to: first.from,
            slot: "back".into(),
        });
        prop_assert!(wavefronts(&cyclic).is_err());
    }
}
