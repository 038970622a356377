//! Property-based tests for dependency ordering.
//!
//! Random graphs over a small node alphabet check that a successful sort
//! respects every edge and that a failure reports a genuine cycle.

use std::collections::{BTreeMap, BTreeSet};

use proptest::prelude::*;
use tjs_compiler::topological_sort;

/// Graphs whose edges only point from higher to lower nodes, so they are
/// always acyclic.
fn acyclic_graph() -> impl Strategy<Value = BTreeMap<u8, Vec<u8>>> {
    prop::collection::vec(prop::collection::vec(any::<u8>(), 0..4), 1..12).prop_map(|rows| {
        rows.iter()
            .enumerate()
            .map(|(index, targets)| {
                let node = index as u8;
                let dependencies = if node == 0 {
                    Vec::new()
                } else {
                    let mut seen = BTreeSet::new();
                    targets
                        .iter()
                        .map(|target| target % node)
                        .filter(|target| seen.insert(*target))
                        .collect()
                };
                (node, dependencies)
            })
            .collect()
    })
}

/// Arbitrary graphs, possibly cyclic, possibly pointing at unknown nodes.
fn any_graph() -> impl Strategy<Value = BTreeMap<u8, Vec<u8>>> {
    prop::collection::btree_map(0u8..10, prop::collection::vec(0u8..12, 0..4), 1..10)
}

fn position(order: &[u8], node: u8) -> usize {
    order
        .iter()
        .position(|candidate| *candidate == node)
        .unwrap_or_else(|| panic!("node {node} missing from {order:?}"))
}

proptest! {
    /// Every dependency is emitted before the node depending on it.
    #[test]
    fn dependencies_precede_dependents(graph in acyclic_graph()) {
        let order = topological_sort(&graph).expect("acyclic graphs sort");
        for (node, dependencies) in &graph {
            for dependency in dependencies {
                prop_assert!(position(&order, *dependency) < position(&order, *node));
            }
        }
    }

    /// Each node, including dependencies missing from the keys, appears once.
    #[test]
    fn every_node_is_emitted_once(graph in acyclic_graph()) {
        let order = topological_sort(&graph).expect("acyclic graphs sort");
        let unique: BTreeSet<u8> = order.iter().copied().collect();
        prop_assert_eq!(unique.len(), order.len());

        let mut expected: BTreeSet<u8> = graph.keys().copied().collect();
        expected.extend(graph.values().flatten().copied());
        prop_assert_eq!(unique, expected);
    }

    /// A reported cycle closes on itself and follows real edges.
    #[test]
    fn reported_cycles_are_real(graph in any_graph()) {
        if let Err(cycle) = topological_sort(&graph) {
            let path = &cycle.path;
            prop_assert!(path.len() >= 2);
            prop_assert_eq!(path.first(), path.last());
            for pair in path.windows(2) {
                let dependencies = graph.get(&pair[0]).cloned().unwrap_or_default();
                prop_assert!(dependencies.contains(&pair[1]), "missing edge {:?}", pair);
            }
            let members: BTreeSet<u8> = cycle.members().copied().collect();
            prop_assert_eq!(members.len(), path.len() - 1);
        }
    }
}
