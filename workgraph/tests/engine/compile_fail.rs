//! Graph validation failures: every structural problem is reported at registration.

use workgraph::graph::validate;
use workgraph::{Edge, GraphDefinition, ValidationIssue};

use crate::common::{counting_loop, engine, linear, registry};

/// **Scenario**: Edge to a node that is not in the graph is rejected with the node named.
#[test]
fn rejects_edge_to_unknown_node() {
    let mut def = linear();
    def.add_edge("c", "missing");
    let err = engine().register_graph(def).unwrap_err();
    assert!(err
        .issues
        .iter()
        .any(|i| matches!(i, ValidationIssue::UnknownEdgeTarget { to, .. } if to == "missing")));
    assert!(err.offending_nodes().contains(&"missing".to_string()));
}

/// **Scenario**: Entry point outside the node list is rejected.
#[test]
fn rejects_missing_entry_point() {
    let mut def = GraphDefinition::new("z");
    def.add_node("a");
    let err = engine().register_graph(def).unwrap_err();
    assert!(err
        .issues
        .contains(&ValidationIssue::EntryPointMissing("z".into())));
}

/// **Scenario**: A listed node with no registered implementation is rejected.
#[test]
fn rejects_unregistered_node() {
    let mut def = GraphDefinition::new("a");
    def.add_node("a").add_node("ghost");
    def.add_edge("a", "ghost");
    let err = engine().register_graph(def).unwrap_err();
    assert!(err
        .issues
        .contains(&ValidationIssue::UnregisteredNode("ghost".into())));
}

/// **Scenario**: An edge guarded by an unregistered condition is rejected.
#[test]
fn rejects_unknown_condition() {
    let mut def = linear();
    def.add_edge("c", Edge::when("a", "never_registered"));
    let err = engine().register_graph(def).unwrap_err();
    assert!(err.issues.iter().any(|i| matches!(
        i,
        ValidationIssue::UnknownCondition { condition, .. } if condition == "never_registered"
    )));
}

/// **Scenario**: Several problems are all reported, not just the first.
#[test]
fn reports_every_issue() {
    let mut def = GraphDefinition::new("nowhere");
    def.add_node("a").add_node("a");
    def.add_edge("a", "missing");
    let err = engine().register_graph(def).unwrap_err();
    assert!(err.issues.len() >= 3, "{err}");
}

/// **Scenario**: Redirecting any single edge endpoint of a valid graph to a missing
/// node makes validation fail.
#[test]
fn mutating_any_edge_endpoint_invalidates() {
    let registry = registry();
    for base in [linear(), counting_loop()] {
        assert!(validate(&base, &registry).is_ok());
        for (from, edges) in &base.edges {
            for idx in 0..edges.len() {
                let mut target = base.clone();
                target.edges.get_mut(from).unwrap()[idx].to = "missing".into();
                assert!(validate(&target, &registry).is_err(), "target {from}[{idx}]");

                let mut source = base.clone();
                let moved = source.edges.remove(from).unwrap();
                source.edges.insert("missing".into(), moved);
                assert!(validate(&source, &registry).is_err(), "source {from}");
            }
        }
    }
}
