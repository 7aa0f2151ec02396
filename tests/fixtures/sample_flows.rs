// Helper functions to build stores and batches used across the integration tests

#![allow(dead_code)]

use flowgraph_editor::{ChangeOp, EdgeSpec, GraphStore, NodeKind, ReconcileReport};

/// Start -> "Receive Order"
pub fn scenario_a_ops() -> Vec<ChangeOp> {
    vec![
        ChangeOp::add_node("n1", NodeKind::Start, "Start"),
        ChangeOp::add_node("n2", NodeKind::Process, "Receive Order"),
        ChangeOp::add_edge(EdgeSpec::new("n1", "n2")),
    ]
}

/// Continues A with an approval decision, a shipping step and an end
pub fn scenario_b_ops() -> Vec<ChangeOp> {
    vec![
        ChangeOp::add_node("n3", NodeKind::Decision, "Approved?"),
        ChangeOp::add_edge(EdgeSpec::new("n2", "n3")),
        ChangeOp::add_node("n4", NodeKind::Process, "Ship"),
        ChangeOp::add_edge(EdgeSpec::new("n3", "n4").condition("Yes")),
        ChangeOp::add_node("n5", NodeKind::End, "Done"),
        ChangeOp::add_edge(EdgeSpec::new("n4", "n5")),
    ]
}

/// A store with scenario A applied
pub fn store_after_a() -> (GraphStore, ReconcileReport) {
    let mut store = GraphStore::new();
    let report = store.apply_reconciliation_batch(&scenario_a_ops());
    (store, report)
}

/// A store with scenarios A and B applied
pub fn store_after_b() -> (GraphStore, ReconcileReport) {
    let (mut store, _) = store_after_a();
    let report = store.apply_reconciliation_batch(&scenario_b_ops());
    (store, report)
}

/// Start -> Decision -> three Process branches, one per port
pub fn fully_branched_decision() -> GraphStore {
    let mut store = GraphStore::new();
    let mut ops = vec![
        ChangeOp::add_node("s", NodeKind::Start, "Start"),
        ChangeOp::add_node("d", NodeKind::Decision, "Route?"),
        ChangeOp::add_edge(EdgeSpec::new("s", "d")),
    ];
    for (i, port) in ["right", "top", "bottom"].into_iter().enumerate() {
        let id = format!("b{i}");
        ops.push(ChangeOp::add_node(id.clone(), NodeKind::Process, format!("Branch {i}")));
        ops.push(ChangeOp::add_edge(EdgeSpec::new("d", id).handles(Some(port), None)));
    }
    store.apply_reconciliation_batch(&ops);
    store
}
