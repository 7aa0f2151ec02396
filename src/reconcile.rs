//! Folds a batch of proposed change-ops into the working graph.
//!
//! Ops apply strictly in order against the graph as it stands after the
//! previous op, so an edge may reference a node added earlier in the same
//! batch. Nothing here renumbers, lays out or snapshots; the store runs that
//! pipeline once the whole batch is in. A batch never fails: every op that
//! cannot apply becomes a [`ReconcileWarning`].

use crate::config::NodeDefaults;
use crate::event::EventType;
use crate::ops::{ChangeOp, EdgeSpec, EdgeUpdate, NodeSpec, NodeUpdate};
use crate::serialization::FlowDocument;
use crate::validation::ConnectivityValidator;
use crate::{ConnectionRuleViolation, Edge, EditError, FlowGraph, Node};
use std::collections::HashSet;
use thiserror::Error;
use ulid::Ulid;

/// A non-fatal problem with one op of a batch
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ReconcileWarning {
    #[error("dropped edge {source_id} -> {target_id}: node '{missing}' does not exist")]
    OrphanEdgeDropped {
        source_id: String,
        target_id: String,
        missing: String,
    },

    #[error("dropped edge {source_id} -> {target_id}: {violation}")]
    EdgeRejected {
        source_id: String,
        target_id: String,
        violation: ConnectionRuleViolation,
    },

    #[error("dropped edge '{0}': id already in use")]
    DuplicateEdgeId(String),
}

/// What a batch did
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReconcileReport {
    /// Ops that changed the graph
    pub applied: usize,
    /// Ops that were skipped silently (unknown ids, locked nodes)
    pub skipped: usize,
    pub warnings: Vec<ReconcileWarning>,
    /// Changes in application order, for the event log
    pub changes: Vec<EventType>,
}

impl ReconcileReport {
    pub fn has_warnings(&self) -> bool {
        !self.warnings.is_empty()
    }

    pub fn changed_graph(&self) -> bool {
        self.applied > 0
    }

    fn record(&mut self, change: EventType) {
        self.applied += 1;
        self.changes.push(change);
    }
}

/// Apply `ops` in order. The caller owns the post-batch pipeline.
pub fn apply_batch(graph: &mut FlowGraph, ops: &[ChangeOp], defaults: &NodeDefaults) -> ReconcileReport {
    let mut report = ReconcileReport::default();

    for op in ops {
        tracing::trace!(op = op.name(), "applying change-op");
        match op {
            ChangeOp::AddNode { node } => add_node(graph, node, defaults, &mut report),
            ChangeOp::UpdateNode { node } => update_node(graph, node, &mut report),
            ChangeOp::AddEdge { edge } => add_edge(graph, edge, &mut report),
            ChangeOp::UpdateEdge { edge } => update_edge(graph, edge, &mut report),
            ChangeOp::DeleteNode { node_id } => delete_node(graph, node_id, &mut report),
            ChangeOp::DeleteEdge { edge_id } => match graph.remove_edge(edge_id) {
                Some(_) => report.record(EventType::EdgeRemoved { id: edge_id.clone() }),
                None => {
                    tracing::debug!(edge_id = %edge_id, "delete_edge for unknown edge ignored");
                    report.skipped += 1;
                }
            },
        }
    }

    report
}

/// Build a graph from a full node/edge document. Edges go through the same
/// checks as proposed edges, in document order; the ones that fail are
/// dropped with a warning.
pub fn build_graph(nodes: Vec<Node>, edges: Vec<Edge>) -> (FlowGraph, Vec<ReconcileWarning>) {
    let (mut graph, _) = FlowGraph::from_parts(nodes, Vec::new());
    let mut warnings = Vec::new();

    for edge in edges {
        let missing = [&edge.source_id, &edge.target_id]
            .into_iter()
            .find(|id| !graph.contains_node(id))
            .cloned();
        if let Some(missing) = missing {
            warnings.push(ReconcileWarning::OrphanEdgeDropped {
                source_id: edge.source_id,
                target_id: edge.target_id,
                missing,
            });
            continue;
        }

        let (source_id, target_id) = (edge.source_id.clone(), edge.target_id.clone());
        let result = ConnectivityValidator::check_edge(&graph, &edge).and_then(|()| graph.push_edge(edge));
        match result {
            Ok(()) => {}
            Err(EditError::Connection(violation)) => warnings.push(ReconcileWarning::EdgeRejected {
                source_id,
                target_id,
                violation,
            }),
            Err(EditError::DuplicateEdgeId(id)) => warnings.push(ReconcileWarning::DuplicateEdgeId(id)),
            Err(err) => tracing::warn!(error = %err, "edge dropped while loading"),
        }
    }

    for warning in &warnings {
        tracing::warn!("{warning}");
    }
    (graph, warnings)
}

/// Change-ops that turn `graph` into `document`.
///
/// Live edges are matched to document edges by id, then by endpoints.
/// Unmatched live edges and absent nodes are deleted before anything is
/// added, so degree limits see the final shape. Run through
/// [`apply_batch`], locked nodes keep their fields and survive deletion.
pub fn document_ops(graph: &FlowGraph, document: &FlowDocument) -> Vec<ChangeOp> {
    let mut live_ids: Vec<Option<&str>> = document
        .edges
        .iter()
        .map(|edge| graph.edge(&edge.id).map(|live| live.id.as_str()))
        .collect();
    let mut claimed: HashSet<&str> = live_ids.iter().flatten().copied().collect();
    for (slot, edge) in live_ids.iter_mut().zip(&document.edges) {
        if slot.is_some() {
            continue;
        }
        *slot = graph
            .edges()
            .iter()
            .find(|live| {
                !claimed.contains(live.id.as_str())
                    && live.source_id == edge.source_id
                    && live.target_id == edge.target_id
            })
            .map(|live| live.id.as_str());
        if let Some(id) = *slot {
            claimed.insert(id);
        }
    }

    let mut ops: Vec<ChangeOp> = graph
        .edges()
        .iter()
        .filter(|live| !claimed.contains(live.id.as_str()))
        .map(|live| ChangeOp::delete_edge(live.id.clone()))
        .collect();

    let wanted: HashSet<&str> = document.nodes.iter().map(|n| n.id.as_str()).collect();
    ops.extend(
        graph
            .nodes()
            .filter(|n| !wanted.contains(n.id.as_str()))
            .map(|n| ChangeOp::delete_node(n.id.clone())),
    );
    ops.extend(document.nodes.iter().map(|node| ChangeOp::AddNode {
        node: NodeSpec::from(node),
    }));

    for (edge, live_id) in document.edges.iter().zip(live_ids) {
        let op = match live_id {
            Some(live_id) => ChangeOp::update_edge(EdgeUpdate {
                id: live_id.to_string(),
                source: Some(edge.source_id.clone()),
                target: Some(edge.target_id.clone()),
                source_handle: edge.source_handle.clone(),
                target_handle: edge.target_handle.clone(),
                condition: edge.condition.clone(),
            }),
            None => ChangeOp::add_edge(EdgeSpec {
                id: Some(edge.id.clone()),
                source: edge.source_id.clone(),
                target: edge.target_id.clone(),
                source_handle: edge.source_handle.clone(),
                target_handle: edge.target_handle.clone(),
                condition: edge.condition.clone(),
            }),
        };
        ops.push(op);
    }
    ops
}

fn add_node(graph: &mut FlowGraph, spec: &NodeSpec, defaults: &NodeDefaults, report: &mut ReconcileReport) {
    // A replayed id updates in place instead of duplicating the node
    if graph.contains_node(&spec.id) {
        tracing::debug!(node_id = %spec.id, "add_node for existing id treated as update");
        update_node(graph, &spec.as_update(), report);
        return;
    }

    let mut node = Node::new(spec.id.clone(), spec.kind, spec.label.clone());
    node.owner = spec.owner.clone().unwrap_or_else(|| defaults.owner.clone());
    node.system = spec.system.clone().unwrap_or_else(|| defaults.system.clone());
    node.automation = spec.automation.unwrap_or(defaults.automation);
    node.logical_id = spec.logical_id.clone().filter(|id| !id.is_empty());

    let change = EventType::NodeAdded {
        id: node.id.clone(),
        kind: node.kind,
    };
    match graph.insert_node(node) {
        Ok(()) => report.record(change),
        Err(err) => {
            tracing::warn!(node_id = %spec.id, error = %err, "add_node skipped");
            report.skipped += 1;
        }
    }
}

fn update_node(graph: &mut FlowGraph, update: &NodeUpdate, report: &mut ReconcileReport) {
    let Some(node) = graph.node_mut(&update.id) else {
        tracing::debug!(node_id = %update.id, "update_node for unknown node ignored");
        report.skipped += 1;
        return;
    };
    if node.is_locked() {
        tracing::debug!(node_id = %update.id, "update_node skipped, node was edited by the user");
        report.skipped += 1;
        return;
    }

    let mut fields = Vec::new();
    if let Some(label) = &update.label {
        if node.label != *label {
            node.set_label(label.clone());
            fields.push("label");
        }
    }
    if let Some(owner) = &update.owner {
        if node.owner != *owner {
            node.set_owner(owner.clone());
            fields.push("owner");
        }
    }
    if let Some(system) = &update.system {
        if node.system != *system {
            node.set_system(system.clone());
            fields.push("system");
        }
    }
    if let Some(automation) = update.automation {
        if node.automation != automation {
            node.set_automation(automation);
            fields.push("automation");
        }
    }

    if fields.is_empty() {
        report.skipped += 1;
        return;
    }
    report.record(EventType::NodeUpdated {
        id: update.id.clone(),
        field: fields.join(","),
    });
}

fn add_edge(graph: &mut FlowGraph, spec: &EdgeSpec, report: &mut ReconcileReport) {
    for endpoint in [&spec.source, &spec.target] {
        if !graph.contains_node(endpoint) {
            let warning = ReconcileWarning::OrphanEdgeDropped {
                source_id: spec.source.clone(),
                target_id: spec.target.clone(),
                missing: endpoint.clone(),
            };
            tracing::warn!("{warning}");
            report.warnings.push(warning);
            return;
        }
    }

    let id = spec
        .id
        .clone()
        .filter(|id| !id.is_empty())
        .unwrap_or_else(|| Ulid::new().to_string());
    let mut edge = Edge::new(id, spec.source.clone(), spec.target.clone())
        .with_handles(spec.source_handle.clone(), spec.target_handle.clone());
    edge.condition = spec.condition.clone();

    let checked = ConnectivityValidator::check_edge(graph, &edge).and_then(|()| {
        let change = EventType::EdgeAdded {
            id: edge.id.clone(),
            source_id: edge.source_id.clone(),
            target_id: edge.target_id.clone(),
        };
        graph.push_edge(edge).map(|()| change)
    });

    match checked {
        Ok(change) => report.record(change),
        Err(EditError::Connection(violation)) => {
            let warning = ReconcileWarning::EdgeRejected {
                source_id: spec.source.clone(),
                target_id: spec.target.clone(),
                violation,
            };
            tracing::warn!("{warning}");
            report.warnings.push(warning);
        }
        Err(EditError::DuplicateEdgeId(id)) => {
            let warning = ReconcileWarning::DuplicateEdgeId(id);
            tracing::warn!("{warning}");
            report.warnings.push(warning);
        }
        Err(err) => {
            tracing::warn!(error = %err, "add_edge skipped");
            report.skipped += 1;
        }
    }
}

fn update_edge(graph: &mut FlowGraph, update: &EdgeUpdate, report: &mut ReconcileReport) {
    let Some(mut moved) = graph.edge(&update.id).cloned() else {
        tracing::debug!(edge_id = %update.id, "update_edge for unknown edge ignored");
        report.skipped += 1;
        return;
    };

    let mut fields = Vec::new();
    let overwrites = [
        ("source", &update.source, &mut moved.source_id),
        ("target", &update.target, &mut moved.target_id),
    ];
    for (name, proposed, current) in overwrites {
        if let Some(value) = proposed {
            if *current != *value {
                *current = value.clone();
                fields.push(name);
            }
        }
    }
    let optional = [
        ("source_handle", &update.source_handle, &mut moved.source_handle),
        ("target_handle", &update.target_handle, &mut moved.target_handle),
        ("condition", &update.condition, &mut moved.condition),
    ];
    for (name, proposed, current) in optional {
        if proposed.is_some() && *current != *proposed {
            *current = proposed.clone();
            fields.push(name);
        }
    }

    if fields.is_empty() {
        report.skipped += 1;
        return;
    }

    let missing = [&moved.source_id, &moved.target_id]
        .into_iter()
        .find(|id| !graph.contains_node(id))
        .cloned();
    if let Some(missing) = missing {
        let warning = ReconcileWarning::OrphanEdgeDropped {
            source_id: moved.source_id,
            target_id: moved.target_id,
            missing,
        };
        tracing::warn!("{warning}");
        report.warnings.push(warning);
        return;
    }

    match ConnectivityValidator::check_reconnection(graph, &moved) {
        Ok(()) => {
            if let Some(edge) = graph.edge_mut(&update.id) {
                *edge = moved;
            }
            report.record(EventType::EdgeUpdated {
                id: update.id.clone(),
                field: fields.join(","),
            });
        }
        Err(EditError::Connection(violation)) => {
            let warning = ReconcileWarning::EdgeRejected {
                source_id: moved.source_id,
                target_id: moved.target_id,
                violation,
            };
            tracing::warn!("{warning}");
            report.warnings.push(warning);
        }
        Err(err) => {
            tracing::warn!(error = %err, "update_edge skipped");
            report.skipped += 1;
        }
    }
}

fn delete_node(graph: &mut FlowGraph, node_id: &str, report: &mut ReconcileReport) {
    let Some(locked) = graph.node(node_id).map(Node::is_locked) else {
        tracing::debug!(node_id, "delete_node for unknown node ignored");
        report.skipped += 1;
        return;
    };
    if locked {
        tracing::debug!(node_id, "delete_node skipped, node was edited by the user");
        report.skipped += 1;
        return;
    }

    if let Some((_, removed)) = graph.remove_node(node_id) {
        report.record(EventType::NodeRemoved {
            id: node_id.to_string(),
            edges_removed: removed.len(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Automation, NodeKind};
    use assert_matches::assert_matches;
    use pretty_assertions::assert_eq;

    fn apply(graph: &mut FlowGraph, ops: &[ChangeOp]) -> ReconcileReport {
        apply_batch(graph, ops, &NodeDefaults::default())
    }

    #[test]
    fn test_edges_may_reference_nodes_from_same_batch() {
        let mut graph = FlowGraph::new();
        let report = apply(
            &mut graph,
            &[
                ChangeOp::add_node("n1", NodeKind::Start, "Start"),
                ChangeOp::add_node("n2", NodeKind::Process, "Receive Order"),
                ChangeOp::add_edge(EdgeSpec::new("n1", "n2").id("e1")),
            ],
        );

        assert_eq!(report.applied, 3);
        assert!(!report.has_warnings());
        assert_eq!(graph.node_count(), 2);
        assert_eq!(graph.edge("e1").unwrap().source_id, "n1");
    }

    #[test]
    fn test_defaults_fill_missing_metadata() {
        let mut graph = FlowGraph::new();
        let defaults = NodeDefaults {
            owner: "Ops".into(),
            ..NodeDefaults::default()
        };
        let spec = NodeSpec::new("n1", NodeKind::Process, "Pack").automation(Automation::Automated);
        apply_batch(&mut graph, &[ChangeOp::AddNode { node: spec }], &defaults);

        let node = graph.node("n1").unwrap();
        assert_eq!(node.owner, "Ops");
        assert_eq!(node.system, "TBD");
        assert_eq!(node.automation, Automation::Automated);
        assert!(!node.is_locked());
    }

    #[test]
    fn test_orphan_edge_dropped_and_batch_continues() {
        let mut graph = FlowGraph::new();
        let report = apply(
            &mut graph,
            &[
                ChangeOp::add_node("n2", NodeKind::Process, "Receive Order"),
                ChangeOp::add_edge(EdgeSpec::new("ghost", "n2")),
                ChangeOp::add_node("n9", NodeKind::End, "Done"),
            ],
        );

        assert_eq!(report.applied, 2);
        assert_eq!(
            report.warnings,
            vec![ReconcileWarning::OrphanEdgeDropped {
                source_id: "ghost".into(),
                target_id: "n2".into(),
                missing: "ghost".into(),
            }]
        );
        assert_eq!(graph.edge_count(), 0);
        assert!(graph.contains_node("n9"));
    }

    #[test]
    fn test_rejected_edge_becomes_warning() {
        let mut graph = FlowGraph::new();
        let report = apply(
            &mut graph,
            &[
                ChangeOp::add_node("s", NodeKind::Start, "Start"),
                ChangeOp::add_node("a", NodeKind::Process, "A"),
                ChangeOp::add_node("b", NodeKind::Process, "B"),
                ChangeOp::add_edge(EdgeSpec::new("s", "a")),
                ChangeOp::add_edge(EdgeSpec::new("s", "b")),
            ],
        );

        assert_eq!(graph.edge_count(), 1);
        assert_matches!(
            &report.warnings[..],
            [ReconcileWarning::EdgeRejected {
                violation: ConnectionRuleViolation::SourceOutputLimitExceeded { .. },
                ..
            }]
        );
    }

    #[test]
    fn test_locked_node_never_overwritten() {
        let mut graph = FlowGraph::new();
        let mut node = Node::new("n1", NodeKind::Process, "Mine");
        node.lock();
        graph.insert_node(node).unwrap();

        for _ in 0..3 {
            let report = apply(
                &mut graph,
                &[
                    ChangeOp::update_label("n1", "Theirs"),
                    ChangeOp::add_node("n1", NodeKind::Process, "Also theirs"),
                    ChangeOp::delete_node("n1"),
                ],
            );
            assert_eq!(report.applied, 0);
            assert_eq!(report.skipped, 3);
        }

        assert_eq!(graph.node("n1").unwrap().label, "Mine");
    }

    #[test]
    fn test_repeated_add_node_updates_in_place() {
        let mut graph = FlowGraph::new();
        apply(&mut graph, &[ChangeOp::add_node("n1", NodeKind::Process, "Draft")]);
        let report = apply(&mut graph, &[ChangeOp::add_node("n1", NodeKind::Process, "Final")]);

        assert_eq!(graph.node_count(), 1);
        assert_eq!(graph.node("n1").unwrap().label, "Final");
        assert_eq!(
            report.changes,
            vec![EventType::NodeUpdated {
                id: "n1".into(),
                field: "label".into()
            }]
        );
    }

    #[test]
    fn test_update_unknown_node_is_noop() {
        let mut graph = FlowGraph::new();
        let report = apply(&mut graph, &[ChangeOp::update_label("nobody", "x")]);

        assert_eq!(report.applied, 0);
        assert!(!report.has_warnings());
        assert!(graph.is_empty());
    }

    #[test]
    fn test_update_metadata_fields() {
        let mut graph = FlowGraph::new();
        apply(&mut graph, &[ChangeOp::add_node("n1", NodeKind::Process, "Pack")]);
        let update = NodeUpdate {
            id: "n1".into(),
            owner: Some("Warehouse".into()),
            system: Some("WMS".into()),
            ..NodeUpdate::default()
        };
        apply(&mut graph, &[ChangeOp::UpdateNode { node: update }]);

        let node = graph.node("n1").unwrap();
        assert_eq!(node.label, "Pack");
        assert_eq!(node.owner, "Warehouse");
        assert_eq!(node.system, "WMS");
    }

    #[test]
    fn test_deletes() {
        let mut graph = FlowGraph::new();
        apply(
            &mut graph,
            &[
                ChangeOp::add_node("a", NodeKind::Process, "A"),
                ChangeOp::add_node("b", NodeKind::End, "B"),
                ChangeOp::add_edge(EdgeSpec::new("a", "b").id("e1")),
            ],
        );

        let report = apply(&mut graph, &[ChangeOp::delete_edge("e1"), ChangeOp::delete_edge("e1")]);
        assert_eq!(report.applied, 1);
        assert_eq!(report.skipped, 1);

        let report = apply(&mut graph, &[ChangeOp::delete_node("a")]);
        assert_eq!(report.applied, 1);
        assert!(!graph.contains_node("a"));
    }

    #[test]
    fn test_build_graph_drops_bad_edges() {
        let nodes = vec![
            Node::new("s", NodeKind::Start, "Start"),
            Node::new("a", NodeKind::Process, "A"),
            Node::new("b", NodeKind::Process, "B"),
        ];
        let edges = vec![
            Edge::new("e1", "s", "a"),
            Edge::new("e2", "s", "b"),
            Edge::new("e3", "a", "gone"),
        ];

        let (graph, warnings) = build_graph(nodes, edges);

        assert_eq!(graph.edge_count(), 1);
        assert_eq!(warnings.len(), 2);
        assert_matches!(&warnings[0], ReconcileWarning::EdgeRejected { target_id, .. } if target_id == "b");
        assert_matches!(&warnings[1], ReconcileWarning::OrphanEdgeDropped { missing, .. } if missing == "gone");
    }

    #[test]
    fn test_duplicate_edge_id_warned() {
        let mut graph = FlowGraph::new();
        let report = apply(
            &mut graph,
            &[
                ChangeOp::add_node("m", NodeKind::Merge, "Join"),
                ChangeOp::add_node("a", NodeKind::End, "A"),
                ChangeOp::add_node("b", NodeKind::End, "B"),
                ChangeOp::add_edge(EdgeSpec::new("m", "a").id("e1")),
                ChangeOp::add_edge(EdgeSpec::new("m", "b").id("e1")),
            ],
        );

        assert_eq!(report.warnings, vec![ReconcileWarning::DuplicateEdgeId("e1".into())]);
        assert_eq!(graph.edge_count(), 1);
    }

    fn branched() -> FlowGraph {
        let mut graph = FlowGraph::new();
        apply(
            &mut graph,
            &[
                ChangeOp::add_node("d", NodeKind::Decision, "Approved?"),
                ChangeOp::add_node("a", NodeKind::Process, "Ship"),
                ChangeOp::add_node("b", NodeKind::End, "Reject"),
                ChangeOp::add_node("c", NodeKind::Process, "Escalate"),
                ChangeOp::add_edge(EdgeSpec::new("d", "a").id("yes").handles(Some("right"), None)),
                ChangeOp::add_edge(EdgeSpec::new("d", "b").id("no").handles(Some("bottom"), None)),
            ],
        );
        graph
    }

    #[test]
    fn test_update_edge_condition_and_handle() {
        let mut graph = branched();
        let report = apply(
            &mut graph,
            &[ChangeOp::update_edge(EdgeUpdate::new("yes").condition("Yes").source_handle("top"))],
        );

        assert_eq!(
            report.changes,
            vec![EventType::EdgeUpdated {
                id: "yes".into(),
                field: "source_handle,condition".into()
            }]
        );
        let edge = graph.edge("yes").unwrap();
        assert_eq!(edge.condition.as_deref(), Some("Yes"));
        assert_eq!(edge.source_handle.as_deref(), Some("top"));
        assert_eq!(edge.target_id, "a");
    }

    #[test]
    fn test_update_edge_rechecks_ports() {
        let mut graph = branched();
        let before = graph.clone();

        // Port already taken by the other branch
        let report = apply(
            &mut graph,
            &[ChangeOp::update_edge(EdgeUpdate::new("yes").source_handle("bottom"))],
        );

        assert_matches!(
            &report.warnings[..],
            [ReconcileWarning::EdgeRejected {
                violation: ConnectionRuleViolation::HandleInUse { .. },
                ..
            }]
        );
        assert_eq!(graph, before);
    }

    #[test]
    fn test_update_edge_moves_target() {
        let mut graph = branched();
        let report = apply(&mut graph, &[ChangeOp::update_edge(EdgeUpdate::new("yes").target("c"))]);

        assert_eq!(report.applied, 1);
        assert_eq!(graph.edge("yes").unwrap().target_id, "c");
        assert_eq!(graph.incoming("a").count(), 0);

        let report = apply(&mut graph, &[ChangeOp::update_edge(EdgeUpdate::new("yes").target("ghost"))]);
        assert_matches!(
            &report.warnings[..],
            [ReconcileWarning::OrphanEdgeDropped { missing, .. }] if missing == "ghost"
        );
        assert_eq!(graph.edge("yes").unwrap().target_id, "c");
    }

    #[test]
    fn test_update_unknown_or_unchanged_edge_is_noop() {
        let mut graph = branched();
        let before = graph.clone();

        let report = apply(
            &mut graph,
            &[
                ChangeOp::update_edge(EdgeUpdate::new("missing").condition("No")),
                ChangeOp::update_edge(EdgeUpdate::new("no").source_handle("bottom")),
            ],
        );

        assert_eq!(report.applied, 0);
        assert_eq!(report.skipped, 2);
        assert!(!report.has_warnings());
        assert_eq!(graph, before);
    }

    #[test]
    fn test_document_ops_respect_locks() {
        let mut graph = FlowGraph::new();
        apply(
            &mut graph,
            &[
                ChangeOp::add_node("n1", NodeKind::Start, "Start"),
                ChangeOp::add_node("n2", NodeKind::Process, "Receive"),
                ChangeOp::add_node("n3", NodeKind::Process, "Pack"),
                ChangeOp::add_edge(EdgeSpec::new("n1", "n2").id("e1")),
                ChangeOp::add_edge(EdgeSpec::new("n2", "n3").id("e2")),
            ],
        );
        graph.node_mut("n3").unwrap().lock();

        // The document drops n3 and routes n2 to a new end node
        let document = FlowDocument::new(
            vec![
                Node::new("n1", NodeKind::Start, "Start"),
                Node::new("n2", NodeKind::Process, "Receive order"),
                Node::new("n4", NodeKind::End, "Done"),
            ],
            vec![
                Edge::new("x1", "n1", "n2").with_condition("always"),
                Edge::new("e3", "n2", "n4"),
            ],
        );
        let ops = document_ops(&graph, &document);
        let report = apply(&mut graph, &ops);

        assert!(!report.has_warnings());
        assert_eq!(graph.node("n2").unwrap().label, "Receive order");
        assert!(graph.contains_node("n3"));
        assert!(graph.contains_node("n4"));
        assert!(graph.edge("e2").is_none());
        // Matched by endpoints, so the live id stays
        assert!(graph.edge("x1").is_none());
        assert_eq!(graph.edge("e1").unwrap().condition.as_deref(), Some("always"));
        assert_eq!(graph.edge("e3").unwrap().target_id, "n4");
    }
}
