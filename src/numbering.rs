//! Flow-order logical ids for process steps.
//!
//! Process nodes are numbered `1.1.1.<n>` in depth-first visitation order from
//! every root (a node with no incoming edges), following edges in stored order.
//! Nodes no root reaches are numbered afterwards in stored order. Other node
//! kinds are never numbered; they keep whatever id was set by hand.
//!
//! Numbering is recomputed wholesale after every structural change.

use crate::FlowGraph;
use regex::Regex;
use std::collections::{HashMap, HashSet};
use std::sync::OnceLock;

/// Fixed hierarchy prefix of every generated id
pub const LOGICAL_ID_PREFIX: &str = "1.1.1";

/// Format the id of the `n`th process step (1-based)
pub fn logical_id_for(n: usize) -> String {
    format!("{LOGICAL_ID_PREFIX}.{n}")
}

/// Node ids in numbering order: depth-first from each root, then the rest
pub fn visitation_order(graph: &FlowGraph) -> Vec<String> {
    let mut adjacency: HashMap<&str, Vec<&str>> = HashMap::new();
    for edge in graph.edges() {
        adjacency
            .entry(edge.source_id.as_str())
            .or_default()
            .push(edge.target_id.as_str());
    }

    let mut roots: Vec<&str> = graph.roots().iter().map(|n| n.id.as_str()).collect();
    if roots.is_empty() {
        // Every node sits on a cycle; start anywhere so traversal terminates
        roots.extend(graph.nodes().next().map(|n| n.id.as_str()));
    }

    let mut visited: HashSet<&str> = HashSet::new();
    let mut order = Vec::with_capacity(graph.node_count());

    for root in roots {
        let mut stack = vec![root];
        while let Some(node_id) = stack.pop() {
            if !visited.insert(node_id) {
                continue;
            }
            order.push(node_id.to_string());
            if let Some(targets) = adjacency.get(node_id) {
                // Reversed so the first stored edge is explored first
                stack.extend(targets.iter().rev().filter(|t| !visited.contains(*t)));
            }
        }
    }

    for node in graph.nodes() {
        if !visited.contains(node.id.as_str()) {
            order.push(node.id.clone());
        }
    }

    order
}

/// Reassign logical ids across the whole graph. Returns how many process
/// nodes were numbered.
pub fn renumber(graph: &mut FlowGraph) -> usize {
    let order = visitation_order(graph);
    let mut counter = 0;

    for node_id in order {
        let Some(node) = graph.node_mut(&node_id) else {
            continue;
        };
        if node.kind.is_numbered() {
            counter += 1;
            node.logical_id = Some(logical_id_for(counter));
        }
    }

    tracing::debug!(process_steps = counter, "renumbered flow");
    counter
}

fn logical_id_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^1\.1\.1(\.[1-9][0-9]*)+$").expect("static pattern"))
}

/// Check that an id has the `1.1.1.<n>[.<m>...]` shape with positive parts
pub fn is_valid_logical_id(logical_id: &str) -> bool {
    logical_id_pattern().is_match(logical_id)
}

/// Parent of a nested id: `1.1.1.2.1` -> `1.1.1.2`. Top-level steps have none.
pub fn parent_logical_id(logical_id: &str) -> Option<&str> {
    if !is_valid_logical_id(logical_id) || logical_id.split('.').count() <= 4 {
        return None;
    }
    logical_id.rsplit_once('.').map(|(parent, _)| parent)
}

/// Numeric suffix of a top-level id: `1.1.1.7` -> 7
pub fn sequence_number(logical_id: &str) -> Option<usize> {
    if !is_valid_logical_id(logical_id) || logical_id.split('.').count() != 4 {
        return None;
    }
    logical_id.rsplit('.').next()?.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Edge, Node, NodeKind};
    use pretty_assertions::assert_eq;

    fn build(nodes: &[(&str, NodeKind)], edges: &[(&str, &str)]) -> FlowGraph {
        let mut graph = FlowGraph::new();
        for (id, kind) in nodes {
            graph.insert_node(Node::new(*id, *kind, *id)).unwrap();
        }
        for (i, (from, to)) in edges.iter().enumerate() {
            graph
                .push_edge(Edge::new(format!("e{i}"), *from, *to))
                .unwrap();
        }
        graph
    }

    fn ids(graph: &FlowGraph) -> Vec<(String, String)> {
        graph
            .nodes()
            .map(|n| (n.id.clone(), n.logical_id().to_string()))
            .collect()
    }

    #[test]
    fn test_linear_flow() {
        let mut graph = build(
            &[
                ("s", NodeKind::Start),
                ("a", NodeKind::Process),
                ("b", NodeKind::Process),
                ("e", NodeKind::End),
            ],
            &[("s", "a"), ("a", "b"), ("b", "e")],
        );

        assert_eq!(renumber(&mut graph), 2);
        assert_eq!(graph.node("a").unwrap().logical_id(), "1.1.1.1");
        assert_eq!(graph.node("b").unwrap().logical_id(), "1.1.1.2");
        assert_eq!(graph.node("s").unwrap().logical_id(), "");
        assert_eq!(graph.node("e").unwrap().logical_id(), "");
    }

    #[test]
    fn test_flow_order_not_creation_order() {
        // "late" was created first but comes second in the flow
        let mut graph = build(
            &[
                ("late", NodeKind::Process),
                ("s", NodeKind::Start),
                ("early", NodeKind::Process),
            ],
            &[("s", "early"), ("early", "late")],
        );

        renumber(&mut graph);
        assert_eq!(graph.node("early").unwrap().logical_id(), "1.1.1.1");
        assert_eq!(graph.node("late").unwrap().logical_id(), "1.1.1.2");
    }

    #[test]
    fn test_branches_follow_edge_order() {
        let mut graph = build(
            &[
                ("s", NodeKind::Start),
                ("d", NodeKind::Decision),
                ("yes", NodeKind::Process),
                ("yes2", NodeKind::Process),
                ("no", NodeKind::Process),
            ],
            &[("s", "d"), ("d", "yes"), ("d", "no"), ("yes", "yes2")],
        );

        renumber(&mut graph);
        assert_eq!(graph.node("yes").unwrap().logical_id(), "1.1.1.1");
        assert_eq!(graph.node("yes2").unwrap().logical_id(), "1.1.1.2");
        assert_eq!(graph.node("no").unwrap().logical_id(), "1.1.1.3");
        assert_eq!(graph.node("d").unwrap().logical_id(), "");
    }

    #[test]
    fn test_orphans_numbered_last() {
        let mut graph = build(
            &[
                ("orphan", NodeKind::Process),
                ("s", NodeKind::Start),
                ("a", NodeKind::Process),
            ],
            &[("s", "a")],
        );

        // The orphan has no incoming edges, so it is a root of its own
        renumber(&mut graph);
        assert_eq!(graph.node("orphan").unwrap().logical_id(), "1.1.1.1");
        assert_eq!(graph.node("a").unwrap().logical_id(), "1.1.1.2");
    }

    #[test]
    fn test_cycle_without_roots_terminates() {
        let mut graph = build(
            &[("m", NodeKind::Merge), ("a", NodeKind::Process), ("b", NodeKind::Process)],
            &[("m", "a"), ("a", "b"), ("b", "m")],
        );

        assert_eq!(renumber(&mut graph), 2);
        assert_eq!(graph.node("a").unwrap().logical_id(), "1.1.1.1");
        assert_eq!(graph.node("b").unwrap().logical_id(), "1.1.1.2");
    }

    #[test]
    fn test_unreached_cycle_appended_in_stored_order() {
        let mut graph = build(
            &[
                ("s", NodeKind::Start),
                ("a", NodeKind::Process),
                ("x", NodeKind::Process),
                ("y", NodeKind::Merge),
            ],
            &[("s", "a"), ("x", "y"), ("y", "x")],
        );

        let order = visitation_order(&graph);
        assert_eq!(order, vec!["s", "a", "x", "y"]);

        renumber(&mut graph);
        assert_eq!(graph.node("x").unwrap().logical_id(), "1.1.1.2");
    }

    #[test]
    fn test_manual_ids_kept_on_unnumbered_kinds() {
        let mut graph = build(&[("d", NodeKind::Decision)], &[]);
        graph.node_mut("d").unwrap().logical_id = Some("D-1".into());

        renumber(&mut graph);
        assert_eq!(graph.node("d").unwrap().logical_id(), "D-1");
    }

    #[test]
    fn test_renumber_is_idempotent() {
        let mut graph = build(
            &[
                ("s", NodeKind::Start),
                ("a", NodeKind::Process),
                ("m", NodeKind::Merge),
                ("b", NodeKind::Process),
            ],
            &[("s", "a"), ("a", "m"), ("m", "b")],
        );

        renumber(&mut graph);
        let first = ids(&graph);
        renumber(&mut graph);
        assert_eq!(ids(&graph), first);
    }

    #[test]
    fn test_logical_id_helpers() {
        assert!(is_valid_logical_id("1.1.1.1"));
        assert!(is_valid_logical_id("1.1.1.12.3"));
        assert!(!is_valid_logical_id("1.1.1"));
        assert!(!is_valid_logical_id("1.1.1.0"));
        assert!(!is_valid_logical_id("2.1.1.1"));
        assert!(!is_valid_logical_id(""));

        assert_eq!(parent_logical_id("1.1.1.2.1"), Some("1.1.1.2"));
        assert_eq!(parent_logical_id("1.1.1.3"), None);

        assert_eq!(sequence_number("1.1.1.7"), Some(7));
        assert_eq!(sequence_number("1.1.1.7.1"), None);
        assert_eq!(logical_id_for(4), "1.1.1.4");
    }
}
