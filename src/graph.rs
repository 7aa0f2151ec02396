use crate::{Edge, EditError, Node};
use indexmap::IndexMap;

/// Ordered node and edge collections.
///
/// Nodes keep insertion order (numbering falls back to it for orphans) and
/// edges keep insertion order (numbering walks adjacency in that order).
/// Every edge references two existing nodes; removing a node removes its edges.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FlowGraph {
    /// All nodes indexed by ID, in stored order
    nodes: IndexMap<String, Node>,

    /// All edges, in stored order
    edges: Vec<Edge>,
}

impl FlowGraph {
    /// Create a new empty graph
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a graph from loose records, dropping edges whose endpoints are missing
    /// and later records that reuse an id. Returns the dropped edges.
    pub fn from_parts(nodes: Vec<Node>, edges: Vec<Edge>) -> (Self, Vec<Edge>) {
        let mut graph = Self::new();
        for node in nodes {
            if graph.nodes.contains_key(&node.id) {
                tracing::warn!(node_id = %node.id, "ignoring node with duplicate id");
                continue;
            }
            graph.nodes.insert(node.id.clone(), node);
        }

        let mut dropped = Vec::new();
        for edge in edges {
            let dangling = !graph.contains_node(&edge.source_id) || !graph.contains_node(&edge.target_id);
            if dangling || graph.edge(&edge.id).is_some() {
                dropped.push(edge);
            } else {
                graph.edges.push(edge);
            }
        }
        (graph, dropped)
    }

    // ========== Node Operations ==========

    /// Get a node by ID
    pub fn node(&self, id: &str) -> Option<&Node> {
        self.nodes.get(id)
    }

    pub(crate) fn node_mut(&mut self, id: &str) -> Option<&mut Node> {
        self.nodes.get_mut(id)
    }

    pub fn contains_node(&self, id: &str) -> bool {
        self.nodes.contains_key(id)
    }

    /// All nodes in stored order
    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.values()
    }

    pub(crate) fn nodes_mut(&mut self) -> impl Iterator<Item = &mut Node> {
        self.nodes.values_mut()
    }

    /// Insert a node; ids must be unique
    pub fn insert_node(&mut self, node: Node) -> Result<(), EditError> {
        if self.nodes.contains_key(&node.id) {
            return Err(EditError::DuplicateNodeId(node.id));
        }
        self.nodes.insert(node.id.clone(), node);
        Ok(())
    }

    /// Remove a node and every edge touching it
    pub fn remove_node(&mut self, id: &str) -> Option<(Node, Vec<Edge>)> {
        let node = self.nodes.shift_remove(id)?;
        let (removed, kept): (Vec<Edge>, Vec<Edge>) =
            self.edges.drain(..).partition(|e| e.involves(id));
        self.edges = kept;
        Some((node, removed))
    }

    // ========== Edge Operations ==========

    /// All edges in stored order
    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    /// Get an edge by ID
    pub fn edge(&self, id: &str) -> Option<&Edge> {
        self.edges.iter().find(|e| e.id == id)
    }

    pub(crate) fn edge_mut(&mut self, id: &str) -> Option<&mut Edge> {
        self.edges.iter_mut().find(|e| e.id == id)
    }

    /// Append an edge. Connectivity rules are the caller's responsibility;
    /// only the no-dangling-edge invariant and id uniqueness are checked here.
    pub(crate) fn push_edge(&mut self, edge: Edge) -> Result<(), EditError> {
        for endpoint in [&edge.source_id, &edge.target_id] {
            if !self.contains_node(endpoint) {
                return Err(EditError::MissingEndpoint {
                    node_id: endpoint.clone(),
                });
            }
        }
        if self.edge(&edge.id).is_some() {
            return Err(EditError::DuplicateEdgeId(edge.id));
        }
        self.edges.push(edge);
        Ok(())
    }

    /// Remove an edge by ID
    pub fn remove_edge(&mut self, id: &str) -> Option<Edge> {
        let index = self.edges.iter().position(|e| e.id == id)?;
        Some(self.edges.remove(index))
    }

    /// Edges leaving a node, in stored order
    pub fn outgoing<'a>(&'a self, id: &'a str) -> impl Iterator<Item = &'a Edge> + 'a {
        self.edges.iter().filter(move |e| e.starts_from(id))
    }

    /// Edges entering a node, in stored order
    pub fn incoming<'a>(&'a self, id: &'a str) -> impl Iterator<Item = &'a Edge> + 'a {
        self.edges.iter().filter(move |e| e.ends_at(id))
    }

    /// Nodes with no incoming edges, in stored order
    pub fn roots(&self) -> Vec<&Node> {
        self.nodes
            .values()
            .filter(|n| self.incoming(&n.id).next().is_none())
            .collect()
    }

    // ========== Utility Methods ==========

    /// Count nodes
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Count edges
    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::NodeKind;
    use assert_matches::assert_matches;

    fn chain() -> FlowGraph {
        let mut graph = FlowGraph::new();
        graph.insert_node(Node::new("s", NodeKind::Start, "Start")).unwrap();
        graph.insert_node(Node::new("p", NodeKind::Process, "Work")).unwrap();
        graph.insert_node(Node::new("e", NodeKind::End, "End")).unwrap();
        graph.push_edge(Edge::new("e1", "s", "p")).unwrap();
        graph.push_edge(Edge::new("e2", "p", "e")).unwrap();
        graph
    }

    #[test]
    fn test_graph_creation() {
        let graph = FlowGraph::new();
        assert_eq!(graph.node_count(), 0);
        assert_eq!(graph.edge_count(), 0);
        assert!(graph.is_empty());
    }

    #[test]
    fn test_duplicate_node_rejected() {
        let mut graph = chain();
        let result = graph.insert_node(Node::new("p", NodeKind::Process, "Again"));

        assert_matches!(result, Err(EditError::DuplicateNodeId(id)) if id == "p");
        assert_eq!(graph.node_count(), 3);
    }

    #[test]
    fn test_remove_node_cascades() {
        let mut graph = chain();
        let (node, removed) = graph.remove_node("p").unwrap();

        assert_eq!(node.id, "p");
        assert_eq!(removed.len(), 2);
        assert_eq!(graph.edge_count(), 0);
        assert!(graph.remove_node("p").is_none());
    }

    #[test]
    fn test_dangling_edge_rejected() {
        let mut graph = chain();
        let result = graph.push_edge(Edge::new("e3", "p", "ghost"));

        assert_matches!(result, Err(EditError::MissingEndpoint { node_id }) if node_id == "ghost");
        assert_eq!(graph.edge_count(), 2);
    }

    #[test]
    fn test_adjacency_queries() {
        let graph = chain();

        assert_eq!(graph.outgoing("s").count(), 1);
        assert_eq!(graph.incoming("s").count(), 0);
        assert_eq!(graph.incoming("e").count(), 1);

        let roots: Vec<&str> = graph.roots().iter().map(|n| n.id.as_str()).collect();
        assert_eq!(roots, vec!["s"]);
    }

    #[test]
    fn test_from_parts_drops_dangling_edges() {
        let nodes = vec![
            Node::new("a", NodeKind::Start, "A"),
            Node::new("b", NodeKind::End, "B"),
            Node::new("a", NodeKind::End, "Duplicate"),
        ];
        let edges = vec![Edge::new("e1", "a", "b"), Edge::new("e2", "a", "missing")];

        let (graph, dropped) = FlowGraph::from_parts(nodes, edges);

        assert_eq!(graph.node_count(), 2);
        assert_eq!(graph.node("a").unwrap().kind, NodeKind::Start);
        assert_eq!(graph.edge_count(), 1);
        assert_eq!(dropped.len(), 1);
        assert_eq!(dropped[0].id, "e2");
    }

    #[test]
    fn test_remove_preserves_order() {
        let mut graph = chain();
        graph.remove_node("s");

        let ids: Vec<&str> = graph.nodes().map(|n| n.id.as_str()).collect();
        assert_eq!(ids, vec!["p", "e"]);
    }
}
