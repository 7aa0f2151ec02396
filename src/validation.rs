use crate::{ConnectionRuleViolation, Edge, EditError, FlowGraph, NodeKind};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

/// Per-type degree rules, checked whenever an edge is created or moved
pub struct ConnectivityValidator;

impl ConnectivityValidator {
    /// Check a new edge against the current graph
    pub fn check_edge(graph: &FlowGraph, edge: &Edge) -> Result<(), EditError> {
        Self::check(graph, edge, None)
    }

    /// Check an existing edge's prospective state; the edge's current
    /// version (same id) is excluded from every count
    pub fn check_reconnection(graph: &FlowGraph, moved: &Edge) -> Result<(), EditError> {
        Self::check(graph, moved, Some(&moved.id))
    }

    fn check(graph: &FlowGraph, edge: &Edge, ignore: Option<&str>) -> Result<(), EditError> {
        let source = graph
            .node(&edge.source_id)
            .ok_or_else(|| EditError::MissingEndpoint {
                node_id: edge.source_id.clone(),
            })?;
        let target = graph
            .node(&edge.target_id)
            .ok_or_else(|| EditError::MissingEndpoint {
                node_id: edge.target_id.clone(),
            })?;

        let others: Vec<&Edge> = graph
            .edges()
            .iter()
            .filter(|e| Some(e.id.as_str()) != ignore)
            .collect();
        let outgoing: Vec<&Edge> = others
            .iter()
            .copied()
            .filter(|e| e.starts_from(&source.id))
            .collect();
        let incoming: Vec<&Edge> = others
            .iter()
            .copied()
            .filter(|e| e.ends_at(&target.id))
            .collect();

        if source.kind == NodeKind::End {
            return Err(ConnectionRuleViolation::EndOutgoingForbidden {
                node_id: source.id.clone(),
            }
            .into());
        }

        if let Some(limit) = source.kind.max_outgoing() {
            if outgoing.len() >= limit {
                return Err(ConnectionRuleViolation::SourceOutputLimitExceeded {
                    node_id: source.id.clone(),
                    kind: source.kind,
                    limit,
                }
                .into());
            }
        }

        if source.id == target.id {
            return Err(ConnectionRuleViolation::SelfLoopForbidden {
                node_id: source.id.clone(),
            }
            .into());
        }

        if target.kind == NodeKind::Start {
            return Err(ConnectionRuleViolation::StartIncomingForbidden {
                node_id: target.id.clone(),
            }
            .into());
        }

        if let (Some(ports), Some(handle)) = (source.kind.output_ports(), &edge.source_handle) {
            if !ports.contains(&handle.as_str()) {
                return Err(ConnectionRuleViolation::InvalidHandle {
                    node_id: source.id.clone(),
                    handle: handle.clone(),
                }
                .into());
            }
        }

        if others.iter().any(|e| e.same_connector(edge)) {
            return Err(ConnectionRuleViolation::DuplicateConnector {
                source_id: edge.source_id.clone(),
                target_id: edge.target_id.clone(),
            }
            .into());
        }

        if let Some(limit) = target.kind.max_incoming() {
            if incoming.len() >= limit {
                return Err(ConnectionRuleViolation::TargetInputLimitExceeded {
                    node_id: target.id.clone(),
                    kind: target.kind,
                    limit,
                }
                .into());
            }
        }

        // One edge per port, even where the degree limit would allow more
        if let Some(handle) = &edge.source_handle {
            if outgoing.iter().any(|e| e.source_handle.as_ref() == Some(handle)) {
                return Err(ConnectionRuleViolation::HandleInUse {
                    node_id: source.id.clone(),
                    handle: handle.clone(),
                }
                .into());
            }
        }
        if let Some(handle) = &edge.target_handle {
            if incoming.iter().any(|e| e.target_handle.as_ref() == Some(handle)) {
                return Err(ConnectionRuleViolation::HandleInUse {
                    node_id: target.id.clone(),
                    handle: handle.clone(),
                }
                .into());
            }
        }

        Ok(())
    }
}

/// Validation severity level
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ValidationSeverity {
    Info,    // informational
    Warning, // flow is incomplete
}

/// Validation issue
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationIssue {
    pub severity: ValidationSeverity,
    pub message: String,
    pub affected_nodes: Vec<String>,
    pub issue_type: ValidationIssueType,
}

/// Types of validation issues
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ValidationIssueType {
    NoStartNode,
    IncompleteConnections,
    UnreachableNode,
    Cycle,
}

/// Complete audit result
#[derive(Debug, Clone, Default)]
pub struct ValidationResult {
    pub issues: Vec<ValidationIssue>,
}

impl ValidationResult {
    /// Create a new empty validation result
    pub fn new() -> Self {
        Self { issues: Vec::new() }
    }

    /// Add an issue
    pub fn add_issue(&mut self, issue: ValidationIssue) {
        self.issues.push(issue);
    }

    /// Check if there are any warnings
    pub fn has_warnings(&self) -> bool {
        self.issues
            .iter()
            .any(|i| i.severity == ValidationSeverity::Warning)
    }

    /// Get all warnings
    pub fn warnings(&self) -> Vec<&ValidationIssue> {
        self.issues
            .iter()
            .filter(|i| i.severity == ValidationSeverity::Warning)
            .collect()
    }

    /// Get all info messages
    pub fn info(&self) -> Vec<&ValidationIssue> {
        self.issues
            .iter()
            .filter(|i| i.severity == ValidationSeverity::Info)
            .collect()
    }

    /// A complete flow has no warnings
    pub fn is_complete(&self) -> bool {
        !self.has_warnings()
    }
}

/// Whole-graph topology audit. Advisory only: it reports flows that are
/// still being built, it never blocks an edit.
pub struct Validator;

impl Validator {
    /// Run all checks on a graph
    pub fn audit(graph: &FlowGraph) -> ValidationResult {
        let mut result = ValidationResult::new();

        let starts: Vec<&str> = graph
            .nodes()
            .filter(|n| n.kind == NodeKind::Start)
            .map(|n| n.id.as_str())
            .collect();

        if starts.is_empty() && !graph.is_empty() {
            result.add_issue(ValidationIssue {
                severity: ValidationSeverity::Warning,
                message: "Flow has no start node.".to_string(),
                affected_nodes: vec![],
                issue_type: ValidationIssueType::NoStartNode,
            });
        }

        for node in graph.nodes() {
            let inn = graph.incoming(&node.id).count();
            let out = graph.outgoing(&node.id).count();
            if let Some(problem) = Self::degree_problem(node.kind, inn, out) {
                result.add_issue(ValidationIssue {
                    severity: ValidationSeverity::Warning,
                    message: format!("{} node '{}' {}", node.kind, node.label, problem),
                    affected_nodes: vec![node.id.clone()],
                    issue_type: ValidationIssueType::IncompleteConnections,
                });
            }
        }

        if !starts.is_empty() {
            let unreachable = Self::find_unreachable_nodes(graph, &starts);
            if !unreachable.is_empty() {
                result.add_issue(ValidationIssue {
                    severity: ValidationSeverity::Info,
                    message: format!(
                        "{} node(s) cannot be reached from a start node.",
                        unreachable.len()
                    ),
                    affected_nodes: unreachable,
                    issue_type: ValidationIssueType::UnreachableNode,
                });
            }
        }

        if let Some(cycle_nodes) = Self::detect_cycles(graph) {
            result.add_issue(ValidationIssue {
                severity: ValidationSeverity::Info,
                message: format!("Flow loops back through {} node(s).", cycle_nodes.len()),
                affected_nodes: cycle_nodes,
                issue_type: ValidationIssueType::Cycle,
            });
        }

        result
    }

    /// Describe how a node's degrees fall short of a complete flow
    fn degree_problem(kind: NodeKind, inn: usize, out: usize) -> Option<String> {
        match kind {
            NodeKind::Start if out != 1 => {
                Some(format!("must have exactly 1 outgoing connection (has {out})"))
            }
            NodeKind::End if inn < 1 => Some("must have at least 1 incoming connection".into()),
            NodeKind::Process if inn != 1 => {
                Some(format!("must have exactly 1 incoming connection (has {inn})"))
            }
            NodeKind::Decision if inn != 1 => {
                Some(format!("must have exactly 1 incoming connection (has {inn})"))
            }
            NodeKind::Decision if out < 2 => {
                Some(format!("must have 2-3 outgoing connections (has {out})"))
            }
            NodeKind::Merge if inn < 2 => {
                Some(format!("must have at least 2 incoming connections (has {inn})"))
            }
            NodeKind::Merge if out < 1 => Some("must have an outgoing connection".into()),
            _ => None,
        }
    }

    /// Detect cycles in the flow using DFS
    fn detect_cycles(graph: &FlowGraph) -> Option<Vec<String>> {
        let mut visited = HashSet::new();
        let mut rec_stack = HashSet::new();
        let mut cycle_nodes = Vec::new();

        for node in graph.nodes() {
            if !visited.contains(node.id.as_str())
                && Self::dfs_detect_cycle(
                    graph,
                    &node.id,
                    &mut visited,
                    &mut rec_stack,
                    &mut cycle_nodes,
                )
            {
                return Some(cycle_nodes);
            }
        }

        None
    }

    /// DFS helper for cycle detection
    fn dfs_detect_cycle<'a>(
        graph: &'a FlowGraph,
        node_id: &'a str,
        visited: &mut HashSet<&'a str>,
        rec_stack: &mut HashSet<&'a str>,
        cycle_nodes: &mut Vec<String>,
    ) -> bool {
        visited.insert(node_id);
        rec_stack.insert(node_id);

        for edge in graph.outgoing(node_id) {
            let target = edge.target_id.as_str();

            if !visited.contains(target) {
                if Self::dfs_detect_cycle(graph, target, visited, rec_stack, cycle_nodes) {
                    cycle_nodes.push(node_id.to_string());
                    return true;
                }
            } else if rec_stack.contains(target) {
                cycle_nodes.push(node_id.to_string());
                cycle_nodes.push(target.to_string());
                return true;
            }
        }

        rec_stack.remove(node_id);
        false
    }

    /// Find nodes that no start node leads to
    fn find_unreachable_nodes(graph: &FlowGraph, starts: &[&str]) -> Vec<String> {
        let mut reachable = HashSet::new();
        let mut queue: Vec<&str> = starts.to_vec();

        while let Some(node_id) = queue.pop() {
            if !reachable.insert(node_id) {
                continue;
            }
            for edge in graph.outgoing(node_id) {
                queue.push(edge.target_id.as_str());
            }
        }

        graph
            .nodes()
            .filter(|n| !reachable.contains(n.id.as_str()))
            .map(|n| n.id.clone())
            .collect()
    }
}

/// Extension trait for FlowGraph to add auditing
pub trait ValidatedGraph {
    /// Audit the graph
    fn audit(&self) -> ValidationResult;

    /// Get nodes with audit issues, keyed by the highest severity seen
    fn nodes_with_issues(&self, result: &ValidationResult) -> HashMap<String, ValidationSeverity>;
}

impl ValidatedGraph for FlowGraph {
    fn audit(&self) -> ValidationResult {
        Validator::audit(self)
    }

    fn nodes_with_issues(&self, result: &ValidationResult) -> HashMap<String, ValidationSeverity> {
        let mut nodes = HashMap::new();

        for issue in &result.issues {
            for node_id in &issue.affected_nodes {
                nodes
                    .entry(node_id.clone())
                    .and_modify(|severity| {
                        // Keep the highest severity
                        if issue.severity as u8 > *severity as u8 {
                            *severity = issue.severity;
                        }
                    })
                    .or_insert(issue.severity);
            }
        }

        nodes
    }
}
