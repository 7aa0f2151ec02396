use crate::config::EditorConfig;
use crate::edge::EdgeEnd;
use crate::history::HistoryManager;
use crate::layout::{midpoint_bounds, LayoutAdapter};
use crate::numbering::renumber;
use crate::ops::ChangeOp;
use crate::reconcile::{apply_batch, build_graph, ReconcileReport, ReconcileWarning};
use crate::serialization::FlowDocument;
use crate::validation::{ConnectivityValidator, ValidationResult, Validator};
use crate::{Automation, Edge, EditError, EventType, FlowGraph, GraphEvent, Node};
use anyhow::Result;
use ulid::Ulid;

/// A single node field a user can edit
#[derive(Debug, Clone, PartialEq)]
pub enum NodeField {
    Label(String),
    Owner(String),
    System(String),
    Automation(Automation),
    /// Drag to a new top-left corner; pins the node against layout
    Position { x: f32, y: f32 },
    /// Hand-set logical id. Process nodes are renumbered, so it only sticks
    /// on the other kinds.
    LogicalId(String),
}

impl NodeField {
    pub fn name(&self) -> &'static str {
        match self {
            NodeField::Label(_) => "label",
            NodeField::Owner(_) => "owner",
            NodeField::System(_) => "system",
            NodeField::Automation(_) => "automation",
            NodeField::Position { .. } => "position",
            NodeField::LogicalId(_) => "logicalId",
        }
    }
}

/// A direct user action
#[derive(Debug, Clone, PartialEq)]
pub enum UserEdit {
    AddNode(Node),
    RemoveNode(String),
    AddEdge(Edge),
    RemoveEdge(String),
    ReconnectEdge { edge_id: String, end: EdgeEnd },
    UpdateNode { node_id: String, field: NodeField },
    /// Split an existing edge with a new node
    InsertOnEdge { edge_id: String, node: Node },
}

/// Whether an accepted edit changed anything
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditOutcome {
    Applied,
    /// The edit referenced an unknown id or set a value already in place
    Unchanged,
}

/// Owns the live graph and is the only way to mutate it.
///
/// Every accepted change runs the same pipeline before returning: renumber,
/// lay out, snapshot, then record events. Rejected edits leave the graph,
/// the history and the event log untouched.
#[derive(Debug)]
pub struct GraphStore {
    graph: FlowGraph,
    history: HistoryManager,
    layout: LayoutAdapter,
    config: EditorConfig,
    events: Vec<GraphEvent>,
}

impl GraphStore {
    /// Create an empty store with default settings
    pub fn new() -> Self {
        Self::with_config(EditorConfig::default())
    }

    pub fn with_config(config: EditorConfig) -> Self {
        let graph = FlowGraph::new();
        Self {
            history: HistoryManager::new(&graph, config.history_limit),
            layout: LayoutAdapter::new(config.layout),
            graph,
            config,
            events: Vec::new(),
        }
    }

    /// Read-only view for rendering
    pub fn graph(&self) -> &FlowGraph {
        &self.graph
    }

    pub fn config(&self) -> &EditorConfig {
        &self.config
    }

    pub fn history(&self) -> &HistoryManager {
        &self.history
    }

    /// Events recorded since the last drain
    pub fn events(&self) -> &[GraphEvent] {
        &self.events
    }

    pub fn drain_events(&mut self) -> Vec<GraphEvent> {
        std::mem::take(&mut self.events)
    }

    /// Advisory completeness report
    pub fn audit(&self) -> ValidationResult {
        Validator::audit(&self.graph)
    }

    // ========== Facade ==========

    /// Apply one user action
    pub fn apply_user_edit(&mut self, edit: UserEdit) -> Result<EditOutcome, EditError> {
        match edit {
            UserEdit::AddNode(node) => self.add_node(node),
            UserEdit::RemoveNode(id) => Ok(self.remove_node(&id)),
            UserEdit::AddEdge(edge) => self.add_edge(edge),
            UserEdit::RemoveEdge(id) => Ok(self.remove_edge(&id)),
            UserEdit::ReconnectEdge { edge_id, end } => self.reconnect_edge(&edge_id, end),
            UserEdit::UpdateNode { node_id, field } => Ok(self.update_node_field(&node_id, field)),
            UserEdit::InsertOnEdge { edge_id, node } => self.insert_on_edge(&edge_id, node),
        }
    }

    /// Fold a batch of proposed ops into the graph as one undoable step
    pub fn apply_reconciliation_batch(&mut self, ops: &[ChangeOp]) -> ReconcileReport {
        let mut report = apply_batch(&mut self.graph, ops, &self.config.defaults);

        if report.changed_graph() {
            let changes = std::mem::take(&mut report.changes);
            self.commit(changes, true);
        }
        self.log(EventType::BatchApplied {
            applied: report.applied,
            warnings: report.warnings.len(),
        });

        tracing::info!(
            ops = ops.len(),
            applied = report.applied,
            skipped = report.skipped,
            warnings = report.warnings.len(),
            "reconciliation batch applied"
        );
        report
    }

    /// Swap in a complete document as one undoable step. Edges that dangle
    /// or break a connectivity rule are dropped.
    pub fn replace(&mut self, document: FlowDocument) -> Vec<ReconcileWarning> {
        let (graph, warnings) = build_graph(document.nodes, document.edges);
        self.graph = graph;

        let change = EventType::GraphReplaced {
            nodes: self.graph.node_count(),
            edges: self.graph.edge_count(),
        };
        self.commit(vec![change], true);
        tracing::info!(
            nodes = self.graph.node_count(),
            edges = self.graph.edge_count(),
            dropped = warnings.len(),
            "graph replaced"
        );
        warnings
    }

    /// Step back one snapshot; `false` at the oldest
    pub fn undo(&mut self) -> bool {
        let Some(graph) = self.history.undo() else {
            return false;
        };
        self.graph = graph.clone();
        self.log(EventType::Undone);
        tracing::info!(cursor = self.history.cursor(), "undo");
        true
    }

    /// Step forward one snapshot; `false` at the tip
    pub fn redo(&mut self) -> bool {
        let Some(graph) = self.history.redo() else {
            return false;
        };
        self.graph = graph.clone();
        self.log(EventType::Redone);
        tracing::info!(cursor = self.history.cursor(), "redo");
        true
    }

    pub fn can_undo(&self) -> bool {
        self.history.can_undo()
    }

    pub fn can_redo(&self) -> bool {
        self.history.can_redo()
    }

    /// The persisted `{nodes, edges}` shape
    pub fn serialize(&self) -> FlowDocument {
        FlowDocument::from_graph(&self.graph)
    }

    /// Load a document as a fresh session: the result becomes the undo baseline
    pub fn deserialize(&mut self, document: FlowDocument) -> Vec<ReconcileWarning> {
        let (graph, warnings) = build_graph(document.nodes, document.edges);
        self.graph = graph;
        self.normalize(true);
        self.history.reset(&self.graph);
        self.events.clear();
        warnings
    }

    pub fn to_json(&self) -> Result<String> {
        self.serialize().to_json()
    }

    pub fn load_json(&mut self, text: &str) -> Result<Vec<ReconcileWarning>> {
        let document = FlowDocument::from_json(text)?;
        Ok(self.deserialize(document))
    }

    // ========== Mutation API ==========

    /// Add a node as given
    pub fn add_node(&mut self, node: Node) -> Result<EditOutcome, EditError> {
        let change = EventType::NodeAdded {
            id: node.id.clone(),
            kind: node.kind,
        };
        self.graph.insert_node(node)?;
        self.commit(vec![change], true);
        Ok(EditOutcome::Applied)
    }

    /// Remove a node and its edges; unknown ids are a no-op
    pub fn remove_node(&mut self, id: &str) -> EditOutcome {
        let Some((_, removed)) = self.graph.remove_node(id) else {
            return EditOutcome::Unchanged;
        };
        let change = EventType::NodeRemoved {
            id: id.to_string(),
            edges_removed: removed.len(),
        };
        self.commit(vec![change], true);
        EditOutcome::Applied
    }

    /// Connect two nodes after checking every connectivity rule
    pub fn add_edge(&mut self, edge: Edge) -> Result<EditOutcome, EditError> {
        ConnectivityValidator::check_edge(&self.graph, &edge)?;
        let change = EventType::EdgeAdded {
            id: edge.id.clone(),
            source_id: edge.source_id.clone(),
            target_id: edge.target_id.clone(),
        };
        self.graph.push_edge(edge)?;
        self.commit(vec![change], true);
        Ok(EditOutcome::Applied)
    }

    /// Remove an edge; unknown ids are a no-op
    pub fn remove_edge(&mut self, id: &str) -> EditOutcome {
        if self.graph.remove_edge(id).is_none() {
            return EditOutcome::Unchanged;
        }
        self.commit(vec![EventType::EdgeRemoved { id: id.to_string() }], true);
        EditOutcome::Applied
    }

    /// Move one end of an existing edge
    pub fn reconnect_edge(&mut self, edge_id: &str, end: EdgeEnd) -> Result<EditOutcome, EditError> {
        let mut moved = self
            .graph
            .edge(edge_id)
            .cloned()
            .ok_or_else(|| EditError::EdgeNotFound(edge_id.to_string()))?;

        match end {
            EdgeEnd::Source { node_id, handle } => {
                moved.source_id = node_id;
                moved.source_handle = handle;
            }
            EdgeEnd::Target { node_id, handle } => {
                moved.target_id = node_id;
                moved.target_handle = handle;
            }
        }

        if self.graph.edge(edge_id) == Some(&moved) {
            return Ok(EditOutcome::Unchanged);
        }
        ConnectivityValidator::check_reconnection(&self.graph, &moved)?;

        let change = EventType::EdgeReconnected {
            id: moved.id.clone(),
            source_id: moved.source_id.clone(),
            target_id: moved.target_id.clone(),
        };
        if let Some(edge) = self.graph.edge_mut(edge_id) {
            *edge = moved;
        }
        self.commit(vec![change], true);
        Ok(EditOutcome::Applied)
    }

    /// Apply a user edit to one field and lock the node against automation.
    /// Only a position change reruns layout.
    pub fn update_node_field(&mut self, node_id: &str, field: NodeField) -> EditOutcome {
        let Some(node) = self.graph.node_mut(node_id) else {
            return EditOutcome::Unchanged;
        };

        let name = field.name();
        let mut moved = false;
        let changed = match field {
            NodeField::Label(label) => replace_if_changed(&mut node.label, label),
            NodeField::Owner(owner) => replace_if_changed(&mut node.owner, owner),
            NodeField::System(system) => replace_if_changed(&mut node.system, system),
            NodeField::Automation(automation) => replace_if_changed(&mut node.automation, automation),
            NodeField::LogicalId(logical_id) => {
                replace_if_changed(&mut node.logical_id, Some(logical_id).filter(|id| !id.is_empty()))
            }
            NodeField::Position { x, y } => {
                let changed = node.bounds.x != x || node.bounds.y != y;
                node.set_position(x, y);
                node.position_pinned = true;
                moved = changed;
                changed
            }
        };
        if !changed {
            return EditOutcome::Unchanged;
        }
        node.lock();

        let change = EventType::NodeUpdated {
            id: node_id.to_string(),
            field: name.to_string(),
        };
        self.commit(vec![change], moved);
        EditOutcome::Applied
    }

    /// Replace edge `s -> t` with `s -> node -> t`, placing the node halfway
    /// between `s` and `t`. All or nothing.
    pub fn insert_on_edge(&mut self, edge_id: &str, mut node: Node) -> Result<EditOutcome, EditError> {
        let original = self
            .graph
            .edge(edge_id)
            .cloned()
            .ok_or_else(|| EditError::EdgeNotFound(edge_id.to_string()))?;
        if self.graph.contains_node(&node.id) {
            return Err(EditError::DuplicateNodeId(node.id));
        }

        if let (Some(source), Some(target)) = (
            self.graph.node(&original.source_id),
            self.graph.node(&original.target_id),
        ) {
            node.bounds = midpoint_bounds(&source.bounds, &target.bounds, node.kind);
        }

        let mut inbound = Edge::new(Ulid::new().to_string(), original.source_id.clone(), node.id.clone())
            .with_handles(original.source_handle.clone(), None);
        inbound.condition = original.condition.clone();
        let outbound = Edge::new(Ulid::new().to_string(), node.id.clone(), original.target_id.clone())
            .with_handles(None, original.target_handle.clone());

        // Work on a copy so a failed check leaves the live graph untouched
        let mut working = self.graph.clone();
        working.remove_edge(edge_id);
        let node_id = node.id.clone();
        working.insert_node(node)?;
        for edge in [inbound, outbound] {
            ConnectivityValidator::check_edge(&working, &edge)?;
            working.push_edge(edge)?;
        }
        self.graph = working;

        let change = EventType::NodeInserted {
            id: node_id,
            split_edge: edge_id.to_string(),
        };
        self.commit(vec![change], true);
        Ok(EditOutcome::Applied)
    }

    // ========== Pipeline ==========

    fn normalize(&mut self, structural: bool) -> Vec<EventType> {
        let mut events = Vec::new();
        if structural {
            let process_steps = renumber(&mut self.graph);
            events.push(EventType::Renumbered { process_steps });
        }
        self.layout.apply(&mut self.graph, self.config.auto_layout);
        events.push(EventType::LayoutApplied);
        events
    }

    /// Run the post-mutation pipeline and record what happened
    fn commit(&mut self, changes: Vec<EventType>, structural: bool) {
        let pipeline = if structural { self.normalize(true) } else { Vec::new() };
        self.history.snapshot(&self.graph);

        for change in changes.into_iter().chain(pipeline) {
            self.log(change);
        }
        self.log(EventType::SnapshotCommitted {
            depth: self.history.len(),
        });
        tracing::debug!(
            nodes = self.graph.node_count(),
            edges = self.graph.edge_count(),
            depth = self.history.len(),
            "mutation committed"
        );
    }

    fn log(&mut self, event: EventType) {
        self.events.push(GraphEvent::new(event));
    }
}

impl Default for GraphStore {
    fn default() -> Self {
        Self::new()
    }
}

fn replace_if_changed<T: PartialEq>(slot: &mut T, value: T) -> bool {
    if *slot == value {
        return false;
    }
    *slot = value;
    true
}
