//! Change-ops proposed by the flow-generation collaborator.
//!
//! The wire shape is `{"type": "add_node", "node": {...}}`. Model output is
//! not always well formed, so [`parse_change_ops`] accepts a bare array or an
//! `{"operations": [...]}` envelope, rewrites the legacy `{"add_node": {...}}`
//! shape, fills in missing ids and skips entries that still fail to parse.

use crate::{Automation, Node, NodeKind};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use ulid::Ulid;

/// One proposed graph mutation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ChangeOp {
    AddNode { node: NodeSpec },
    UpdateNode { node: NodeUpdate },
    AddEdge { edge: EdgeSpec },
    UpdateEdge { edge: EdgeUpdate },
    DeleteNode { node_id: String },
    DeleteEdge { edge_id: String },
}

impl ChangeOp {
    pub fn add_node(id: impl Into<String>, kind: NodeKind, label: impl Into<String>) -> Self {
        ChangeOp::AddNode {
            node: NodeSpec::new(id, kind, label),
        }
    }

    pub fn update_label(id: impl Into<String>, label: impl Into<String>) -> Self {
        ChangeOp::UpdateNode {
            node: NodeUpdate {
                id: id.into(),
                label: Some(label.into()),
                ..NodeUpdate::default()
            },
        }
    }

    pub fn add_edge(edge: EdgeSpec) -> Self {
        ChangeOp::AddEdge { edge }
    }

    pub fn update_edge(edge: EdgeUpdate) -> Self {
        ChangeOp::UpdateEdge { edge }
    }

    pub fn delete_node(id: impl Into<String>) -> Self {
        ChangeOp::DeleteNode { node_id: id.into() }
    }

    pub fn delete_edge(id: impl Into<String>) -> Self {
        ChangeOp::DeleteEdge { edge_id: id.into() }
    }

    pub fn name(&self) -> &'static str {
        match self {
            ChangeOp::AddNode { .. } => "add_node",
            ChangeOp::UpdateNode { .. } => "update_node",
            ChangeOp::AddEdge { .. } => "add_edge",
            ChangeOp::UpdateEdge { .. } => "update_edge",
            ChangeOp::DeleteNode { .. } => "delete_node",
            ChangeOp::DeleteEdge { .. } => "delete_edge",
        }
    }
}

/// A node to create; missing metadata is filled from the editor defaults
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeSpec {
    #[serde(default)]
    pub id: String,
    #[serde(rename = "type", default)]
    pub kind: NodeKind,
    #[serde(default)]
    pub label: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub automation: Option<Automation>,
    #[serde(default, alias = "logical_id", skip_serializing_if = "Option::is_none")]
    pub logical_id: Option<String>,
}

impl NodeSpec {
    pub fn new(id: impl Into<String>, kind: NodeKind, label: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            kind,
            label: label.into(),
            ..Self::default()
        }
    }

    pub fn owner(mut self, owner: impl Into<String>) -> Self {
        self.owner = Some(owner.into());
        self
    }

    pub fn system(mut self, system: impl Into<String>) -> Self {
        self.system = Some(system.into());
        self
    }

    pub fn automation(mut self, automation: Automation) -> Self {
        self.automation = Some(automation);
        self
    }

    /// The fields an `AddNode` replayed on an existing id may overwrite
    pub fn as_update(&self) -> NodeUpdate {
        NodeUpdate {
            id: self.id.clone(),
            label: Some(self.label.clone()),
            owner: self.owner.clone(),
            system: self.system.clone(),
            automation: self.automation,
        }
    }
}

impl From<&Node> for NodeSpec {
    fn from(node: &Node) -> Self {
        Self {
            id: node.id.clone(),
            kind: node.kind,
            label: node.label.clone(),
            owner: Some(node.owner.clone()),
            system: Some(node.system.clone()),
            automation: Some(node.automation),
            logical_id: node.logical_id.clone(),
        }
    }
}

/// Field overwrites for an existing node; `None` leaves a field alone
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct NodeUpdate {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub automation: Option<Automation>,
}

/// An edge to create
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EdgeSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(alias = "sourceId")]
    pub source: String,
    #[serde(alias = "targetId")]
    pub target: String,
    #[serde(default, alias = "source_handle", skip_serializing_if = "Option::is_none")]
    pub source_handle: Option<String>,
    #[serde(default, alias = "target_handle", skip_serializing_if = "Option::is_none")]
    pub target_handle: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub condition: Option<String>,
}

impl EdgeSpec {
    pub fn new(source: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            target: target.into(),
            ..Self::default()
        }
    }

    pub fn id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn condition(mut self, condition: impl Into<String>) -> Self {
        self.condition = Some(condition.into());
        self
    }

    pub fn handles(mut self, source_handle: Option<&str>, target_handle: Option<&str>) -> Self {
        self.source_handle = source_handle.map(str::to_string);
        self.target_handle = target_handle.map(str::to_string);
        self
    }
}

/// Overwrites for an existing edge; `None` leaves a field alone. Moving an
/// endpoint is checked like a reconnection.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EdgeUpdate {
    pub id: String,
    #[serde(default, alias = "sourceId", skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(default, alias = "targetId", skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,
    #[serde(default, alias = "source_handle", skip_serializing_if = "Option::is_none")]
    pub source_handle: Option<String>,
    #[serde(default, alias = "target_handle", skip_serializing_if = "Option::is_none")]
    pub target_handle: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub condition: Option<String>,
}

impl EdgeUpdate {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Self::default()
        }
    }

    pub fn condition(mut self, condition: impl Into<String>) -> Self {
        self.condition = Some(condition.into());
        self
    }

    pub fn source_handle(mut self, handle: impl Into<String>) -> Self {
        self.source_handle = Some(handle.into());
        self
    }

    pub fn target(mut self, target: impl Into<String>) -> Self {
        self.target = Some(target.into());
        self
    }
}

/// Result of leniently parsing collaborator output
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParsedOps {
    pub ops: Vec<ChangeOp>,
    /// Entries that could not be understood
    pub skipped: usize,
}

const LEGACY_KEYS: [(&str, &str); 6] = [
    ("add_node", "node"),
    ("update_node", "node"),
    ("add_edge", "edge"),
    ("update_edge", "edge"),
    ("delete_node", "node_id"),
    ("delete_edge", "edge_id"),
];

/// Parse a batch of change-ops from JSON text
pub fn parse_change_ops_str(text: &str) -> Result<ParsedOps, serde_json::Error> {
    let value: Value = serde_json::from_str(text)?;
    Ok(parse_change_ops(&value))
}

/// Parse a batch of change-ops, skipping entries that cannot be understood
pub fn parse_change_ops(value: &Value) -> ParsedOps {
    let entries: Vec<&Value> = match value {
        Value::Array(items) => items.iter().collect(),
        Value::Object(map) => match map.get("operations") {
            Some(Value::Array(items)) => items.iter().collect(),
            Some(_) => Vec::new(),
            None => vec![value],
        },
        _ => Vec::new(),
    };

    let mut parsed = ParsedOps::default();
    for entry in entries {
        let normalized = normalize_legacy(entry);
        match serde_json::from_value::<ChangeOp>(normalized) {
            Ok(op) => parsed.ops.push(with_generated_ids(op)),
            Err(err) => {
                tracing::warn!(error = %err, entry = %entry, "skipping unreadable change-op");
                parsed.skipped += 1;
            }
        }
    }
    parsed
}

/// Rewrite `{"add_node": {...}}` into `{"type": "add_node", "node": {...}}`
fn normalize_legacy(entry: &Value) -> Value {
    let Some(map) = entry.as_object() else {
        return entry.clone();
    };
    if map.contains_key("type") {
        return entry.clone();
    }
    for (key, field) in LEGACY_KEYS {
        let Some(payload) = map.get(key) else {
            continue;
        };
        // Legacy deletes carry either a bare id or a record with one
        let payload = if field.ends_with("_id") {
            payload.get("id").cloned().unwrap_or_else(|| payload.clone())
        } else {
            payload.clone()
        };
        let mut normalized = Map::new();
        normalized.insert("type".to_string(), Value::from(key));
        normalized.insert(field.to_string(), payload);
        return Value::Object(normalized);
    }
    entry.clone()
}

fn with_generated_ids(op: ChangeOp) -> ChangeOp {
    match op {
        ChangeOp::AddNode { mut node } if node.id.is_empty() => {
            node.id = Ulid::new().to_string();
            ChangeOp::AddNode { node }
        }
        ChangeOp::AddEdge { mut edge } if edge.id.as_deref().map_or(true, str::is_empty) => {
            edge.id = Some(Ulid::new().to_string());
            ChangeOp::AddEdge { edge }
        }
        other => other,
    }
}
