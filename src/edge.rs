use serde::{Deserialize, Serialize};

/// Fixed outgoing ports of a Decision node, in assignment order
pub const DECISION_PORTS: [&str; 3] = ["right", "top", "bottom"];

/// Directed connection between two nodes
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "camelCase")]
pub struct Edge {
    pub id: String,

    /// Source node (flow goes FROM this node)
    #[serde(alias = "source")]
    pub source_id: String,

    /// Destination node (flow goes TO this node)
    #[serde(alias = "target")]
    pub target_id: String,

    /// Logical port names on either end
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_handle: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_handle: Option<String>,

    /// Branch label; only meaningful when the source is a Decision
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub condition: Option<String>,
}

impl Edge {
    /// Create a new edge without handles or condition
    pub fn new(id: impl Into<String>, source_id: impl Into<String>, target_id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            source_id: source_id.into(),
            target_id: target_id.into(),
            source_handle: None,
            target_handle: None,
            condition: None,
        }
    }

    pub fn with_handles(mut self, source_handle: Option<String>, target_handle: Option<String>) -> Self {
        self.source_handle = source_handle;
        self.target_handle = target_handle;
        self
    }

    pub fn with_condition(mut self, condition: impl Into<String>) -> Self {
        self.condition = Some(condition.into());
        self
    }

    /// Check if this edge touches a given node
    pub fn involves(&self, node_id: &str) -> bool {
        self.source_id == node_id || self.target_id == node_id
    }

    /// Check if this edge starts from a given node
    pub fn starts_from(&self, node_id: &str) -> bool {
        self.source_id == node_id
    }

    /// Check if this edge ends at a given node
    pub fn ends_at(&self, node_id: &str) -> bool {
        self.target_id == node_id
    }

    /// Two edges share a connector when source, target and both handles match
    pub fn same_connector(&self, other: &Edge) -> bool {
        self.source_id == other.source_id
            && self.target_id == other.target_id
            && self.source_handle == other.source_handle
            && self.target_handle == other.target_handle
    }
}

/// Which end of an edge a reconnection moves
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EdgeEnd {
    Source {
        node_id: String,
        handle: Option<String>,
    },
    Target {
        node_id: String,
        handle: Option<String>,
    },
}
