use serde::{Deserialize, Serialize};

/// A step in the process flow
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Node {
    /// Opaque, globally unique identifier
    pub id: String,

    /// Node type determines connectivity rules and sizing
    #[serde(rename = "type")]
    pub kind: NodeKind,

    pub label: String,

    /// Dotted sequence number ("1.1.1.<n>"), assigned to Process nodes by numbering
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub logical_id: Option<String>,

    #[serde(default = "placeholder")]
    pub owner: String,
    #[serde(default = "placeholder")]
    pub system: String,

    #[serde(default)]
    pub automation: Automation,

    /// Position and size on the canvas
    #[serde(default)]
    pub bounds: Rectangle,

    /// Set once a human edits label, metadata or position; freezes the node against automation
    #[serde(default)]
    pub user_modified: bool,

    /// Set once a human drags the node; layout leaves its position alone
    #[serde(default)]
    pub position_pinned: bool,
}

impl Node {
    /// Create a new node with placeholder metadata
    pub fn new(id: impl Into<String>, kind: NodeKind, label: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            kind,
            label: label.into(),
            logical_id: None,
            owner: placeholder(),
            system: placeholder(),
            automation: Automation::Manual,
            bounds: Rectangle::default(),
            user_modified: false,
            position_pinned: false,
        }
    }

    /// Logical id as displayed; empty when unassigned
    pub fn logical_id(&self) -> &str {
        self.logical_id.as_deref().unwrap_or("")
    }

    pub fn set_label(&mut self, label: impl Into<String>) {
        self.label = label.into();
    }

    pub fn set_owner(&mut self, owner: impl Into<String>) {
        self.owner = owner.into();
    }

    pub fn set_system(&mut self, system: impl Into<String>) {
        self.system = system.into();
    }

    pub fn set_automation(&mut self, automation: Automation) {
        self.automation = automation;
    }

    /// Move the node, keeping its size
    pub fn set_position(&mut self, x: f32, y: f32) {
        self.bounds.x = x;
        self.bounds.y = y;
    }

    /// Mark the node as human-edited
    pub fn lock(&mut self) {
        self.user_modified = true;
    }

    pub fn is_locked(&self) -> bool {
        self.user_modified
    }
}

fn placeholder() -> String {
    String::from("TBD")
}

/// Node type. Connectivity limits are a property of the variant.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
    Start,
    End,
    #[default]
    #[serde(alias = "default")]
    Process,
    Decision,
    Merge,
}

impl NodeKind {
    /// Maximum accepted incoming edges; `None` means unbounded
    pub fn max_incoming(self) -> Option<usize> {
        match self {
            NodeKind::Start => Some(0),
            NodeKind::End | NodeKind::Merge => None,
            NodeKind::Process | NodeKind::Decision => Some(1),
        }
    }

    /// Maximum accepted outgoing edges; `None` means unbounded
    pub fn max_outgoing(self) -> Option<usize> {
        match self {
            NodeKind::Start | NodeKind::Process => Some(1),
            NodeKind::End => Some(0),
            NodeKind::Decision => Some(3),
            NodeKind::Merge => None,
        }
    }

    /// Fixed outgoing ports, for kinds that have them
    pub fn output_ports(self) -> Option<&'static [&'static str]> {
        match self {
            NodeKind::Decision => Some(&crate::edge::DECISION_PORTS[..]),
            _ => None,
        }
    }

    /// Whether numbering assigns this kind a logical id
    pub fn is_numbered(self) -> bool {
        self == NodeKind::Process
    }

    pub fn as_str(self) -> &'static str {
        match self {
            NodeKind::Start => "start",
            NodeKind::End => "end",
            NodeKind::Process => "process",
            NodeKind::Decision => "decision",
            NodeKind::Merge => "merge",
        }
    }
}

impl std::fmt::Display for NodeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Whether a step is performed by a person or a system
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Automation {
    #[default]
    #[serde(alias = "unknown")]
    Manual,
    Automated,
}

/// Rectangle representing position and size on canvas
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Default)]
pub struct Rectangle {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl Rectangle {
    /// Create a new rectangle
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn center(&self) -> (f32, f32) {
        (self.x + self.width / 2.0, self.y + self.height / 2.0)
    }
}
