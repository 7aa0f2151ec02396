use crate::node::NodeKind;
use thiserror::Error;

/// A proposed edge that breaks a connectivity rule. The graph is left unchanged.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConnectionRuleViolation {
    #[error("{kind} node '{node_id}' already has its maximum of {limit} outgoing connection(s)")]
    SourceOutputLimitExceeded {
        node_id: String,
        kind: NodeKind,
        limit: usize,
    },

    #[error("{kind} node '{node_id}' already has its maximum of {limit} incoming connection(s)")]
    TargetInputLimitExceeded {
        node_id: String,
        kind: NodeKind,
        limit: usize,
    },

    #[error("a connector from '{source_id}' to '{target_id}' on the same handles already exists")]
    DuplicateConnector { source_id: String, target_id: String },

    #[error("handle '{handle}' on node '{node_id}' is already connected")]
    HandleInUse { node_id: String, handle: String },

    #[error("start node '{node_id}' cannot have incoming connections")]
    StartIncomingForbidden { node_id: String },

    #[error("end node '{node_id}' cannot have outgoing connections")]
    EndOutgoingForbidden { node_id: String },

    #[error("node '{node_id}' cannot connect to itself")]
    SelfLoopForbidden { node_id: String },

    #[error("node '{node_id}' has no output port named '{handle}'")]
    InvalidHandle { node_id: String, handle: String },
}

/// Errors surfaced by direct graph edits
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EditError {
    #[error(transparent)]
    Connection(#[from] ConnectionRuleViolation),

    #[error("edge endpoint '{node_id}' does not exist")]
    MissingEndpoint { node_id: String },

    #[error("a node with id '{0}' already exists")]
    DuplicateNodeId(String),

    #[error("an edge with id '{0}' already exists")]
    DuplicateEdgeId(String),

    #[error("edge '{0}' not found")]
    EdgeNotFound(String),
}

/// Reasons a reconciliation request is refused or its result discarded
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GateError {
    #[error("request {in_flight} is still being generated")]
    Busy { in_flight: u64 },

    #[error("request {ticket} was superseded or cancelled")]
    Stale { ticket: u64 },
}

impl EditError {
    /// The connectivity rule that was broken, if that is why the edit failed
    pub fn violation(&self) -> Option<&ConnectionRuleViolation> {
        match self {
            EditError::Connection(v) => Some(v),
            _ => None,
        }
    }
}
