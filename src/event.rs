use crate::NodeKind;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A graph event with timestamp
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphEvent {
    pub timestamp: DateTime<Utc>,
    pub event: EventType,
}

impl GraphEvent {
    /// Create a new event with the current timestamp
    pub fn new(event: EventType) -> Self {
        Self {
            timestamp: Utc::now(),
            event,
        }
    }
}

/// What changed. Emitted after the post-mutation pipeline has run, so a
/// listener always observes a renumbered, laid-out graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum EventType {
    NodeAdded {
        id: String,
        kind: NodeKind,
    },

    NodeRemoved {
        id: String,
        edges_removed: usize,
    },

    NodeUpdated {
        id: String,
        field: String,
    },

    EdgeAdded {
        id: String,
        source_id: String,
        target_id: String,
    },

    EdgeRemoved {
        id: String,
    },

    EdgeReconnected {
        id: String,
        source_id: String,
        target_id: String,
    },

    EdgeUpdated {
        id: String,
        field: String,
    },

    /// A node was spliced into an existing edge
    NodeInserted {
        id: String,
        split_edge: String,
    },

    Renumbered {
        process_steps: usize,
    },

    LayoutApplied,

    BatchApplied {
        applied: usize,
        warnings: usize,
    },

    GraphReplaced {
        nodes: usize,
        edges: usize,
    },

    SnapshotCommitted {
        depth: usize,
    },

    Undone,
    Redone,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_creation() {
        let event = GraphEvent::new(EventType::NodeAdded {
            id: "n1".into(),
            kind: NodeKind::Process,
        });

        assert!(event.timestamp <= Utc::now());
    }

    #[test]
    fn test_event_serialization() {
        let event = GraphEvent::new(EventType::EdgeAdded {
            id: "e1".into(),
            source_id: "a".into(),
            target_id: "b".into(),
        });

        let json = serde_json::to_string(&event).unwrap();
        let deserialized: GraphEvent = serde_json::from_str(&json).unwrap();

        assert_eq!(deserialized.event, event.event);
    }
}
