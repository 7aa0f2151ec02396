use crate::FlowGraph;
use chrono::{DateTime, Utc};
use std::collections::VecDeque;

/// Immutable copy of the graph at one point in time
#[derive(Debug, Clone)]
pub struct HistorySnapshot {
    pub taken_at: DateTime<Utc>,
    pub graph: FlowGraph,
}

impl HistorySnapshot {
    pub fn new(graph: &FlowGraph) -> Self {
        Self {
            taken_at: Utc::now(),
            graph: graph.clone(),
        }
    }
}

/// Bounded linear undo stack.
///
/// The snapshot under the cursor always equals the live graph. Recording
/// while the cursor is behind the tip discards the redo tail first; the
/// oldest snapshot is evicted once `limit` is exceeded.
#[derive(Debug, Clone)]
pub struct HistoryManager {
    snapshots: VecDeque<HistorySnapshot>,
    cursor: usize,
    limit: usize,
}

impl HistoryManager {
    /// Start a history whose baseline is `graph`
    pub fn new(graph: &FlowGraph, limit: usize) -> Self {
        let mut snapshots = VecDeque::with_capacity(limit.max(1));
        snapshots.push_back(HistorySnapshot::new(graph));
        Self {
            snapshots,
            cursor: 0,
            limit: limit.max(1),
        }
    }

    /// Record the graph as the new tip
    pub fn snapshot(&mut self, graph: &FlowGraph) {
        self.snapshots.truncate(self.cursor + 1);
        self.snapshots.push_back(HistorySnapshot::new(graph));
        while self.snapshots.len() > self.limit {
            self.snapshots.pop_front();
        }
        self.cursor = self.snapshots.len() - 1;
    }

    /// Step back; `None` when already at the oldest snapshot
    pub fn undo(&mut self) -> Option<&FlowGraph> {
        if self.cursor == 0 {
            return None;
        }
        self.cursor -= 1;
        self.snapshots.get(self.cursor).map(|s| &s.graph)
    }

    /// Step forward; `None` when already at the tip
    pub fn redo(&mut self) -> Option<&FlowGraph> {
        if self.cursor + 1 >= self.snapshots.len() {
            return None;
        }
        self.cursor += 1;
        self.snapshots.get(self.cursor).map(|s| &s.graph)
    }

    pub fn can_undo(&self) -> bool {
        self.cursor > 0
    }

    pub fn can_redo(&self) -> bool {
        self.cursor + 1 < self.snapshots.len()
    }

    /// Number of stored snapshots
    pub fn len(&self) -> usize {
        self.snapshots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshots.is_empty()
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn current(&self) -> Option<&HistorySnapshot> {
        self.snapshots.get(self.cursor)
    }

    /// Forget everything and start over from `graph`
    pub fn reset(&mut self, graph: &FlowGraph) {
        *self = Self::new(graph, self.limit);
    }
}
