// Flow Graph Editor - Core Library

pub mod config;
pub mod edge;
pub mod error;
pub mod event;
pub mod graph;
pub mod history;
pub mod layout;
pub mod node;
pub mod numbering;
pub mod ops;
pub mod reconcile;
pub mod serialization;
pub mod session;
pub mod store;
pub mod validation;

// Re-export main types for convenience
pub use config::{EditorConfig, GateConfig, LayoutConfig, LayoutEngine, NodeDefaults};
pub use edge::{Edge, EdgeEnd, DECISION_PORTS};
pub use error::{ConnectionRuleViolation, EditError, GateError};
pub use event::{EventType, GraphEvent};
pub use graph::FlowGraph;
pub use history::{HistoryManager, HistorySnapshot};
pub use layout::{BreadthFirstLayering, DagreLayering, LayeredLayout, LayoutAdapter};
pub use node::{Automation, Node, NodeKind, Rectangle};
pub use ops::{parse_change_ops, parse_change_ops_str, ChangeOp, EdgeSpec, EdgeUpdate, NodeSpec, NodeUpdate, ParsedOps};
pub use reconcile::{ReconcileReport, ReconcileWarning};
pub use serialization::{DirectoryRepository, FlowDocument, FlowRepository, Manifest};
pub use session::{Admission, FlowGenerator, GenerationRequest, GenerationResult, ReconciliationGate, RequestTicket, Session};
pub use store::{EditOutcome, GraphStore, NodeField, UserEdit};
pub use validation::{ConnectivityValidator, ValidatedGraph, ValidationIssue, ValidationResult, ValidationSeverity, Validator};
