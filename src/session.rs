//! Narration-driven editing session.
//!
//! Transcript fragments arrive asynchronously, but at most one
//! reconciliation request is ever in flight. The gate hands out tickets;
//! a result is applied only if its ticket is still the current one, so a
//! cancelled or superseded request can never touch the graph. Its narration
//! is not lost: the fragments ride along with the next request. A fragment
//! identical to the last processed one (or to the one in flight) is skipped
//! outright.

use crate::config::{EditorConfig, GateConfig};
use crate::ops::ChangeOp;
use crate::reconcile::{self, ReconcileReport};
use crate::serialization::FlowDocument;
use crate::store::GraphStore;
use crate::GateError;

/// Identifies one reconciliation request
pub type RequestTicket = u64;

/// Outcome of offering a fragment to the gate
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    Accepted(RequestTicket),
    /// Same text as the last processed or in-flight fragment
    Duplicate,
}

#[derive(Debug, Clone)]
struct InFlight {
    ticket: RequestTicket,
    /// Carried-over fragments first, the admitted one last
    fragments: Vec<String>,
}

impl InFlight {
    fn latest(&self) -> Option<&str> {
        self.fragments.last().map(String::as_str)
    }
}

/// Serializes reconciliation requests
#[derive(Debug, Clone)]
pub struct ReconciliationGate {
    config: GateConfig,
    next_ticket: RequestTicket,
    in_flight: Option<InFlight>,
    /// Fragments of superseded or cancelled requests, not yet processed
    pending: Vec<String>,
    last_processed: Option<String>,
}

impl ReconciliationGate {
    pub fn new(config: GateConfig) -> Self {
        Self {
            config,
            next_ticket: 1,
            in_flight: None,
            pending: Vec::new(),
            last_processed: None,
        }
    }

    /// Offer a fragment. A newer request either supersedes the one in flight
    /// or is refused, depending on configuration.
    pub fn admit(&mut self, fragment: &str) -> Result<Admission, GateError> {
        let in_flight_text = self.in_flight.as_ref().and_then(InFlight::latest);
        if self.last_processed.as_deref() == Some(fragment) || in_flight_text == Some(fragment) {
            tracing::debug!("duplicate fragment skipped");
            return Ok(Admission::Duplicate);
        }

        if let Some(current) = &self.in_flight {
            if !self.config.supersede_in_flight {
                return Err(GateError::Busy {
                    in_flight: current.ticket,
                });
            }
            tracing::warn!(superseded = current.ticket, "newer fragment supersedes request in flight");
        }
        if let Some(superseded) = self.in_flight.take() {
            self.pending.extend(superseded.fragments);
        }

        let mut fragments = std::mem::take(&mut self.pending);
        fragments.retain(|f| f != fragment);
        fragments.push(fragment.to_string());

        let ticket = self.next_ticket;
        self.next_ticket += 1;
        self.in_flight = Some(InFlight { ticket, fragments });
        Ok(Admission::Accepted(ticket))
    }

    /// Close a request whose result arrived. Returns every fragment it
    /// covered, oldest first, or `Stale` if the ticket was cancelled or
    /// superseded.
    pub fn complete(&mut self, ticket: RequestTicket) -> Result<Vec<String>, GateError> {
        match self.in_flight.take() {
            Some(current) if current.ticket == ticket => {
                self.last_processed = current.latest().map(str::to_string);
                Ok(current.fragments)
            }
            other => {
                self.in_flight = other;
                tracing::warn!(ticket, "discarding stale reconciliation result");
                Err(GateError::Stale { ticket })
            }
        }
    }

    /// Abandon a request; `false` if it was not the one in flight.
    /// Its fragments carry over to the next admitted request.
    pub fn cancel(&mut self, ticket: RequestTicket) -> bool {
        match self.in_flight.take() {
            Some(current) if current.ticket == ticket => {
                self.pending.extend(current.fragments);
                true
            }
            other => {
                self.in_flight = other;
                false
            }
        }
    }

    pub fn in_flight(&self) -> Option<RequestTicket> {
        self.in_flight.as_ref().map(|f| f.ticket)
    }

    /// Fragments the request in flight covers, oldest first
    pub fn in_flight_fragments(&self) -> &[String] {
        match &self.in_flight {
            Some(current) => &current.fragments,
            None => &[],
        }
    }

    /// Fragments waiting for the next request
    pub fn pending(&self) -> &[String] {
        &self.pending
    }

    pub fn is_busy(&self) -> bool {
        self.in_flight.is_some()
    }
}

impl Default for ReconciliationGate {
    fn default() -> Self {
        Self::new(GateConfig::default())
    }
}

/// What the flow-generation collaborator is given
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationRequest {
    /// Every processed fragment so far, then the ones this request covers
    pub narration: String,
    /// The graph as plain records
    pub graph: FlowDocument,
    /// No graph exists yet, so a full document is expected
    pub first_generation: bool,
}

/// What the collaborator may return
#[derive(Debug, Clone, PartialEq)]
pub enum GenerationResult {
    Replace(FlowDocument),
    Changes(Vec<ChangeOp>),
}

/// Turns narration into a diagram or a diagram update
pub trait FlowGenerator {
    fn generate(&mut self, request: &GenerationRequest) -> anyhow::Result<GenerationResult>;
}

/// One editing session: the store plus gated reconciliation
#[derive(Debug)]
pub struct Session {
    store: GraphStore,
    gate: ReconciliationGate,
    narration: Vec<String>,
}

impl Session {
    pub fn new(config: EditorConfig) -> Self {
        Self::with_store(GraphStore::with_config(config))
    }

    pub fn with_store(store: GraphStore) -> Self {
        Self {
            gate: ReconciliationGate::new(store.config().gate),
            store,
            narration: Vec::new(),
        }
    }

    pub fn store(&self) -> &GraphStore {
        &self.store
    }

    /// Direct user edits, undo and redo go straight to the store
    pub fn store_mut(&mut self) -> &mut GraphStore {
        &mut self.store
    }

    pub fn gate(&self) -> &ReconciliationGate {
        &self.gate
    }

    /// Accepted narration so far
    pub fn narration(&self) -> String {
        self.narration.join("\n")
    }

    /// Start a request for a new fragment. `None` when it is a duplicate.
    pub fn begin(&mut self, fragment: &str) -> Result<Option<(RequestTicket, GenerationRequest)>, GateError> {
        let ticket = match self.gate.admit(fragment)? {
            Admission::Accepted(ticket) => ticket,
            Admission::Duplicate => return Ok(None),
        };

        let mut narration = self.narration.clone();
        narration.extend_from_slice(self.gate.in_flight_fragments());
        let request = GenerationRequest {
            narration: narration.join("\n"),
            graph: self.store.serialize(),
            first_generation: self.store.graph().is_empty(),
        };
        Ok(Some((ticket, request)))
    }

    /// Apply a result if its request is still current.
    ///
    /// A full document replaces the graph only while it is empty. Once a
    /// graph exists the document is folded in as a change batch, so nodes
    /// the user edited stay as they are.
    pub fn complete(&mut self, ticket: RequestTicket, result: GenerationResult) -> Result<ReconcileReport, GateError> {
        let fragments = self.gate.complete(ticket)?;
        self.narration.extend(fragments);

        let report = match result {
            GenerationResult::Changes(ops) => self.store.apply_reconciliation_batch(&ops),
            GenerationResult::Replace(document) if !self.store.graph().is_empty() => {
                tracing::debug!("full document for an existing graph, applying as changes");
                let ops = reconcile::document_ops(self.store.graph(), &document);
                self.store.apply_reconciliation_batch(&ops)
            }
            GenerationResult::Replace(document) => {
                let warnings = self.store.replace(document);
                ReconcileReport {
                    applied: self.store.graph().node_count() + self.store.graph().edge_count(),
                    warnings,
                    ..ReconcileReport::default()
                }
            }
        };
        Ok(report)
    }

    pub fn cancel(&mut self, ticket: RequestTicket) -> bool {
        self.gate.cancel(ticket)
    }

    /// Run one fragment through the collaborator synchronously.
    /// `None` when the fragment was a duplicate.
    pub fn process_fragment(
        &mut self,
        fragment: &str,
        generator: &mut dyn FlowGenerator,
    ) -> anyhow::Result<Option<ReconcileReport>> {
        let Some((ticket, request)) = self.begin(fragment)? else {
            return Ok(None);
        };

        let result = match generator.generate(&request) {
            Ok(result) => result,
            Err(err) => {
                self.cancel(ticket);
                return Err(err.context("flow generation failed"));
            }
        };
        Ok(Some(self.complete(ticket, result)?))
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new(EditorConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ops::EdgeSpec;
    use crate::{Node, NodeField, NodeKind};
    use assert_matches::assert_matches;
    use std::collections::VecDeque;

    struct Scripted {
        results: VecDeque<anyhow::Result<GenerationResult>>,
        requests: Vec<GenerationRequest>,
    }

    impl Scripted {
        fn new(results: Vec<anyhow::Result<GenerationResult>>) -> Self {
            Self {
                results: results.into(),
                requests: Vec::new(),
            }
        }
    }

    impl FlowGenerator for Scripted {
        fn generate(&mut self, request: &GenerationRequest) -> anyhow::Result<GenerationResult> {
            self.requests.push(request.clone());
            self.results
                .pop_front()
                .unwrap_or_else(|| Ok(GenerationResult::Changes(Vec::new())))
        }
    }

    fn first_draft() -> GenerationResult {
        GenerationResult::Replace(FlowDocument::new(
            vec![
                Node::new("n1", NodeKind::Start, "Start"),
                Node::new("n2", NodeKind::Process, "Receive Order"),
            ],
            vec![crate::Edge::new("e1", "n1", "n2")],
        ))
    }

    #[test]
    fn test_gate_duplicate_and_stale() {
        let mut gate = ReconciliationGate::default();

        let Admission::Accepted(first) = gate.admit("we receive orders").unwrap() else {
            panic!("first fragment must be accepted");
        };
        assert_eq!(gate.admit("we receive orders").unwrap(), Admission::Duplicate);

        let Admission::Accepted(second) = gate.admit("then we ship").unwrap() else {
            panic!("newer fragment must supersede");
        };
        assert_matches!(gate.complete(first), Err(GateError::Stale { ticket }) if ticket == first);
        assert_eq!(gate.complete(second).unwrap(), vec!["we receive orders", "then we ship"]);
        assert!(!gate.is_busy());

        assert_eq!(gate.admit("then we ship").unwrap(), Admission::Duplicate);
    }

    #[test]
    fn test_gate_rejects_when_not_superseding() {
        let mut gate = ReconciliationGate::new(GateConfig {
            supersede_in_flight: false,
        });
        let Admission::Accepted(ticket) = gate.admit("a").unwrap() else {
            panic!("expected acceptance");
        };

        assert_eq!(gate.admit("b"), Err(GateError::Busy { in_flight: ticket }));
        assert!(gate.cancel(ticket));
        assert!(!gate.cancel(ticket));
        assert_matches!(gate.admit("b"), Ok(Admission::Accepted(_)));
    }

    #[test]
    fn test_cancelled_result_never_applied() {
        let mut session = Session::default();
        let (ticket, _) = session.begin("we receive orders").unwrap().unwrap();
        session.cancel(ticket);

        let result = session.complete(ticket, first_draft());

        assert_matches!(result, Err(GateError::Stale { .. }));
        assert!(session.store().graph().is_empty());
        assert_eq!(session.narration(), "");
    }

    #[test]
    fn test_process_fragments_accumulates_narration() {
        let mut session = Session::default();
        let mut generator = Scripted::new(vec![
            Ok(first_draft()),
            Ok(GenerationResult::Changes(vec![
                ChangeOp::add_node("n3", NodeKind::End, "Done"),
                ChangeOp::add_edge(EdgeSpec::new("n2", "n3")),
            ])),
        ]);

        session.process_fragment("We receive orders.", &mut generator).unwrap();
        let report = session
            .process_fragment("Then we are done.", &mut generator)
            .unwrap()
            .unwrap();

        assert_eq!(report.applied, 2);
        assert_eq!(session.store().graph().node_count(), 3);
        assert!(generator.requests[0].first_generation);
        assert!(!generator.requests[1].first_generation);
        assert_eq!(generator.requests[1].narration, "We receive orders.\nThen we are done.");
        assert_eq!(generator.requests[1].graph.nodes.len(), 2);
    }

    #[test]
    fn test_duplicate_fragment_skips_generation() {
        let mut session = Session::default();
        let mut generator = Scripted::new(vec![Ok(first_draft())]);

        session.process_fragment("We receive orders.", &mut generator).unwrap();
        let again = session.process_fragment("We receive orders.", &mut generator).unwrap();

        assert!(again.is_none());
        assert_eq!(generator.requests.len(), 1);
        assert_eq!(session.store().history().len(), 2);
    }

    #[test]
    fn test_generator_failure_releases_gate() {
        let mut session = Session::default();
        let mut generator = Scripted::new(vec![Err(anyhow::anyhow!("model unavailable"))]);

        assert!(session.process_fragment("We receive orders.", &mut generator).is_err());
        assert!(!session.gate().is_busy());
        assert!(session.store().graph().is_empty());
    }

    #[test]
    fn test_superseded_fragment_rides_with_next_request() {
        let mut session = Session::default();
        let (first, _) = session.begin("We receive orders.").unwrap().unwrap();
        let (second, request) = session.begin("Then we ship.").unwrap().unwrap();

        assert_eq!(request.narration, "We receive orders.\nThen we ship.");
        assert_matches!(session.complete(first, first_draft()), Err(GateError::Stale { .. }));

        session.complete(second, first_draft()).unwrap();
        assert_eq!(session.narration(), "We receive orders.\nThen we ship.");
        assert!(session.gate().pending().is_empty());
    }

    #[test]
    fn test_failed_fragment_retried_with_next() {
        let mut session = Session::default();
        let mut generator = Scripted::new(vec![Err(anyhow::anyhow!("timeout")), Ok(first_draft())]);

        assert!(session.process_fragment("We receive orders.", &mut generator).is_err());
        assert_eq!(session.gate().pending(), ["We receive orders."]);

        session.process_fragment("Then we ship.", &mut generator).unwrap();
        assert_eq!(generator.requests[1].narration, "We receive orders.\nThen we ship.");
        assert_eq!(session.narration(), "We receive orders.\nThen we ship.");
    }

    #[test]
    fn test_later_full_document_keeps_user_edits() {
        let mut session = Session::default();
        let mut generator = Scripted::new(vec![
            Ok(first_draft()),
            Ok(GenerationResult::Replace(FlowDocument::new(
                vec![
                    Node::new("n2", NodeKind::Process, "Theirs"),
                    Node::new("n3", NodeKind::End, "Done"),
                ],
                vec![crate::Edge::new("e2", "n2", "n3")],
            ))),
        ]);

        session.process_fragment("We receive orders.", &mut generator).unwrap();
        session
            .store_mut()
            .update_node_field("n2", NodeField::Label("Mine".into()));
        let report = session
            .process_fragment("Then we are done.", &mut generator)
            .unwrap()
            .unwrap();

        assert!(!generator.requests[1].first_generation);
        let graph = session.store().graph();
        let kept = graph.node("n2").unwrap();
        assert_eq!(kept.label, "Mine");
        assert!(kept.is_locked());
        // Unedited nodes follow the document
        assert!(!graph.contains_node("n1"));
        assert!(graph.contains_node("n3"));
        assert_eq!(graph.edge("e2").unwrap().source_id, "n2");
        assert!(report.skipped >= 1);
        // One undo step for the whole document
        assert!(session.store_mut().undo());
        assert_eq!(session.store().graph().node("n2").unwrap().label, "Mine");
        assert!(session.store().graph().contains_node("n1"));
    }
}
