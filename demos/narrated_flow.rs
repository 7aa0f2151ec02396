/// Example: building a flow from narration
///
/// This example demonstrates:
/// - Driving a session with a flow-generation collaborator
/// - Parsing loosely shaped change-ops from model output
/// - Duplicate fragments being skipped
/// - User edits surviving later narration
/// - Saving the flow and its event log per process id

use anyhow::Result;
use flowgraph_editor::*;

/// Stands in for the model: replays canned JSON answers in order
struct CannedGenerator {
    answers: Vec<&'static str>,
}

impl FlowGenerator for CannedGenerator {
    fn generate(&mut self, request: &GenerationRequest) -> Result<GenerationResult> {
        println!("  -> generating from {} char(s) of narration", request.narration.len());
        let answer = if self.answers.is_empty() {
            "[]"
        } else {
            self.answers.remove(0)
        };

        if request.first_generation {
            return Ok(GenerationResult::Replace(FlowDocument::from_json(answer)?));
        }
        let parsed = parse_change_ops_str(answer)?;
        if parsed.skipped > 0 {
            println!("  -> {} unreadable op(s) ignored", parsed.skipped);
        }
        Ok(GenerationResult::Changes(parsed.ops))
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt().with_env_filter("warn").init();

    println!("=== Flow Graph Editor: Narrated Flow Example ===\n");

    let mut generator = CannedGenerator {
        answers: vec![
            r#"{"nodes": [
                  {"id": "start", "type": "start", "label": "Start"},
                  {"id": "receive", "type": "process", "label": "Receive order", "owner": "Sales"}
               ],
               "edges": [{"id": "e1", "source": "start", "target": "receive"}]}"#,
            r#"{"operations": [
                  {"add_node": {"id": "check", "type": "decision", "label": "In stock?"}},
                  {"type": "add_edge", "edge": {"source": "receive", "target": "check"}},
                  {"type": "add_node", "node": {"id": "ship", "type": "default", "label": "Ship"}},
                  {"type": "add_edge", "edge": {"id": "in_stock", "source": "check", "target": "ship", "sourceHandle": "right", "condition": "Yes"}},
                  {"type": "add_node", "node": {"id": "backorder", "label": "Backorder"}},
                  {"type": "add_edge", "edge": {"source": "check", "target": "backorder", "sourceHandle": "bottom", "condition": "No"}},
                  {"type": "add_edge", "edge": {"source": "warehouse", "target": "ship"}},
                  {"type": "teleport"}
               ]}"#,
            r#"[{"type": "update_node", "node": {"id": "receive", "label": "Take order"}},
                {"type": "add_node", "node": {"id": "done", "type": "end", "label": "Done"}},
                {"type": "add_edge", "edge": {"source": "ship", "target": "done"}},
                {"update_edge": {"id": "in_stock", "condition": "In stock"}}]"#,
        ],
    };

    let mut session = Session::default();

    println!("Step 1: First narration...");
    session.process_fragment("Orders come in through sales.", &mut generator)?;
    print_flow(session.store());

    println!("\nStep 2: Second narration (with one orphan edge and one bad op)...");
    if let Some(report) = session.process_fragment("We check stock, then ship or backorder.", &mut generator)? {
        for warning in &report.warnings {
            println!("  ! {warning}");
        }
    }
    print_flow(session.store());

    println!("\nStep 3: Retried network call delivers the same fragment...");
    let again = session.process_fragment("We check stock, then ship or backorder.", &mut generator)?;
    println!("  skipped: {}", again.is_none());

    println!("\nStep 4: User renames 'Receive order', then more narration arrives...");
    session.store_mut().apply_user_edit(UserEdit::UpdateNode {
        node_id: "receive".into(),
        field: NodeField::Label("Receive customer order".into()),
    })?;
    session.process_fragment("Shipping finishes the process.", &mut generator)?;
    print_flow(session.store());

    println!("\nStep 5: Audit...");
    let audit = session.store().audit();
    for issue in &audit.issues {
        println!("  [{:?}] {}", issue.severity, issue.message);
    }

    println!("\nStep 6: Saving...");
    let repo = DirectoryRepository::open(&std::env::temp_dir().join("flowgraph_editor_demo"))?;
    let events = session.store_mut().drain_events();
    repo.save("order-fulfilment", &session.store().serialize())?;
    repo.append_events("order-fulfilment", &events)?;
    println!("  saved to {}", repo.process_dir("order-fulfilment").display());
    println!("  {} event(s) logged", events.len());

    println!("\n=== Example Complete ===");
    Ok(())
}

fn print_flow(store: &GraphStore) {
    for node in store.graph().nodes() {
        println!(
            "  {:<9} {:<24} {:<9} at ({:.0}, {:.0})",
            node.kind.as_str(),
            node.label,
            node.logical_id(),
            node.bounds.x,
            node.bounds.y
        );
    }
    for edge in store.graph().edges() {
        let condition = edge.condition.as_deref().unwrap_or("");
        println!("  {} -> {} {}", edge.source_id, edge.target_id, condition);
    }
}
