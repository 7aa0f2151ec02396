use anyhow::Result;
use flowgraph_editor::{
    ChangeOp, EdgeSpec, EditorConfig, GraphStore, NodeField, NodeKind, ReconcileReport, UserEdit,
    ValidatedGraph,
};
use std::path::Path;
use tracing_subscriber::EnvFilter;

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = match std::env::args().nth(1) {
        Some(path) => EditorConfig::load(Path::new(&path))?,
        None => EditorConfig::default(),
    };

    println!("Flow Graph Editor - Reconciliation Walkthrough");
    println!("==============================================\n");

    let mut store = GraphStore::with_config(config);

    let report = store.apply_reconciliation_batch(&[
        ChangeOp::add_node("n1", NodeKind::Start, "Start"),
        ChangeOp::add_node("n2", NodeKind::Process, "Receive Order"),
        ChangeOp::add_edge(EdgeSpec::new("n1", "n2")),
    ]);
    summarize("First narration", &store, &report);

    let report = store.apply_reconciliation_batch(&[
        ChangeOp::add_node("n3", NodeKind::Decision, "Approved?"),
        ChangeOp::add_edge(EdgeSpec::new("n2", "n3")),
        ChangeOp::add_node("n4", NodeKind::Process, "Ship"),
        ChangeOp::add_edge(EdgeSpec::new("n3", "n4").condition("Yes")),
        ChangeOp::add_node("n5", NodeKind::End, "Done"),
        ChangeOp::add_edge(EdgeSpec::new("n4", "n5")),
    ]);
    summarize("Second narration", &store, &report);

    // The user renames a step; automation can no longer touch it
    store.apply_user_edit(UserEdit::UpdateNode {
        node_id: "n4".into(),
        field: NodeField::Label("Ship to customer".into()),
    })?;
    let report = store.apply_reconciliation_batch(&[
        ChangeOp::update_label("n4", "Dispatch"),
        ChangeOp::add_edge(EdgeSpec::new("ghost", "n2")),
    ]);
    summarize("Third narration", &store, &report);

    let audit = store.graph().audit();
    println!("\nAudit: {} issue(s), complete = {}", audit.issues.len(), audit.is_complete());
    for issue in &audit.issues {
        println!("  [{:?}] {}", issue.severity, issue.message);
    }

    store.undo();
    store.undo();
    println!(
        "\nAfter two undos: {} nodes, {} edges",
        store.graph().node_count(),
        store.graph().edge_count()
    );

    println!("\n{}", store.to_json()?);
    Ok(())
}

fn summarize(title: &str, store: &GraphStore, report: &ReconcileReport) {
    println!("{title}: {} op(s) applied, {} warning(s)", report.applied, report.warnings.len());
    for warning in &report.warnings {
        println!("  ! {warning}");
    }
    for node in store.graph().nodes() {
        println!("  {:<10} {:<20} {}", node.kind.as_str(), node.label, node.logical_id());
    }
}
