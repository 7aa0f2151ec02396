use crate::{Edge, FlowGraph, GraphEvent, Node};
use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

/// The persisted `{nodes, edges}` shape, also what the flow-generation
/// collaborator receives and may return as a full replacement
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FlowDocument {
    #[serde(default)]
    pub nodes: Vec<Node>,
    #[serde(default)]
    pub edges: Vec<Edge>,
}

impl FlowDocument {
    pub fn new(nodes: Vec<Node>, edges: Vec<Edge>) -> Self {
        Self { nodes, edges }
    }

    /// Plain records of a graph, in stored order
    pub fn from_graph(graph: &FlowGraph) -> Self {
        Self {
            nodes: graph.nodes().cloned().collect(),
            edges: graph.edges().to_vec(),
        }
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).context("Failed to serialize flow document")
    }

    pub fn from_json(text: &str) -> Result<Self> {
        serde_json::from_str(text).context("Failed to parse flow document")
    }
}

/// Per-process metadata stored next to the flow
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Manifest {
    pub version: String,
    pub process_id: String,
    pub created: DateTime<Utc>,
    pub modified: DateTime<Utc>,
    pub node_count: usize,
    pub edge_count: usize,
}

impl Manifest {
    /// Create a new manifest
    pub fn new(process_id: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            version: env!("CARGO_PKG_VERSION").to_string(),
            process_id: process_id.into(),
            created: now,
            modified: now,
            node_count: 0,
            edge_count: 0,
        }
    }

    /// Update the modified timestamp and counts
    pub fn touch(&mut self, document: &FlowDocument) {
        self.modified = Utc::now();
        self.node_count = document.nodes.len();
        self.edge_count = document.edges.len();
    }

    /// Save manifest to file
    pub fn save(&self, path: &Path) -> Result<()> {
        let file = File::create(path)
            .with_context(|| format!("Failed to create manifest file: {}", path.display()))?;
        let writer = BufWriter::new(file);
        serde_json::to_writer_pretty(writer, self)
            .with_context(|| format!("Failed to write manifest to: {}", path.display()))?;
        Ok(())
    }

    /// Load manifest from file
    pub fn load(path: &Path) -> Result<Self> {
        let file = File::open(path)
            .with_context(|| format!("Failed to open manifest file: {}", path.display()))?;
        let reader = BufReader::new(file);
        serde_json::from_reader(reader)
            .with_context(|| format!("Failed to parse manifest from: {}", path.display()))
    }
}

/// Load and save of flow documents keyed by process id
pub trait FlowRepository {
    fn save(&self, process_id: &str, document: &FlowDocument) -> Result<()>;

    /// `None` when nothing has been saved for the process yet
    fn load(&self, process_id: &str) -> Result<Option<FlowDocument>>;

    fn append_events(&self, process_id: &str, events: &[GraphEvent]) -> Result<()>;
}

fn process_id_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^[A-Za-z0-9_-]+$").expect("static pattern"))
}

/// Process ids become directory names
pub fn check_process_id(process_id: &str) -> Result<()> {
    if process_id_pattern().is_match(process_id) {
        Ok(())
    } else {
        Err(anyhow!("Invalid process id: {:?}", process_id))
    }
}

/// One directory per process under a common root:
/// `<root>/<process_id>/{flow.json, manifest.json, events.jsonl}`
pub struct DirectoryRepository {
    root_dir: PathBuf,
}

impl DirectoryRepository {
    /// Open a repository, creating the root directory if needed
    pub fn open(path: &Path) -> Result<Self> {
        fs::create_dir_all(path)
            .with_context(|| format!("Failed to create repository directory: {}", path.display()))?;
        Ok(Self {
            root_dir: path.to_path_buf(),
        })
    }

    /// Get the root directory
    pub fn root_dir(&self) -> &Path {
        &self.root_dir
    }

    pub fn process_dir(&self, process_id: &str) -> PathBuf {
        self.root_dir.join(process_id)
    }

    /// Get path to flow.json
    pub fn flow_path(&self, process_id: &str) -> PathBuf {
        self.process_dir(process_id).join("flow.json")
    }

    /// Get path to manifest.json
    pub fn manifest_path(&self, process_id: &str) -> PathBuf {
        self.process_dir(process_id).join("manifest.json")
    }

    /// Get path to events.jsonl
    pub fn events_path(&self, process_id: &str) -> PathBuf {
        self.process_dir(process_id).join("events.jsonl")
    }

    /// Load manifest
    pub fn load_manifest(&self, process_id: &str) -> Result<Manifest> {
        check_process_id(process_id)?;
        Manifest::load(&self.manifest_path(process_id))
    }

    /// Ids of every stored process, sorted
    pub fn processes(&self) -> Result<Vec<String>> {
        let entries = fs::read_dir(&self.root_dir)
            .with_context(|| format!("Failed to list repository: {}", self.root_dir.display()))?;

        let mut ids = Vec::new();
        for entry in entries {
            let entry = entry.with_context(|| {
                format!("Failed to read entry in: {}", self.root_dir.display())
            })?;
            let name = entry.file_name().to_string_lossy().into_owned();
            if entry.path().join("flow.json").exists() && check_process_id(&name).is_ok() {
                ids.push(name);
            }
        }
        ids.sort();
        Ok(ids)
    }

    /// Load all events from events.jsonl
    pub fn load_events(&self, process_id: &str) -> Result<Vec<GraphEvent>> {
        check_process_id(process_id)?;
        let events_path = self.events_path(process_id);

        if !events_path.exists() {
            return Ok(Vec::new());
        }

        let file = File::open(&events_path)
            .with_context(|| format!("Failed to open events.jsonl: {}", events_path.display()))?;
        let reader = BufReader::new(file);

        let mut events = Vec::new();
        for (line_num, line) in reader.lines().enumerate() {
            let line = line.with_context(|| {
                format!(
                    "Failed to read line {} from: {}",
                    line_num + 1,
                    events_path.display()
                )
            })?;

            if line.trim().is_empty() {
                continue;
            }

            let event: GraphEvent = serde_json::from_str(&line).with_context(|| {
                format!(
                    "Failed to parse event on line {} from: {}",
                    line_num + 1,
                    events_path.display()
                )
            })?;

            events.push(event);
        }

        Ok(events)
    }
}

impl FlowRepository for DirectoryRepository {
    fn save(&self, process_id: &str, document: &FlowDocument) -> Result<()> {
        check_process_id(process_id)?;
        let dir = self.process_dir(process_id);
        fs::create_dir_all(&dir)
            .with_context(|| format!("Failed to create process directory: {}", dir.display()))?;

        // A corrupt manifest fails the save before anything is written
        let manifest_path = self.manifest_path(process_id);
        let mut manifest = if manifest_path.exists() {
            Manifest::load(&manifest_path)?
        } else {
            Manifest::new(process_id)
        };

        let flow_path = self.flow_path(process_id);
        let file = File::create(&flow_path)
            .with_context(|| format!("Failed to create flow.json: {}", flow_path.display()))?;
        let mut writer = BufWriter::new(file);
        serde_json::to_writer_pretty(&mut writer, document)
            .with_context(|| format!("Failed to write flow.json: {}", flow_path.display()))?;
        writer
            .flush()
            .with_context(|| format!("Failed to flush flow.json: {}", flow_path.display()))?;

        manifest.touch(document);
        manifest.save(&manifest_path)?;

        tracing::info!(
            process_id,
            nodes = document.nodes.len(),
            edges = document.edges.len(),
            "saved flow"
        );
        Ok(())
    }

    fn load(&self, process_id: &str) -> Result<Option<FlowDocument>> {
        check_process_id(process_id)?;
        let flow_path = self.flow_path(process_id);
        if !flow_path.exists() {
            return Ok(None);
        }

        let file = File::open(&flow_path)
            .with_context(|| format!("Failed to open flow.json: {}", flow_path.display()))?;
        let reader = BufReader::new(file);
        let document = serde_json::from_reader(reader)
            .with_context(|| format!("Failed to parse flow.json: {}", flow_path.display()))?;

        Ok(Some(document))
    }

    fn append_events(&self, process_id: &str, events: &[GraphEvent]) -> Result<()> {
        check_process_id(process_id)?;
        let dir = self.process_dir(process_id);
        fs::create_dir_all(&dir)
            .with_context(|| format!("Failed to create process directory: {}", dir.display()))?;
        let events_path = self.events_path(process_id);

        let file = fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&events_path)
            .with_context(|| format!("Failed to open events.jsonl: {}", events_path.display()))?;

        let mut writer = BufWriter::new(file);

        for event in events {
            let json = serde_json::to_string(event).with_context(|| {
                format!("Failed to serialize event: {}", events_path.display())
            })?;
            writeln!(writer, "{}", json).with_context(|| {
                format!("Failed to write event to: {}", events_path.display())
            })?;
        }

        writer
            .flush()
            .with_context(|| format!("Failed to flush events.jsonl: {}", events_path.display()))?;

        Ok(())
    }
}
