use crate::Automation;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

/// Editor settings. Every field has a default, so a config file only needs
/// the values it changes.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct EditorConfig {
    /// Number of snapshots kept for undo, including the baseline
    pub history_limit: usize,

    /// Re-run the layered layout after each structural change. When off,
    /// nodes keep the positions they were given (manual layout).
    pub auto_layout: bool,

    pub layout: LayoutConfig,
    pub defaults: NodeDefaults,
    pub gate: GateConfig,
}

impl Default for EditorConfig {
    fn default() -> Self {
        Self {
            history_limit: 50,
            auto_layout: true,
            layout: LayoutConfig::default(),
            defaults: NodeDefaults::default(),
            gate: GateConfig::default(),
        }
    }
}

impl EditorConfig {
    /// Load config from a JSON file
    pub fn load(path: &Path) -> Result<Self> {
        let file = File::open(path)
            .with_context(|| format!("Failed to open config file: {}", path.display()))?;
        let reader = BufReader::new(file);
        let config: Self = serde_json::from_reader(reader)
            .with_context(|| format!("Failed to parse config from: {}", path.display()))?;
        config.check()?;
        Ok(config)
    }

    fn check(&self) -> Result<()> {
        if self.history_limit == 0 {
            anyhow::bail!("history_limit must be at least 1");
        }
        if self.layout.rank_spacing <= 0.0 || self.layout.node_spacing <= 0.0 {
            anyhow::bail!("layout spacing must be positive");
        }
        Ok(())
    }
}

/// Spacing for the layered layout, left to right
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LayoutConfig {
    /// Horizontal distance between rank centre lines
    pub rank_spacing: f32,
    /// Vertical distance between node centres within a rank
    pub node_spacing: f32,
    pub engine: LayoutEngine,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            rank_spacing: 200.0,
            node_spacing: 150.0,
            engine: LayoutEngine::Dagre,
        }
    }
}

/// Which rank assignment backs the layered layout
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum LayoutEngine {
    /// `dagre_rust` network-simplex ranking with crossing minimisation
    #[default]
    Dagre,
    /// Ranks by breadth-first discovery from the roots
    BreadthFirst,
}

/// Metadata given to nodes whose proposal leaves it out
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct NodeDefaults {
    pub owner: String,
    pub system: String,
    pub automation: Automation,
}

impl Default for NodeDefaults {
    fn default() -> Self {
        Self {
            owner: "TBD".to_string(),
            system: "TBD".to_string(),
            automation: Automation::Manual,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct GateConfig {
    /// A new request supersedes the one in flight (whose result is then
    /// discarded) instead of being rejected
    pub supersede_in_flight: bool,
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            supersede_in_flight: true,
        }
    }
}
