use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Result, SynthflowError};

/// Top-level SynthFlow configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub layout: LayoutConfig,
    #[serde(default)]
    pub simulator: SimulatorConfig,
    #[serde(default)]
    pub tui: TuiConfig,
    #[serde(default)]
    pub flow: FlowConfig,
}

/// Rank direction of the layered layout.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum LayoutDirection {
    /// Layers stacked top to bottom.
    #[serde(rename = "TB")]
    TopToBottom,
    /// Layers placed left to right.
    #[default]
    #[serde(rename = "LR")]
    LeftToRight,
}

impl LayoutDirection {
    pub fn as_str(self) -> &'static str {
        match self {
            LayoutDirection::TopToBottom => "TB",
            LayoutDirection::LeftToRight => "LR",
        }
    }
}

impl FromStr for LayoutDirection {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "TB" | "TD" => Ok(LayoutDirection::TopToBottom),
            "LR" => Ok(LayoutDirection::LeftToRight),
            other => Err(format!("unknown layout direction '{}' (expected TB or LR)", other)),
        }
    }
}

impl std::fmt::Display for LayoutDirection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Layered layout parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LayoutConfig {
    #[serde(default)]
    pub direction: LayoutDirection,
    /// Fixed node width in layout units. Default: 150
    #[serde(default = "default_node_width")]
    pub node_width: f64,
    /// Fixed node height in layout units. Default: 50
    #[serde(default = "default_node_height")]
    pub node_height: f64,
    /// Gap between neighbouring nodes of one layer. Default: 160
    #[serde(default = "default_node_sep")]
    pub node_sep: f64,
    /// Gap between consecutive layers. Default: 100
    #[serde(default = "default_rank_sep")]
    pub rank_sep: f64,
    /// Upper bound on barycenter sweep iterations. Default: 8
    #[serde(default = "default_max_sweeps")]
    pub max_sweeps: usize,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            direction: LayoutDirection::default(),
            node_width: default_node_width(),
            node_height: default_node_height(),
            node_sep: default_node_sep(),
            rank_sep: default_rank_sep(),
            max_sweeps: default_max_sweeps(),
        }
    }
}

fn default_node_width() -> f64 { 150.0 }
fn default_node_height() -> f64 { 50.0 }
fn default_node_sep() -> f64 { 160.0 }
fn default_rank_sep() -> f64 { 100.0 }
fn default_max_sweeps() -> usize { 8 }

/// Execution simulator pacing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulatorConfig {
    /// Time each node spends in progress. Default: 500ms
    #[serde(default = "default_step_delay_ms")]
    pub step_delay_ms: u64,
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        Self {
            step_delay_ms: default_step_delay_ms(),
        }
    }
}

fn default_step_delay_ms() -> u64 { 500 }

/// Terminal UI settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TuiConfig {
    /// Redraw tick for animations. Default: 100ms
    #[serde(default = "default_tick_ms")]
    pub tick_ms: u64,
    #[serde(default = "default_true")]
    pub show_minimap: bool,
    #[serde(default = "default_true")]
    pub show_banner: bool,
}

impl Default for TuiConfig {
    fn default() -> Self {
        Self {
            tick_ms: default_tick_ms(),
            show_minimap: true,
            show_banner: true,
        }
    }
}

fn default_tick_ms() -> u64 { 100 }
fn default_true() -> bool { true }

/// Where the graph comes from.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FlowConfig {
    /// TOML file with a custom node/edge definition. None = built-in pipeline.
    #[serde(default)]
    pub definition: Option<String>,
}

impl AppConfig {
    /// Load config from a TOML file, with env var expansion.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|_| SynthflowError::ConfigNotFound(path.display().to_string()))?;
        let config = Self::from_toml_str(&content)?;
        debug!(path = %path.display(), direction = %config.layout.direction, "Loaded config");
        Ok(config)
    }

    /// Parse config text, expanding `${ENV_VAR}` references first.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let expanded = expand_env_vars(content);
        let config: AppConfig =
            toml::from_str(&expanded).map_err(|e| SynthflowError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        let l = &self.layout;
        if l.node_width <= 0.0 || l.node_height <= 0.0 {
            return Err(SynthflowError::Config(
                "layout.node_width and layout.node_height must be positive".into(),
            ));
        }
        if l.node_sep < 0.0 || l.rank_sep < 0.0 {
            return Err(SynthflowError::Config(
                "layout.node_sep and layout.rank_sep must not be negative".into(),
            ));
        }
        if self.tui.tick_ms == 0 {
            return Err(SynthflowError::Config("tui.tick_ms must be at least 1".into()));
        }
        Ok(())
    }

    /// Resolve the custom flow definition path (expand ~), if one is set.
    pub fn definition_path(&self) -> Option<PathBuf> {
        self.flow.definition.as_deref().map(expand_home)
    }
}

fn expand_home(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = dirs_home() {
            return home.join(rest);
        }
    }
    PathBuf::from(path)
}

/// Expand `${ENV_VAR}` patterns in a string.
fn expand_env_vars(input: &str) -> String {
    let mut result = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(c) = chars.next() {
        if c == '$' && chars.peek() == Some(&'{') {
            chars.next(); // consume '{'
            let mut var_name = String::new();
            for c in chars.by_ref() {
                if c == '}' {
                    break;
                }
                var_name.push(c);
            }
            match std::env::var(&var_name) {
                Ok(val) => result.push_str(&val),
                Err(_) => {
                    // Keep original if env var not set
                    result.push_str(&format!("${{{}}}", var_name));
                }
            }
        } else {
            result.push(c);
        }
    }
    result
}

fn dirs_home() -> Option<PathBuf> {
    std::env::var("HOME").ok().map(PathBuf::from)
}
