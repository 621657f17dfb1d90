use neuroflow_agent::{ClassifierConfig, ModelConfig, SessionConfig};
use neuroflow_graph::HeatConfig;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::warn;

/// Environment variable consulted when `[model] api_key` is empty.
pub const API_KEY_ENV: &str = "NEUROFLOW_API_KEY";

/// Name of the SQLite file inside `data_dir`.
pub const DATABASE_FILE: &str = "neuroflow.db";

/// Contents of `neuroflow.toml`.
#[derive(Debug, Deserialize)]
pub struct NeuroflowConfig {
    #[serde(default)]
    pub model: ModelConfig,
    #[serde(default)]
    pub classifier: ClassifierConfig,
    #[serde(default)]
    pub graph: GraphSettings,
    #[serde(default)]
    pub sessions: SessionConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
    /// Text file holding the assistant persona.
    #[serde(default)]
    pub persona_path: Option<PathBuf>,
    /// JSON array of knowledge items for the keyword retriever.
    #[serde(default)]
    pub knowledge_path: Option<PathBuf>,
}

/// `[graph]` table: heat tuning plus harvesting switches.
#[derive(Debug, Deserialize)]
pub struct GraphSettings {
    #[serde(flatten)]
    pub heat: HeatConfig,
    /// Grow the graph from finished exchanges.
    #[serde(default)]
    pub harvest: bool,
    #[serde(default = "default_max_node_id_len")]
    pub max_node_id_len: usize,
}

impl Default for GraphSettings {
    fn default() -> Self {
        Self {
            heat: HeatConfig::default(),
            harvest: false,
            max_node_id_len: default_max_node_id_len(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("./data")
}
fn default_host() -> String {
    "0.0.0.0".to_string()
}
fn default_port() -> u16 {
    8000
}
fn default_max_node_id_len() -> usize {
    40
}

impl NeuroflowConfig {
    /// Parse a TOML document.
    pub fn parse(raw: &str) -> anyhow::Result<Self> {
        Ok(toml::from_str(raw)?)
    }

    /// Read the config file. A missing file yields the defaults.
    pub async fn load(path: &Path) -> anyhow::Result<Self> {
        match tokio::fs::read_to_string(path).await {
            Ok(raw) => Self::parse(&raw).map_err(|e| {
                anyhow::anyhow!("Invalid config file '{}': {e}", path.display())
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                warn!(path = %path.display(), "Config file not found, using defaults");
                Self::parse("")
            }
            Err(e) => Err(anyhow::anyhow!(
                "Failed to read config file '{}': {e}",
                path.display()
            )),
        }
    }

    /// Fill an empty API key from the given fallback.
    pub fn with_api_key_fallback(mut self, key: Option<String>) -> Self {
        if self.model.api_key.trim().is_empty() {
            if let Some(key) = key.filter(|k| !k.trim().is_empty()) {
                self.model.api_key = key;
            }
        }
        self
    }

    /// Make relative paths relative to the config file's directory.
    pub fn resolve_paths(mut self, base: &Path) -> Self {
        let resolve = |p: PathBuf| if p.is_relative() { base.join(p) } else { p };
        self.data_dir = resolve(self.data_dir);
        self.persona_path = self.persona_path.map(resolve);
        self.knowledge_path = self.knowledge_path.map(resolve);
        self
    }

    pub fn database_path(&self) -> PathBuf {
        self.data_dir.join(DATABASE_FILE)
    }
}
