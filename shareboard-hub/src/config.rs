/// Configuration for the Shareboard hub.
/// Reads hub.json from ~/.config/shareboard/hub.json (or platform equivalent).
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HubConfig {
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_bind_address")]
    pub bind_address: String,
    /// Directory for the board snapshot. `None` uses the platform data dir.
    #[serde(default)]
    pub data_dir: Option<PathBuf>,
    /// Keep boards in memory only.
    #[serde(default)]
    pub ephemeral: bool,
}

fn default_port() -> u16 {
    8080
}

fn default_bind_address() -> String {
    "127.0.0.1".to_string()
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            bind_address: default_bind_address(),
            data_dir: None,
            ephemeral: false,
        }
    }
}

impl HubConfig {
    /// Snapshot directory: configured, or ~/.local/share/shareboard/hub.
    pub fn resolved_data_dir(&self) -> PathBuf {
        self.data_dir.clone().unwrap_or_else(|| {
            dirs::data_local_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("shareboard")
                .join("hub")
        })
    }
}

/// Default config path: ~/.config/shareboard/hub.json
pub fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("shareboard")
        .join("hub.json")
}

/// Load config from path. Returns default if file doesn't exist or can't be parsed.
pub fn load_config(path: &Path) -> HubConfig {
    match fs::read_to_string(path) {
        Ok(content) => serde_json::from_str(&content).unwrap_or_else(|e| {
            log::warn!(
                target: "shareboard.hub.config",
                "Failed to parse config {}: {}",
                path.display(),
                e
            );
            HubConfig::default()
        }),
        Err(_) => {
            log::info!(
                target: "shareboard.hub.config",
                "No config at {}, using defaults",
                path.display()
            );
            HubConfig::default()
        }
    }
}
