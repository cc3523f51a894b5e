/// Client session configuration.
/// Reads client.json from ~/.config/shareboard/client.json (or platform equivalent).
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::{ids, ledger};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionConfig {
    #[serde(default = "default_app_id")]
    pub app_id: String,
    #[serde(default = "default_recent_boards_limit")]
    pub recent_boards_limit: usize,
    #[serde(default = "default_join_code_length")]
    pub join_code_length: usize,
    /// How long the "syncing" indicator stays up after a successful push.
    #[serde(default = "default_sync_indicator_linger_ms")]
    pub sync_indicator_linger_ms: u64,
    #[serde(default = "default_recent_boards_key")]
    pub recent_boards_key: String,
}

fn default_app_id() -> String {
    "default-app-id".to_string()
}

fn default_recent_boards_limit() -> usize {
    ledger::DEFAULT_LIMIT
}

fn default_join_code_length() -> usize {
    ids::BOARD_CODE_LEN
}

fn default_sync_indicator_linger_ms() -> u64 {
    500
}

fn default_recent_boards_key() -> String {
    ledger::DEFAULT_KEY.to_string()
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            app_id: default_app_id(),
            recent_boards_limit: default_recent_boards_limit(),
            join_code_length: default_join_code_length(),
            sync_indicator_linger_ms: default_sync_indicator_linger_ms(),
            recent_boards_key: default_recent_boards_key(),
        }
    }
}

/// Default config path: ~/.config/shareboard/client.json
pub fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("shareboard")
        .join("client.json")
}

/// Load config from path. Returns default if file doesn't exist or can't be parsed.
pub fn load_config(path: &Path) -> SessionConfig {
    match fs::read_to_string(path) {
        Ok(content) => serde_json::from_str(&content).unwrap_or_else(|e| {
            log::warn!(
                "[shareboard.config] Failed to parse config {}: {}",
                path.display(),
                e
            );
            SessionConfig::default()
        }),
        Err(_) => {
            log::info!(
                "[shareboard.config] No config at {}, using defaults",
                path.display()
            );
            SessionConfig::default()
        }
    }
}
