//! Engine configuration, persisted as JSON in the app data directory

use serde::{Deserialize, Serialize};

use crate::paths::get_config_path;

fn default_base_url() -> String {
    "https://api.fitlab.app".to_string()
}

fn default_redirect_uri() -> String {
    "http://localhost:5173".to_string()
}

fn default_poll_attempts() -> u32 {
    10
}

fn default_poll_interval_ms() -> u64 {
    1000
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct EngineConfig {
    /// Base URL of the try-on backend
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Return location handed to the OAuth login endpoint
    #[serde(default = "default_redirect_uri")]
    pub redirect_uri: String,
    /// Attempts made by the result-discovery poll before giving up
    #[serde(default = "default_poll_attempts")]
    pub poll_attempts: u32,
    /// Delay between poll attempts
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            redirect_uri: default_redirect_uri(),
            poll_attempts: default_poll_attempts(),
            poll_interval_ms: default_poll_interval_ms(),
        }
    }
}

/// Loads the engine configuration, falling back to defaults when no
/// config file exists yet
pub fn load_config() -> Result<EngineConfig, String> {
    let config_path = get_config_path()?;
    if config_path.exists() {
        let content = std::fs::read_to_string(&config_path)
            .map_err(|e| format!("Failed to read config: {}", e))?;
        let config: EngineConfig =
            serde_json::from_str(&content).map_err(|e| format!("Failed to parse config: {}", e))?;
        Ok(config)
    } else {
        Ok(EngineConfig::default())
    }
}

/// Saves the engine configuration
pub fn save_config(config: &EngineConfig) -> Result<(), String> {
    let config_path = get_config_path()?;
    if let Some(parent) = config_path.parent() {
        std::fs::create_dir_all(parent)
            .map_err(|e| format!("Failed to create directory: {}", e))?;
    }
    let content = serde_json::to_string_pretty(config)
        .map_err(|e| format!("Failed to serialize config: {}", e))?;
    std::fs::write(&config_path, content).map_err(|e| format!("Failed to save config: {}", e))
}
