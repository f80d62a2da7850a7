use anyhow::{Context, Result};
use grounded_core::config::{get_default_config_file, GeminiConfig};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

pub const APP_NAME: &str = "grounded-chat";
const CONFIG_FILE: &str = "relay.toml";

/// Relay daemon configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RelayConfig {
    /// HTTP listen address
    pub http_addr: SocketAddr,
    /// Frames buffered between the upstream pump and the HTTP body
    pub frame_buffer: usize,
    pub gemini: GeminiConfig,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            http_addr: SocketAddr::from(([127, 0, 0, 1], 8080)),
            frame_buffer: 32,
            gemini: GeminiConfig::default(),
        }
    }
}

impl RelayConfig {
    /// Loads configuration from a file; a missing file yields the defaults
    pub fn load_from_file(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let mut config: Self = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;

        // Fields missing from the [gemini] table keep their defaults
        config.gemini = GeminiConfig::default().merge(&config.gemini);
        Ok(config)
    }

    /// Loads `~/.config/grounded-chat/relay.toml`
    pub fn load_from_default() -> Result<Self> {
        let path = default_config_path()?;
        Self::load_from_file(&path)
    }
}

pub fn default_config_path() -> Result<PathBuf> {
    get_default_config_file(APP_NAME, CONFIG_FILE)
        .map_err(|e| anyhow::anyhow!("Could not locate config directory: {}", e))
}
