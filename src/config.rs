//! Configuration management for ollama-chat.
//!
//! Configuration is loaded from `~/.config/ollama-chat/config.toml`.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Main configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Ollama server settings.
    #[serde(default)]
    pub server: ServerConfig,
    /// Chat session preferences.
    #[serde(default)]
    pub chat: ChatPreferences,
}

/// Where the Ollama server lives and how long to wait for it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Ollama host URL (default: http://localhost:11434).
    #[serde(default = "default_host")]
    pub host: String,
    /// Per-request timeout in seconds. Generation on CPU can be slow.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl ServerConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Chat session preferences.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatPreferences {
    /// Model used for new sessions (default: llama3.2).
    #[serde(default = "default_model")]
    pub model: String,
    /// Save the transcript automatically when the session ends.
    #[serde(default)]
    pub autosave: bool,
}

impl Default for ChatPreferences {
    fn default() -> Self {
        Self {
            model: default_model(),
            autosave: false,
        }
    }
}

fn default_host() -> String {
    "http://localhost:11434".to_string()
}

fn default_timeout_secs() -> u64 {
    120
}

fn default_model() -> String {
    "llama3.2".to_string()
}

/// Command-line and environment values that take precedence over the file.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub host: Option<String>,
    pub model: Option<String>,
    pub timeout_secs: Option<u64>,
}

impl Config {
    /// Get the config directory path.
    pub fn config_dir() -> Result<PathBuf> {
        dirs::config_dir()
            .map(|p| p.join("ollama-chat"))
            .context("Could not determine config directory")
    }

    /// Get the config file path.
    pub fn config_path() -> Result<PathBuf> {
        Ok(Self::config_dir()?.join("config.toml"))
    }

    /// Directory where `/save` writes transcripts by default.
    pub fn chats_dir() -> Result<PathBuf> {
        Ok(Self::config_dir()?.join("chats"))
    }

    /// Load configuration from file, using defaults if not found.
    pub fn load() -> Result<Self> {
        let path = Self::config_path()?;
        if path.exists() {
            let contents = std::fs::read_to_string(&path)
                .with_context(|| format!("Failed to read config file: {}", path.display()))?;
            Self::parse(&contents)
                .with_context(|| format!("Failed to parse config file: {}", path.display()))
        } else {
            Ok(Self::default())
        }
    }

    /// Parse configuration from TOML text.
    pub fn parse(contents: &str) -> Result<Self> {
        let mut config: Self = toml::from_str(contents)?;
        config.server.host = normalize_host(&config.server.host);
        Ok(config)
    }

    /// Save configuration to file.
    pub fn save(&self) -> Result<()> {
        let path = Self::config_path()?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create config directory: {}", parent.display()))?;
        }
        let contents = toml::to_string_pretty(self)?;
        std::fs::write(&path, contents)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;
        Ok(())
    }

    /// Apply CLI/environment overrides on top of the loaded file.
    pub fn with_overrides(mut self, overrides: Overrides) -> Self {
        if let Some(host) = overrides.host {
            self.server.host = normalize_host(&host);
        }
        if let Some(model) = overrides.model {
            self.chat.model = model;
        }
        if let Some(secs) = overrides.timeout_secs {
            self.server.timeout_secs = secs;
        }
        self
    }
}

/// Accept `OLLAMA_HOST`-style values such as `127.0.0.1:11434` or a URL with a
/// trailing slash, and turn them into a base URL.
pub fn normalize_host(host: &str) -> String {
    let host = host.trim().trim_end_matches('/');
    if host.starts_with("http://") || host.starts_with("https://") {
        host.to_string()
    } else {
        format!("http://{}", host)
    }
}
