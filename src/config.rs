use crate::error::{ProxyError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Chat-endpoint model aliases, e.g. `"qwen2.5" -> "qwen2.5-coder-32b-instruct-mlx"`.
pub type ModelMap = HashMap<String, String>;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BridgeConfig {
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default)]
    pub target: TargetConfig,
    #[serde(default)]
    pub defaults: GenerationDefaults,
    #[serde(default)]
    pub models: ModelMap,
}

/// Where requests are forwarded and how long we wait for them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TargetConfig {
    #[serde(default = "default_target_url")]
    pub url: String,
    /// Whole-call deadline for buffered requests; time-to-first-byte and
    /// inter-chunk idle deadline for streams.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

/// Sampling values injected when the caller leaves them out.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationDefaults {
    #[serde(default = "default_temperature")]
    pub temperature: f64,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u64,
}

fn default_port() -> u16 {
    11434
}

fn default_target_url() -> String {
    "http://localhost:1234/v1/completions".to_string()
}

fn default_timeout_secs() -> u64 {
    120
}

fn default_temperature() -> f64 {
    0.7
}

fn default_max_tokens() -> u64 {
    512
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            target: TargetConfig::default(),
            defaults: GenerationDefaults::default(),
            models: HashMap::new(),
        }
    }
}

impl Default for TargetConfig {
    fn default() -> Self {
        Self {
            url: default_target_url(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl Default for GenerationDefaults {
    fn default() -> Self {
        Self {
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
        }
    }
}

impl TargetConfig {
    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl BridgeConfig {
    /// Load config from a TOML file. Missing keys take their defaults.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            ProxyError::config(format!("Failed to read config file {}: {}", path.display(), e))
        })?;
        let config: Self = toml::from_str(&content)?;
        Ok(config)
    }

    /// Search standard locations for a config file.
    /// Priority: CLI arg > CWD > XDG config > home dir > built-in defaults
    pub fn find_and_load(explicit_path: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit_path {
            return Self::load(path);
        }

        for candidate in config_search_paths() {
            if candidate.exists() {
                tracing::info!(path = %candidate.display(), "Loading config");
                return Self::load(&candidate);
            }
        }

        tracing::info!("No config file found, using defaults");
        Ok(Self::default())
    }

    pub fn validate(&self) -> Result<()> {
        if self.target.timeout_secs == 0 {
            return Err(ProxyError::config("target.timeout_secs must be greater than 0"));
        }
        let url = self.target.url.trim();
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(ProxyError::config(format!(
                "target.url must be an http(s) URL, got '{url}'"
            )));
        }
        Ok(())
    }
}

pub fn config_search_paths() -> Vec<PathBuf> {
    let mut paths = Vec::new();

    paths.push(PathBuf::from("ollama-bridge.toml"));

    if cfg!(target_os = "macos") {
        if let Some(home) = home_dir() {
            paths.push(
                home.join("Library")
                    .join("Application Support")
                    .join("ollama-bridge")
                    .join("config.toml"),
            );
        }
    } else {
        if let Ok(xdg) = std::env::var("XDG_CONFIG_HOME") {
            paths.push(PathBuf::from(xdg).join("ollama-bridge").join("config.toml"));
        }
        if let Some(home) = home_dir() {
            paths.push(home.join(".config").join("ollama-bridge").join("config.toml"));
        }
    }

    if let Some(home) = home_dir() {
        paths.push(home.join(".ollama-bridge.toml"));
    }

    paths
}

fn home_dir() -> Option<PathBuf> {
    std::env::var("HOME").ok().map(PathBuf::from)
}
