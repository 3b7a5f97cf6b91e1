//! Run configuration
//!
//! `~/.rhetor/config.json` when present, built-in defaults otherwise. Every
//! field is optional in the file.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::agent::AgentId;
use crate::coherence::CoherenceConfig;
use crate::llm::OPENROUTER_URL;

/// Environment variable holding the LLM API key
pub const API_KEY_ENV: &str = "OPENROUTER_API_KEY";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid config.json: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Invalid config: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AnalysisConfig {
    pub model: String,
    pub api_url: String,
    pub temperature: f64,
    /// Turn budget for one run
    pub max_turns: u32,
    /// Consecutive turns without new findings before the run stops; 0 disables
    pub stall_limit: u32,
    /// Tool rounds an agent may take within one turn
    pub max_tool_rounds: usize,
    /// Agent that takes the first turn
    pub first_agent: AgentId,
    pub request_timeout_secs: u64,
    pub data_dir: PathBuf,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cache_dir: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub report_dir: Option<PathBuf>,
    /// JSON taxonomy replacing the built-in one
    #[serde(skip_serializing_if = "Option::is_none")]
    pub taxonomy_file: Option<PathBuf>,
    /// Base URL of the logic solver service
    #[serde(skip_serializing_if = "Option::is_none")]
    pub solver_url: Option<String>,
    pub coherence: CoherenceConfig,
}

pub fn default_data_dir() -> PathBuf {
    dirs::home_dir()
        .map(|h| h.join(".rhetor"))
        .unwrap_or_else(|| PathBuf::from(".rhetor"))
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            model: "google/gemini-2.5-flash".to_string(),
            api_url: OPENROUTER_URL.to_string(),
            temperature: 0.2,
            max_turns: 10,
            stall_limit: 2,
            max_tool_rounds: crate::agent::MAX_TOOL_ROUNDS,
            first_agent: AgentId::InformalFallacy,
            request_timeout_secs: 120,
            data_dir: default_data_dir(),
            cache_dir: None,
            report_dir: None,
            taxonomy_file: None,
            solver_url: None,
            coherence: CoherenceConfig::default(),
        }
    }
}

impl AnalysisConfig {
    pub fn default_path() -> PathBuf {
        default_data_dir().join("config.json")
    }

    /// Read a config file. Missing fields take their defaults.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load `path` if it exists; a missing or broken file falls back to
    /// defaults with a warning.
    pub fn load_or_default(path: &Path) -> Self {
        if !path.exists() {
            tracing::debug!(path = %path.display(), "no config file, using defaults");
            return Self::default();
        }
        match Self::load_from(path) {
            Ok(config) => {
                tracing::info!(path = %path.display(), "loaded config");
                config
            }
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "ignoring config file, using defaults");
                Self::default()
            }
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_turns == 0 {
            return Err(ConfigError::Invalid("max_turns must be at least 1".to_string()));
        }
        if self.max_tool_rounds == 0 {
            return Err(ConfigError::Invalid("max_tool_rounds must be at least 1".to_string()));
        }
        if !(0.0..=2.0).contains(&self.temperature) {
            return Err(ConfigError::Invalid(format!(
                "temperature {} outside [0, 2]",
                self.temperature
            )));
        }
        Ok(())
    }

    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }

    pub fn cache_dir(&self) -> PathBuf {
        self.cache_dir.clone().unwrap_or_else(|| self.data_dir.join("cache"))
    }

    pub fn report_dir(&self) -> PathBuf {
        self.report_dir.clone().unwrap_or_else(|| self.data_dir.join("reports"))
    }

    pub fn transcript_dir(&self) -> PathBuf {
        self.report_dir().join("transcripts")
    }

    /// Sealed source configuration
    pub fn sources_path(&self) -> PathBuf {
        self.data_dir.join("sources.enc")
    }

    /// API key from the environment, if set and non-empty
    pub fn api_key_from_env() -> Option<String> {
        std::env::var(API_KEY_ENV).ok().filter(|k| !k.trim().is_empty())
    }
}
