//! Configuration management for Ergon
//!
//! Supports environment variables, config files, and runtime overrides.
//! Priority: CLI args > env vars > config file > defaults.
//!
//! Config file location: ~/.config/ergon/config.toml

use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use crate::agent::AnswerPolicy;
use crate::core::error::{ErgonError, Result};
use crate::tools::FinishPolicy;

/// Main configuration for Ergon
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Ollama configuration
    #[serde(default)]
    pub ollama: OllamaConfig,
    /// Agent loop configuration
    #[serde(default)]
    pub agent: AgentConfig,
    /// Event hub configuration
    #[serde(default)]
    pub hub: HubConfig,
}

/// Ollama server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OllamaConfig {
    /// Host address (default: localhost)
    pub host: String,
    /// Port number (default: 11434)
    pub port: u16,
    /// Request timeout in seconds
    pub timeout_secs: u64,
    /// Model used for completions
    pub model: String,
}

/// Agent behavior configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    /// Maximum think/act steps before a forced finish
    /// Default: 20
    pub max_steps: usize,
    /// Identical assistant turns that count as a stuck loop (0 disables)
    /// Default: 2
    pub duplicate_threshold: usize,
    /// System prompt sent with every completion call
    pub system_prompt: String,
    /// Hint appended as a user turn before each follow-up step
    pub next_step_prompt: Option<String>,
    /// When a plain model answer ends the run
    pub answer_policy: AnswerPolicy,
    /// Whether `finish` requires a completed plan
    pub finish_policy: FinishPolicy,
    /// Extra completion attempts after a provider failure
    pub max_retries: u32,
    /// Base backoff between completion attempts in milliseconds
    pub retry_backoff_ms: u64,
}

/// Event hub configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HubConfig {
    /// Maximum events retained for replay
    /// Default: 1000
    pub history_capacity: usize,
    /// Queue depth per subscriber before it is dropped
    /// Default: 256
    pub subscriber_capacity: usize,
}

const DEFAULT_SYSTEM_PROMPT: &str = "You are Ergon, an autonomous agent that completes tasks \
by reasoning step by step and calling the tools available to you. Use the `planning` tool to \
break larger tasks into steps and keep their status current. When the task is done, call \
`finish` with the final answer.";

const DEFAULT_NEXT_STEP_PROMPT: &str = "Based on the results so far, decide the next action. \
If the task is complete, call `finish` with the final answer.";

impl Default for OllamaConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 11434,
            timeout_secs: 120,
            model: "qwen3:8b".to_string(),
        }
    }
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            max_steps: 20,
            duplicate_threshold: 2,
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
            next_step_prompt: Some(DEFAULT_NEXT_STEP_PROMPT.to_string()),
            answer_policy: AnswerPolicy::TerminalToolOnly,
            finish_policy: FinishPolicy::Unconditional,
            max_retries: 2,
            retry_backoff_ms: 500,
        }
    }
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            history_capacity: 1000,
            subscriber_capacity: 256,
        }
    }
}

impl Config {
    /// Get the config directory path
    pub fn config_dir() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("ergon")
    }

    /// Get the config file path
    pub fn config_file() -> PathBuf {
        Self::config_dir().join("config.toml")
    }

    /// Load configuration from file, environment, and defaults
    pub fn load() -> Self {
        // Try to load .env file if it exists
        let _ = dotenvy::dotenv();

        let path = Self::config_file();
        let mut config = if path.exists() {
            Self::load_from(&path).unwrap_or_else(|e| {
                tracing::warn!(path = %path.display(), error = %e, "Ignoring config file");
                Self::default()
            })
        } else {
            Self::default()
        };
        config.apply_env();
        config
    }

    /// Load configuration from a specific file
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(ErgonError::config(format!(
                "Config file not found: {}",
                path.display()
            )));
        }

        let content = fs::read_to_string(path)
            .map_err(|e| ErgonError::config(format!("Failed to read config: {}", e)))?;

        toml::from_str(&content)
            .map_err(|e| ErgonError::config(format!("Failed to parse config: {}", e)))
    }

    /// Save configuration to a specific file, creating parent directories
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir)
                .map_err(|e| ErgonError::config(format!("Failed to create config dir: {}", e)))?;
        }

        let content = toml::to_string_pretty(self)
            .map_err(|e| ErgonError::config(format!("Failed to serialize config: {}", e)))?;

        fs::write(path, content)
            .map_err(|e| ErgonError::config(format!("Failed to write config: {}", e)))
    }

    /// Apply `ERGON_*` and `OLLAMA_*` environment overrides
    pub fn apply_env(&mut self) {
        if let Ok(host) = env::var("OLLAMA_HOST") {
            self.ollama.host = host;
        }
        if let Some(port) = env::var("OLLAMA_PORT").ok().and_then(|p| p.parse().ok()) {
            self.ollama.port = port;
        }
        if let Ok(model) = env::var("ERGON_MODEL") {
            self.ollama.model = model;
        }
        if let Some(steps) = env::var("ERGON_MAX_STEPS").ok().and_then(|s| s.parse().ok()) {
            self.agent.max_steps = steps;
        }
        if let Some(cap) = env::var("ERGON_HISTORY_CAPACITY")
            .ok()
            .and_then(|s| s.parse().ok())
        {
            self.hub.history_capacity = cap;
        }
    }

    /// Reject settings the runtime cannot honor
    pub fn validate(&self) -> Result<()> {
        if self.agent.max_steps == 0 {
            return Err(ErgonError::config("agent.max_steps must be at least 1"));
        }
        if self.agent.duplicate_threshold == 1 {
            return Err(ErgonError::config(
                "agent.duplicate_threshold must be 0 (disabled) or at least 2",
            ));
        }
        if self.hub.history_capacity == 0 {
            return Err(ErgonError::config("hub.history_capacity must be at least 1"));
        }
        if self.hub.subscriber_capacity == 0 {
            return Err(ErgonError::config(
                "hub.subscriber_capacity must be at least 1",
            ));
        }
        Ok(())
    }

    /// Get the full Ollama API URL
    pub fn ollama_url(&self) -> String {
        format!("http://{}:{}", self.ollama.host, self.ollama.port)
    }
}
