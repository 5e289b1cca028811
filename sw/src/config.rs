//! specwright configuration types and loading

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use eyre::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::llm::LlmError;
use crate::session::WorkflowKind;

/// Main specwright configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// LLM provider configuration
    pub llm: LlmConfig,

    /// Planning dialogue limits
    pub planning: PlanningConfig,

    /// Codebase snapshot limits
    pub snapshot: SnapshotConfig,

    /// Session storage configuration
    pub storage: StorageConfig,

    /// External tool providers
    pub tools: ToolsConfig,
}

impl Config {
    /// Validate configuration before use
    ///
    /// Checks that required environment variables are set. Call this early
    /// in startup to fail fast with clear error messages.
    pub fn validate(&self) -> Result<()> {
        if std::env::var(&self.llm.api_key_env).is_err() {
            return Err(eyre::eyre!(
                "LLM API key not found. Set the {} environment variable.",
                self.llm.api_key_env
            ));
        }
        if self.planning.max_turns == 0 {
            return Err(eyre::eyre!("planning.max-turns must be at least 1"));
        }
        Ok(())
    }

    /// Load configuration with fallback chain
    pub fn load(config_path: Option<&PathBuf>) -> Result<Self> {
        if let Some(path) = config_path {
            return Self::load_from_file(path).context(format!("Failed to load config from {}", path.display()));
        }

        // Project-local config: .specwright.yml
        let local_config = PathBuf::from(".specwright.yml");
        if local_config.exists() {
            match Self::load_from_file(&local_config) {
                Ok(config) => return Ok(config),
                Err(e) => {
                    tracing::warn!("Failed to load config from {}: {}", local_config.display(), e);
                }
            }
        }

        // User config: ~/.config/specwright/specwright.yml
        if let Some(config_dir) = dirs::config_dir() {
            let user_config = config_dir.join("specwright").join("specwright.yml");
            if user_config.exists() {
                match Self::load_from_file(&user_config) {
                    Ok(config) => return Ok(config),
                    Err(e) => {
                        tracing::warn!("Failed to load config from {}: {}", user_config.display(), e);
                    }
                }
            }
        }

        tracing::info!("No config file found, using defaults");
        Ok(Self::default())
    }

    fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path).context("Failed to read config file")?;

        let config: Self = serde_yaml::from_str(&content).context("Failed to parse config file")?;

        tracing::info!("Loaded config from: {}", path.as_ref().display());
        Ok(config)
    }
}

/// LLM provider configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// Provider name ("anthropic" or "openai")
    pub provider: String,

    /// Model identifier
    pub model: String,

    /// Environment variable containing the API key
    #[serde(rename = "api-key-env")]
    pub api_key_env: String,

    /// API base URL
    #[serde(rename = "base-url")]
    pub base_url: String,

    /// Maximum tokens per response
    #[serde(rename = "max-tokens")]
    pub max_tokens: u32,

    /// Request timeout in milliseconds
    #[serde(rename = "timeout-ms")]
    pub timeout_ms: u64,
}

impl LlmConfig {
    /// Read the API key from the configured environment variable
    pub fn get_api_key(&self) -> Result<String, LlmError> {
        std::env::var(&self.api_key_env)
            .ok()
            .filter(|key| !key.trim().is_empty())
            .ok_or_else(|| LlmError::MissingApiKey {
                env: self.api_key_env.clone(),
            })
    }
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: "anthropic".to_string(),
            model: "claude-sonnet-4-20250514".to_string(),
            api_key_env: "ANTHROPIC_API_KEY".to_string(),
            base_url: "https://api.anthropic.com".to_string(),
            max_tokens: 16384,
            timeout_ms: 300_000,
        }
    }
}

/// Planning dialogue configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PlanningConfig {
    /// Orchestrator iterations allowed per call before giving up
    #[serde(rename = "max-turns")]
    pub max_turns: u32,

    /// Default document kind for new sessions
    pub workflow: WorkflowKind,

    /// Max tokens for a dialogue turn
    #[serde(rename = "turn-max-tokens")]
    pub turn_max_tokens: u32,

    /// Max tokens for the readiness verdict
    #[serde(rename = "readiness-max-tokens")]
    pub readiness_max_tokens: u32,

    /// Max tokens for the generated document
    #[serde(rename = "document-max-tokens")]
    pub document_max_tokens: u32,
}

impl Default for PlanningConfig {
    fn default() -> Self {
        Self {
            max_turns: 10,
            workflow: WorkflowKind::Adr,
            turn_max_tokens: 4096,
            readiness_max_tokens: 1024,
            document_max_tokens: 8192,
        }
    }
}

/// Codebase snapshot configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SnapshotConfig {
    /// Files larger than this are listed but not packed
    #[serde(rename = "max-file-bytes")]
    pub max_file_bytes: u64,

    /// Packing stops once this many bytes are collected
    #[serde(rename = "max-total-bytes")]
    pub max_total_bytes: u64,

    /// Glob patterns (relative to the packed root) to skip
    pub exclude: Vec<String>,

    /// Files sampled by the metadata fingerprint when git is unavailable
    #[serde(rename = "fingerprint-sample-limit")]
    pub fingerprint_sample_limit: usize,
}

impl Default for SnapshotConfig {
    fn default() -> Self {
        Self {
            max_file_bytes: 256 * 1024,
            max_total_bytes: 4 * 1024 * 1024,
            exclude: vec![
                ".git/**".to_string(),
                "target/**".to_string(),
                "node_modules/**".to_string(),
                "dist/**".to_string(),
                "build/**".to_string(),
                ".specwright/**".to_string(),
            ],
            fingerprint_sample_limit: 2000,
        }
    }
}

/// Session storage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Directory holding one JSON document per session
    #[serde(rename = "sessions-dir")]
    pub sessions_dir: String,
}

impl StorageConfig {
    /// Sessions directory with `~/` expanded
    pub fn sessions_path(&self) -> PathBuf {
        expand_home(&self.sessions_dir)
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        // XDG data directory (~/.local/share/specwright on Linux)
        let sessions_dir = dirs::data_dir()
            .map(|d| d.join("specwright").join("sessions"))
            .unwrap_or_else(|| PathBuf::from(".specwright/sessions"))
            .to_string_lossy()
            .into_owned();

        Self { sessions_dir }
    }
}

/// External tool provider configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolsConfig {
    /// MCP servers keyed by provider id
    pub servers: HashMap<String, McpServerConfig>,
}

/// A single MCP server launched over stdio
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct McpServerConfig {
    /// Executable to launch
    pub command: String,

    /// Arguments passed to the executable
    pub args: Vec<String>,

    /// Extra environment variables
    pub env: HashMap<String, String>,

    /// Working directory for the server process
    pub cwd: Option<PathBuf>,

    /// Timeout for the initialize handshake in milliseconds
    #[serde(rename = "init-timeout-ms")]
    pub init_timeout_ms: u64,

    /// Timeout for a single tool call in milliseconds
    #[serde(rename = "call-timeout-ms")]
    pub call_timeout_ms: u64,
}

impl Default for McpServerConfig {
    fn default() -> Self {
        Self {
            command: String::new(),
            args: Vec::new(),
            env: HashMap::new(),
            cwd: None,
            init_timeout_ms: 30_000,
            call_timeout_ms: 60_000,
        }
    }
}

/// Expand a leading `~/` to the home directory
pub fn expand_home(path: &str) -> PathBuf {
    match path.strip_prefix("~/") {
        Some(rest) => dirs::home_dir()
            .map(|home| home.join(rest))
            .unwrap_or_else(|| PathBuf::from(path)),
        None => PathBuf::from(path),
    }
}
