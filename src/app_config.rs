/*!
 * Application configuration: loading, validation, and overlaying endpoint
 * credentials from the environment.
 */

use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::errors::ConfigError;

/// Pool role of an endpoint: primaries are tried first, fallbacks absorb
/// escalations
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum PoolRole {
    /// First-line endpoints, chunk assignment is spread across these
    #[default]
    Primary,
    /// Escalation targets, tried in rounds after a primary failure
    Fallback,
}

impl PoolRole {
    /// Capitalized role name for logs and statistics
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Primary => "Primary",
            Self::Fallback => "Fallback",
        }
    }
}

impl std::fmt::Display for PoolRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Primary => write!(f, "primary"),
            Self::Fallback => write!(f, "fallback"),
        }
    }
}

/// Requested register of the translation
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Tone {
    /// Natural spoken register fitting film subtitles
    #[default]
    Conversational,
    /// Formal register
    Formal,
    /// Close-to-source rendering
    Literal,
}

impl std::fmt::Display for Tone {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Conversational => write!(f, "conversational"),
            Self::Formal => write!(f, "formal"),
            Self::Literal => write!(f, "literal"),
        }
    }
}

impl std::str::FromStr for Tone {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "conversational" => Ok(Self::Conversational),
            "formal" => Ok(Self::Formal),
            "literal" => Ok(Self::Literal),
            _ => Err(anyhow!("Invalid tone: {}", s)),
        }
    }
}

/// Configuration for a single credentialed endpoint
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct EndpointConfig {
    /// Display name, also used as the identity in logs and statistics
    pub name: String,

    /// Pool role
    #[serde(default)]
    pub role: PoolRole,

    /// API key
    #[serde(default = "String::new")]
    pub api_key: String,

    /// Endpoint URL template; `{model}` is substituted before use
    #[serde(default = "default_endpoint_template")]
    pub endpoint: String,

    /// Max simultaneous in-flight calls for this endpoint
    #[serde(default = "default_concurrent_requests")]
    pub concurrent_requests: usize,

    /// Per-call timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl EndpointConfig {
    /// Create an endpoint config with defaults for the given role
    pub fn new(name: impl Into<String>, role: PoolRole, api_key: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            role,
            api_key: api_key.into(),
            endpoint: default_endpoint_template(),
            concurrent_requests: default_concurrent_requests(),
            timeout_secs: default_timeout_secs(),
        }
    }

    /// Endpoint URL with the model substituted into the template
    pub fn resolved_endpoint(&self, model: &str) -> String {
        self.endpoint.replace("{model}", model)
    }
}

/// Translation behavior settings
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct TranslationSettings {
    /// Model name passed to the endpoint template
    #[serde(default = "default_model")]
    pub model: String,

    /// Lines per chunk
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,

    /// Fallback retry rounds before a chunk is declared unresolved
    #[serde(default = "default_retry_rounds")]
    pub retry_rounds: usize,

    /// Hard cap on total calls for one chunk, bounds transport-error loops
    #[serde(default = "default_max_attempts_per_chunk")]
    pub max_attempts_per_chunk: usize,

    /// Base delay between fallback rounds in milliseconds
    #[serde(default = "default_retry_backoff_ms")]
    pub retry_backoff_ms: u64,

    /// Requested register
    #[serde(default)]
    pub tone: Tone,

    /// Use the extended CJK ranges for residual-script detection
    #[serde(default = "default_true")]
    pub strict_script_check: bool,
}

impl Default for TranslationSettings {
    fn default() -> Self {
        Self {
            model: default_model(),
            chunk_size: default_chunk_size(),
            retry_rounds: default_retry_rounds(),
            max_attempts_per_chunk: default_max_attempts_per_chunk(),
            retry_backoff_ms: default_retry_backoff_ms(),
            tone: Tone::default(),
            strict_script_check: true,
        }
    }
}

/// Represents the application configuration
#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct Config {
    /// Translation settings
    #[serde(default)]
    pub settings: TranslationSettings,

    /// Credentialed endpoints, grouped by role at pool construction
    #[serde(default)]
    pub endpoints: Vec<EndpointConfig>,

    /// Proper-noun source-to-target substitution table
    #[serde(default)]
    pub name_map: BTreeMap<String, String>,
}

fn default_model() -> String {
    "gemini-2.5-flash".to_string()
}

fn default_endpoint_template() -> String {
    "https://generativelanguage.googleapis.com/v1beta/models/{model}:generateContent".to_string()
}

fn default_chunk_size() -> usize {
    10
}

fn default_retry_rounds() -> usize {
    3
}

fn default_max_attempts_per_chunk() -> usize {
    12
}

fn default_retry_backoff_ms() -> u64 {
    500
}

fn default_concurrent_requests() -> usize {
    5
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_true() -> bool {
    true
}

/// Environment variables holding API keys, checked by `overlay_env_keys`.
/// Each present key adds one endpoint of the matching role.
const ENV_KEYS: [(&str, PoolRole, &str); 4] = [
    ("SUBFALL_PRIMARY_KEY_1", PoolRole::Primary, "Primary-1"),
    ("SUBFALL_PRIMARY_KEY_2", PoolRole::Primary, "Primary-2"),
    ("SUBFALL_FALLBACK_KEY_1", PoolRole::Fallback, "Fallback-1"),
    ("SUBFALL_FALLBACK_KEY_2", PoolRole::Fallback, "Fallback-2"),
];

impl Config {
    /// Load configuration from a JSON file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref())
            .map_err(|e| ConfigError::LoadFailed(format!("{}: {}", path.as_ref().display(), e)))?;
        let config: Config = serde_json::from_str(&content)
            .map_err(|e| ConfigError::LoadFailed(format!("{}: {}", path.as_ref().display(), e)))?;
        Ok(config)
    }

    /// Default configuration file location (`~/.subfall/config.json`)
    pub fn default_config_path() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".subfall")
            .join("config.json")
    }

    /// Add endpoints for API keys found in the environment.
    ///
    /// Keys already named in the config file are not duplicated.
    pub fn overlay_env_keys(&mut self) {
        for (var, role, name) in ENV_KEYS {
            if self.endpoints.iter().any(|e| e.name == name) {
                continue;
            }
            if let Ok(key) = std::env::var(var) {
                if !key.trim().is_empty() {
                    self.endpoints.push(EndpointConfig::new(name, role, key.trim()));
                }
            }
        }
    }

    /// Endpoints with the given role
    pub fn endpoints_with_role(&self, role: PoolRole) -> Vec<&EndpointConfig> {
        self.endpoints.iter().filter(|e| e.role == role).collect()
    }

    /// Validate the configuration for consistency and required values.
    ///
    /// The dispatcher assumes a validated configuration; anything caught here
    /// is fatal and surfaced before a single endpoint call is made.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.settings.chunk_size < 1 {
            return Err(ConfigError::InvalidConfiguration(
                "chunk_size must be >= 1".to_string(),
            ));
        }
        if self.settings.max_attempts_per_chunk < 1 {
            return Err(ConfigError::InvalidConfiguration(
                "max_attempts_per_chunk must be >= 1".to_string(),
            ));
        }
        if self.endpoints.is_empty() {
            return Err(ConfigError::InvalidConfiguration(
                "no endpoints configured; set API keys in the config file or environment"
                    .to_string(),
            ));
        }
        if self.endpoints_with_role(PoolRole::Primary).is_empty() {
            return Err(ConfigError::InvalidConfiguration(
                "at least one primary endpoint is required".to_string(),
            ));
        }
        for endpoint in &self.endpoints {
            if endpoint.api_key.trim().is_empty() {
                return Err(ConfigError::InvalidConfiguration(format!(
                    "endpoint {} has no API key",
                    endpoint.name
                )));
            }
            if endpoint.concurrent_requests < 1 {
                return Err(ConfigError::InvalidConfiguration(format!(
                    "endpoint {} must allow at least one concurrent request",
                    endpoint.name
                )));
            }
        }
        Ok(())
    }
}
