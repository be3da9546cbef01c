//! Configuration loading, validation, and management for askdesk.
//!
//! Loads configuration from `askdesk.toml` (or the path given by `--config` /
//! `ASKDESK_CONFIG`) with environment variable overrides. Validates all
//! settings at startup.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Default config file name, looked up in the working directory.
pub const CONFIG_FILE: &str = "askdesk.toml";

/// The root configuration structure.
///
/// Maps directly to `askdesk.toml`.
#[derive(Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// API key for the completion provider
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Completion provider: gemini, openai, openrouter, ollama, or any
    /// OpenAI-compatible name together with `api_url`
    #[serde(default = "default_provider")]
    pub provider: String,

    /// Model identifier
    #[serde(default = "default_model")]
    pub model: String,

    /// Base URL override for the provider
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_url: Option<String>,

    /// Sampling temperature
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Max tokens per response
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,

    /// Per-request timeout against the provider
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// Probe the provider at startup and refuse to serve on a rejected credential
    #[serde(default)]
    pub verify_credential: bool,

    /// Knowledge document location
    #[serde(default)]
    pub knowledge: KnowledgeConfig,

    /// Persona settings
    #[serde(default)]
    pub persona: PersonaConfig,

    /// Conversation handling
    #[serde(default)]
    pub conversation: ConversationConfig,

    /// Retry/backoff against the provider
    #[serde(default)]
    pub retry: RetryConfig,

    /// HTTP gateway configuration
    #[serde(default)]
    pub gateway: GatewayConfig,
}

fn default_provider() -> String {
    "gemini".into()
}
fn default_model() -> String {
    "gemini-2.5-flash".into()
}
fn default_temperature() -> f32 {
    0.7
}
fn default_request_timeout_secs() -> u64 {
    60
}
fn default_true() -> bool {
    true
}

/// Redact a secret for Debug output.
fn redact(s: &Option<String>) -> &'static str {
    match s {
        Some(_) => "[REDACTED]",
        None => "None",
    }
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("api_key", &redact(&self.api_key))
            .field("provider", &self.provider)
            .field("model", &self.model)
            .field("api_url", &self.api_url)
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .field("verify_credential", &self.verify_credential)
            .field("knowledge", &self.knowledge)
            .field("persona", &self.persona)
            .field("conversation", &self.conversation)
            .field("retry", &self.retry)
            .field("gateway", &self.gateway)
            .finish()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KnowledgeConfig {
    #[serde(default = "default_knowledge_path")]
    pub path: PathBuf,
}

fn default_knowledge_path() -> PathBuf {
    PathBuf::from("college_data.json")
}

impl Default for KnowledgeConfig {
    fn default() -> Self {
        Self {
            path: default_knowledge_path(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersonaConfig {
    #[serde(default = "default_role")]
    pub role: String,

    /// Defaults to the knowledge document's `name` field when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub organization: Option<String>,

    #[serde(default = "default_tone")]
    pub tone: String,

    /// Extra rules appended verbatim
    #[serde(default)]
    pub rules: Vec<String>,
}

fn default_role() -> String {
    "Admissions Assistant".into()
}
fn default_tone() -> String {
    "Professional, helpful, and concise.".into()
}

impl Default for PersonaConfig {
    fn default() -> Self {
        Self {
            role: default_role(),
            organization: None,
            tone: default_tone(),
            rules: Vec::new(),
        }
    }
}

/// What the provider sees of earlier turns.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HistoryPolicy {
    /// Only the new message; every call is independent
    #[default]
    Latest,
    /// The whole transcript so far
    Full,
}

impl std::fmt::Display for HistoryPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Latest => f.write_str("latest"),
            Self::Full => f.write_str("full"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationConfig {
    #[serde(default)]
    pub history: HistoryPolicy,

    /// Sessions kept in memory before the least recently used is evicted
    #[serde(default = "default_max_sessions")]
    pub max_sessions: usize,
}

fn default_max_sessions() -> usize {
    1_000
}

impl Default for ConversationConfig {
    fn default() -> Self {
        Self {
            history: HistoryPolicy::default(),
            max_sessions: default_max_sessions(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Attempts including the first; 1 disables retrying
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,

    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,

    #[serde(default = "default_true")]
    pub jitter: bool,
}

fn default_max_attempts() -> u32 {
    3
}
fn default_base_delay_ms() -> u64 {
    500
}
fn default_max_delay_ms() -> u64 {
    8_000
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            base_delay_ms: default_base_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
            jitter: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default = "default_host")]
    pub host: String,

    /// Origins allowed by CORS; empty means same-origin only
    #[serde(default)]
    pub allowed_origins: Vec<String>,
}

fn default_port() -> u16 {
    8501
}
fn default_host() -> String {
    "127.0.0.1".into()
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            host: default_host(),
            allowed_origins: Vec::new(),
        }
    }
}

impl AppConfig {
    /// Load configuration and apply environment overrides.
    ///
    /// Path resolution: `explicit` → `ASKDESK_CONFIG` → `./askdesk.toml`.
    /// A missing default file yields defaults; a missing explicit file is an error.
    ///
    /// API key environment variables, checked only when the file has none:
    /// - `ASKDESK_API_KEY` (highest priority)
    /// - the provider's own variable: `GEMINI_API_KEY`, `OPENAI_API_KEY`,
    ///   `OPENROUTER_API_KEY`, `GROQ_API_KEY`, ...
    pub fn load(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        let env_path = std::env::var("ASKDESK_CONFIG").ok().map(PathBuf::from);

        let mut config = match explicit.map(Path::to_path_buf).or(env_path) {
            Some(path) => {
                if !path.exists() {
                    return Err(ConfigError::ReadError {
                        reason: "file does not exist".into(),
                        path,
                    });
                }
                Self::load_from(&path)?
            }
            None => Self::load_from(Path::new(CONFIG_FILE))?,
        };

        config.apply_env(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific file path.
    ///
    /// A relative knowledge path is resolved against the file's directory.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::info!("No config file found at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let mut config: Self = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        if config.knowledge.path.is_relative() {
            if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
                config.knowledge.path = dir.join(&config.knowledge.path);
            }
        }

        config.validate()?;
        Ok(config)
    }

    /// Apply environment overrides through `lookup` (normally `std::env::var`).
    ///
    /// Provider overrides are applied first so the key lookup matches the
    /// provider that will receive it. A blank key in the file counts as unset.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(provider) = lookup("ASKDESK_PROVIDER") {
            self.provider = provider;
        }

        if let Some(model) = lookup("ASKDESK_MODEL") {
            self.model = model;
        }

        if let Some(path) = lookup("ASKDESK_KNOWLEDGE") {
            self.knowledge.path = PathBuf::from(path);
        }

        if self.api_key.as_deref().is_some_and(|k| k.trim().is_empty()) {
            self.api_key = None;
        }

        if self.api_key.is_none() {
            self.api_key = ["ASKDESK_API_KEY".to_string(), provider_key_var(&self.provider)]
                .iter()
                .find_map(|key| lookup(key.as_str()).filter(|v| !v.trim().is_empty()));
        }
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(0.0..=2.0).contains(&self.temperature) {
            return Err(ConfigError::ValidationError(
                "temperature must be between 0.0 and 2.0".into(),
            ));
        }

        if self.request_timeout_secs == 0 {
            return Err(ConfigError::ValidationError(
                "request_timeout_secs must be > 0".into(),
            ));
        }

        if self.retry.max_attempts == 0 {
            return Err(ConfigError::ValidationError(
                "retry.max_attempts must be at least 1".into(),
            ));
        }

        if self.retry.base_delay_ms > self.retry.max_delay_ms {
            return Err(ConfigError::ValidationError(
                "retry.base_delay_ms must not exceed retry.max_delay_ms".into(),
            ));
        }

        if self.conversation.max_sessions == 0 {
            return Err(ConfigError::ValidationError(
                "conversation.max_sessions must be > 0".into(),
            ));
        }

        if self.model.trim().is_empty() {
            return Err(ConfigError::ValidationError("model must not be empty".into()));
        }

        Ok(())
    }

    /// Whether the configured provider needs a credential at all.
    pub fn provider_requires_key(&self) -> bool {
        self.provider != "ollama"
    }

    /// The credential, or `MissingCredential` when the provider needs one.
    pub fn require_api_key(&self) -> Result<&str, ConfigError> {
        match self.api_key.as_deref().map(str::trim) {
            Some(key) if !key.is_empty() => Ok(key),
            _ if !self.provider_requires_key() => Ok(""),
            _ => Err(ConfigError::MissingCredential {
                provider: self.provider.clone(),
            }),
        }
    }
}

/// The provider's own key variable, e.g. `GEMINI_API_KEY` for `gemini`.
fn provider_key_var(provider: &str) -> String {
    let name: String = provider
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c.to_ascii_uppercase() } else { '_' })
        .collect();
    format!("{name}_API_KEY")
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            provider: default_provider(),
            model: default_model(),
            api_url: None,
            temperature: default_temperature(),
            max_tokens: None,
            request_timeout_secs: default_request_timeout_secs(),
            verify_credential: false,
            knowledge: KnowledgeConfig::default(),
            persona: PersonaConfig::default(),
            conversation: ConversationConfig::default(),
            retry: RetryConfig::default(),
            gateway: GatewayConfig::default(),
        }
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {path}: {reason}")]
    ReadError { path: PathBuf, reason: String },

    #[error("Failed to parse config file at {path}: {reason}")]
    ParseError { path: PathBuf, reason: String },

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),

    #[error(
        "No API key configured for provider '{provider}'. Set ASKDESK_API_KEY (or GEMINI_API_KEY / OPENAI_API_KEY) or add api_key to askdesk.toml"
    )]
    MissingCredential { provider: String },
}
