//! Configuration management for CampusCandid services
//!
//! Supports loading configuration from:
//! - Environment variables (prefixed with APP__)
//! - Configuration files (config/default, config/{APP_ENV}, config/local)
//! - Default values

use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Main application configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct AppConfig {
    /// Server configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// Graph store configuration
    #[serde(default)]
    pub graph: GraphConfig,

    /// Language-generation service configuration
    #[serde(default)]
    pub llm: LlmConfig,

    /// Session context store configuration
    #[serde(default)]
    pub session: SessionConfig,

    /// Ambiguity fallback configuration
    #[serde(default)]
    pub fallback: FallbackConfig,

    /// Retry policy for outbound calls
    #[serde(default)]
    pub retry: RetryConfig,

    /// Evidence rendering configuration
    #[serde(default)]
    pub render: RenderConfig,

    /// Observability configuration
    #[serde(default)]
    pub observability: ObservabilityConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    /// Host to bind to
    #[serde(default = "default_host")]
    pub host: String,

    /// Port to listen on
    #[serde(default = "default_port")]
    pub port: u16,

    /// Shutdown timeout in seconds
    #[serde(default = "default_shutdown_timeout")]
    pub shutdown_timeout_secs: u64,
}

/// Which graph store implementation to use
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum GraphBackend {
    /// Neo4j over its HTTP transactional endpoint
    Neo4j,
    /// In-process store loaded with the fixture dataset
    Memory,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct GraphConfig {
    #[serde(default = "default_graph_backend")]
    pub backend: GraphBackend,

    /// Neo4j HTTP base URL
    #[serde(default = "default_graph_url")]
    pub url: String,

    /// Neo4j database name
    #[serde(default = "default_graph_database")]
    pub database: String,

    pub user: Option<String>,

    pub password: Option<String>,

    /// Request timeout in seconds
    #[serde(default = "default_graph_timeout")]
    pub timeout_secs: u64,
}

/// Language-generation provider
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LlmProvider {
    Gemini,
    OpenAi,
    Mock,
}

impl LlmProvider {
    /// Conventional environment variable holding the provider's API key
    pub fn api_key_env(&self) -> Option<&'static str> {
        match self {
            LlmProvider::Gemini => Some("GEMINI_API_KEY"),
            LlmProvider::OpenAi => Some("OPENAI_API_KEY"),
            LlmProvider::Mock => None,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LlmConfig {
    #[serde(default = "default_llm_provider")]
    pub provider: LlmProvider,

    /// API key; falls back to the provider's conventional env variable
    pub api_key: Option<String>,

    /// API base URL (for custom endpoints)
    pub api_base: Option<String>,

    /// Model to use (provider default when unset)
    pub model: Option<String>,

    /// Request timeout in seconds
    #[serde(default = "default_llm_timeout")]
    pub timeout_secs: u64,

    #[serde(default = "default_temperature")]
    pub temperature: f32,

    #[serde(default = "default_max_tokens")]
    pub max_tokens: usize,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SessionConfig {
    /// Maximum number of sessions kept in memory
    #[serde(default = "default_session_max_entries")]
    pub max_entries: usize,

    /// Idle time after which a session's context is forgotten
    #[serde(default = "default_session_ttl")]
    pub ttl_secs: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct FallbackConfig {
    /// Consult the language model for ambiguous turns
    #[serde(default = "default_enabled")]
    pub enabled: bool,

    /// Reject model output that does not follow the directive format
    #[serde(default = "default_enabled")]
    pub strict: bool,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RetryConfig {
    /// Retries after the first attempt (0 = fail fast)
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    #[serde(default = "default_initial_backoff")]
    pub initial_backoff_ms: u64,

    #[serde(default = "default_max_backoff")]
    pub max_backoff_ms: u64,

    /// Upper bound on the total time spent retrying one call
    #[serde(default = "default_max_elapsed")]
    pub max_elapsed_ms: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RenderConfig {
    /// Records rendered per (entity, intent) pair
    #[serde(default = "default_records_per_pair")]
    pub records_per_pair: usize,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ObservabilityConfig {
    /// Log level (debug, info, warn, error) or a full filter directive
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Enable JSON logging
    #[serde(default = "default_json_logging")]
    pub json_logging: bool,

    /// Metrics port (0 to disable)
    #[serde(default = "default_metrics_port")]
    pub metrics_port: u16,

    /// Service name for logs
    #[serde(default = "default_service_name")]
    pub service_name: String,
}

// Default value functions
fn default_host() -> String { "0.0.0.0".to_string() }
fn default_port() -> u16 { 3000 }
fn default_shutdown_timeout() -> u64 { 30 }
fn default_graph_backend() -> GraphBackend { GraphBackend::Neo4j }
fn default_graph_url() -> String { "http://localhost:7474".to_string() }
fn default_graph_database() -> String { "neo4j".to_string() }
fn default_graph_timeout() -> u64 { 10 }
fn default_llm_provider() -> LlmProvider { LlmProvider::Gemini }
fn default_llm_timeout() -> u64 { 30 }
fn default_temperature() -> f32 { 0.2 }
fn default_max_tokens() -> usize { 1024 }
fn default_session_max_entries() -> usize { 1024 }
fn default_session_ttl() -> u64 { 1800 }
fn default_enabled() -> bool { true }
fn default_max_retries() -> u32 { 2 }
fn default_initial_backoff() -> u64 { 200 }
fn default_max_backoff() -> u64 { 2000 }
fn default_max_elapsed() -> u64 { 10_000 }
fn default_records_per_pair() -> usize { 1 }
fn default_log_level() -> String { "info".to_string() }
fn default_json_logging() -> bool { true }
fn default_metrics_port() -> u16 { 9090 }
fn default_service_name() -> String { "campuscandid".to_string() }

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            shutdown_timeout_secs: default_shutdown_timeout(),
        }
    }
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self {
            backend: default_graph_backend(),
            url: default_graph_url(),
            database: default_graph_database(),
            user: None,
            password: None,
            timeout_secs: default_graph_timeout(),
        }
    }
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: default_llm_provider(),
            api_key: None,
            api_base: None,
            model: None,
            timeout_secs: default_llm_timeout(),
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
        }
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            max_entries: default_session_max_entries(),
            ttl_secs: default_session_ttl(),
        }
    }
}

impl Default for FallbackConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            strict: default_enabled(),
        }
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            initial_backoff_ms: default_initial_backoff(),
            max_backoff_ms: default_max_backoff(),
            max_elapsed_ms: default_max_elapsed(),
        }
    }
}

impl RetryConfig {
    /// Policy that never retries
    pub fn fail_fast() -> Self {
        Self {
            max_retries: 0,
            ..Self::default()
        }
    }
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            records_per_pair: default_records_per_pair(),
        }
    }
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            json_logging: default_json_logging(),
            metrics_port: default_metrics_port(),
            service_name: default_service_name(),
        }
    }
}

impl AppConfig {
    /// Load configuration from environment and files
    pub fn load() -> Result<Self, ConfigError> {
        let env = std::env::var("APP_ENV").unwrap_or_else(|_| "development".to_string());

        let config = Config::builder()
            // Load base config file
            .add_source(File::with_name("config/default").required(false))

            // Load environment-specific config
            .add_source(File::with_name(&format!("config/{}", env)).required(false))

            // Load local overrides
            .add_source(File::with_name("config/local").required(false))

            // Load from environment variables with APP__ prefix
            // e.g., APP__SERVER__PORT=8081
            .add_source(
                Environment::with_prefix("APP")
                    .separator("__")
                    .try_parsing(true)
            )

            .build()?;

        let mut config: Self = config.try_deserialize()?;
        config.apply_conventional_env();
        Ok(config)
    }

    /// Pick up provider API keys from their conventional variables
    fn apply_conventional_env(&mut self) {
        if self.llm.api_key.is_none() {
            self.llm.api_key = self
                .llm
                .provider
                .api_key_env()
                .and_then(|var| std::env::var(var).ok())
                .filter(|key| !key.is_empty());
        }
    }

    /// Get shutdown timeout as Duration
    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.server.shutdown_timeout_secs)
    }

    /// Session idle TTL as Duration
    pub fn session_ttl(&self) -> Duration {
        Duration::from_secs(self.session.ttl_secs)
    }
}
