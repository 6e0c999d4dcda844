//! Configuration for the backlog service.
//!
//! Everything is resolved once at startup and injected; nothing downstream
//! reads the process environment.

use std::env;
use std::time::Duration;

use crate::ai::{anthropic, openai};

/// Settings for one LLM provider slot.
#[derive(Clone)]
pub struct ProviderSettings {
    /// API key; `None` makes every call on this slot fail immediately.
    pub api_key: Option<String>,
    /// Endpoint override (proxies, test servers).
    pub base_url: Option<String>,
    /// Model identifier.
    pub model: String,
    /// Sampling temperature.
    pub temperature: f32,
    /// Completion token limit.
    pub max_tokens: Option<u32>,
}

impl std::fmt::Debug for ProviderSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderSettings")
            .field("api_key", &self.api_key.as_ref().map(|_| "***"))
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .finish()
    }
}

/// Provider chain configuration.
#[derive(Debug, Clone)]
pub struct ProvidersConfig {
    /// Primary provider (OpenAI).
    pub primary: ProviderSettings,
    /// Secondary provider (Anthropic), always sampled at temperature 0.
    pub secondary: ProviderSettings,
    /// TCP connect timeout for provider calls.
    pub connect_timeout: Duration,
    /// Overall timeout for a single provider call.
    pub request_timeout: Duration,
}

/// HTTP server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Maximum accepted request body (uploads included).
    pub max_upload_bytes: usize,
}

/// Service configuration.
#[derive(Debug, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub providers: ProvidersConfig,
    /// Result cache entries; 0 disables caching.
    pub cache_capacity: usize,
}

impl Config {
    /// Resolve configuration from the process environment.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Resolve configuration from an arbitrary key lookup.
    ///
    /// Unparseable numeric values fall back to their defaults.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let parsed = |key: &str| non_empty(key).and_then(|v| v.trim().parse::<u64>().ok());
        let max_tokens = non_empty("BACKLOG_MAX_TOKENS")
            .and_then(|v| v.trim().parse::<u32>().ok())
            .or(Some(4096));

        Self {
            server: ServerConfig {
                host: non_empty("BACKLOG_HOST").unwrap_or_else(|| "0.0.0.0".to_string()),
                port: non_empty("BACKLOG_PORT")
                    .and_then(|v| v.trim().parse().ok())
                    .unwrap_or(8080),
                max_upload_bytes: parsed("BACKLOG_MAX_UPLOAD_BYTES")
                    .and_then(|v| usize::try_from(v).ok())
                    .unwrap_or(20 * 1024 * 1024),
            },
            providers: ProvidersConfig {
                primary: ProviderSettings {
                    api_key: non_empty("OPENAI_API_KEY"),
                    base_url: non_empty("OPENAI_BASE_URL"),
                    model: non_empty("PRIMARY_MODEL")
                        .unwrap_or_else(|| openai::DEFAULT_MODEL.to_string()),
                    temperature: non_empty("PRIMARY_TEMPERATURE")
                        .and_then(|v| v.trim().parse::<f32>().ok())
                        .filter(|t| (0.0..=1.0).contains(t))
                        .unwrap_or(0.2),
                    max_tokens,
                },
                secondary: ProviderSettings {
                    api_key: non_empty("ANTHROPIC_API_KEY"),
                    base_url: non_empty("ANTHROPIC_BASE_URL"),
                    model: non_empty("SECONDARY_MODEL")
                        .unwrap_or_else(|| anthropic::DEFAULT_MODEL.to_string()),
                    temperature: 0.0,
                    max_tokens,
                },
                connect_timeout: Duration::from_secs(
                    parsed("PROVIDER_CONNECT_TIMEOUT_SECS").unwrap_or(10),
                ),
                request_timeout: Duration::from_secs(
                    parsed("PROVIDER_REQUEST_TIMEOUT_SECS").unwrap_or(300),
                ),
            },
            cache_capacity: parsed("BACKLOG_CACHE_CAPACITY")
                .and_then(|v| usize::try_from(v).ok())
                .unwrap_or(0),
        }
    }

    /// Socket address string for the HTTP listener.
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::from_lookup(|_| None)
    }
}
