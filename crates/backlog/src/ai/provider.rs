//! AI Provider trait and common types.
//!
//! Defines the interface that every LLM provider implements. The gateway
//! treats providers as interchangeable generation strategies.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::entities::Seed;
use crate::errors::{BacklogError, BacklogResult};

/// Role of a message in a conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AIRole {
    /// System message (sets context/behavior)
    System,
    /// User message (input)
    User,
    /// Assistant message (AI response)
    Assistant,
}

impl AIRole {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::System => "system",
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }
}

/// A message in a conversation with an AI model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AIMessage {
    /// Role of the message sender
    pub role: AIRole,
    /// Content of the message
    pub content: String,
}

impl AIMessage {
    /// Create a new system message.
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: AIRole::System,
            content: content.into(),
        }
    }

    /// Create a new user message.
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: AIRole::User,
            content: content.into(),
        }
    }
}

/// Token usage information from an AI response.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    pub input_tokens: u32,
    pub output_tokens: u32,
    pub total_tokens: u32,
}

/// Response from an AI model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AIResponse {
    /// Generated text content
    pub text: String,
    /// Token usage information
    pub usage: TokenUsage,
    /// Model that generated the response
    pub model: String,
    /// Provider that generated the response
    pub provider: String,
}

/// Options for text generation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GenerateOptions {
    /// Temperature for sampling (0.0 to 1.0)
    pub temperature: Option<f32>,
    /// Maximum tokens to generate
    pub max_tokens: Option<u32>,
    /// Reproducibility seed, forwarded only by providers that support it
    pub seed: Option<Seed>,
}

/// Trait for AI providers.
#[async_trait]
pub trait AIProvider: Send + Sync {
    /// Get the provider name (e.g., "anthropic", "openai").
    fn name(&self) -> &'static str;

    /// Get the environment variable name for the API key.
    fn api_key_env_var(&self) -> &'static str;

    /// Check if the provider is configured (has API key).
    fn is_configured(&self) -> bool;

    /// Whether the provider honours [`GenerateOptions::seed`].
    fn supports_seed(&self) -> bool {
        false
    }

    /// Generate text from messages.
    async fn generate_text(
        &self,
        model: &str,
        messages: &[AIMessage],
        options: &GenerateOptions,
    ) -> BacklogResult<AIResponse>;
}

/// Map a transport-level `reqwest` failure onto the provider error taxonomy.
pub(crate) fn request_error(provider: &str, err: &reqwest::Error) -> BacklogError {
    if err.is_timeout() {
        BacklogError::ProviderTimeout {
            provider: provider.to_string(),
        }
    } else if err.is_connect() {
        BacklogError::provider(provider, format!("connection failed: {err}"))
    } else {
        BacklogError::provider(provider, format!("request failed: {err}"))
    }
}

/// Build the missing-credential error for a provider.
pub(crate) fn not_configured(provider: &dyn AIProvider) -> BacklogError {
    BacklogError::ProviderNotConfigured {
        provider: provider.name().to_string(),
        env_var: provider.api_key_env_var().to_string(),
    }
}
