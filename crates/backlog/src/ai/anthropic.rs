//! Anthropic Claude provider implementation (secondary provider).

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::domain::encoding::normalize_bytes;
use crate::errors::{BacklogError, BacklogResult};

use super::provider::{
    not_configured, request_error, AIMessage, AIProvider, AIResponse, AIRole, GenerateOptions,
    TokenUsage,
};

/// Anthropic API endpoint
pub const ANTHROPIC_API_URL: &str = "https://api.anthropic.com/v1/messages";

/// Anthropic API version
const ANTHROPIC_VERSION: &str = "2023-06-01";

/// Default model
pub const DEFAULT_MODEL: &str = "claude-sonnet-4-20250514";

const DEFAULT_MAX_TOKENS: u32 = 4096;

const PROVIDER: &str = "anthropic";

/// Maps short names to their API identifiers.
fn normalize_model(model: &str) -> &str {
    match model {
        "opus" => "claude-opus-4-1-20250805",
        "sonnet" => "claude-sonnet-4-20250514",
        "haiku" => "claude-3-5-haiku-20241022",
        _ => model,
    }
}

#[derive(Debug, Serialize)]
struct AnthropicMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct AnthropicRequest<'a> {
    model: &'a str,
    messages: Vec<AnthropicMessage<'a>>,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
}

#[derive(Debug, Deserialize)]
struct AnthropicContent {
    #[serde(rename = "type")]
    content_type: String,
    #[serde(default)]
    text: String,
}

#[derive(Debug, Default, Deserialize)]
struct AnthropicUsage {
    input_tokens: u32,
    output_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct AnthropicResponse {
    content: Vec<AnthropicContent>,
    model: String,
    #[serde(default)]
    usage: AnthropicUsage,
}

#[derive(Debug, Deserialize)]
struct AnthropicError {
    #[serde(rename = "type")]
    error_type: String,
    message: String,
}

#[derive(Debug, Deserialize)]
struct AnthropicErrorResponse {
    error: AnthropicError,
}

/// Anthropic Claude provider.
///
/// The messages API has no sampling seed, so [`GenerateOptions::seed`] is ignored.
pub struct AnthropicProvider {
    client: Client,
    api_key: Option<String>,
    base_url: String,
}

impl AnthropicProvider {
    /// Create a provider using a shared HTTP client.
    pub fn new(client: Client, api_key: Option<String>) -> Self {
        Self {
            client,
            api_key: api_key.filter(|k| !k.trim().is_empty()),
            base_url: ANTHROPIC_API_URL.to_string(),
        }
    }

    /// Set a custom base URL.
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    /// Convert messages to Anthropic format, extracting the system message.
    fn convert_messages(messages: &[AIMessage]) -> (Option<&str>, Vec<AnthropicMessage<'_>>) {
        let mut system = None;
        let mut converted = Vec::new();

        for msg in messages {
            match msg.role {
                AIRole::System => system = Some(msg.content.as_str()),
                AIRole::User | AIRole::Assistant => converted.push(AnthropicMessage {
                    role: msg.role.as_str(),
                    content: &msg.content,
                }),
            }
        }

        (system, converted)
    }
}

#[async_trait]
impl AIProvider for AnthropicProvider {
    fn name(&self) -> &'static str {
        PROVIDER
    }

    fn api_key_env_var(&self) -> &'static str {
        "ANTHROPIC_API_KEY"
    }

    fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }

    async fn generate_text(
        &self,
        model: &str,
        messages: &[AIMessage],
        options: &GenerateOptions,
    ) -> BacklogResult<AIResponse> {
        let api_key = self.api_key.as_ref().ok_or_else(|| not_configured(self))?;

        let (system, converted_messages) = Self::convert_messages(messages);
        let request = AnthropicRequest {
            model: normalize_model(model),
            messages: converted_messages,
            max_tokens: options.max_tokens.unwrap_or(DEFAULT_MAX_TOKENS),
            system,
            temperature: options.temperature,
        };

        debug!(model = %request.model, temperature = ?request.temperature, "Calling Claude API");

        let response = self
            .client
            .post(&self.base_url)
            .header("x-api-key", api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&request)
            .send()
            .await
            .map_err(|e| request_error(PROVIDER, &e))?;

        let status = response.status();
        let bytes = response
            .bytes()
            .await
            .map_err(|e| request_error(PROVIDER, &e))?;
        let body = normalize_bytes(&bytes);

        if !status.is_success() {
            warn!(status = %status, body = %body, "Anthropic API returned an error");
            if let Ok(error_response) = serde_json::from_str::<AnthropicErrorResponse>(&body) {
                return Err(BacklogError::provider(
                    PROVIDER,
                    format!(
                        "API returned {status}: {} - {}",
                        error_response.error.error_type, error_response.error.message
                    ),
                ));
            }
            return Err(BacklogError::provider(
                PROVIDER,
                format!("API returned {status}: {body}"),
            ));
        }

        let api_response: AnthropicResponse = serde_json::from_str(&body).map_err(|e| {
            BacklogError::provider(PROVIDER, format!("failed to parse response: {e}"))
        })?;

        let text: String = api_response
            .content
            .iter()
            .filter(|block| block.content_type == "text")
            .map(|block| block.text.as_str())
            .collect();
        if text.trim().is_empty() {
            return Err(BacklogError::provider(PROVIDER, "response contained no content"));
        }

        let usage = api_response.usage;
        Ok(AIResponse {
            text,
            usage: TokenUsage {
                input_tokens: usage.input_tokens,
                output_tokens: usage.output_tokens,
                total_tokens: usage.input_tokens + usage.output_tokens,
            },
            model: api_response.model,
            provider: PROVIDER.to_string(),
        })
    }
}
