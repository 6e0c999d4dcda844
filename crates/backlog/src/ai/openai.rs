//! OpenAI GPT provider implementation (primary provider).

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::domain::encoding::normalize_bytes;
use crate::errors::{BacklogError, BacklogResult};

use super::provider::{
    not_configured, request_error, AIMessage, AIProvider, AIResponse, GenerateOptions, TokenUsage,
};

/// OpenAI API endpoint
pub const OPENAI_API_URL: &str = "https://api.openai.com/v1/chat/completions";

/// Default model
pub const DEFAULT_MODEL: &str = "gpt-4-turbo";

const PROVIDER: &str = "openai";

/// OpenAI API request message
#[derive(Debug, Serialize)]
struct OpenAIMessage<'a> {
    role: &'static str,
    content: &'a str,
}

/// OpenAI API request
#[derive(Debug, Serialize)]
struct OpenAIRequest<'a> {
    model: &'a str,
    messages: Vec<OpenAIMessage<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    seed: Option<i32>,
}

#[derive(Debug, Deserialize)]
struct OpenAIChoiceMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OpenAIChoice {
    message: OpenAIChoiceMessage,
}

#[derive(Debug, Default, Deserialize)]
#[allow(clippy::struct_field_names)]
struct OpenAIUsage {
    prompt_tokens: u32,
    completion_tokens: u32,
    total_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct OpenAIResponse {
    choices: Vec<OpenAIChoice>,
    model: String,
    #[serde(default)]
    usage: OpenAIUsage,
}

#[derive(Debug, Deserialize)]
struct OpenAIError {
    message: String,
}

#[derive(Debug, Deserialize)]
struct OpenAIErrorResponse {
    error: OpenAIError,
}

/// OpenAI chat completions provider.
pub struct OpenAIProvider {
    client: Client,
    api_key: Option<String>,
    base_url: String,
}

impl OpenAIProvider {
    /// Create a provider using a shared HTTP client.
    pub fn new(client: Client, api_key: Option<String>) -> Self {
        Self {
            client,
            api_key: api_key.filter(|k| !k.trim().is_empty()),
            base_url: OPENAI_API_URL.to_string(),
        }
    }

    /// Set a custom base URL (useful for Azure OpenAI or proxies).
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    fn convert_messages(messages: &[AIMessage]) -> Vec<OpenAIMessage<'_>> {
        messages
            .iter()
            .map(|msg| OpenAIMessage {
                role: msg.role.as_str(),
                content: &msg.content,
            })
            .collect()
    }
}

#[async_trait]
impl AIProvider for OpenAIProvider {
    fn name(&self) -> &'static str {
        PROVIDER
    }

    fn api_key_env_var(&self) -> &'static str {
        "OPENAI_API_KEY"
    }

    fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }

    fn supports_seed(&self) -> bool {
        true
    }

    async fn generate_text(
        &self,
        model: &str,
        messages: &[AIMessage],
        options: &GenerateOptions,
    ) -> BacklogResult<AIResponse> {
        let api_key = self.api_key.as_ref().ok_or_else(|| not_configured(self))?;

        let request = OpenAIRequest {
            model,
            messages: Self::convert_messages(messages),
            max_tokens: options.max_tokens,
            temperature: options.temperature,
            seed: options.seed.map(|s| s.value()),
        };

        debug!(
            model = %model,
            seed = ?request.seed,
            temperature = ?request.temperature,
            "Calling OpenAI chat completions"
        );

        let response = self
            .client
            .post(&self.base_url)
            .bearer_auth(api_key)
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
            warn!(status = %status, body = %body, "OpenAI API returned an error");
            if let Ok(error_response) = serde_json::from_str::<OpenAIErrorResponse>(&body) {
                return Err(BacklogError::provider(
                    PROVIDER,
                    format!("API returned {status}: {}", error_response.error.message),
                ));
            }
            return Err(BacklogError::provider(
                PROVIDER,
                format!("API returned {status}: {body}"),
            ));
        }

        let api_response: OpenAIResponse = serde_json::from_str(&body).map_err(|e| {
            BacklogError::provider(PROVIDER, format!("failed to parse response: {e}"))
        })?;

        let text = api_response
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .filter(|t| !t.trim().is_empty())
            .ok_or_else(|| BacklogError::provider(PROVIDER, "response contained no content"))?;

        Ok(AIResponse {
            text,
            usage: TokenUsage {
                input_tokens: api_response.usage.prompt_tokens,
                output_tokens: api_response.usage.completion_tokens,
                total_tokens: api_response.usage.total_tokens,
            },
            model: api_response.model,
            provider: PROVIDER.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_identity() {
        let provider = OpenAIProvider::new(Client::new(), None);
        assert_eq!(provider.name(), "openai");
        assert!(provider.supports_seed());
        assert!(!provider.is_configured());
    }

    #[test]
    fn test_blank_key_is_not_configured() {
        let provider = OpenAIProvider::new(Client::new(), Some("   ".to_string()));
        assert!(!provider.is_configured());
    }

    #[test]
    fn test_request_serialization() {
        let messages = vec![AIMessage::system("rules"), AIMessage::user("spec")];
        let request = OpenAIRequest {
            model: "gpt-4-turbo",
            messages: OpenAIProvider::convert_messages(&messages),
            max_tokens: None,
            temperature: Some(0.2),
            seed: Some(-42),
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["seed"], -42);
        assert_eq!(json["messages"][0]["role"], "system");
        assert_eq!(json["messages"][1]["content"], "spec");
        assert!(json.get("max_tokens").is_none());
    }

    #[tokio::test]
    async fn test_missing_key_fails_without_network() {
        let provider = OpenAIProvider::new(Client::new(), None)
            .with_base_url("http://127.0.0.1:9/unreachable");
        let err = provider
            .generate_text("gpt-4-turbo", &[AIMessage::user("x")], &GenerateOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, BacklogError::ProviderNotConfigured { .. }));
    }
}
