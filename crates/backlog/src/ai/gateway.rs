//! LLM gateway - ordered provider fallback chain.
//!
//! Each prompt is sent to the first slot of the chain; any provider-level
//! failure moves on to the next slot. When every slot has failed the gateway
//! still answers, with a diagnostic text and `degraded = true`.

use std::sync::Arc;

use reqwest::Client;
use serde::Serialize;
use tracing::{info, warn};

use crate::config::{Config, ProviderSettings};
use crate::entities::Seed;
use crate::errors::{BacklogError, BacklogResult};

use super::anthropic::AnthropicProvider;
use super::openai::OpenAIProvider;
use super::prompts::Prompt;
use super::provider::{AIMessage, AIProvider, GenerateOptions, TokenUsage};

/// One entry of the fallback chain.
#[derive(Clone)]
pub struct ProviderSlot {
    provider: Arc<dyn AIProvider>,
    model: String,
    temperature: f32,
    max_tokens: Option<u32>,
}

impl ProviderSlot {
    pub fn new(provider: Arc<dyn AIProvider>, model: impl Into<String>, temperature: f32) -> Self {
        Self {
            provider,
            model: model.into(),
            temperature,
            max_tokens: None,
        }
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    pub fn provider_name(&self) -> &'static str {
        self.provider.name()
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn options(&self, seed: Option<Seed>) -> GenerateOptions {
        GenerateOptions {
            temperature: Some(self.temperature),
            max_tokens: self.max_tokens,
            seed: seed.filter(|_| self.provider.supports_seed()),
        }
    }
}

/// A provider attempt that did not produce text.
#[derive(Debug, Clone, Serialize)]
pub struct ProviderFailure {
    pub provider: String,
    pub model: String,
    pub reason: String,
}

/// Outcome of a gateway call. Never an error: see [`Generation::degraded`].
#[derive(Debug, Clone, Serialize)]
pub struct Generation {
    pub text: String,
    /// True when `text` is the static diagnostic rather than model output.
    pub degraded: bool,
    pub provider: Option<String>,
    pub model: Option<String>,
    pub usage: TokenUsage,
    pub failures: Vec<ProviderFailure>,
}

/// Gateway over an ordered list of providers.
#[derive(Clone)]
pub struct LlmGateway {
    chain: Vec<ProviderSlot>,
}

impl LlmGateway {
    pub fn new(chain: Vec<ProviderSlot>) -> Self {
        Self { chain }
    }

    /// Build the standard chain: OpenAI (primary) then Anthropic at temperature 0.
    pub fn from_config(config: &Config) -> BacklogResult<Self> {
        let client = Client::builder()
            .connect_timeout(config.providers.connect_timeout)
            .timeout(config.providers.request_timeout)
            .build()
            .map_err(|e| BacklogError::Config {
                reason: format!("failed to build HTTP client: {e}"),
            })?;

        let primary = &config.providers.primary;
        let mut openai = OpenAIProvider::new(client.clone(), primary.api_key.clone());
        if let Some(url) = &primary.base_url {
            openai = openai.with_base_url(url);
        }

        let secondary = &config.providers.secondary;
        let mut anthropic = AnthropicProvider::new(client, secondary.api_key.clone());
        if let Some(url) = &secondary.base_url {
            anthropic = anthropic.with_base_url(url);
        }

        if !openai.is_configured() {
            warn!("OPENAI_API_KEY not set - every call will fall back to the secondary provider");
        }
        if !anthropic.is_configured() {
            warn!("ANTHROPIC_API_KEY not set - no secondary provider available");
        }

        let slot = |provider: Arc<dyn AIProvider>, settings: &ProviderSettings| {
            let slot = ProviderSlot::new(provider, &settings.model, settings.temperature);
            match settings.max_tokens {
                Some(limit) => slot.with_max_tokens(limit),
                None => slot,
            }
        };

        Ok(Self::new(vec![
            slot(Arc::new(openai), primary),
            slot(Arc::new(anthropic), secondary),
        ]))
    }

    pub fn chain(&self) -> &[ProviderSlot] {
        &self.chain
    }

    /// Send a prompt down the chain until one provider answers.
    pub async fn generate(&self, prompt: &Prompt, seed: Option<Seed>) -> Generation {
        let messages = [
            AIMessage::system(prompt.system.as_str()),
            AIMessage::user(prompt.user.as_str()),
        ];
        let mut failures = Vec::new();

        for slot in &self.chain {
            let provider = slot.provider_name();
            match slot
                .provider
                .generate_text(&slot.model, &messages, &slot.options(seed))
                .await
            {
                Ok(response) => {
                    info!(
                        provider,
                        model = %response.model,
                        input_tokens = response.usage.input_tokens,
                        output_tokens = response.usage.output_tokens,
                        fallbacks = failures.len(),
                        "Generation succeeded"
                    );
                    return Generation {
                        text: response.text,
                        degraded: false,
                        provider: Some(response.provider),
                        model: Some(response.model),
                        usage: response.usage,
                        failures,
                    };
                }
                Err(e) => {
                    warn!(provider, model = %slot.model, error = %e, "Provider failed, trying next");
                    failures.push(ProviderFailure {
                        provider: provider.to_string(),
                        model: slot.model.clone(),
                        reason: e.to_string(),
                    });
                }
            }
        }

        warn!(attempts = failures.len(), "All providers failed, returning diagnostic");
        Generation {
            text: diagnostic_message(&failures),
            degraded: true,
            provider: None,
            model: None,
            usage: TokenUsage::default(),
            failures,
        }
    }
}

/// Human-readable text returned when no provider produced output.
pub fn diagnostic_message(failures: &[ProviderFailure]) -> String {
    if failures.is_empty() {
        return "Backlog generation is unavailable: no AI provider is configured.".to_string();
    }

    let mut message =
        String::from("Backlog generation is unavailable: every AI provider failed.\n");
    for failure in failures {
        message.push_str(&format!(
            "- {} ({}): {}\n",
            failure.provider, failure.model, failure.reason
        ));
    }
    message.push_str("Please try again later.");
    message
}
