//! AI integration for backlog generation.
//!
//! This module provides:
//! - AI provider abstraction (OpenAI, Anthropic)
//! - Prompt template system with Handlebars
//! - The fallback gateway that chains providers

pub mod gateway;
pub mod prompts;
pub mod provider;

// Provider implementations
pub mod anthropic;
pub mod openai;

// Re-exports
pub use gateway::{Generation, LlmGateway, ProviderFailure, ProviderSlot};
pub use prompts::{Prompt, PromptManager, PromptTemplate};
pub use provider::{AIMessage, AIProvider, AIResponse, AIRole, GenerateOptions, TokenUsage};
