//! LLM Provider abstractions for trialscan-runtime.
//!
//! This module defines the trait for LLM providers and includes
//! implementations for OpenAI and Anthropic. Both accept a PDF document
//! alongside the prompt text.
//!
//! ## Security
//!
//! All providers use the [`secrets`] module for secure credential handling.
//! See [`ApiCredential`] for the recommended patterns.

use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

use crate::document::PdfDocument;

mod factory;
pub mod secrets;

#[cfg(any(feature = "openai", feature = "anthropic"))]
mod http;

#[cfg(feature = "anthropic")]
mod anthropic;

#[cfg(feature = "openai")]
mod openai;

pub use factory::{ProviderFactory, ProviderRegistry};
pub use secrets::{ApiCredential, CredentialSource};

#[cfg(feature = "anthropic")]
pub use anthropic::{AnthropicProvider, AnthropicProviderFactory, ANTHROPIC_API_KEY_ENV};

#[cfg(feature = "openai")]
pub use openai::{OpenAiProvider, OpenAiProviderFactory, OPENAI_API_KEY_ENV};

/// Default extraction model.
pub const DEFAULT_MODEL: &str = "gpt-5-mini";

/// Errors from LLM providers.
#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("HTTP request failed: {0}")]
    HttpError(String),

    #[error("Rate limit exceeded, retry after {retry_after:?}")]
    RateLimited { retry_after: Option<Duration> },

    #[error("API error: {status} - {message}")]
    ApiError { status: u16, message: String },

    #[error("JSON parse error: {0}")]
    ParseError(String),

    #[error("Authentication failed")]
    AuthError,

    #[error("Timeout after {0:?}")]
    Timeout(Duration),

    #[error("Provider not configured: {0}")]
    NotConfigured(String),
}

impl ProviderError {
    /// Whether a retry may succeed: network trouble, throttling, or a
    /// server-side failure.
    pub fn is_retryable(&self) -> bool {
        match self {
            ProviderError::HttpError(_)
            | ProviderError::RateLimited { .. }
            | ProviderError::Timeout(_) => true,
            ProviderError::ApiError { status, .. } => *status >= 500,
            ProviderError::ParseError(_)
            | ProviderError::AuthError
            | ProviderError::NotConfigured(_) => false,
        }
    }
}

/// Configuration for a completion request.
#[derive(Debug, Clone)]
pub struct CompletionConfig {
    /// Model to use
    pub model: String,

    /// Maximum tokens to generate (reasoning models count reasoning here)
    pub max_tokens: u32,

    /// Temperature (0.0 leaves the provider default)
    pub temperature: f32,

    /// Request timeout
    pub timeout: Duration,

    /// Enable prompt caching (Anthropic-specific)
    pub prompt_caching: bool,
}

impl Default for CompletionConfig {
    fn default() -> Self {
        Self {
            model: DEFAULT_MODEL.to_string(),
            max_tokens: 16_000,
            temperature: 0.0,
            timeout: Duration::from_secs(120),
            prompt_caching: true,
        }
    }
}

/// One piece of message content.
#[derive(Debug, Clone)]
pub enum MessagePart {
    Text(String),
    Document(PdfDocument),
}

/// A chat message for LLM completion.
#[derive(Debug, Clone)]
pub struct ChatMessage {
    /// Role: "system", "user", or "assistant"
    pub role: String,

    /// Message content, in order
    pub parts: Vec<MessagePart>,
}

impl ChatMessage {
    /// Create a system message.
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            parts: vec![MessagePart::Text(content.into())],
        }
    }

    /// Create a user message.
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            parts: vec![MessagePart::Text(content.into())],
        }
    }

    /// Create a user message carrying an instruction and a document.
    pub fn user_with_document(content: impl Into<String>, document: PdfDocument) -> Self {
        Self {
            role: "user".to_string(),
            parts: vec![
                MessagePart::Text(content.into()),
                MessagePart::Document(document),
            ],
        }
    }

    /// Concatenated text parts.
    pub fn text(&self) -> String {
        self.parts
            .iter()
            .filter_map(|p| match p {
                MessagePart::Text(t) => Some(t.as_str()),
                MessagePart::Document(_) => None,
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    pub fn documents(&self) -> impl Iterator<Item = &PdfDocument> {
        self.parts.iter().filter_map(|p| match p {
            MessagePart::Document(d) => Some(d),
            MessagePart::Text(_) => None,
        })
    }
}

/// Response from an LLM completion.
#[derive(Debug, Clone)]
pub struct CompletionResponse {
    /// Generated text
    pub content: String,

    /// Token usage
    pub usage: TokenUsage,

    /// Model used
    pub model: String,

    /// Stop reason or response status
    pub stop_reason: Option<String>,
}

/// Token usage from a completion.
#[derive(Debug, Clone, Default)]
pub struct TokenUsage {
    /// Tokens in the prompt, cache reads included
    pub prompt_tokens: u32,

    /// Tokens in the completion
    pub completion_tokens: u32,

    /// Tokens read from cache
    pub cache_read_tokens: u32,

    /// Tokens written to cache (Anthropic)
    pub cache_creation_tokens: u32,
}

impl TokenUsage {
    /// Total tokens used.
    pub fn total(&self) -> u32 {
        self.prompt_tokens + self.completion_tokens
    }
}

/// Provider abstraction allows swapping LLM backends.
///
/// This is the only place where network calls to a model are made.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Execute a chat completion.
    async fn complete(
        &self,
        messages: Vec<ChatMessage>,
        config: &CompletionConfig,
    ) -> Result<CompletionResponse, ProviderError>;

    /// Check if provider is usable (credential present).
    async fn health_check(&self) -> bool;

    /// Get provider name for logs.
    fn name(&self) -> &str;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chat_message_creation() {
        let system = ChatMessage::system("You extract study data.");
        assert_eq!(system.role, "system");
        assert_eq!(system.text(), "You extract study data.");

        let doc = PdfDocument::from_bytes("a.pdf", b"%PDF-".to_vec());
        let user = ChatMessage::user_with_document("Extract.", doc);
        assert_eq!(user.role, "user");
        assert_eq!(user.text(), "Extract.");
        assert_eq!(user.documents().count(), 1);
    }

    #[test]
    fn test_token_usage_total() {
        let usage = TokenUsage {
            prompt_tokens: 100,
            completion_tokens: 50,
            cache_read_tokens: 0,
            cache_creation_tokens: 0,
        };
        assert_eq!(usage.total(), 150);
    }

    #[test]
    fn test_retry_classification() {
        assert!(ProviderError::Timeout(Duration::from_secs(1)).is_retryable());
        assert!(ProviderError::RateLimited { retry_after: None }.is_retryable());
        assert!(ProviderError::ApiError {
            status: 503,
            message: "overloaded".into()
        }
        .is_retryable());
        assert!(!ProviderError::ApiError {
            status: 400,
            message: "bad file".into()
        }
        .is_retryable());
        assert!(!ProviderError::AuthError.is_retryable());
        assert!(!ProviderError::ParseError("x".into()).is_retryable());
    }
}
