//! Anthropic Messages API provider.
//!
//! The PDF goes out as a base64 `document` block. With prompt caching on,
//! the document block is marked ephemeral so a retry of the same file reads
//! it from cache.
//!
//! ## Security
//!
//! This provider uses the centralized [`ApiCredential`] system for secure
//! credential handling. See the [`secrets`](super::secrets) module for details.

use super::{
    factory::ProviderFactory,
    http,
    secrets::{ApiCredential, CredentialSource},
    ChatMessage, CompletionConfig, CompletionResponse, LlmProvider, MessagePart, ProviderError,
    TokenUsage,
};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::sync::Arc;

/// Environment variable name for Anthropic API key.
pub const ANTHROPIC_API_KEY_ENV: &str = "ANTHROPIC_API_KEY";

const DEFAULT_BASE_URL: &str = "https://api.anthropic.com/v1";
const ANTHROPIC_VERSION: &str = "2023-06-01";
const DEFAULT_ANTHROPIC_MODEL: &str = "claude-sonnet-4-5";

/// Anthropic Claude provider.
pub struct AnthropicProvider {
    credential: ApiCredential,
    base_url: String,
    client: reqwest::Client,
}

impl std::fmt::Debug for AnthropicProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AnthropicProvider")
            .field("credential", &self.credential)
            .field("base_url", &self.base_url)
            .finish()
    }
}

impl AnthropicProvider {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self::with_credential(ApiCredential::new(
            api_key,
            CredentialSource::Programmatic,
            "Anthropic API key",
        ))
    }

    /// Create from the `ANTHROPIC_API_KEY` environment variable.
    pub fn from_env() -> Result<Self, ProviderError> {
        let credential = ApiCredential::from_env(ANTHROPIC_API_KEY_ENV, "Anthropic API key")?;
        Ok(Self::with_credential(credential))
    }

    /// Create from JSON configuration with environment fallback.
    pub fn from_config(config: &JsonValue) -> Result<Self, ProviderError> {
        let credential = ApiCredential::from_config_or_env(
            config,
            "api_key",
            ANTHROPIC_API_KEY_ENV,
            "Anthropic API key",
        )?;

        let mut provider = Self::with_credential(credential);
        if let Some(url) = config["base_url"].as_str() {
            provider.base_url = url.trim_end_matches('/').to_string();
        }
        Ok(provider)
    }

    fn with_credential(credential: ApiCredential) -> Self {
        Self {
            credential,
            base_url: DEFAULT_BASE_URL.to_string(),
            client: reqwest::Client::new(),
        }
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }
}

/// Anthropic API request format.
#[derive(Debug, Serialize)]
struct AnthropicRequest {
    model: String,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,
    messages: Vec<AnthropicMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
}

#[derive(Debug, Serialize)]
struct AnthropicMessage {
    role: String,
    content: Vec<ContentBlock>,
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ContentBlock {
    Text {
        text: String,
    },
    Document {
        source: DocumentSource,
        #[serde(skip_serializing_if = "Option::is_none")]
        cache_control: Option<CacheControl>,
    },
}

#[derive(Debug, Serialize)]
struct DocumentSource {
    #[serde(rename = "type")]
    type_: &'static str,
    media_type: &'static str,
    data: String,
}

#[derive(Debug, Serialize)]
struct CacheControl {
    #[serde(rename = "type")]
    type_: &'static str,
}

/// Anthropic API response format.
#[derive(Debug, Deserialize)]
struct AnthropicResponse {
    content: Vec<ContentBlockResponse>,
    model: String,
    stop_reason: Option<String>,
    usage: AnthropicUsage,
}

#[derive(Debug, Deserialize)]
struct ContentBlockResponse {
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AnthropicUsage {
    input_tokens: u32,
    output_tokens: u32,
    #[serde(default)]
    cache_creation_input_tokens: u32,
    #[serde(default)]
    cache_read_input_tokens: u32,
}

/// Split out the system prompt and convert the rest to Anthropic blocks.
fn to_request(messages: Vec<ChatMessage>, config: &CompletionConfig) -> AnthropicRequest {
    let mut system: Option<String> = None;
    let mut api_messages = Vec::new();

    for msg in messages {
        if msg.role == "system" {
            let text = msg.text();
            system = Some(match system {
                Some(existing) => format!("{}\n\n{}", existing, text),
                None => text,
            });
            continue;
        }

        let content = msg
            .parts
            .into_iter()
            .map(|part| match part {
                MessagePart::Text(text) => ContentBlock::Text { text },
                MessagePart::Document(doc) => ContentBlock::Document {
                    source: DocumentSource {
                        type_: "base64",
                        media_type: "application/pdf",
                        data: doc.to_base64(),
                    },
                    cache_control: config
                        .prompt_caching
                        .then_some(CacheControl { type_: "ephemeral" }),
                },
            })
            .collect();

        api_messages.push(AnthropicMessage {
            role: msg.role,
            content,
        });
    }

    AnthropicRequest {
        model: config.model.clone(),
        max_tokens: config.max_tokens,
        system,
        messages: api_messages,
        temperature: if config.temperature == 0.0 {
            None
        } else {
            Some(config.temperature)
        },
    }
}

#[async_trait]
impl LlmProvider for AnthropicProvider {
    async fn complete(
        &self,
        messages: Vec<ChatMessage>,
        config: &CompletionConfig,
    ) -> Result<CompletionResponse, ProviderError> {
        let request = to_request(messages, config);

        // SECURITY: Only expose the credential here, at the point of use
        let builder = self
            .client
            .post(format!("{}/messages", self.base_url))
            .header("x-api-key", self.credential.expose())
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&request);

        let response = http::send(builder, config.timeout).await?;
        let body: AnthropicResponse = http::json(response).await?;

        let content = body
            .content
            .into_iter()
            .filter_map(|block| block.text)
            .collect::<Vec<_>>()
            .join("");

        if content.is_empty() {
            return Err(ProviderError::ParseError(
                "could not extract model output text".to_string(),
            ));
        }

        Ok(CompletionResponse {
            content,
            usage: TokenUsage {
                prompt_tokens: body.usage.input_tokens + body.usage.cache_read_input_tokens,
                completion_tokens: body.usage.output_tokens,
                cache_read_tokens: body.usage.cache_read_input_tokens,
                cache_creation_tokens: body.usage.cache_creation_input_tokens,
            },
            model: body.model,
            stop_reason: body.stop_reason,
        })
    }

    async fn health_check(&self) -> bool {
        !self.credential.is_empty()
    }

    fn name(&self) -> &str {
        "anthropic"
    }
}

/// Factory for creating Anthropic providers from configuration.
///
/// ## Configuration Format
/// ```json
/// {
///   "api_key": "sk-ant-...",   // Optional, falls back to ANTHROPIC_API_KEY env
///   "base_url": "https://..."  // Optional, custom API endpoint
/// }
/// ```
pub struct AnthropicProviderFactory;

impl ProviderFactory for AnthropicProviderFactory {
    fn provider_type(&self) -> &'static str {
        "anthropic"
    }

    fn create(&self, config: &JsonValue) -> Result<Arc<dyn LlmProvider>, ProviderError> {
        let provider = AnthropicProvider::from_config(config)?;
        Ok(Arc::new(provider))
    }

    fn validate_config(&self, config: &JsonValue) -> Result<(), ProviderError> {
        if !ApiCredential::is_available(config, "api_key", ANTHROPIC_API_KEY_ENV) {
            return Err(ProviderError::NotConfigured(format!(
                "Anthropic API key required: set 'api_key' in config or {} env",
                ANTHROPIC_API_KEY_ENV
            )));
        }
        super::factory::validate_base_url(config)
    }

    fn default_model(&self) -> &'static str {
        DEFAULT_ANTHROPIC_MODEL
    }

    fn description(&self) -> &'static str {
        "Anthropic Messages API with PDF document blocks"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::PdfDocument;

    fn messages() -> Vec<ChatMessage> {
        let doc = PdfDocument::from_bytes("trial.pdf", b"%PDF-1.7".to_vec());
        vec![
            ChatMessage::system("rules"),
            ChatMessage::user_with_document("Extract.", doc),
        ]
    }

    #[test]
    fn test_request_lifts_system_prompt() {
        let request = to_request(messages(), &CompletionConfig::default());
        let json = serde_json::to_value(&request).unwrap();

        assert_eq!(json["system"], "rules");
        assert_eq!(json["messages"].as_array().unwrap().len(), 1);
        assert_eq!(json["messages"][0]["content"][0]["type"], "text");
    }

    #[test]
    fn test_document_block_shape() {
        let request = to_request(messages(), &CompletionConfig::default());
        let json = serde_json::to_value(&request).unwrap();
        let block = &json["messages"][0]["content"][1];

        assert_eq!(block["type"], "document");
        assert_eq!(block["source"]["type"], "base64");
        assert_eq!(block["source"]["media_type"], "application/pdf");
        assert_eq!(block["source"]["data"], "JVBERi0xLjc=");
        assert_eq!(block["cache_control"]["type"], "ephemeral");
    }

    #[test]
    fn test_no_cache_control_when_caching_off() {
        let config = CompletionConfig {
            prompt_caching: false,
            ..CompletionConfig::default()
        };
        let json = serde_json::to_value(to_request(messages(), &config)).unwrap();
        assert!(json["messages"][0]["content"][1].get("cache_control").is_none());
    }

    #[test]
    fn test_factory_create_with_api_key() {
        let factory = AnthropicProviderFactory;
        let provider = factory
            .create(&serde_json::json!({ "api_key": "test-api-key" }))
            .unwrap();
        assert_eq!(provider.name(), "anthropic");
        assert_eq!(factory.default_model(), "claude-sonnet-4-5");
    }

    #[test]
    fn test_factory_validate_invalid_base_url() {
        let factory = AnthropicProviderFactory;
        let config = serde_json::json!({
            "api_key": "test-key",
            "base_url": "invalid-url"
        });
        assert!(factory.validate_config(&config).is_err());
    }

    // ==================== SECURITY TESTS ====================

    #[test]
    fn test_api_key_not_in_debug_output() {
        let secret_key = "sk-ant-REDACTED";
        let provider = AnthropicProvider::new(secret_key);

        let debug_output = format!("{:?}", provider);
        assert!(
            !debug_output.contains(secret_key),
            "API key was exposed in Debug output!"
        );
        assert!(debug_output.contains("[REDACTED]"));
    }

    #[tokio::test]
    async fn test_api_key_accessible_for_health_check() {
        assert!(AnthropicProvider::new("sk-ant-key").health_check().await);
        assert!(!AnthropicProvider::new("").health_check().await);
    }

    #[test]
    fn test_from_config_with_api_key() {
        let config = serde_json::json!({
            "api_key": "config-api-key",
            "base_url": "https://custom.api.com/v1"
        });

        let provider = AnthropicProvider::from_config(&config).unwrap();
        assert_eq!(provider.base_url, "https://custom.api.com/v1");
        assert_eq!(provider.credential.expose(), "config-api-key");
        assert_eq!(provider.credential.source(), CredentialSource::Config);
    }
}
