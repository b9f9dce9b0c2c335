//! Pipeline configuration.
//!
//! Loaded from an optional YAML file. The document is checked against
//! `schema/config.schema.json` before it is deserialized, so unknown keys
//! and out-of-range values are reported with their location.

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use std::time::Duration;
use thiserror::Error;

use crate::providers::CompletionConfig;
use crate::resilience::RetryPolicy;

const CONFIG_SCHEMA_JSON: &str = include_str!("../schema/config.schema.json");

static COMPILED_SCHEMA: OnceLock<Result<jsonschema::Validator, String>> = OnceLock::new();

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("config is not valid YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("config does not match schema: {}", .0.join("; "))]
    Schema(Vec<String>),

    #[error("invalid config value: {0}")]
    Invalid(#[from] serde_json::Error),

    #[error("failed to load config schema: {0}")]
    SchemaLoad(String),
}

/// Durations written the humantime way (`120s`, `1m 30s`, `250ms`).
pub(crate) mod duration_str {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&humantime::format_duration(*duration).to_string())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let text = String::deserialize(deserializer)?;
        humantime::parse_duration(text.trim()).map_err(serde::de::Error::custom)
    }
}

/// Where routed records are written.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct OutputConfig {
    pub valid_dir: PathBuf,
    pub invalid_dir: PathBuf,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            valid_dir: PathBuf::from("output"),
            invalid_dir: PathBuf::from("invalid_output"),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BudgetConfig {
    /// Tokens the whole batch may spend; unset means no limit.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_total_tokens: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PipelineConfig {
    /// Provider type registered in the [`ProviderRegistry`](crate::providers::ProviderRegistry)
    pub provider: String,

    /// Model name; the provider's default when unset
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,

    pub max_tokens: u32,

    #[serde(with = "duration_str")]
    pub timeout: Duration,

    /// Documents extracted at the same time
    pub concurrency: usize,

    pub prompt_caching: bool,

    pub output: OutputConfig,

    pub retry: RetryPolicy,

    pub budget: BudgetConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        let completion = CompletionConfig::default();
        Self {
            provider: "openai".to_string(),
            model: None,
            base_url: None,
            max_tokens: completion.max_tokens,
            timeout: completion.timeout,
            concurrency: 4,
            prompt_caching: completion.prompt_caching,
            output: OutputConfig::default(),
            retry: RetryPolicy::default(),
            budget: BudgetConfig::default(),
        }
    }
}

impl PipelineConfig {
    pub fn from_yaml_str(text: &str) -> Result<Self, ConfigError> {
        let mut value: JsonValue = serde_yaml::from_str(text)?;
        if value.is_null() {
            value = JsonValue::Object(Default::default());
        }

        validate_config_schema(&value)?;
        Ok(serde_json::from_value(value)?)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        let config = Self::from_yaml_str(&text)?;
        tracing::debug!(path = %path.display(), provider = %config.provider, "loaded config");
        Ok(config)
    }

    /// Request settings, with `default_model` filling an unset model.
    pub fn completion_config(&self, default_model: &str) -> CompletionConfig {
        CompletionConfig {
            model: self
                .model
                .clone()
                .unwrap_or_else(|| default_model.to_string()),
            max_tokens: self.max_tokens,
            timeout: self.timeout,
            prompt_caching: self.prompt_caching,
            ..CompletionConfig::default()
        }
    }

    /// JSON config handed to the provider factory.
    pub fn provider_config(&self, api_key: Option<&str>) -> JsonValue {
        let mut config = serde_json::Map::new();
        if let Some(key) = api_key {
            config.insert("api_key".to_string(), JsonValue::from(key));
        }
        if let Some(url) = &self.base_url {
            config.insert("base_url".to_string(), JsonValue::from(url.as_str()));
        }
        JsonValue::Object(config)
    }
}

fn get_validator() -> Result<&'static jsonschema::Validator, ConfigError> {
    let result = COMPILED_SCHEMA.get_or_init(|| {
        let schema_value: JsonValue = serde_json::from_str(CONFIG_SCHEMA_JSON)
            .map_err(|e| format!("Invalid schema JSON: {}", e))?;
        jsonschema::options()
            .build(&schema_value)
            .map_err(|e| format!("Failed to compile schema: {}", e))
    });

    result
        .as_ref()
        .map_err(|e| ConfigError::SchemaLoad(e.clone()))
}

/// Check a config document against the schema, collecting every error.
pub fn validate_config_schema(value: &JsonValue) -> Result<(), ConfigError> {
    let validator = get_validator()?;

    let errors: Vec<String> = validator
        .iter_errors(value)
        .map(|e| format!("{} at '{}'", e, e.instance_path))
        .collect();

    if errors.is_empty() {
        Ok(())
    } else {
        Err(ConfigError::Schema(errors))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_document_gives_defaults() {
        let config = PipelineConfig::from_yaml_str("").unwrap();
        assert_eq!(config, PipelineConfig::default());
        assert_eq!(config.provider, "openai");
        assert_eq!(config.output.valid_dir, PathBuf::from("output"));
        assert_eq!(config.output.invalid_dir, PathBuf::from("invalid_output"));
        assert_eq!(config.timeout, Duration::from_secs(120));
        assert_eq!(config.retry.max_attempts, 3);
        assert_eq!(config.budget.max_total_tokens, None);
    }

    #[test]
    fn test_full_document() {
        let yaml = r#"
provider: anthropic
model: claude-sonnet-4-5
base_url: https://proxy.internal/v1
max_tokens: 8000
timeout: 90s
concurrency: 2
output:
  valid_dir: accepted
  invalid_dir: rejected
retry:
  max_attempts: 5
  min_delay: 500ms
budget:
  max_total_tokens: 2000000
"#;
        let config = PipelineConfig::from_yaml_str(yaml).unwrap();
        assert_eq!(config.provider, "anthropic");
        assert_eq!(config.timeout, Duration::from_secs(90));
        assert_eq!(config.concurrency, 2);
        assert_eq!(config.output.invalid_dir, PathBuf::from("rejected"));
        assert_eq!(config.retry.min_delay, Duration::from_millis(500));
        assert_eq!(config.budget.max_total_tokens, Some(2_000_000));

        let completion = config.completion_config("unused");
        assert_eq!(completion.model, "claude-sonnet-4-5");
        assert_eq!(completion.max_tokens, 8000);
    }

    #[test]
    fn test_unknown_key_rejected() {
        let err = PipelineConfig::from_yaml_str("provider: openai\ntemprature: 0.2\n").unwrap_err();
        assert!(matches!(err, ConfigError::Schema(_)));
    }

    #[test]
    fn test_unknown_provider_rejected() {
        let err = PipelineConfig::from_yaml_str("provider: ollama\n").unwrap_err();
        assert!(matches!(err, ConfigError::Schema(_)));
    }

    #[test]
    fn test_schema_collects_every_error() {
        let value = serde_json::json!({ "concurrency": 0, "timeout": "soon" });
        match validate_config_schema(&value) {
            Err(ConfigError::Schema(errors)) => assert_eq!(errors.len(), 2),
            other => panic!("expected schema errors, got {:?}", other),
        }
    }

    #[test]
    fn test_bad_duration_unit_is_invalid_value() {
        // Matches the schema pattern but is not a humantime unit
        let err = PipelineConfig::from_yaml_str("timeout: 10 parsecs\n").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn test_model_falls_back_to_provider_default() {
        let config = PipelineConfig::default();
        assert_eq!(config.completion_config("gpt-5-mini").model, "gpt-5-mini");
    }

    #[test]
    fn test_provider_config() {
        let config = PipelineConfig {
            base_url: Some("https://proxy.local/v1".to_string()),
            ..PipelineConfig::default()
        };
        let json = config.provider_config(Some("sk-test"));
        assert_eq!(json["api_key"], "sk-test");
        assert_eq!(json["base_url"], "https://proxy.local/v1");

        assert!(PipelineConfig::default()
            .provider_config(None)
            .get("api_key")
            .is_none());
    }

    #[test]
    fn test_from_path_reports_missing_file() {
        let err = PipelineConfig::from_path("/nonexistent/trialscan.yaml").unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }

    #[test]
    fn test_from_path_reads_yaml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("trialscan.yaml");
        std::fs::write(&path, "concurrency: 8\n").unwrap();

        assert_eq!(PipelineConfig::from_path(&path).unwrap().concurrency, 8);
    }
}
