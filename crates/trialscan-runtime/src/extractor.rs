//! PDF → JSON record extraction.
//!
//! One provider call per distinct document: the prompt and the PDF go out
//! together, the reply text is parsed into a single JSON value. The value is
//! returned untouched; classification is the validator's job.

use lazy_static::lazy_static;
use parking_lot::Mutex;
use regex::Regex;
use serde_json::Value as JsonValue;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use thiserror::Error;

use crate::cache::{CacheKey, ExtractionCache};
use crate::document::PdfDocument;
use crate::prompts::extraction_messages;
use crate::providers::{CompletionConfig, LlmProvider, ProviderError};
use crate::resilience::{RetryPolicy, UsageTracker};

lazy_static! {
    /// A reply wrapped in a Markdown code fence, optionally tagged `json`.
    static ref CODE_FENCE: Regex =
        Regex::new(r"(?s)^\s*```[A-Za-z]*\s*\n?(.*?)\s*```\s*$").unwrap();
}

#[derive(Error, Debug)]
pub enum ExtractError {
    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("provider call failed: {0}")]
    Provider(#[from] ProviderError),

    #[error("model output is not valid JSON: {0}")]
    InvalidJson(#[source] serde_json::Error),

    #[error("model returned no output text")]
    EmptyOutput,

    #[error("token budget exhausted: {used} of {max} tokens used")]
    BudgetExceeded { used: u64, max: u64 },

    /// Failure of another caller's in-flight extraction of the same document.
    #[error("{0}")]
    Shared(String),
}

/// Parsed model output for one document.
#[derive(Debug, Clone)]
pub struct Extraction {
    pub record: JsonValue,
    pub model: String,
    /// True when the value came from the cache and no call was made.
    pub cached: bool,
}

pub struct Extractor {
    provider: Arc<dyn LlmProvider>,
    config: CompletionConfig,
    retry: RetryPolicy,
    usage: Arc<UsageTracker>,
    cache: ExtractionCache,
}

impl Extractor {
    pub fn new(provider: Arc<dyn LlmProvider>, config: CompletionConfig) -> Self {
        Self {
            provider,
            config,
            retry: RetryPolicy::default(),
            usage: Arc::new(UsageTracker::unbounded()),
            cache: ExtractionCache::default(),
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_usage_tracker(mut self, usage: Arc<UsageTracker>) -> Self {
        self.usage = usage;
        self
    }

    pub fn usage(&self) -> &UsageTracker {
        &self.usage
    }

    pub fn provider_name(&self) -> &str {
        self.provider.name()
    }

    pub fn model(&self) -> &str {
        &self.config.model
    }

    /// Read a PDF from disk and extract it.
    pub async fn extract_path(&self, path: &Path) -> Result<Extraction, ExtractError> {
        let document = PdfDocument::from_path(path)
            .await
            .map_err(|source| ExtractError::Io {
                path: path.to_path_buf(),
                source,
            })?;
        self.extract(&document).await
    }

    /// Extract one document.
    ///
    /// Concurrent calls for identical bytes share a single provider call.
    pub async fn extract(&self, document: &PdfDocument) -> Result<Extraction, ExtractError> {
        if !document.looks_like_pdf() {
            tracing::debug!(file = %document.filename(), "payload lacks a PDF header");
        }

        let key = CacheKey::new(document, &self.config.model);
        let called = AtomicBool::new(false);
        let own_error: Mutex<Option<ExtractError>> = Mutex::new(None);

        let record = self
            .cache
            .try_get_with(key, async {
                called.store(true, Ordering::SeqCst);
                self.call_provider(document).await.map_err(|err| {
                    let message = err.to_string();
                    *own_error.lock() = Some(err);
                    message
                })
            })
            .await
            .map_err(|shared| {
                own_error
                    .lock()
                    .take()
                    .unwrap_or_else(|| ExtractError::Shared(shared.to_string()))
            })?;

        let cached = !called.load(Ordering::SeqCst);
        if cached {
            tracing::debug!(file = %document.filename(), "extraction served from cache");
        }

        Ok(Extraction {
            record,
            model: self.config.model.clone(),
            cached,
        })
    }

    async fn call_provider(&self, document: &PdfDocument) -> Result<JsonValue, ExtractError> {
        if let Err((used, max)) = self.usage.check() {
            return Err(ExtractError::BudgetExceeded { used, max });
        }

        tracing::debug!(
            file = %document.filename(),
            bytes = document.len(),
            provider = self.provider.name(),
            model = %self.config.model,
            "requesting extraction"
        );

        let response = self
            .retry
            .run(document.filename(), || {
                self.provider
                    .complete(extraction_messages(document), &self.config)
            })
            .await?;

        self.usage.record(&response.usage, &response.model);
        tracing::debug!(
            file = %document.filename(),
            tokens = response.usage.total(),
            "extraction response received"
        );

        parse_model_output(&response.content)
    }
}

/// Parse model reply text into one JSON value.
///
/// Accepts bare JSON, JSON inside a Markdown code fence, or JSON with
/// surrounding prose (the outermost `{...}` span is used).
pub fn parse_model_output(text: &str) -> Result<JsonValue, ExtractError> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Err(ExtractError::EmptyOutput);
    }

    let body = CODE_FENCE
        .captures(trimmed)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().trim())
        .unwrap_or(trimmed);

    match serde_json::from_str::<JsonValue>(body) {
        Ok(value) => Ok(value),
        Err(err) => match (body.find('{'), body.rfind('}')) {
            (Some(start), Some(end)) if start < end => {
                serde_json::from_str(&body[start..=end]).map_err(ExtractError::InvalidJson)
            }
            _ => Err(ExtractError::InvalidJson(err)),
        },
    }
}
