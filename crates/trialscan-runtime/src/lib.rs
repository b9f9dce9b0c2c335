//! # trialscan-runtime
//!
//! Extraction and routing around the deterministic validator in
//! `trialscan-core`.
//!
//! ## Important
//!
//! This crate is where model calls happen. `trialscan-core` never performs
//! I/O; records produced here are classified there and then written to the
//! valid or invalid output directory exactly as the model returned them.
//!
//! ## Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use trialscan_runtime::{Pipeline, PipelineConfig, ProviderRegistry};
//!
//! let config = PipelineConfig::default();
//! let registry = ProviderRegistry::with_defaults();
//! let provider = registry.create("openai", &config.provider_config(Some(&key)))?;
//!
//! let pipeline = Pipeline::from_config(provider, &config, "gpt-5-mini");
//! let report = pipeline.run(&pdfs).await?;
//! println!("{} valid of {}", report.summary.valid, report.summary.total);
//! ```

pub mod cache;
pub mod config;
pub mod document;
pub mod extractor;
pub mod pipeline;
pub mod prompts;
pub mod providers;
pub mod resilience;
pub mod sink;

pub use cache::{CacheKey, ExtractionCache};
pub use config::{BudgetConfig, ConfigError, OutputConfig, PipelineConfig};
pub use document::PdfDocument;
pub use extractor::{parse_model_output, ExtractError, Extraction, Extractor};
pub use pipeline::{BatchReport, BatchSummary, DocumentOutcome, Outcome, Pipeline, PipelineError};
pub use providers::{
    ApiCredential, ChatMessage, CompletionConfig, CompletionResponse, CredentialSource,
    LlmProvider, MessagePart, ProviderError, ProviderFactory, ProviderRegistry, TokenUsage,
    DEFAULT_MODEL,
};
pub use resilience::{LlmUsage, RetryPolicy, TokenBudget, UsageTracker};
pub use sink::{OutputSink, SinkError};
