//! Batch pipeline: extract, validate, route.
//!
//! Documents are extracted concurrently up to the configured bound and
//! reported in input order. A failure on one document is recorded in the
//! report and never stops the batch.

use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use trialscan_core::{Validator, Violation};

use crate::config::PipelineConfig;
use crate::extractor::Extractor;
use crate::providers::LlmProvider;
use crate::resilience::{LlmUsage, UsageTracker};
use crate::sink::{OutputSink, SinkError};

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("output directory unavailable: {0}")]
    Output(#[from] SinkError),
}

/// What happened to one document.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Outcome {
    Valid {
        path: PathBuf,
    },
    Invalid {
        path: PathBuf,
        violations: Vec<Violation>,
    },
    /// Nothing was written.
    Failed {
        error: String,
    },
}

#[derive(Debug, Clone, Serialize)]
pub struct DocumentOutcome {
    pub source: PathBuf,
    #[serde(flatten)]
    pub outcome: Outcome,
    pub cached: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BatchSummary {
    pub total: usize,
    pub valid: usize,
    pub invalid: usize,
    pub failed: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct BatchReport {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub provider: String,
    pub model: String,
    pub summary: BatchSummary,
    pub documents: Vec<DocumentOutcome>,
    pub usage: LlmUsage,
}

impl BatchReport {
    /// True when every document produced a valid record.
    pub fn all_valid(&self) -> bool {
        self.summary.valid == self.summary.total
    }
}

fn summarize(documents: &[DocumentOutcome]) -> BatchSummary {
    documents
        .iter()
        .fold(BatchSummary::default(), |mut summary, doc| {
            summary.total += 1;
            match doc.outcome {
                Outcome::Valid { .. } => summary.valid += 1,
                Outcome::Invalid { .. } => summary.invalid += 1,
                Outcome::Failed { .. } => summary.failed += 1,
            }
            summary
        })
}

pub struct Pipeline {
    extractor: Extractor,
    validator: Validator,
    sink: OutputSink,
    concurrency: usize,
}

impl Pipeline {
    pub fn new(extractor: Extractor, sink: OutputSink) -> Self {
        Self {
            extractor,
            validator: Validator::new(),
            sink,
            concurrency: 4,
        }
    }

    /// Build the full stack from config. `default_model` applies when the
    /// config names no model.
    pub fn from_config(
        provider: Arc<dyn LlmProvider>,
        config: &PipelineConfig,
        default_model: &str,
    ) -> Self {
        let usage = match config.budget.max_total_tokens {
            Some(max) => UsageTracker::with_budget(max),
            None => UsageTracker::unbounded(),
        };

        let extractor = Extractor::new(provider, config.completion_config(default_model))
            .with_retry(config.retry.clone())
            .with_usage_tracker(Arc::new(usage));

        Self::new(extractor, OutputSink::from_config(&config.output))
            .with_concurrency(config.concurrency)
    }

    pub fn with_validator(mut self, validator: Validator) -> Self {
        self.validator = validator;
        self
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    pub fn sink(&self) -> &OutputSink {
        &self.sink
    }

    /// Process every source, in order.
    pub async fn run(&self, sources: &[PathBuf]) -> Result<BatchReport, PipelineError> {
        let started_at = Utc::now();
        self.sink.ensure_dirs().await?;

        tracing::info!(
            documents = sources.len(),
            concurrency = self.concurrency,
            provider = self.extractor.provider_name(),
            model = self.extractor.model(),
            "starting batch"
        );

        let documents: Vec<DocumentOutcome> = stream::iter(sources)
            .map(|source| self.process(source))
            .buffered(self.concurrency)
            .collect()
            .await;

        let summary = summarize(&documents);
        tracing::info!(
            total = summary.total,
            valid = summary.valid,
            invalid = summary.invalid,
            failed = summary.failed,
            "batch finished"
        );

        Ok(BatchReport {
            started_at,
            finished_at: Utc::now(),
            provider: self.extractor.provider_name().to_string(),
            model: self.extractor.model().to_string(),
            summary,
            documents,
            usage: self.extractor.usage().snapshot(),
        })
    }

    /// Extract, validate, and persist one document.
    pub async fn process(&self, source: &Path) -> DocumentOutcome {
        let (outcome, cached) = match self.extractor.extract_path(source).await {
            Ok(extraction) => (self.route(source, &extraction.record).await, extraction.cached),
            Err(e) => (self.failed(source, e.to_string()), false),
        };

        DocumentOutcome {
            source: source.to_path_buf(),
            outcome,
            cached,
        }
    }

    async fn route(&self, source: &Path, record: &serde_json::Value) -> Outcome {
        let verdict = match self.validator.validate_json(record) {
            Ok(verdict) => verdict,
            Err(e) => return self.failed(source, e.to_string()),
        };

        let path = match self.sink.persist(source, record, &verdict).await {
            Ok(path) => path,
            Err(e) => return self.failed(source, e.to_string()),
        };

        if verdict.is_valid() {
            tracing::info!(file = %source.display(), path = %path.display(), "saved valid record");
            Outcome::Valid { path }
        } else {
            tracing::info!(
                file = %source.display(),
                path = %path.display(),
                violations = ?verdict.rule_ids(),
                "saved invalid record"
            );
            Outcome::Invalid {
                path,
                violations: verdict.into_violations(),
            }
        }
    }

    fn failed(&self, source: &Path, error: String) -> Outcome {
        tracing::warn!(file = %source.display(), error = %error, "extraction failed");
        Outcome::Failed { error }
    }
}
