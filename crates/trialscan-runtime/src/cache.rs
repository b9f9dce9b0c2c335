//! In-process cache of extraction results.
//!
//! Keyed by document content and model, so a PDF that appears twice in a
//! batch (or under two names) costs one provider call.

use moka::future::Cache;
use serde_json::Value as JsonValue;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use crate::document::PdfDocument;

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct CacheKey {
    document_hash: u64,
    document_len: usize,
    model: String,
}

impl CacheKey {
    pub fn new(document: &PdfDocument, model: &str) -> Self {
        Self {
            document_hash: document.content_hash(),
            document_len: document.len(),
            model: model.to_string(),
        }
    }
}

/// Parsed model output per document.
pub struct ExtractionCache {
    cache: Cache<CacheKey, JsonValue>,
}

impl ExtractionCache {
    pub fn new(max_entries: u64, ttl: Duration) -> Self {
        let cache = Cache::builder()
            .max_capacity(max_entries)
            .time_to_live(ttl)
            .build();

        Self { cache }
    }

    /// Return the cached value or run `init`, sharing one in-flight `init`
    /// among concurrent callers. Errors are not cached.
    pub async fn try_get_with<F, E>(&self, key: CacheKey, init: F) -> Result<JsonValue, Arc<E>>
    where
        F: Future<Output = Result<JsonValue, E>>,
        E: Send + Sync + 'static,
    {
        self.cache.try_get_with(key, init).await
    }
}

impl Default for ExtractionCache {
    fn default() -> Self {
        Self::new(1_000, Duration::from_secs(3600))
    }
}
