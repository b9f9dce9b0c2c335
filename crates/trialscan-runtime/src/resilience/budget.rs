//! Token budget and usage accounting for a batch of extractions.

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};

use crate::providers::TokenUsage;

/// Upper bound on tokens spent by one batch.
pub struct TokenBudget {
    pub max_tokens: u64,
    used: AtomicU64,
}

impl TokenBudget {
    pub fn new(max_tokens: u64) -> Self {
        Self {
            max_tokens,
            used: AtomicU64::new(0),
        }
    }

    /// True while some budget is left.
    pub fn has_remaining(&self) -> bool {
        self.remaining() > 0
    }

    pub fn record(&self, tokens: u64) {
        self.used.fetch_add(tokens, Ordering::SeqCst);
    }

    pub fn remaining(&self) -> u64 {
        self.max_tokens.saturating_sub(self.used())
    }

    pub fn used(&self) -> u64 {
        self.used.load(Ordering::SeqCst)
    }
}

/// Accumulated provider usage.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LlmUsage {
    pub total_tokens: u64,
    pub prompt_tokens: u64,
    pub completion_tokens: u64,

    /// Provider calls that returned a response
    pub llm_calls: u32,

    /// Estimated cost in USD
    pub estimated_cost: f64,

    pub cache_creation_tokens: u64,
    pub cache_read_tokens: u64,
}

impl LlmUsage {
    pub fn add(&mut self, usage: &TokenUsage, model: &str) {
        self.prompt_tokens += u64::from(usage.prompt_tokens);
        self.completion_tokens += u64::from(usage.completion_tokens);
        self.total_tokens += u64::from(usage.total());
        self.llm_calls += 1;
        self.cache_creation_tokens += u64::from(usage.cache_creation_tokens);
        self.cache_read_tokens += u64::from(usage.cache_read_tokens);
        self.estimated_cost += Self::estimate_cost(usage, model);
    }

    fn estimate_cost(usage: &TokenUsage, model: &str) -> f64 {
        // USD per million tokens: input, output, cache write, cache read
        let (input_rate, output_rate, cache_write_rate, cache_read_rate) = match model {
            m if m.contains("gpt-5-mini") => (0.25, 2.0, 0.0, 0.025),
            m if m.contains("gpt-5-nano") => (0.05, 0.4, 0.0, 0.005),
            m if m.contains("gpt-5") => (1.25, 10.0, 0.0, 0.125),
            m if m.contains("sonnet-4-5") => (3.0, 15.0, 3.75, 0.3),
            m if m.contains("haiku-4-5") => (1.0, 5.0, 1.25, 0.1),
            _ => (0.25, 2.0, 0.0, 0.025),
        };

        let uncached_prompt = usage.prompt_tokens.saturating_sub(usage.cache_read_tokens);

        let per_million = |tokens: u32, rate: f64| tokens as f64 / 1_000_000.0 * rate;
        per_million(uncached_prompt, input_rate)
            + per_million(usage.completion_tokens, output_rate)
            + per_million(usage.cache_creation_tokens, cache_write_rate)
            + per_million(usage.cache_read_tokens, cache_read_rate)
    }
}

/// Shared usage across concurrent extractions, with an optional budget.
pub struct UsageTracker {
    budget: Option<TokenBudget>,
    usage: RwLock<LlmUsage>,
}

impl UsageTracker {
    pub fn unbounded() -> Self {
        Self {
            budget: None,
            usage: RwLock::new(LlmUsage::default()),
        }
    }

    pub fn with_budget(max_total_tokens: u64) -> Self {
        Self {
            budget: Some(TokenBudget::new(max_total_tokens)),
            usage: RwLock::new(LlmUsage::default()),
        }
    }

    /// `Err((used, max))` once the budget is spent.
    pub fn check(&self) -> Result<(), (u64, u64)> {
        match &self.budget {
            Some(budget) if !budget.has_remaining() => Err((budget.used(), budget.max_tokens)),
            _ => Ok(()),
        }
    }

    pub fn record(&self, usage: &TokenUsage, model: &str) {
        if let Some(budget) = &self.budget {
            budget.record(u64::from(usage.total()));
        }
        self.usage.write().add(usage, model);
    }

    pub fn snapshot(&self) -> LlmUsage {
        self.usage.read().clone()
    }
}

impl Default for UsageTracker {
    fn default() -> Self {
        Self::unbounded()
    }
}
