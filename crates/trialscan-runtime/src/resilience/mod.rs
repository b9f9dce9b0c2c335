//! Resilience patterns for trialscan-runtime.
//!
//! - Retry with exponential backoff for transient provider errors
//! - Token budget and usage accounting across a batch

mod budget;
mod retry;

pub use budget::{LlmUsage, TokenBudget, UsageTracker};
pub use retry::RetryPolicy;
