//! # trialscan-core
//!
//! Deterministic validation engine for study records extracted from
//! biomedical PDFs by a language model.
//!
//! This crate answers one question per record: can this extraction be
//! accepted as-is, and if not, which rules does it break?
//!
//! ## Key Guarantees
//!
//! 1. **Deterministic**: Same record always produces the same verdict
//! 2. **No LLM calls, no I/O**: Validation is a pure function
//! 3. **Exhaustive**: Every violated rule is reported, nothing short-circuits
//! 4. **Parallel-safe**: `Validator` holds only an immutable rule table
//!
//! ## Example
//!
//! ```rust
//! use trialscan_core::validate_json;
//!
//! let record = serde_json::json!({
//!     "title": "X",
//!     "study_design": "RCT",
//!     "population": "adults",
//!     "sample_size": 0,
//!     "outcome": "mortality",
//!     "effect_size": {"point": 0.8, "ci_lower": 0.6, "ci_upper": 1.0}
//! });
//!
//! let verdict = validate_json(&record).unwrap();
//! assert!(!verdict.is_valid());
//! assert_eq!(verdict.rule_ids(), vec!["invalid_sample_size"]);
//! ```

pub mod record;
pub mod rules;
pub mod validator;
pub mod value;
pub mod verdict;

// Re-export main types at crate root
pub use record::{Record, RecordError};
pub use rules::{rule_table, Expected, FieldRef, Member, Phase, Rule, REQUIRED_FIELDS, RULE_TABLE};
pub use validator::{validate, validate_json, Validator};
pub use value::{FieldValue, ValueKind};
pub use verdict::{Verdict, Violation};
