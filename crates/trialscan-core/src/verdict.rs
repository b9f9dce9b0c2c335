//! Verdicts: the validator's output.

use serde::Serialize;
use std::fmt;

/// A named rule failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Violation {
    /// Stable rule identifier (e.g. `missing_field:sample_size`)
    pub rule_id: String,

    /// Human-readable explanation
    pub reason: String,
}

impl Violation {
    pub fn new(rule_id: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            rule_id: rule_id.into(),
            reason: reason.into(),
        }
    }
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.rule_id, self.reason)
    }
}

/// Accept/reject decision for one record.
///
/// A verdict is valid exactly when it carries no violations. The only way
/// to build one is from the full violation list, so the two cannot drift.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Verdict {
    is_valid: bool,
    violations: Vec<Violation>,
}

impl Verdict {
    pub fn from_violations(violations: Vec<Violation>) -> Self {
        Self {
            is_valid: violations.is_empty(),
            violations,
        }
    }

    pub fn is_valid(&self) -> bool {
        self.is_valid
    }

    /// Violations in evaluation order.
    pub fn violations(&self) -> &[Violation] {
        &self.violations
    }

    pub fn rule_ids(&self) -> Vec<&str> {
        self.violations.iter().map(|v| v.rule_id.as_str()).collect()
    }

    pub fn has_violation(&self, rule_id: &str) -> bool {
        self.violations.iter().any(|v| v.rule_id == rule_id)
    }

    pub fn into_violations(self) -> Vec<Violation> {
        self.violations
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_valid {
            write!(f, "valid")
        } else {
            write!(f, "invalid ({})", self.rule_ids().join(", "))
        }
    }
}
