//! The validation engine.
//!
//! Runs a rule table over one record and collects every failure. Checks
//! never short-circuit: a record with several problems reports all of them.
//!
//! Phases run in a fixed order (presence, type, numeric). A field flagged
//! missing is not type-checked, and numeric checks whose inputs are absent
//! or mistyped are skipped silently.

use serde_json::Value as JsonValue;
use std::borrow::Cow;
use std::collections::BTreeSet;

use crate::record::{Record, RecordError};
use crate::rules::{Phase, Rule, RULE_TABLE};
use crate::verdict::{Verdict, Violation};

/// Validation engine over an immutable rule table.
#[derive(Debug, Clone)]
pub struct Validator {
    rules: Cow<'static, [Rule]>,
}

impl Validator {
    /// Validator over the default [`RULE_TABLE`].
    pub fn new() -> Self {
        Self {
            rules: Cow::Borrowed(RULE_TABLE),
        }
    }

    /// Validator over a custom rule table.
    pub fn with_rules(rules: impl Into<Cow<'static, [Rule]>>) -> Self {
        Self {
            rules: rules.into(),
        }
    }

    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    /// Evaluate one record.
    pub fn validate(&self, record: &Record) -> Verdict {
        let mut missing = BTreeSet::new();
        let mut violations = Vec::new();

        for phase in Phase::ALL {
            for rule in self.rules.iter().filter(|r| r.phase() == phase) {
                if let Some(violation) = check(rule, record, &mut missing) {
                    tracing::trace!(rule = %violation.rule_id, "rule violated");
                    violations.push(violation);
                }
            }
        }

        Verdict::from_violations(violations)
    }

    /// Evaluate a raw JSON value.
    ///
    /// Fails only when `value` is not a JSON object.
    pub fn validate_json(&self, value: &JsonValue) -> Result<Verdict, RecordError> {
        let record = Record::from_json(value)?;
        Ok(self.validate(&record))
    }
}

impl Default for Validator {
    fn default() -> Self {
        Self::new()
    }
}

/// Apply a single rule. `missing` accumulates fields flagged in the
/// presence phase so later phases can skip them.
fn check(
    rule: &Rule,
    record: &Record,
    missing: &mut BTreeSet<&'static str>,
) -> Option<Violation> {
    match rule {
        Rule::Required { field } => {
            if !record.get(field).is_empty_equivalent() {
                return None;
            }
            missing.insert(*field);
            Some(Violation::new(
                rule.name(),
                format!("required field '{}' is missing or empty", field),
            ))
        }

        Rule::TypeOf { field, expected } => {
            if missing.contains(field.root()) {
                return None;
            }
            let value = field.resolve(record);
            if value.is_absent() || expected.accepts(value.kind()) {
                return None;
            }
            Some(Violation::new(
                rule.name(),
                format!(
                    "'{}' must be {}, found {}",
                    field,
                    expected.describe(),
                    value.kind()
                ),
            ))
        }

        Rule::PositiveInteger { field } => {
            let n = field.resolve(record).as_integer()?;
            if n > 0 {
                return None;
            }
            Some(Violation::new(
                rule.name(),
                format!("'{}' must be greater than 0, found {}", field, n),
            ))
        }

        Rule::CiOrdered { lower, upper } => {
            let lo = lower.resolve(record).as_number()?;
            let hi = upper.resolve(record).as_number()?;
            if lo <= hi {
                return None;
            }
            Some(Violation::new(
                rule.name(),
                format!("CI lower bound {} exceeds upper bound {}", lo, hi),
            ))
        }

        Rule::EstimateWithinCi {
            estimate,
            lower,
            upper,
        } => {
            let point = estimate.resolve(record).as_number()?;
            let lo = lower.resolve(record).as_number()?;
            let hi = upper.resolve(record).as_number()?;
            // Inverted bounds are reported by CiOrdered; containment is
            // undefined for them.
            if lo > hi || (lo..=hi).contains(&point) {
                return None;
            }
            Some(Violation::new(
                rule.name(),
                format!("point estimate {} lies outside CI [{}, {}]", point, lo, hi),
            ))
        }
    }
}

/// Validate a record against the default rule table.
pub fn validate(record: &Record) -> Verdict {
    Validator::new().validate(record)
}

/// Validate a raw JSON value against the default rule table.
pub fn validate_json(value: &JsonValue) -> Result<Verdict, RecordError> {
    Validator::new().validate_json(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::{Expected, FieldRef, SAMPLE_SIZE};
    use serde_json::{json, Value};

    fn scenario_a() -> Value {
        json!({
            "title": "X",
            "study_design": "RCT",
            "population": "adults",
            "sample_size": 120,
            "outcome": "mortality",
            "effect_size": {"point": 0.8, "ci_lower": 0.6, "ci_upper": 1.0}
        })
    }

    fn verdict_for(value: &Value) -> Verdict {
        validate_json(value).unwrap()
    }

    #[test]
    fn test_fully_valid_record() {
        let verdict = verdict_for(&scenario_a());
        assert!(verdict.is_valid());
        assert!(verdict.violations().is_empty());
    }

    #[test]
    fn test_non_positive_sample_size() {
        let mut record = scenario_a();
        record["sample_size"] = json!(0);
        let verdict = verdict_for(&record);
        assert_eq!(verdict.rule_ids(), vec!["invalid_sample_size"]);
        assert!(!verdict.is_valid());

        record["sample_size"] = json!(-5);
        assert_eq!(verdict_for(&record).rule_ids(), vec!["invalid_sample_size"]);
    }

    #[test]
    fn test_inverted_ci() {
        let mut record = scenario_a();
        record["effect_size"]["ci_lower"] = json!(1.2);
        record["effect_size"]["ci_upper"] = json!(0.9);
        let verdict = verdict_for(&record);
        assert_eq!(verdict.rule_ids(), vec!["ci_bounds_inverted"]);
    }

    #[test]
    fn test_effect_outside_ci() {
        let mut record = scenario_a();
        record["effect_size"]["point"] = json!(1.5);
        let verdict = verdict_for(&record);
        assert_eq!(verdict.rule_ids(), vec!["effect_outside_ci"]);
    }

    #[test]
    fn test_ci_bounds_are_inclusive() {
        let mut record = scenario_a();
        record["effect_size"]["point"] = json!(1.0);
        assert!(verdict_for(&record).is_valid());
        record["effect_size"]["point"] = json!(0.6);
        assert!(verdict_for(&record).is_valid());
    }

    #[test]
    fn test_only_title_present() {
        let verdict = verdict_for(&json!({"title": "X"}));
        assert!(!verdict.is_valid());
        assert_eq!(
            verdict.rule_ids(),
            vec![
                "missing_field:study_design",
                "missing_field:population",
                "missing_field:sample_size",
                "missing_field:outcome",
                "missing_field:effect_size",
            ]
        );
    }

    #[test]
    fn test_missing_sample_size_is_not_type_checked() {
        let mut record = scenario_a();
        record.as_object_mut().unwrap().remove("sample_size");
        let verdict = verdict_for(&record);
        assert_eq!(verdict.rule_ids(), vec!["missing_field:sample_size"]);

        record["sample_size"] = json!(null);
        assert_eq!(verdict_for(&record).rule_ids(), vec!["missing_field:sample_size"]);
    }

    #[test]
    fn test_string_sample_size_is_type_mismatch() {
        let mut record = scenario_a();
        record["sample_size"] = json!("120");
        let verdict = verdict_for(&record);
        assert_eq!(verdict.rule_ids(), vec!["type_mismatch:sample_size"]);
        assert!(verdict.violations()[0].reason.contains("found string"));
    }

    #[test]
    fn test_float_sample_size_skips_range_check() {
        let mut record = scenario_a();
        record["sample_size"] = json!(-3.0);
        assert_eq!(
            verdict_for(&record).rule_ids(),
            vec!["type_mismatch:sample_size"]
        );
    }

    #[test]
    fn test_blank_string_counts_as_missing() {
        let mut record = scenario_a();
        record["population"] = json!("  ");
        assert_eq!(
            verdict_for(&record).rule_ids(),
            vec!["missing_field:population"]
        );
    }

    #[test]
    fn test_effect_size_must_be_object() {
        let mut record = scenario_a();
        record["effect_size"] = json!(0.8);
        assert_eq!(
            verdict_for(&record).rule_ids(),
            vec!["type_mismatch:effect_size"]
        );
    }

    #[test]
    fn test_non_numeric_bounds() {
        let mut record = scenario_a();
        record["effect_size"]["ci_lower"] = json!("0.6");
        let verdict = verdict_for(&record);
        assert_eq!(verdict.rule_ids(), vec!["type_mismatch:effect_size.ci_lower"]);
    }

    #[test]
    fn test_partial_ci_is_permissive() {
        let mut record = scenario_a();
        record["effect_size"] = json!({"point": 5.0, "ci_lower": 0.6});
        assert!(verdict_for(&record).is_valid());

        record["effect_size"] = json!({"point": 0.8, "ci_upper": null});
        assert!(verdict_for(&record).is_valid());
    }

    #[test]
    fn test_legacy_effect_keys() {
        let mut record = scenario_a();
        record["effect_size"] = json!({
            "type": "hazard ratio",
            "value": 1.5,
            "lower_ci": 0.6,
            "upper_ci": 1.0
        });
        assert_eq!(verdict_for(&record).rule_ids(), vec!["effect_outside_ci"]);
    }

    #[test]
    fn test_outcome_may_be_structured() {
        let mut record = scenario_a();
        record["outcome"] = json!({"primary": "mortality", "timepoint": "12 months"});
        assert!(verdict_for(&record).is_valid());

        record["outcome"] = json!(42);
        assert_eq!(verdict_for(&record).rule_ids(), vec!["type_mismatch:outcome"]);
    }

    #[test]
    fn test_violations_accumulate_across_phases() {
        let verdict = verdict_for(&json!({
            "title": 7,
            "study_design": "RCT",
            "population": "adults",
            "sample_size": 0,
            "effect_size": {"point": 2.0, "ci_lower": 1.2, "ci_upper": 0.9}
        }));
        assert_eq!(
            verdict.rule_ids(),
            vec![
                "missing_field:outcome",
                "type_mismatch:title",
                "invalid_sample_size",
                "ci_bounds_inverted",
            ]
        );
    }

    #[test]
    fn test_extra_fields_are_ignored() {
        let mut record = scenario_a();
        record["journal"] = json!({"name": "NEJM"});
        record["authors"] = json!(["A", "B"]);
        assert!(verdict_for(&record).is_valid());
    }

    #[test]
    fn test_structural_faults_are_errors() {
        assert!(validate_json(&json!(null)).is_err());
        assert!(validate_json(&json!(12)).is_err());
        assert!(validate_json(&json!("title")).is_err());
        assert!(validate_json(&json!([scenario_a()])).is_err());
    }

    #[test]
    fn test_validation_is_idempotent() {
        let record = Record::from_json(&json!({"title": "X", "sample_size": "n/a"})).unwrap();
        let validator = Validator::new();
        assert_eq!(validator.validate(&record), validator.validate(&record));
    }

    #[test]
    fn test_custom_rule_table() {
        let validator = Validator::with_rules(vec![
            Rule::Required { field: SAMPLE_SIZE },
            Rule::TypeOf {
                field: FieldRef::Field(SAMPLE_SIZE),
                expected: Expected::Integer,
            },
        ]);
        let record = Record::new().with(SAMPLE_SIZE, "many");
        assert_eq!(
            validator.validate(&record).rule_ids(),
            vec!["type_mismatch:sample_size"]
        );
        assert_eq!(validator.rules().len(), 2);
    }

    #[test]
    fn test_phase_order_holds_for_unordered_tables() {
        let validator = Validator::with_rules(vec![
            Rule::TypeOf {
                field: FieldRef::Field("title"),
                expected: Expected::String,
            },
            Rule::Required { field: SAMPLE_SIZE },
        ]);
        let record = Record::new().with("title", 3i64);
        assert_eq!(
            validator.validate(&record).rule_ids(),
            vec!["missing_field:sample_size", "type_mismatch:title"]
        );
    }
}
