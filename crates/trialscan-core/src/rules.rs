//! The rule table.
//!
//! Every check the validator runs is declared here as data: which fields
//! are required, what type each field must have, and which numeric
//! relations must hold. The table carries no evaluation logic; see
//! [`crate::validator`] for that.

use std::fmt;

use crate::record::{Record, ABSENT};
use crate::value::{FieldValue, ValueKind};

pub const TITLE: &str = "title";
pub const STUDY_DESIGN: &str = "study_design";
pub const POPULATION: &str = "population";
pub const SAMPLE_SIZE: &str = "sample_size";
pub const OUTCOME: &str = "outcome";
pub const EFFECT_SIZE: &str = "effect_size";

/// Top-level fields every record must carry, in reporting order.
pub const REQUIRED_FIELDS: [&str; 6] = [
    TITLE,
    STUDY_DESIGN,
    POPULATION,
    SAMPLE_SIZE,
    OUTCOME,
    EFFECT_SIZE,
];

pub const MISSING_FIELD: &str = "missing_field";
pub const TYPE_MISMATCH: &str = "type_mismatch";
pub const CI_BOUNDS_INVERTED: &str = "ci_bounds_inverted";
pub const EFFECT_OUTSIDE_CI: &str = "effect_outside_ci";

/// A member of a nested object, readable under several keys.
///
/// The first key holding a non-null value wins.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Member {
    pub name: &'static str,
    pub keys: &'static [&'static str],
}

pub const POINT_ESTIMATE: Member = Member {
    name: "point",
    keys: &["point", "value"],
};

pub const CI_LOWER: Member = Member {
    name: "ci_lower",
    keys: &["ci_lower", "lower_ci"],
};

pub const CI_UPPER: Member = Member {
    name: "ci_upper",
    keys: &["ci_upper", "upper_ci"],
};

/// Kind of effect measure (e.g. "hazard ratio").
pub const EFFECT_MEASURE: Member = Member {
    name: "type",
    keys: &["type"],
};

/// Reference to a value inside a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldRef {
    Field(&'static str),
    Member {
        parent: &'static str,
        member: Member,
    },
}

impl FieldRef {
    pub const fn effect(member: Member) -> Self {
        FieldRef::Member {
            parent: EFFECT_SIZE,
            member,
        }
    }

    /// Top-level field this reference lives under.
    pub fn root(&self) -> &'static str {
        match self {
            FieldRef::Field(name) => name,
            FieldRef::Member { parent, .. } => parent,
        }
    }

    /// Dotted path used in rule names, e.g. `effect_size.ci_lower`.
    pub fn path(&self) -> String {
        match self {
            FieldRef::Field(name) => (*name).to_string(),
            FieldRef::Member { parent, member } => format!("{}.{}", parent, member.name),
        }
    }

    /// Read the referenced value. Anything unreachable reads as absent.
    pub fn resolve<'r>(&self, record: &'r Record) -> &'r FieldValue {
        match self {
            FieldRef::Field(name) => record.get(name),
            FieldRef::Member { parent, member } => record
                .get(parent)
                .as_object()
                .and_then(|map| {
                    member
                        .keys
                        .iter()
                        .filter_map(|key| map.get(*key))
                        .find(|value| !value.is_absent())
                })
                .unwrap_or(&ABSENT),
        }
    }
}

impl fmt::Display for FieldRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.path())
    }
}

/// Type a field must conform to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Expected {
    String,
    Integer,
    /// Integer or float
    Number,
    Object,
    /// Free text or a structured object
    StringOrObject,
}

impl Expected {
    pub fn accepts(&self, kind: ValueKind) -> bool {
        match self {
            Expected::String => kind == ValueKind::String,
            Expected::Integer => kind == ValueKind::Integer,
            Expected::Number => matches!(kind, ValueKind::Integer | ValueKind::Float),
            Expected::Object => kind == ValueKind::Object,
            Expected::StringOrObject => matches!(kind, ValueKind::String | ValueKind::Object),
        }
    }

    pub fn describe(&self) -> &'static str {
        match self {
            Expected::String => "a string",
            Expected::Integer => "an integer",
            Expected::Number => "a number",
            Expected::Object => "an object",
            Expected::StringOrObject => "a string or an object",
        }
    }
}

/// Evaluation phase. Phases run in declaration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Phase {
    Presence,
    Type,
    Numeric,
}

impl Phase {
    pub const ALL: [Phase; 3] = [Phase::Presence, Phase::Type, Phase::Numeric];
}

/// A single declarative check.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Rule {
    /// The top-level field must be present and non-empty.
    Required { field: &'static str },

    /// A present value must have the expected type.
    TypeOf { field: FieldRef, expected: Expected },

    /// An integer value must be greater than zero.
    PositiveInteger { field: FieldRef },

    /// Lower bound must not exceed upper bound.
    CiOrdered { lower: FieldRef, upper: FieldRef },

    /// Estimate must lie within `[lower, upper]`, inclusive.
    EstimateWithinCi {
        estimate: FieldRef,
        lower: FieldRef,
        upper: FieldRef,
    },
}

impl Rule {
    /// Stable rule identifier, as reported in violations.
    pub fn name(&self) -> String {
        match self {
            Rule::Required { field } => format!("{}:{}", MISSING_FIELD, field),
            Rule::TypeOf { field, .. } => format!("{}:{}", TYPE_MISMATCH, field.path()),
            Rule::PositiveInteger { field } => format!("invalid_{}", field.path()),
            Rule::CiOrdered { .. } => CI_BOUNDS_INVERTED.to_string(),
            Rule::EstimateWithinCi { .. } => EFFECT_OUTSIDE_CI.to_string(),
        }
    }

    pub fn phase(&self) -> Phase {
        match self {
            Rule::Required { .. } => Phase::Presence,
            Rule::TypeOf { .. } => Phase::Type,
            Rule::PositiveInteger { .. }
            | Rule::CiOrdered { .. }
            | Rule::EstimateWithinCi { .. } => Phase::Numeric,
        }
    }

    /// Human-readable statement of what the rule requires.
    pub fn describe(&self) -> String {
        match self {
            Rule::Required { field } => format!("'{}' must be present and non-empty", field),
            Rule::TypeOf { field, expected } => {
                format!("'{}' must be {} when present", field, expected.describe())
            }
            Rule::PositiveInteger { field } => format!("'{}' must be greater than 0", field),
            Rule::CiOrdered { lower, upper } => {
                format!("'{}' must not exceed '{}'", lower, upper)
            }
            Rule::EstimateWithinCi {
                estimate,
                lower,
                upper,
            } => format!("'{}' must lie within ['{}', '{}']", estimate, lower, upper),
        }
    }
}

/// The rule set applied to every extracted study record.
pub static RULE_TABLE: &[Rule] = &[
    Rule::Required { field: TITLE },
    Rule::Required { field: STUDY_DESIGN },
    Rule::Required { field: POPULATION },
    Rule::Required { field: SAMPLE_SIZE },
    Rule::Required { field: OUTCOME },
    Rule::Required { field: EFFECT_SIZE },
    Rule::TypeOf {
        field: FieldRef::Field(TITLE),
        expected: Expected::String,
    },
    Rule::TypeOf {
        field: FieldRef::Field(STUDY_DESIGN),
        expected: Expected::String,
    },
    Rule::TypeOf {
        field: FieldRef::Field(POPULATION),
        expected: Expected::String,
    },
    Rule::TypeOf {
        field: FieldRef::Field(SAMPLE_SIZE),
        expected: Expected::Integer,
    },
    Rule::TypeOf {
        field: FieldRef::Field(OUTCOME),
        expected: Expected::StringOrObject,
    },
    Rule::TypeOf {
        field: FieldRef::Field(EFFECT_SIZE),
        expected: Expected::Object,
    },
    Rule::TypeOf {
        field: FieldRef::effect(POINT_ESTIMATE),
        expected: Expected::Number,
    },
    Rule::TypeOf {
        field: FieldRef::effect(CI_LOWER),
        expected: Expected::Number,
    },
    Rule::TypeOf {
        field: FieldRef::effect(CI_UPPER),
        expected: Expected::Number,
    },
    Rule::TypeOf {
        field: FieldRef::effect(EFFECT_MEASURE),
        expected: Expected::String,
    },
    Rule::PositiveInteger {
        field: FieldRef::Field(SAMPLE_SIZE),
    },
    Rule::CiOrdered {
        lower: FieldRef::effect(CI_LOWER),
        upper: FieldRef::effect(CI_UPPER),
    },
    Rule::EstimateWithinCi {
        estimate: FieldRef::effect(POINT_ESTIMATE),
        lower: FieldRef::effect(CI_LOWER),
        upper: FieldRef::effect(CI_UPPER),
    },
];

/// The default rule table.
pub fn rule_table() -> &'static [Rule] {
    RULE_TABLE
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::HashSet;

    #[test]
    fn test_rule_names_are_unique() {
        let names: Vec<String> = RULE_TABLE.iter().map(Rule::name).collect();
        let unique: HashSet<&String> = names.iter().collect();
        assert_eq!(names.len(), unique.len());
    }

    #[test]
    fn test_every_required_field_has_a_presence_rule() {
        for field in REQUIRED_FIELDS {
            let name = format!("missing_field:{}", field);
            assert!(
                RULE_TABLE.iter().any(|r| r.name() == name),
                "no presence rule for {}",
                field
            );
        }
    }

    #[test]
    fn test_table_is_in_phase_order() {
        let phases: Vec<Phase> = RULE_TABLE.iter().map(Rule::phase).collect();
        let mut sorted = phases.clone();
        sorted.sort();
        assert_eq!(phases, sorted);
    }

    #[test]
    fn test_stable_names() {
        let names: Vec<String> = RULE_TABLE.iter().map(Rule::name).collect();
        for expected in [
            "missing_field:sample_size",
            "type_mismatch:sample_size",
            "type_mismatch:effect_size.ci_lower",
            "invalid_sample_size",
            "ci_bounds_inverted",
            "effect_outside_ci",
        ] {
            assert!(names.iter().any(|n| n == expected), "missing rule {}", expected);
        }
    }

    #[test]
    fn test_member_resolves_through_aliases() {
        let record = Record::from_json(&json!({
            "effect_size": {"value": 0.8, "lower_ci": 0.6, "ci_upper": 1.0}
        }))
        .unwrap();

        assert_eq!(
            FieldRef::effect(POINT_ESTIMATE).resolve(&record),
            &FieldValue::Float(0.8)
        );
        assert_eq!(
            FieldRef::effect(CI_LOWER).resolve(&record),
            &FieldValue::Float(0.6)
        );
        assert_eq!(
            FieldRef::effect(CI_UPPER).resolve(&record),
            &FieldValue::Float(1.0)
        );
    }

    #[test]
    fn test_null_alias_falls_through() {
        let record = Record::from_json(&json!({
            "effect_size": {"point": null, "value": 1.1}
        }))
        .unwrap();
        assert_eq!(
            FieldRef::effect(POINT_ESTIMATE).resolve(&record),
            &FieldValue::Float(1.1)
        );
    }

    #[test]
    fn test_member_of_non_object_is_absent() {
        let record = Record::from_json(&json!({"effect_size": 0.8})).unwrap();
        assert!(FieldRef::effect(POINT_ESTIMATE).resolve(&record).is_absent());
    }

    #[test]
    fn test_expected_accepts() {
        assert!(Expected::Number.accepts(ValueKind::Integer));
        assert!(Expected::Number.accepts(ValueKind::Float));
        assert!(!Expected::Integer.accepts(ValueKind::Float));
        assert!(!Expected::Number.accepts(ValueKind::Bool));
        assert!(Expected::StringOrObject.accepts(ValueKind::Object));
        assert!(!Expected::StringOrObject.accepts(ValueKind::List));
    }

    #[test]
    fn test_describe_mentions_the_field() {
        let rule = Rule::PositiveInteger {
            field: FieldRef::Field(SAMPLE_SIZE),
        };
        assert!(rule.describe().contains("sample_size"));
    }
}
