//! Declarative rule conditions
//!
//! A rule's conditions map field names to condition specs. A spec is either
//! a bare scalar (shorthand for `equals`) or a map of operators, and every
//! entry must pass for the rule to fire. The polymorphic shape is decoded
//! once at configuration load into [`Condition`]; evaluation never
//! re-inspects raw configuration values.

use hookrelay_core::FieldValue;
use serde::{Deserialize, Deserializer};
use std::collections::HashMap;

/// Comparison operator in a condition spec.
///
/// Operator names are parsed case-insensitively at decode time. Names that
/// are not recognised are retained and always evaluate false.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operator {
    Equals,
    Not,
    GreaterThan,
    LessThan,
    GreaterThanOrEqual,
    LessThanOrEqual,
    Unknown(String),
}

impl Operator {
    /// Parse an operator name, case-insensitively
    pub fn parse(name: &str) -> Operator {
        match name.to_ascii_lowercase().as_str() {
            "equals" => Operator::Equals,
            "not" => Operator::Not,
            "greater-than" => Operator::GreaterThan,
            "less-than" => Operator::LessThan,
            "greater-than-or-equal" => Operator::GreaterThanOrEqual,
            "less-than-or-equal" => Operator::LessThanOrEqual,
            _ => Operator::Unknown(name.to_string()),
        }
    }
}

/// Operand of a single operator entry
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum Operand {
    /// Absent operand; under `equals` it matches only a missing field
    Null,

    /// Single scalar operand
    Value(FieldValue),

    /// Sequence operand; under `equals` any element may match
    List(Vec<FieldValue>),
}

impl Operand {
    /// Numeric coercion for comparison operators; non-numeric shapes
    /// coerce to `0.0`, never erroring.
    fn as_f64(&self) -> f64 {
        match self {
            Operand::Value(v) => v.as_f64(),
            Operand::Null | Operand::List(_) => 0.0,
        }
    }
}

/// A decoded condition spec for one field
#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    /// Bare scalar shorthand for `equals`
    Scalar(Operand),

    /// Operator map; every entry must pass
    Operators(Vec<(Operator, Operand)>),
}

impl Condition {
    /// Evaluate this condition against the field's value (None = missing)
    pub fn evaluate(&self, value: Option<&FieldValue>) -> bool {
        match self {
            Condition::Scalar(operand) => equals_matches(value, operand),
            Condition::Operators(entries) => entries
                .iter()
                .all(|(op, operand)| evaluate_operator(value, op, operand)),
        }
    }
}

impl<'de> Deserialize<'de> for Condition {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum RawCondition {
            Map(HashMap<String, Operand>),
            Scalar(Operand),
        }

        Ok(match RawCondition::deserialize(deserializer)? {
            RawCondition::Map(map) => Condition::Operators(
                map.into_iter()
                    .map(|(name, operand)| (Operator::parse(&name), operand))
                    .collect(),
            ),
            RawCondition::Scalar(operand) => Condition::Scalar(operand),
        })
    }
}

fn evaluate_operator(value: Option<&FieldValue>, op: &Operator, operand: &Operand) -> bool {
    match op {
        Operator::Equals => equals_matches(value, operand),
        Operator::Not => !equals_matches(value, operand),
        Operator::GreaterThan => field_f64(value) > operand.as_f64(),
        Operator::LessThan => field_f64(value) < operand.as_f64(),
        Operator::GreaterThanOrEqual => field_f64(value) >= operand.as_f64(),
        Operator::LessThanOrEqual => field_f64(value) <= operand.as_f64(),
        Operator::Unknown(_) => false,
    }
}

fn field_f64(value: Option<&FieldValue>) -> f64 {
    value.map(FieldValue::as_f64).unwrap_or(0.0)
}

fn equals_matches(value: Option<&FieldValue>, operand: &Operand) -> bool {
    match operand {
        Operand::List(items) => items
            .iter()
            .any(|item| scalar_equals(value, item)),
        Operand::Null => value.is_none(),
        Operand::Value(item) => scalar_equals(value, item),
    }
}

fn scalar_equals(value: Option<&FieldValue>, operand: &FieldValue) -> bool {
    match value {
        Some(v) => v.to_string().eq_ignore_ascii_case(&operand.to_string()),
        None => false,
    }
}

/// All conditions configured for a rule, keyed by field name.
///
/// Empty sets evaluate true; otherwise every entry must pass.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(transparent)]
pub struct ConditionSet(HashMap<String, Condition>);

impl ConditionSet {
    /// Create an empty condition set
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether no conditions are configured
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Add a condition for a field
    pub fn insert(&mut self, field: impl Into<String>, condition: Condition) {
        self.0.insert(field.into(), condition);
    }

    /// Evaluate all conditions against the event's fields (logical AND)
    pub fn evaluate(&self, fields: &HashMap<String, FieldValue>) -> bool {
        self.0
            .iter()
            .all(|(field, condition)| condition.evaluate(fields.get(field.as_str())))
    }
}
