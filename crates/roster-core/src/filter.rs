//! # Profile Filters
//!
//! A [`Filter`] is the parsed form of a list-query filter document. Each
//! top-level key names a profile field (or `_id`) and maps either to a plain
//! value, meaning equality, or to an operator object:
//!
//! ```text
//! {"course": "cs", "age": {"$gte": 20, "$lt": 30}, "city": {"$in": ["Pune", "Goa"]}}
//! ```
//!
//! Supported operators: `$eq`, `$ne`, `$gt`, `$gte`, `$lt`, `$lte`, `$in`,
//! `$nin`. Any other `$`-prefixed key is rejected with [`FilterError`], so an
//! unsupported query never degrades into a silent empty result.
//!
//! ## Matching rules
//!
//! - Equality is containment: scalars compare by value (numerically for
//!   numbers), objects match when every filter key is contained recursively,
//!   and an array field matches a scalar it contains.
//! - `$ne` and `$nin` also match profiles that lack the field.
//! - Range operators compare numbers with numbers and strings with strings
//!   (byte order). A range against any other operand type never matches.

use std::cmp::Ordering;

use serde_json::Value;
use thiserror::Error;

use crate::document::{Document, Profile, ID_FIELD};

/// Comparison applied by a [`Condition`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    Eq,
    Ne,
    Gt,
    Gte,
    Lt,
    Lte,
    In,
    Nin,
}

impl Operator {
    fn from_key(key: &str) -> Option<Self> {
        Some(match key {
            "$eq" => Self::Eq,
            "$ne" => Self::Ne,
            "$gt" => Self::Gt,
            "$gte" => Self::Gte,
            "$lt" => Self::Lt,
            "$lte" => Self::Lte,
            "$in" => Self::In,
            "$nin" => Self::Nin,
            _ => return None,
        })
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Eq => "$eq",
            Self::Ne => "$ne",
            Self::Gt => "$gt",
            Self::Gte => "$gte",
            Self::Lt => "$lt",
            Self::Lte => "$lte",
            Self::In => "$in",
            Self::Nin => "$nin",
        }
    }

    /// Whether the operator takes a list of candidate values.
    pub fn is_set(&self) -> bool {
        matches!(self, Self::In | Self::Nin)
    }

    /// Whether the operator is an ordering comparison.
    pub fn is_range(&self) -> bool {
        matches!(self, Self::Gt | Self::Gte | Self::Lt | Self::Lte)
    }

    fn accepts(&self, ordering: Ordering) -> bool {
        match self {
            Self::Gt => ordering == Ordering::Greater,
            Self::Gte => ordering != Ordering::Less,
            Self::Lt => ordering == Ordering::Less,
            Self::Lte => ordering != Ordering::Greater,
            _ => false,
        }
    }
}

/// Errors raised while parsing a filter document.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FilterError {
    #[error("unsupported filter operator '{0}'")]
    UnsupportedOperator(String),

    #[error("'{operator}' on '{field}' requires an array")]
    ExpectedArray { field: String, operator: &'static str },

    #[error("filter on '{0}' mixes operators and plain fields")]
    MixedOperators(String),
}

/// One `field <operator> operand` test.
#[derive(Debug, Clone, PartialEq)]
pub struct Condition {
    pub field: String,
    pub operator: Operator,
    pub operand: Value,
}

impl Condition {
    /// Evaluate against the field's value, `None` when the field is absent.
    pub fn matches(&self, actual: Option<&Value>) -> bool {
        match self.operator {
            Operator::Eq => actual.is_some_and(|a| contains(a, &self.operand)),
            Operator::Ne => !actual.is_some_and(|a| contains(a, &self.operand)),
            Operator::In => actual.is_some_and(|a| any_contained(a, &self.operand)),
            Operator::Nin => !actual.is_some_and(|a| any_contained(a, &self.operand)),
            op => actual
                .and_then(|a| compare(a, &self.operand))
                .is_some_and(|ordering| op.accepts(ordering)),
        }
    }
}

/// A conjunction of [`Condition`]s. The empty filter matches every profile.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Filter {
    conditions: Vec<Condition>,
}

impl Filter {
    /// Parse a filter document.
    pub fn parse(doc: &Document) -> Result<Self, FilterError> {
        let mut conditions = Vec::with_capacity(doc.len());
        for (field, value) in doc {
            if field.starts_with('$') {
                return Err(FilterError::UnsupportedOperator(field.clone()));
            }
            match operator_object(field, value)? {
                Some(ops) => {
                    for (key, operand) in ops {
                        let operator = Operator::from_key(key)
                            .ok_or_else(|| FilterError::UnsupportedOperator(key.clone()))?;
                        if operator.is_set() && !operand.is_array() {
                            return Err(FilterError::ExpectedArray {
                                field: field.clone(),
                                operator: operator.as_str(),
                            });
                        }
                        conditions.push(Condition {
                            field: field.clone(),
                            operator,
                            operand: operand.clone(),
                        });
                    }
                }
                None => conditions.push(Condition {
                    field: field.clone(),
                    operator: Operator::Eq,
                    operand: value.clone(),
                }),
            }
        }
        Ok(Self { conditions })
    }

    /// Single equality test on `field`.
    pub fn eq(field: impl Into<String>, value: Value) -> Self {
        Self {
            conditions: vec![Condition {
                field: field.into(),
                operator: Operator::Eq,
                operand: value,
            }],
        }
    }

    pub fn conditions(&self) -> &[Condition] {
        &self.conditions
    }

    pub fn is_empty(&self) -> bool {
        self.conditions.is_empty()
    }

    /// Whether every condition holds for `profile`.
    pub fn matches(&self, profile: &Profile) -> bool {
        let id = Value::String(profile.id.to_string());
        self.conditions.iter().all(|cond| {
            let actual = match cond.field.as_str() {
                ID_FIELD => Some(&id),
                field => profile.fields.get(field),
            };
            cond.matches(actual)
        })
    }
}

/// The operator map of `value`, when it is a non-empty object of `$` keys.
fn operator_object<'a>(field: &str, value: &'a Value) -> Result<Option<&'a Document>, FilterError> {
    let Value::Object(map) = value else {
        return Ok(None);
    };
    let operators = map.keys().filter(|k| k.starts_with('$')).count();
    match operators {
        0 => Ok(None),
        n if n == map.len() => Ok(Some(map)),
        _ => Err(FilterError::MixedOperators(field.to_string())),
    }
}

/// JSON containment, mirroring Postgres `jsonb @>` for the value shapes that
/// appear in profile filters.
pub fn contains(actual: &Value, expected: &Value) -> bool {
    match (actual, expected) {
        (Value::Object(a), Value::Object(e)) => e
            .iter()
            .all(|(k, ev)| a.get(k).is_some_and(|av| contains(av, ev))),
        (Value::Array(a), Value::Array(e)) => {
            e.iter().all(|ev| a.iter().any(|av| contains(av, ev)))
        }
        (Value::Array(a), scalar) if !scalar.is_object() => {
            a.iter().any(|av| !av.is_array() && contains(av, scalar))
        }
        (Value::Number(a), Value::Number(e)) => a.as_f64() == e.as_f64(),
        _ => actual == expected,
    }
}

fn any_contained(actual: &Value, candidates: &Value) -> bool {
    candidates
        .as_array()
        .is_some_and(|list| list.iter().any(|c| contains(actual, c)))
}

fn compare(actual: &Value, operand: &Value) -> Option<Ordering> {
    match (actual, operand) {
        (Value::Number(a), Value::Number(b)) => a.as_f64()?.partial_cmp(&b.as_f64()?),
        (Value::String(a), Value::String(b)) => Some(a.as_bytes().cmp(b.as_bytes())),
        _ => None,
    }
}
