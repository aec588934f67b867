//! Document filters.

use serde_json::Value;
use std::cmp::Ordering;
use sync_types::Document;

/// A predicate over documents.
///
/// Comparisons only hold between values of the same kind: numbers with
/// numbers and strings with strings. A missing field never compares.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Filter {
    /// Matches every document.
    #[default]
    All,
    /// Field equals value.
    Eq(String, Value),
    /// Field is missing or differs from value.
    Ne(String, Value),
    /// Field equals one of the values.
    In(String, Vec<Value>),
    /// Field is missing or equals none of the values.
    NotIn(String, Vec<Value>),
    /// Field is greater than value.
    Gt(String, Value),
    /// Field is greater than or equal to value.
    Gte(String, Value),
    /// Field is lower than value.
    Lt(String, Value),
    /// Every filter matches.
    And(Vec<Filter>),
    /// At least one filter matches.
    Or(Vec<Filter>),
}

impl Filter {
    /// `field == value`
    pub fn eq(field: &str, value: impl Into<Value>) -> Self {
        Filter::Eq(field.to_string(), value.into())
    }

    /// `field != value`
    pub fn ne(field: &str, value: impl Into<Value>) -> Self {
        Filter::Ne(field.to_string(), value.into())
    }

    /// `field in values`
    pub fn is_in<V: Into<Value>>(field: &str, values: impl IntoIterator<Item = V>) -> Self {
        Filter::In(field.to_string(), values.into_iter().map(Into::into).collect())
    }

    /// `field not in values`
    pub fn not_in<V: Into<Value>>(field: &str, values: impl IntoIterator<Item = V>) -> Self {
        Filter::NotIn(field.to_string(), values.into_iter().map(Into::into).collect())
    }

    /// `field > value`
    pub fn gt(field: &str, value: impl Into<Value>) -> Self {
        Filter::Gt(field.to_string(), value.into())
    }

    /// `field >= value`
    pub fn gte(field: &str, value: impl Into<Value>) -> Self {
        Filter::Gte(field.to_string(), value.into())
    }

    /// `field < value`
    pub fn lt(field: &str, value: impl Into<Value>) -> Self {
        Filter::Lt(field.to_string(), value.into())
    }

    /// Combine with another filter, flattening nested conjunctions.
    pub fn and(self, other: Filter) -> Self {
        match (self, other) {
            (Filter::All, f) | (f, Filter::All) => f,
            (Filter::And(mut a), Filter::And(b)) => {
                a.extend(b);
                Filter::And(a)
            }
            (Filter::And(mut a), f) => {
                a.push(f);
                Filter::And(a)
            }
            (f, Filter::And(mut b)) => {
                b.insert(0, f);
                Filter::And(b)
            }
            (a, b) => Filter::And(vec![a, b]),
        }
    }

    /// Evaluate the filter against a document.
    pub fn matches(&self, doc: &Document) -> bool {
        match self {
            Filter::All => true,
            Filter::Eq(field, value) => doc.get(field).is_some_and(|v| values_equal(v, value)),
            Filter::Ne(field, value) => !doc.get(field).is_some_and(|v| values_equal(v, value)),
            Filter::In(field, values) => doc
                .get(field)
                .is_some_and(|v| values.iter().any(|value| values_equal(v, value))),
            Filter::NotIn(field, values) => !doc
                .get(field)
                .is_some_and(|v| values.iter().any(|value| values_equal(v, value))),
            Filter::Gt(field, value) => cmp_field(doc, field, value) == Some(Ordering::Greater),
            Filter::Gte(field, value) => matches!(
                cmp_field(doc, field, value),
                Some(Ordering::Greater | Ordering::Equal)
            ),
            Filter::Lt(field, value) => cmp_field(doc, field, value) == Some(Ordering::Less),
            Filter::And(filters) => filters.iter().all(|f| f.matches(doc)),
            Filter::Or(filters) => filters.iter().any(|f| f.matches(doc)),
        }
    }
}

fn cmp_field(doc: &Document, field: &str, value: &Value) -> Option<Ordering> {
    doc.get(field).and_then(|v| compare_values(v, value))
}

fn values_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(_), Value::Number(_)) => compare_values(a, b) == Some(Ordering::Equal),
        _ => a == b,
    }
}

/// Order two JSON values of the same kind.
///
/// Integers compare exactly, other numbers as floats.
pub fn compare_values(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => match (x.as_i64(), y.as_i64()) {
            (Some(x), Some(y)) => Some(x.cmp(&y)),
            _ => x.as_f64()?.partial_cmp(&y.as_f64()?),
        },
        (Value::String(x), Value::String(y)) => Some(x.cmp(y)),
        (Value::Bool(x), Value::Bool(y)) => Some(x.cmp(y)),
        _ => None,
    }
}
