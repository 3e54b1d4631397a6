//! Storage-agnostic query predicates
//!
//! Filters are evaluated in-process by the memory store and translated to SQL
//! by the MySQL store.

use serde_json::Value;
use std::ops::{Bound, RangeBounds};

use crate::store::Document;

#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    /// Matches every document
    All,

    /// Field equals value. On an array field, matches when the array holds
    /// the value.
    Eq(&'static str, Value),

    /// Integer field within bounds
    Range {
        field: &'static str,
        lower: Bound<i64>,
        upper: Bound<i64>,
    },

    /// Field equal to any of the values (same array rule as `Eq`)
    In(&'static str, Vec<Value>),

    And(Vec<Filter>),
}

impl Filter {
    pub fn eq(field: &'static str, value: impl Into<Value>) -> Self {
        Filter::Eq(field, value.into())
    }

    pub fn range(field: &'static str, lower: Bound<i64>, upper: Bound<i64>) -> Self {
        Filter::Range {
            field,
            lower,
            upper,
        }
    }

    pub fn is_in<I, V>(field: &'static str, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        Filter::In(field, values.into_iter().map(Into::into).collect())
    }

    pub fn and(self, other: Filter) -> Self {
        match self {
            Filter::And(mut parts) => {
                parts.push(other);
                Filter::And(parts)
            }
            first => Filter::And(vec![first, other]),
        }
    }

    pub fn matches(&self, doc: &Document) -> bool {
        match self {
            Filter::All => true,
            Filter::Eq(field, value) => doc.get(*field).is_some_and(|v| value_matches(v, value)),
            Filter::Range {
                field,
                lower,
                upper,
            } => doc
                .get(*field)
                .and_then(Value::as_i64)
                .is_some_and(|v| (*lower, *upper).contains(&v)),
            Filter::In(field, values) => doc
                .get(*field)
                .is_some_and(|v| values.iter().any(|candidate| value_matches(v, candidate))),
            Filter::And(parts) => parts.iter().all(|f| f.matches(doc)),
        }
    }
}

fn value_matches(stored: &Value, wanted: &Value) -> bool {
    match stored {
        Value::Array(items) if !wanted.is_array() => items.contains(wanted),
        _ => stored == wanted,
    }
}

/// Modification applied by `update_by_id`
#[derive(Debug, Clone, PartialEq)]
pub enum Update {
    /// Replace the whole document
    Replace(Document),
    /// Overwrite only the given top-level fields
    Set(Document),
}
