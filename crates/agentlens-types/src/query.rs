//! The typed query language the Store abstraction exposes uniformly over backends (§4.1).

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, strum::Display)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum QueryOperator {
    Equal,
    NotEqual,
    GreaterEqual,
    LessEqual,
    EqualsMany,
    ArrayContains,
}

/// One field predicate: `field {operator} value`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct QueryFilter {
    pub operator: QueryOperator,
    pub value: serde_json::Value,
}

impl QueryFilter {
    pub fn eq(value: impl Into<serde_json::Value>) -> Self {
        Self {
            operator: QueryOperator::Equal,
            value: value.into(),
        }
    }

    pub fn array_contains(value: impl Into<serde_json::Value>) -> Self {
        Self {
            operator: QueryOperator::ArrayContains,
            value: value.into(),
        }
    }

    /// Whether a single stored field value satisfies this filter.
    pub fn matches(&self, field_value: &serde_json::Value) -> bool {
        use serde_json::Value;
        match self.operator {
            QueryOperator::Equal => field_value == &self.value,
            QueryOperator::NotEqual => field_value != &self.value,
            QueryOperator::GreaterEqual => compare_numeric(field_value, &self.value, |a, b| a >= b),
            QueryOperator::LessEqual => compare_numeric(field_value, &self.value, |a, b| a <= b),
            QueryOperator::EqualsMany => match &self.value {
                Value::Array(items) => items.contains(field_value),
                _ => false,
            },
            QueryOperator::ArrayContains => match field_value {
                Value::Array(items) => items.contains(&self.value),
                _ => false,
            },
        }
    }
}

fn compare_numeric(a: &serde_json::Value, b: &serde_json::Value, op: impl Fn(f64, f64) -> bool) -> bool {
    match (a.as_f64(), b.as_f64()) {
        (Some(a), Some(b)) => op(a, b),
        _ => false,
    }
}

/// A query is an AND over field → filter entries (§4.1).
pub type Query = HashMap<String, QueryFilter>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn equal_matches_identical_value() {
        let f = QueryFilter::eq("T1");
        assert!(f.matches(&serde_json::json!("T1")));
        assert!(!f.matches(&serde_json::json!("T2")));
    }

    #[test]
    fn array_contains_checks_membership() {
        let f = QueryFilter::array_contains("A");
        assert!(f.matches(&serde_json::json!(["A", "B"])));
        assert!(!f.matches(&serde_json::json!(["B"])));
    }

    #[test]
    fn greater_equal_compares_numerics() {
        let f = QueryFilter {
            operator: QueryOperator::GreaterEqual,
            value: serde_json::json!(10),
        };
        assert!(f.matches(&serde_json::json!(12)));
        assert!(!f.matches(&serde_json::json!(5)));
    }
}
