//! Record - the unit of work flowing through the batch engine
//!
//! A record is opaque to the core: a caller-defined key plus structured payload.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Opaque, serializable unit of work
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    /// Caller-defined identity
    pub key: String,

    /// Payload fields
    #[serde(default)]
    pub payload: Value,
}

impl Record {
    /// Create a record from key and payload
    pub fn new(key: impl Into<String>, payload: Value) -> Self {
        Self {
            key: key.into(),
            payload,
        }
    }

    /// Look up a top-level payload field
    pub fn field(&self, name: &str) -> Option<&Value> {
        self.payload.get(name)
    }
}

/// Comparison used by a field predicate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterOp {
    /// Field equals value
    Eq,
    /// Numeric field strictly greater than value
    Gt,
    /// Numeric field strictly less than value
    Lt,
}

/// Single predicate over a payload field
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldPredicate {
    pub field: String,
    pub op: FilterOp,
    pub value: Value,
}

impl FieldPredicate {
    /// Evaluate the predicate against a record.
    ///
    /// A missing field never matches. `gt`/`lt` only match numbers.
    pub fn matches(&self, record: &Record) -> bool {
        let Some(actual) = record.field(&self.field) else {
            return false;
        };

        match self.op {
            FilterOp::Eq => actual == &self.value,
            FilterOp::Gt | FilterOp::Lt => match (actual.as_f64(), self.value.as_f64()) {
                (Some(a), Some(b)) if self.op == FilterOp::Gt => a > b,
                (Some(a), Some(b)) => a < b,
                _ => false,
            },
        }
    }
}

/// Query filter passed to `RecordSource::query`
///
/// All predicates must match; `limit` caps the number of returned records.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RecordFilter {
    #[serde(default)]
    pub predicates: Vec<FieldPredicate>,

    #[serde(default)]
    pub limit: Option<usize>,
}

impl RecordFilter {
    /// Filter matching every record
    pub fn all() -> Self {
        Self::default()
    }

    /// Cap the result size
    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Add a predicate
    pub fn with_predicate(mut self, field: impl Into<String>, op: FilterOp, value: Value) -> Self {
        self.predicates.push(FieldPredicate {
            field: field.into(),
            op,
            value,
        });
        self
    }

    /// Check whether a record passes every predicate
    pub fn matches(&self, record: &Record) -> bool {
        self.predicates.iter().all(|p| p.matches(record))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn user(key: &str, age: i64) -> Record {
        Record::new(key, json!({ "name": key, "age": age, "address": "HSR Layout" }))
    }

    #[test]
    fn test_filter_all_matches_everything() {
        assert!(RecordFilter::all().matches(&user("jane", 30)));
    }

    #[test]
    fn test_filter_gt() {
        let filter = RecordFilter::all().with_predicate("age", FilterOp::Gt, json!(20));
        assert!(filter.matches(&user("jane", 30)));
        assert!(!filter.matches(&user("kid", 12)));
        assert!(!filter.matches(&user("edge", 20)));
    }

    #[test]
    fn test_filter_eq_and_missing_field() {
        let filter = RecordFilter::all().with_predicate("name", FilterOp::Eq, json!("jane"));
        assert!(filter.matches(&user("jane", 30)));

        let missing = RecordFilter::all().with_predicate("email", FilterOp::Eq, json!("x"));
        assert!(!missing.matches(&user("jane", 30)));
    }

    #[test]
    fn test_lt_rejects_non_numeric() {
        let filter = RecordFilter::all().with_predicate("name", FilterOp::Lt, json!(5));
        assert!(!filter.matches(&user("jane", 30)));
    }
}
