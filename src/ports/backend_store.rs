//! BackendStore port - row storage on the hosted backend.
//!
//! The directory keeps its data in a hosted Postgres exposed through a REST
//! layer. Rows travel as JSON objects and filters are conjunctions of simple
//! column comparisons, which is all the billing workflows need.

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

/// A single table row.
pub type Row = serde_json::Map<String, Value>;

/// Comparison applied to one column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterOp {
    Eq,
    Lt,
}

impl FilterOp {
    /// Operator name in the REST query syntax (`col=eq.value`).
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Eq => "eq",
            Self::Lt => "lt",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Condition {
    pub column: String,
    pub op: FilterOp,
    pub value: Value,
}

/// Conjunction of column conditions. An empty filter matches every row.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Filter {
    conditions: Vec<Condition>,
}

impl Filter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn eq(mut self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.conditions.push(Condition {
            column: column.into(),
            op: FilterOp::Eq,
            value: value.into(),
        });
        self
    }

    pub fn lt(mut self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.conditions.push(Condition {
            column: column.into(),
            op: FilterOp::Lt,
            value: value.into(),
        });
        self
    }

    pub fn conditions(&self) -> &[Condition] {
        &self.conditions
    }

    pub fn is_empty(&self) -> bool {
        self.conditions.is_empty()
    }

    /// Evaluates the filter against a row held in memory.
    ///
    /// `Lt` compares numbers numerically and strings lexically; any other
    /// pairing never matches.
    pub fn matches(&self, row: &Row) -> bool {
        self.conditions.iter().all(|c| {
            let Some(actual) = row.get(&c.column) else {
                return false;
            };
            match c.op {
                FilterOp::Eq => actual == &c.value,
                FilterOp::Lt => match (actual, &c.value) {
                    (Value::Number(a), Value::Number(b)) => match (a.as_f64(), b.as_f64()) {
                        (Some(a), Some(b)) => a < b,
                        _ => false,
                    },
                    (Value::String(a), Value::String(b)) => a < b,
                    _ => false,
                },
            }
        })
    }
}

/// Errors from the backend store.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("backend unreachable: {0}")]
    Unavailable(String),

    #[error("row conflicts with an existing row: {0}")]
    Conflict(String),

    #[error("backend rejected request ({status}): {message}")]
    Rejected { status: u16, message: String },

    #[error("unexpected backend response: {0}")]
    Decode(String),
}

impl StoreError {
    /// Transient failures worth retrying.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Unavailable(_) => true,
            Self::Rejected { status, .. } => *status >= 500,
            _ => false,
        }
    }
}

/// Table access on the hosted backend.
///
/// Implementations run with service credentials; row-level authorization is
/// enforced by the application layer before calling in.
#[async_trait]
pub trait BackendStore: Send + Sync {
    /// Returns every row in `table` matching `filter`.
    async fn select(&self, table: &str, filter: &Filter) -> Result<Vec<Row>, StoreError>;

    /// Inserts a row and returns it as stored.
    ///
    /// A primary key collision is `StoreError::Conflict`.
    async fn insert(&self, table: &str, row: Row) -> Result<Row, StoreError>;

    /// Merges `patch` into every matching row and returns the updated rows.
    async fn update(&self, table: &str, filter: &Filter, patch: Row)
        -> Result<Vec<Row>, StoreError>;

    /// Deletes matching rows and returns how many were removed.
    async fn delete(&self, table: &str, filter: &Filter) -> Result<u64, StoreError>;

    /// First matching row, if any.
    async fn select_one(&self, table: &str, filter: &Filter) -> Result<Option<Row>, StoreError> {
        Ok(self.select(table, filter).await?.into_iter().next())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn row(value: Value) -> Row {
        match value {
            Value::Object(map) => map,
            _ => panic!("expected object"),
        }
    }

    #[test]
    fn empty_filter_matches_everything() {
        assert!(Filter::new().matches(&row(json!({"id": 1}))));
        assert!(Filter::new().is_empty());
    }

    #[test]
    fn eq_filter_requires_every_condition() {
        let filter = Filter::new().eq("status", "active").eq("is_featured", true);

        assert!(filter.matches(&row(json!({"status": "active", "is_featured": true}))));
        assert!(!filter.matches(&row(json!({"status": "active", "is_featured": false}))));
        assert!(!filter.matches(&row(json!({"status": "active"}))));
    }

    #[test]
    fn lt_filter_compares_numbers_and_strings() {
        let numeric = Filter::new().lt("processed_at", 100);
        assert!(numeric.matches(&row(json!({"processed_at": 99}))));
        assert!(!numeric.matches(&row(json!({"processed_at": 100}))));

        let text = Filter::new().lt("name", "m");
        assert!(text.matches(&row(json!({"name": "a"}))));
        assert!(!text.matches(&row(json!({"name": "z"}))));
        assert!(!text.matches(&row(json!({"name": 1}))));
    }

    #[test]
    fn filter_op_names_match_rest_syntax() {
        assert_eq!(FilterOp::Eq.as_str(), "eq");
        assert_eq!(FilterOp::Lt.as_str(), "lt");
    }

    #[test]
    fn transient_errors() {
        assert!(StoreError::Unavailable("timeout".into()).is_transient());
        assert!(StoreError::Rejected {
            status: 503,
            message: "down".into()
        }
        .is_transient());
        assert!(!StoreError::Rejected {
            status: 400,
            message: "bad".into()
        }
        .is_transient());
        assert!(!StoreError::Conflict("dup".into()).is_transient());
    }

    #[test]
    fn backend_store_is_object_safe() {
        fn _assert(_: &dyn BackendStore) {}
        fn _assert_send_sync<T: Send + Sync + ?Sized>() {}
        _assert_send_sync::<std::sync::Arc<dyn BackendStore>>();
    }
}
