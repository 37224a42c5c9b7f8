//! Result models for the query pipeline.

use serde::{Serialize, Serializer};
use serde_json::{Map, Value};

/// Default cap on rows returned to the caller.
pub const DEFAULT_ROW_LIMIT: u32 = 1000;

/// Hard ceiling for the configurable row limit.
pub const MAX_ROW_LIMIT: u32 = 10000;

/// Marker returned in place of rows for an empty result set.
pub const NO_ROWS_MESSAGE: &str = "Query executed successfully. No rows returned.";

/// One result row: column name → scalar (string, number, boolean or null).
pub type Row = Map<String, Value>;

/// Raw text emitted by the query agent. Parsed, never trusted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentTranscript(String);

impl AgentTranscript {
    pub fn new(text: impl Into<String>) -> Self {
        Self(text.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for AgentTranscript {
    fn from(text: String) -> Self {
        Self(text)
    }
}

impl From<&str> for AgentTranscript {
    fn from(text: &str) -> Self {
        Self(text.to_string())
    }
}

/// An extracted statement and the validator's verdict on it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SqlCandidate {
    pub sql: String,
    pub is_valid: bool,
}

/// Rows from an executed query, or the "no rows" marker.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlResult {
    Rows(Vec<Row>),
    NoRows,
}

impl SqlResult {
    /// Wrap fetched rows; an empty set becomes [`SqlResult::NoRows`].
    pub fn from_rows(rows: Vec<Row>) -> Self {
        if rows.is_empty() {
            Self::NoRows
        } else {
            Self::Rows(rows)
        }
    }

    pub fn row_count(&self) -> usize {
        match self {
            Self::Rows(rows) => rows.len(),
            Self::NoRows => 0,
        }
    }

    /// Text form used in the summarizer prompt.
    pub fn to_prompt_text(&self) -> String {
        match self {
            Self::Rows(rows) => serde_json::to_string(rows).unwrap_or_else(|_| format!("{rows:?}")),
            Self::NoRows => NO_ROWS_MESSAGE.to_string(),
        }
    }
}

impl Serialize for SqlResult {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Rows(rows) => rows.serialize(serializer),
            Self::NoRows => serializer.serialize_str(NO_ROWS_MESSAGE),
        }
    }
}

/// Terminal artifact of one pipeline run.
#[derive(Debug, Clone, Serialize)]
pub struct QueryResult {
    pub user_query: String,
    pub sql_query: String,
    pub sql_result: SqlResult,
    /// `None` when the summarizer degraded
    pub summary: Option<String>,
    pub diagnostic_trace: String,
    /// Rows beyond the configured limit were dropped
    pub truncated: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
    pub execution_time_ms: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_empty_rows_become_marker() {
        let result = SqlResult::from_rows(Vec::new());
        assert_eq!(result, SqlResult::NoRows);
        assert_eq!(serde_json::to_value(&result).unwrap(), json!(NO_ROWS_MESSAGE));
        assert_eq!(result.row_count(), 0);
    }

    #[test]
    fn test_rows_serialize_as_array() {
        let mut row = Row::new();
        row.insert("COUNT(*)".to_string(), json!(42));
        let result = SqlResult::from_rows(vec![row]);
        assert_eq!(
            serde_json::to_value(&result).unwrap(),
            json!([{"COUNT(*)": 42}])
        );
        assert_eq!(result.to_prompt_text(), r#"[{"COUNT(*)":42}]"#);
    }

    #[test]
    fn test_query_result_omits_empty_warning() {
        let result = QueryResult {
            user_query: "q".into(),
            sql_query: "SELECT 1 FROM t".into(),
            sql_result: SqlResult::NoRows,
            summary: None,
            diagnostic_trace: String::new(),
            truncated: false,
            warning: None,
            execution_time_ms: 3,
        };
        let value = serde_json::to_value(&result).unwrap();
        assert!(value.get("warning").is_none());
        assert_eq!(value["summary"], Value::Null);
    }
}
