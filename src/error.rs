//! Error types for the NL-to-SQL service.
//!
//! This module defines all pipeline error types using `thiserror`. Each variant
//! maps to one stage of the query pipeline, and every error can be classified
//! into an [`ErrorCategory`] so callers can tell "rephrase the question" apart
//! from "the system is down".

use crate::llm::LlmError;
use crate::models::Dialect;
use serde::Serialize;
use thiserror::Error;

/// Maximum number of characters of untrusted model output kept in error messages.
const EXCERPT_LIMIT: usize = 200;

/// Coarse classification of a pipeline failure, as seen by the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    /// The question could not be turned into a safe query. Ask the user to rephrase.
    NotAnswerable,
    /// Database or model infrastructure failed. Treat as an outage.
    Infrastructure,
    /// The request itself was malformed.
    InvalidRequest,
}

#[derive(Error, Debug)]
pub enum QueryError {
    #[error("Unsupported database type: {dialect}. Choose 'mysql' or 'postgresql'.")]
    UnsupportedDialect { dialect: String },

    #[error("Connection failed: {message}")]
    Connection { message: String, suggestion: String },

    #[error("Schema introspection failed: {message}")]
    Introspection { message: String },

    #[error("Could not identify a SQL query in agent response: {excerpt}")]
    NoSqlFound { excerpt: String },

    #[error("Failed to generate SQL: {reason}")]
    SqlGenerationFailed { reason: String },

    #[error("Generated query is not a safe read-only query: {sql} ({reason})")]
    UnsafeOrInvalidSql { sql: String, reason: String },

    #[error("Query execution failed: {message}")]
    Execution {
        message: String,
        /// e.g., "42P01" for undefined table
        sql_state: Option<String>,
    },

    #[error("Summary unavailable: {message}")]
    SummarizationDegraded { message: String },

    #[error("Language model error: {message}")]
    Llm { message: String },

    #[error("Invalid input: {message}")]
    InvalidInput { message: String },

    #[error("Timeout: {operation} exceeded {elapsed_secs}s")]
    Timeout {
        operation: String,
        elapsed_secs: u64,
    },

    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl QueryError {
    /// Create an unsupported dialect error.
    pub fn unsupported_dialect(dialect: impl Into<String>) -> Self {
        Self::UnsupportedDialect {
            dialect: dialect.into(),
        }
    }

    /// Create a connection error with a helpful suggestion.
    pub fn connection(message: impl Into<String>, suggestion: impl Into<String>) -> Self {
        Self::Connection {
            message: message.into(),
            suggestion: suggestion.into(),
        }
    }

    /// Create an introspection error.
    pub fn introspection(message: impl Into<String>) -> Self {
        Self::Introspection {
            message: message.into(),
        }
    }

    /// Create a no-SQL-found error. The transcript is shortened for diagnostics.
    pub fn no_sql_found(transcript: &str) -> Self {
        Self::NoSqlFound {
            excerpt: excerpt(transcript),
        }
    }

    /// Create a SQL generation failure.
    pub fn sql_generation_failed(reason: impl Into<String>) -> Self {
        Self::SqlGenerationFailed {
            reason: reason.into(),
        }
    }

    /// Create an unsafe-or-invalid SQL error carrying the rejected text.
    pub fn unsafe_sql(sql: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::UnsafeOrInvalidSql {
            sql: sql.into(),
            reason: reason.into(),
        }
    }

    /// Create an execution error with optional SQL state.
    pub fn execution(message: impl Into<String>, sql_state: Option<String>) -> Self {
        Self::Execution {
            message: message.into(),
            sql_state,
        }
    }

    /// Create a degraded-summary marker.
    pub fn summarization_degraded(message: impl Into<String>) -> Self {
        Self::SummarizationDegraded {
            message: message.into(),
        }
    }

    /// Create a language model error.
    pub fn llm(message: impl Into<String>) -> Self {
        Self::Llm {
            message: message.into(),
        }
    }

    /// Create an invalid input error.
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput {
            message: message.into(),
        }
    }

    /// Create a timeout error.
    pub fn timeout(operation: impl Into<String>, elapsed_secs: u64) -> Self {
        Self::Timeout {
            operation: operation.into(),
            elapsed_secs,
        }
    }

    /// Create an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Map a failure to establish a session.
    pub fn from_connect(err: sqlx::Error, dialect: Dialect) -> Self {
        let suggestion = connection_suggestion(dialect, &err);
        Self::connection(format!("Failed to connect: {}", err), suggestion)
    }

    /// Map a failure while reading catalog tables.
    pub fn from_introspection(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::Database(db_err) => Self::introspection(db_err.message().to_string()),
            other => Self::introspection(other.to_string()),
        }
    }

    /// Map a failure while running the generated statement.
    ///
    /// Database errors keep their original message and SQLSTATE so the caller
    /// can see exactly what the server rejected.
    pub fn from_execution(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::Database(db_err) => {
                let code = db_err.code().map(|c| c.to_string());
                Self::execution(db_err.message(), code)
            }
            sqlx::Error::Io(io_err) => Self::connection(
                format!("I/O error: {}", io_err),
                "Check network connectivity and database server status",
            ),
            sqlx::Error::Protocol(msg) => Self::connection(
                format!("Protocol error: {}", msg),
                "Check database server compatibility",
            ),
            sqlx::Error::ColumnDecode { index, source } => {
                Self::internal(format!("Failed to decode column {}: {}", index, source))
            }
            other => Self::execution(other.to_string(), None),
        }
    }

    /// Get the suggestion for this error, if available.
    pub fn suggestion(&self) -> Option<&str> {
        match self {
            Self::UnsupportedDialect { .. } => Some("Use 'mysql' or 'postgresql' as the database type"),
            Self::Connection { suggestion, .. } => Some(suggestion),
            Self::NoSqlFound { .. } | Self::SqlGenerationFailed { .. } => {
                Some("Rephrase the question so it can be answered from the database")
            }
            Self::UnsafeOrInvalidSql { .. } => Some("Only read-only questions are supported"),
            Self::Execution { .. } => Some("Check the SQL syntax and referenced objects"),
            _ => None,
        }
    }

    /// Classify this error for the caller.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::NoSqlFound { .. }
            | Self::SqlGenerationFailed { .. }
            | Self::UnsafeOrInvalidSql { .. } => ErrorCategory::NotAnswerable,
            Self::UnsupportedDialect { .. } | Self::InvalidInput { .. } => {
                ErrorCategory::InvalidRequest
            }
            Self::Connection { .. }
            | Self::Introspection { .. }
            | Self::Execution { .. }
            | Self::SummarizationDegraded { .. }
            | Self::Llm { .. }
            | Self::Timeout { .. }
            | Self::Internal { .. } => ErrorCategory::Infrastructure,
        }
    }

    /// Stable machine-readable code for this error.
    pub fn code(&self) -> &'static str {
        match self {
            Self::UnsupportedDialect { .. } => "unsupported_dialect",
            Self::Connection { .. } => "connection_error",
            Self::Introspection { .. } => "introspection_error",
            Self::NoSqlFound { .. } => "no_sql_found",
            Self::SqlGenerationFailed { .. } => "sql_generation_failed",
            Self::UnsafeOrInvalidSql { .. } => "unsafe_or_invalid_sql",
            Self::Execution { .. } => "execution_error",
            Self::SummarizationDegraded { .. } => "summarization_degraded",
            Self::Llm { .. } => "llm_error",
            Self::InvalidInput { .. } => "invalid_input",
            Self::Timeout { .. } => "timeout",
            Self::Internal { .. } => "internal_error",
        }
    }

    /// Check if the caller may reasonably retry the same request later.
    ///
    /// The pipeline itself never retries; this is a hint for the boundary.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Connection { .. } | Self::Llm { .. } | Self::Timeout { .. }
        )
    }
}

impl From<LlmError> for QueryError {
    fn from(err: LlmError) -> Self {
        Self::llm(err.to_string())
    }
}

/// Result type alias for pipeline operations.
pub type PipelineResult<T> = Result<T, QueryError>;

/// Shorten untrusted text for inclusion in an error message.
fn excerpt(text: &str) -> String {
    let trimmed = text.trim();
    if trimmed.chars().count() <= EXCERPT_LIMIT {
        return trimmed.to_string();
    }
    let mut short: String = trimmed.chars().take(EXCERPT_LIMIT).collect();
    short.push_str("...");
    short
}

/// Generate a helpful suggestion for connection errors.
fn connection_suggestion(dialect: Dialect, error: &sqlx::Error) -> String {
    let error_str = error.to_string().to_lowercase();

    if error_str.contains("connection refused") {
        return format!("Check that the {} server is running and accessible", dialect);
    }

    if error_str.contains("authentication") || error_str.contains("password") {
        return "Verify the username and password".to_string();
    }

    if error_str.contains("does not exist") || error_str.contains("unknown database") {
        return "Check that the database name exists".to_string();
    }

    if error_str.contains("tls") || error_str.contains("ssl") {
        return "Check TLS/SSL configuration or build with a TLS feature".to_string();
    }

    match dialect {
        Dialect::Postgres => "Verify host, port and credentials (default port 5432)".to_string(),
        Dialect::MySql => "Verify host, port and credentials (default port 3306)".to_string(),
    }
}
