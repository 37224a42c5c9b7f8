//! Data models for the NL-to-SQL service.
//!
//! This module re-exports all model types used throughout the application.

pub mod result;
pub mod schema;
pub mod target;

// Re-export commonly used types
pub use result::{
    AgentTranscript, DEFAULT_ROW_LIMIT, MAX_ROW_LIMIT, NO_ROWS_MESSAGE, QueryResult, Row,
    SqlCandidate, SqlResult,
};
pub use schema::SchemaDescription;
pub use target::{DatabaseTarget, Dialect};
