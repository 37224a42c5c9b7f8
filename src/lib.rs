//! NL-to-SQL Server Library
//!
//! Turns natural-language questions into read-only SQL against MySQL or
//! PostgreSQL, runs it, and summarizes the result. The language model is
//! treated as an untrusted text generator: its output is extracted, validated
//! and guarded before it ever reaches the database.

pub mod config;
pub mod db;
pub mod error;
pub mod llm;
pub mod models;
pub mod pipeline;
pub mod transport;

pub use config::Config;
pub use error::{ErrorCategory, PipelineResult, QueryError};
pub use pipeline::QueryOrchestrator;
