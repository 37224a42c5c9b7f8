//! Transport layer for the NL-to-SQL server.
//!
//! - HTTP: axum routes exposing the orchestrator and the recommender
//! - Stdio: answer one question from the command line and print JSON

pub mod http;
pub mod stdio;

pub use http::{AppState, HttpTransport};
pub use stdio::StdioTransport;

use crate::error::{ErrorCategory, PipelineResult, QueryError};
use serde::Serialize;
use std::future::Future;

/// Trait for transport implementations.
pub trait Transport: Send + Sync {
    /// Start the transport and handle requests until it is shut down.
    fn run(&self) -> impl Future<Output = PipelineResult<()>> + Send;

    /// Get the name of this transport for logging.
    fn name(&self) -> &'static str;
}

/// JSON error payload shared by all transports.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorBody {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_query: Option<String>,
    pub error: String,
    pub code: &'static str,
    pub category: ErrorCategory,
    pub retryable: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggestion: Option<String>,
}

impl ErrorBody {
    pub fn new(err: &QueryError, user_query: Option<&str>) -> Self {
        Self {
            user_query: user_query.map(str::to_string),
            error: err.to_string(),
            code: err.code(),
            category: err.category(),
            retryable: err.is_retryable(),
            suggestion: err.suggestion().map(str::to_string),
        }
    }
}
