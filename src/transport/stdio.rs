//! Stdio transport: answer a single question from the command line.
//!
//! The JSON result (or error body) goes to stdout; logs go to stderr.

use crate::error::{PipelineResult, QueryError};
use crate::models::DatabaseTarget;
use crate::pipeline::QueryOrchestrator;
use crate::transport::{ErrorBody, Transport};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tracing::info;

pub struct StdioTransport {
    orchestrator: Arc<QueryOrchestrator>,
    target: DatabaseTarget,
    question: String,
    request_timeout: Duration,
}

impl StdioTransport {
    pub fn new(
        orchestrator: Arc<QueryOrchestrator>,
        target: DatabaseTarget,
        question: impl Into<String>,
        request_timeout: Duration,
    ) -> Self {
        Self {
            orchestrator,
            target,
            question: question.into(),
            request_timeout,
        }
    }

    /// Run the question and render the outcome as pretty JSON.
    ///
    /// Returns the rendered document together with the pipeline error, if any.
    pub async fn answer(&self) -> (String, Option<QueryError>) {
        let outcome = tokio::time::timeout(
            self.request_timeout,
            self.orchestrator.run(&self.target, &self.question),
        )
        .await
        .unwrap_or_else(|_| {
            Err(QueryError::timeout(
                "request",
                self.request_timeout.as_secs(),
            ))
        });

        let (rendered, failure) = match outcome {
            Ok(result) => (serde_json::to_string_pretty(&result), None),
            Err(err) => (
                serde_json::to_string_pretty(&ErrorBody::new(&err, Some(&self.question))),
                Some(err),
            ),
        };

        match rendered {
            Ok(text) => (text, failure),
            Err(e) => {
                let err = QueryError::internal(format!("Failed to serialize output: {}", e));
                (json!({ "error": err.to_string() }).to_string(), Some(err))
            }
        }
    }
}

impl Transport for StdioTransport {
    async fn run(&self) -> PipelineResult<()> {
        info!(database = %self.target.masked_connection_string(), "Answering question from command line");

        let (text, failure) = self.answer().await;

        let write = async {
            let mut stdout = tokio::io::stdout();
            stdout.write_all(text.as_bytes()).await?;
            stdout.write_all(b"\n").await?;
            stdout.flush().await
        };
        write
            .await
            .map_err(|e| QueryError::internal(format!("Failed to write to stdout: {}", e)))?;

        match failure {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    fn name(&self) -> &'static str {
        "stdio"
    }
}
