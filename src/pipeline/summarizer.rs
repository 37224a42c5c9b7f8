//! Result summarization.
//!
//! Degraded-only: any failure here is reported as
//! [`QueryError::SummarizationDegraded`] and the orchestrator returns the
//! rows without a summary.

use crate::error::{PipelineResult, QueryError};
use crate::llm::{ChatMessage, CompletionRequest, LlmClient};
use crate::models::SqlResult;
use std::sync::Arc;
use tracing::debug;

/// Build the summary prompt.
pub fn summary_prompt(question: &str, sql: &str, result: &SqlResult) -> String {
    format!(
        "Question: {question}\n\
         SQL Query: {sql}\n\
         SQL Result: {result}\n\n\
         Please provide a clear, concise summary of these results in natural language.",
        result = result.to_prompt_text(),
    )
}

pub struct Summarizer {
    client: Arc<dyn LlmClient>,
    max_tokens: u32,
}

impl Summarizer {
    pub fn new(client: Arc<dyn LlmClient>) -> Self {
        Self {
            client,
            max_tokens: 1024,
        }
    }

    /// Summarize an executed query in natural language.
    pub async fn summarize(
        &self,
        question: &str,
        sql: &str,
        result: &SqlResult,
    ) -> PipelineResult<String> {
        let request = CompletionRequest::new(vec![ChatMessage::user(summary_prompt(
            question, sql, result,
        ))])
        .with_max_tokens(self.max_tokens);

        debug!(rows = result.row_count(), "Requesting result summary");

        let summary = self
            .client
            .complete(request)
            .await
            .map_err(|e| QueryError::summarization_degraded(e.to_string()))?;

        let summary = summary.trim();
        if summary.is_empty() {
            return Err(QueryError::summarization_degraded("model returned an empty summary"));
        }
        Ok(summary.to_string())
    }
}
