//! Query Orchestrator.
//!
//! Drives one question through the pipeline:
//!
//! ```text
//! Start -> SchemaLoaded -> AgentRun -> SqlExtracted -> SqlValidated
//!       -> Executed -> Summarized -> Done
//! ```
//!
//! Any stage may fail; the error is returned and the session is closed on
//! every path. Rejected SQL is never executed.

use crate::db::{ConnectionProvider, SqlSession};
use crate::error::{PipelineResult, QueryError};
use crate::models::{
    AgentTranscript, DEFAULT_ROW_LIMIT, DatabaseTarget, MAX_ROW_LIMIT, QueryResult,
    SchemaDescription, SqlCandidate, SqlResult,
};
use crate::pipeline::agent::{GenerationRequest, QueryAgent};
use crate::pipeline::extractor::SqlExtractor;
use crate::pipeline::guard::check_single_query;
use crate::pipeline::summarizer::Summarizer;
use crate::pipeline::trace::AgentTrace;
use crate::pipeline::validator::{is_valid_sql, rejection_reason};
use std::fmt;
use std::sync::Arc;
use std::time::Instant;
use tracing::{Instrument, debug, info, info_span, warn};
use uuid::Uuid;

/// Pipeline stages, for logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Start,
    SchemaLoaded,
    AgentRun,
    SqlExtracted,
    SqlValidated,
    Executed,
    Summarized,
    Done,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Start => "start",
            Stage::SchemaLoaded => "schema_loaded",
            Stage::AgentRun => "agent_run",
            Stage::SqlExtracted => "sql_extracted",
            Stage::SqlValidated => "sql_validated",
            Stage::Executed => "executed",
            Stage::Summarized => "summarized",
            Stage::Done => "done",
        };
        f.write_str(name)
    }
}

/// Tunables for a pipeline run.
#[derive(Debug, Clone, Copy)]
pub struct PipelineOptions {
    /// Clamped to `1..=MAX_ROW_LIMIT`
    pub row_limit: u32,
    /// Let the extractor fall back to the whole transcript
    pub keyword_fallback: bool,
    /// Parse validated SQL and require exactly one query
    pub statement_guard: bool,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            row_limit: DEFAULT_ROW_LIMIT,
            keyword_fallback: true,
            statement_guard: true,
        }
    }
}

pub struct QueryOrchestrator {
    provider: Arc<dyn ConnectionProvider>,
    agent: Arc<dyn QueryAgent>,
    summarizer: Summarizer,
    extractor: SqlExtractor,
    options: PipelineOptions,
}

impl QueryOrchestrator {
    pub fn new(
        provider: Arc<dyn ConnectionProvider>,
        agent: Arc<dyn QueryAgent>,
        summarizer: Summarizer,
        options: PipelineOptions,
    ) -> Self {
        let options = PipelineOptions {
            row_limit: options.row_limit.clamp(1, MAX_ROW_LIMIT),
            ..options
        };
        Self {
            provider,
            agent,
            summarizer,
            extractor: SqlExtractor::new(options.keyword_fallback),
            options,
        }
    }

    pub fn options(&self) -> &PipelineOptions {
        &self.options
    }

    /// Answer `question` against `target`.
    pub async fn run(&self, target: &DatabaseTarget, question: &str) -> PipelineResult<QueryResult> {
        let request_id = Uuid::new_v4();
        let span = info_span!("nl_query", %request_id, dialect = %target.dialect);

        async move {
            let question = question.trim();
            if question.is_empty() {
                return Err(QueryError::invalid_input("Question cannot be empty"));
            }

            let start = Instant::now();
            info!(stage = %Stage::Start, database = %target.masked_connection_string(), "Processing question");

            let mut session = self.provider.open(target).await?;
            let outcome = self.run_session(session.as_mut(), question, start).await;
            session.close().await;

            match &outcome {
                Ok(result) => info!(
                    stage = %Stage::Done,
                    row_count = result.sql_result.row_count(),
                    truncated = result.truncated,
                    elapsed_ms = result.execution_time_ms,
                    "Question answered"
                ),
                Err(e) => warn!(
                    category = ?e.category(),
                    error = %e,
                    "Question failed"
                ),
            }
            outcome
        }
        .instrument(span)
        .await
    }

    async fn run_session(
        &self,
        session: &mut dyn SqlSession,
        question: &str,
        start: Instant,
    ) -> PipelineResult<QueryResult> {
        let dialect = session.dialect();

        let schema = if self.agent.requires_schema() {
            session.describe_schema().await?
        } else {
            SchemaDescription::new()
        };
        debug!(stage = %Stage::SchemaLoaded, tables = schema.table_count(), "Schema ready");

        let mut trace = AgentTrace::new();
        let transcript = self
            .agent
            .generate(
                &GenerationRequest {
                    schema: &schema,
                    question,
                    dialect,
                },
                &mut trace,
            )
            .await?;
        debug!(stage = %Stage::AgentRun, bytes = transcript.as_str().len(), "Agent finished");

        let candidate = self.extract_candidate(&transcript)?;
        debug!(stage = %Stage::SqlExtracted, sql = %candidate.sql, valid = candidate.is_valid, "SQL extracted");

        if !candidate.is_valid {
            let reason = rejection_reason(&candidate.sql);
            warn!(sql = %candidate.sql, reason, "Rejected generated SQL");
            return Err(QueryError::unsafe_sql(candidate.sql, reason));
        }
        if self.options.statement_guard {
            check_single_query(&candidate.sql, dialect)?;
        }
        debug!(stage = %Stage::SqlValidated, "SQL accepted");

        let rows = session
            .fetch_rows(&candidate.sql, self.options.row_limit)
            .await?;
        let sql_result = SqlResult::from_rows(rows.rows);
        debug!(stage = %Stage::Executed, row_count = sql_result.row_count(), "Query executed");

        let (summary, warning) = match self
            .summarizer
            .summarize(question, &candidate.sql, &sql_result)
            .await
        {
            Ok(summary) => (Some(summary), None),
            Err(e) => {
                warn!(error = %e, "Continuing without summary");
                (None, Some(e.to_string()))
            }
        };
        debug!(stage = %Stage::Summarized, degraded = summary.is_none(), "Summary step finished");

        Ok(QueryResult {
            user_query: question.to_string(),
            sql_query: candidate.sql,
            sql_result,
            summary,
            diagnostic_trace: trace.render(),
            truncated: rows.truncated,
            warning,
            execution_time_ms: start.elapsed().as_millis() as u64,
        })
    }

    /// Extract and validate SQL from a transcript.
    ///
    /// When nothing is found, the same transcript is re-parsed once after
    /// normalization. No further model call is made.
    pub fn extract_candidate(&self, transcript: &AgentTranscript) -> PipelineResult<SqlCandidate> {
        let sql = match self.extractor.extract(transcript.as_str()) {
            Ok(sql) => sql,
            Err(QueryError::NoSqlFound { excerpt }) => {
                debug!(excerpt = %excerpt, "No SQL found, re-extracting");
                self.extractor
                    .reextract(transcript.as_str())
                    .map_err(|_| {
                        QueryError::sql_generation_failed(format!(
                            "no SQL statement in agent response: {}",
                            excerpt
                        ))
                    })?
            }
            Err(e) => return Err(e),
        };

        let is_valid = is_valid_sql(&sql);
        Ok(SqlCandidate { sql, is_valid })
    }

    /// Open a session and introspect the target's schema.
    pub async fn describe_target(&self, target: &DatabaseTarget) -> PipelineResult<SchemaDescription> {
        let mut session = self.provider.open(target).await?;
        let schema = session.describe_schema().await;
        session.close().await;
        schema
    }
}
