//! Shared stubs for integration tests.
//!
//! The stubs record what the pipeline did so tests can assert that rejected
//! SQL never reached the database and that every session was closed.

#![allow(dead_code)]

use async_trait::async_trait;
use nl2sql_server::db::{ConnectionProvider, RowSet, SqlSession};
use nl2sql_server::error::{PipelineResult, QueryError};
use nl2sql_server::llm::{CompletionRequest, LlmClient, LlmError};
use nl2sql_server::models::{AgentTranscript, DatabaseTarget, Dialect, Row, SchemaDescription};
use nl2sql_server::pipeline::{
    GenerationRequest, PipelineOptions, QueryAgent, QueryOrchestrator, Summarizer, TraceSink,
};
use serde_json::Value;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// What happened to the sessions opened by a [`StubProvider`].
#[derive(Debug, Default)]
pub struct SessionLog {
    pub opened: usize,
    pub closed: usize,
    pub executed: Vec<String>,
}

#[derive(Clone)]
pub struct StubProvider {
    pub schema: SchemaDescription,
    pub rows: Vec<Row>,
    pub execution_error: Option<String>,
    pub introspection_error: Option<String>,
    pub log: Arc<Mutex<SessionLog>>,
}

impl StubProvider {
    pub fn new(rows: Vec<Row>) -> Self {
        Self {
            schema: shop_schema(),
            rows,
            execution_error: None,
            introspection_error: None,
            log: Arc::new(Mutex::new(SessionLog::default())),
        }
    }

    pub fn failing(message: &str) -> Self {
        Self {
            execution_error: Some(message.to_string()),
            ..Self::new(Vec::new())
        }
    }

    pub fn introspection_failing(message: &str) -> Self {
        Self {
            introspection_error: Some(message.to_string()),
            ..Self::new(Vec::new())
        }
    }

    pub fn executed(&self) -> Vec<String> {
        self.log.lock().unwrap().executed.clone()
    }

    pub fn all_closed(&self) -> bool {
        let log = self.log.lock().unwrap();
        log.opened > 0 && log.opened == log.closed
    }
}

#[async_trait]
impl ConnectionProvider for StubProvider {
    async fn open(&self, target: &DatabaseTarget) -> PipelineResult<Box<dyn SqlSession>> {
        self.log.lock().unwrap().opened += 1;
        Ok(Box::new(StubSession {
            dialect: target.dialect,
            provider: self.clone(),
            closed: false,
        }))
    }
}

struct StubSession {
    dialect: Dialect,
    provider: StubProvider,
    closed: bool,
}

#[async_trait]
impl SqlSession for StubSession {
    fn dialect(&self) -> Dialect {
        self.dialect
    }

    async fn describe_schema(&mut self) -> PipelineResult<SchemaDescription> {
        match &self.provider.introspection_error {
            Some(message) => Err(QueryError::introspection(message.clone())),
            None => Ok(self.provider.schema.clone()),
        }
    }

    async fn fetch_rows(&mut self, sql: &str, row_limit: u32) -> PipelineResult<RowSet> {
        self.provider
            .log
            .lock()
            .unwrap()
            .executed
            .push(sql.to_string());

        if let Some(message) = &self.provider.execution_error {
            return Err(QueryError::execution(message.clone(), Some("42P01".into())));
        }

        let limit = row_limit as usize;
        let truncated = self.provider.rows.len() > limit;
        Ok(RowSet {
            rows: self.provider.rows.iter().take(limit).cloned().collect(),
            truncated,
        })
    }

    async fn close(&mut self) {
        if !self.closed {
            self.closed = true;
            self.provider.log.lock().unwrap().closed += 1;
        }
    }
}

/// Agent that always replies with the same transcript.
pub struct ScriptedAgent {
    pub reply: String,
}

impl ScriptedAgent {
    pub fn new(reply: impl Into<String>) -> Self {
        Self {
            reply: reply.into(),
        }
    }
}

#[async_trait]
impl QueryAgent for ScriptedAgent {
    async fn generate(
        &self,
        request: &GenerationRequest<'_>,
        trace: &mut dyn TraceSink,
    ) -> PipelineResult<AgentTranscript> {
        trace.record("schema", &request.schema.render());
        trace.record("response", &self.reply);
        Ok(AgentTranscript::new(self.reply.clone()))
    }
}

/// LLM that returns a fixed reply, or fails when none is set.
pub struct ScriptedLlm {
    reply: Option<String>,
    pub calls: AtomicUsize,
}

impl ScriptedLlm {
    pub fn replying(reply: impl Into<String>) -> Self {
        Self {
            reply: Some(reply.into()),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn failing() -> Self {
        Self {
            reply: None,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl LlmClient for ScriptedLlm {
    async fn complete(&self, _request: CompletionRequest) -> Result<String, LlmError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.reply
            .clone()
            .ok_or_else(|| LlmError::api_error(503, "model unavailable"))
    }

    fn model_name(&self) -> &str {
        "scripted"
    }
}

pub fn shop_schema() -> SchemaDescription {
    let mut schema = SchemaDescription::new();
    schema.insert_table(
        "users",
        vec!["id".to_string(), "name".to_string(), "email".to_string()],
    );
    schema.insert_table(
        "orders",
        vec!["id".to_string(), "user_id".to_string(), "total".to_string()],
    );
    schema
}

pub fn row(value: Value) -> Row {
    value.as_object().cloned().unwrap_or_default()
}

pub fn target(dialect: Dialect) -> DatabaseTarget {
    DatabaseTarget::new(dialect, "localhost", "app", "secret", "shop").unwrap()
}

pub fn orchestrator(
    provider: &StubProvider,
    agent_reply: &str,
    llm: Arc<ScriptedLlm>,
    options: PipelineOptions,
) -> QueryOrchestrator {
    QueryOrchestrator::new(
        Arc::new(provider.clone()),
        Arc::new(ScriptedAgent::new(agent_reply)),
        Summarizer::new(llm),
        options,
    )
}
