//! Query Agent Driver.
//!
//! The agent turns a question plus schema into a free-text transcript that
//! should contain one SQL statement. Its output is untrusted; extraction and
//! validation happen downstream.

use crate::error::PipelineResult;
use crate::llm::{ChatMessage, CompletionRequest, LlmClient};
use crate::models::{AgentTranscript, Dialect, SchemaDescription};
use crate::pipeline::trace::TraceSink;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::debug;

/// Inputs for one generation call.
#[derive(Debug, Clone, Copy)]
pub struct GenerationRequest<'a> {
    /// Empty when the agent does not require a schema
    pub schema: &'a SchemaDescription,
    pub question: &'a str,
    pub dialect: Dialect,
}

#[async_trait]
pub trait QueryAgent: Send + Sync {
    /// Whether the orchestrator must introspect the schema before calling
    /// [`QueryAgent::generate`].
    fn requires_schema(&self) -> bool {
        true
    }

    /// Produce a transcript for the question, writing diagnostics to `trace`.
    async fn generate(
        &self,
        request: &GenerationRequest<'_>,
        trace: &mut dyn TraceSink,
    ) -> PipelineResult<AgentTranscript>;
}

/// Instruction template sent with every question.
pub fn generation_prompt(question: &str, dialect: Dialect) -> String {
    format!(
        "For the following question, generate a valid SQL query to answer it.\n\
         Question: \"{question}\"\n\n\
         You must return a valid SQL query that would run in {dialect}.\n\
         The query must start with SELECT: only read operations are allowed.\n\
         If you cannot find the answer, return \"I don't know\".\n\
         Do not include explanations, markdown formatting or anything else, only the SQL query itself.",
        dialect = dialect.display_name(),
    )
}

/// System message describing the database.
pub fn schema_message(schema: &SchemaDescription, dialect: Dialect) -> String {
    if schema.is_empty() {
        return format!(
            "You are an expert {} analyst. The database has no visible tables.",
            dialect.display_name()
        );
    }
    format!(
        "You are an expert {} analyst. The database has these tables, given as table(columns):\n{}",
        dialect.display_name(),
        schema.render()
    )
}

/// Agent backed by a single chat completion call.
pub struct LlmQueryAgent {
    client: Arc<dyn LlmClient>,
    temperature: f32,
    max_tokens: u32,
}

impl LlmQueryAgent {
    pub fn new(client: Arc<dyn LlmClient>) -> Self {
        Self {
            client,
            temperature: 0.0,
            max_tokens: 1024,
        }
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }
}

#[async_trait]
impl QueryAgent for LlmQueryAgent {
    async fn generate(
        &self,
        request: &GenerationRequest<'_>,
        trace: &mut dyn TraceSink,
    ) -> PipelineResult<AgentTranscript> {
        let system = schema_message(request.schema, request.dialect);
        let prompt = generation_prompt(request.question, request.dialect);

        trace.record("schema", &system);
        trace.record("prompt", &prompt);

        debug!(
            model = %self.client.model_name(),
            tables = request.schema.table_count(),
            "Requesting SQL from model"
        );

        let completion = CompletionRequest::new(vec![
            ChatMessage::system(system),
            ChatMessage::user(prompt),
        ])
        .with_temperature(self.temperature)
        .with_max_tokens(self.max_tokens);

        let reply = self.client.complete(completion).await?;
        trace.record("response", &reply);

        Ok(AgentTranscript::from(reply))
    }
}
