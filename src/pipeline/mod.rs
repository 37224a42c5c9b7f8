//! The NL-to-SQL pipeline.
//!
//! Pure stages (extractor, validator, guard) have no I/O. The agent,
//! summarizer and recommender talk to the language model; the orchestrator
//! ties everything to a database session.

pub mod agent;
pub mod extractor;
pub mod guard;
pub mod orchestrator;
pub mod recommend;
pub mod summarizer;
pub mod trace;
pub mod validator;

pub use agent::{GenerationRequest, LlmQueryAgent, QueryAgent};
pub use extractor::{SqlExtractor, extract_sql};
pub use orchestrator::{PipelineOptions, QueryOrchestrator, Stage};
pub use recommend::QuestionRecommender;
pub use summarizer::Summarizer;
pub use trace::{AgentTrace, TraceSink};
pub use validator::is_valid_sql;
