//! NL-to-SQL Server - Main entry point.
//!
//! Serves the HTTP API by default, or answers a single question with `ask`.

use clap::Parser;
use nl2sql_server::config::{Command, Config};
use nl2sql_server::db::SqlxConnectionProvider;
use nl2sql_server::llm::{LlmClient, OpenAiCompatibleClient};
use nl2sql_server::models::DatabaseTarget;
use nl2sql_server::pipeline::{LlmQueryAgent, QueryOrchestrator, QuestionRecommender, Summarizer};
use nl2sql_server::transport::{AppState, HttpTransport, StdioTransport, Transport};
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Initialize the tracing subscriber for logging.
///
/// Logs always go to stderr so `ask` output on stdout stays machine-readable.
fn init_tracing(config: &Config) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    let subscriber = tracing_subscriber::registry().with(filter);

    if config.json_logs {
        subscriber
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        subscriber
            .with(
                fmt::layer()
                    .with_target(true)
                    .with_thread_ids(false)
                    .with_writer(std::io::stderr),
            )
            .init();
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv::dotenv().ok();

    let config = Config::parse();
    init_tracing(&config);
    config.validate()?;

    let llm_config = config.llm_config()?;
    let client: Arc<dyn LlmClient> = Arc::new(OpenAiCompatibleClient::new(llm_config)?);

    info!(
        model = client.model_name(),
        row_limit = config.effective_row_limit(),
        statement_guard = config.statement_guard,
        "Starting NL-to-SQL Server v{}",
        env!("CARGO_PKG_VERSION")
    );

    let provider = Arc::new(SqlxConnectionProvider::new(
        config.connect_timeout_duration(),
    ));
    let agent = Arc::new(LlmQueryAgent::new(client.clone()).with_temperature(config.llm_temperature));
    let orchestrator = Arc::new(QueryOrchestrator::new(
        provider,
        agent,
        Summarizer::new(client.clone()),
        config.pipeline_options(),
    ));

    let result = match config.command() {
        Command::Serve => {
            let state = Arc::new(AppState {
                orchestrator,
                recommender: Arc::new(QuestionRecommender::new(client)),
                request_timeout: config.request_timeout_duration(),
            });
            let transport = HttpTransport::new(state, &config.http_host, config.http_port);
            info!(transport = transport.name(), "Using transport");
            transport.run().await
        }
        Command::Ask {
            database_url,
            question,
        } => {
            let target = DatabaseTarget::from_url(&database_url)?;
            let transport = StdioTransport::new(
                orchestrator,
                target,
                question,
                config.request_timeout_duration(),
            );
            info!(transport = transport.name(), "Using transport");
            transport.run().await
        }
    };

    if let Err(e) = result {
        error!(error = %e, code = e.code(), "Server error");
        return Err(e.into());
    }

    info!("Shutdown complete");
    Ok(())
}
