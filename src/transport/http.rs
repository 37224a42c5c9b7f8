//! HTTP transport for the NL-to-SQL server.
//!
//! Routes:
//! - `GET /` health check
//! - `POST /chat` answer a question against the given database
//! - `POST /recommend` suggest questions for the given database

use crate::error::{ErrorCategory, PipelineResult, QueryError};
use crate::models::{DatabaseTarget, Dialect, QueryResult};
use crate::pipeline::{QueryOrchestrator, QuestionRecommender};
use crate::transport::{ErrorBody, Transport};
use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::{Value, json};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::signal;
use tracing::{error, info, warn};

/// Shared handler state.
pub struct AppState {
    pub orchestrator: Arc<QueryOrchestrator>,
    pub recommender: Arc<QuestionRecommender>,
    /// Overall deadline for one request
    pub request_timeout: Duration,
}

/// Database credentials as sent by clients.
#[derive(Deserialize)]
pub struct DatabaseConfig {
    /// Database type: "mysql" or "postgresql"
    pub dbname: String,
    pub host: String,
    pub user: String,
    #[serde(default)]
    pub password: String,
    pub database: String,
}

impl DatabaseConfig {
    pub fn to_target(&self) -> PipelineResult<DatabaseTarget> {
        let dialect: Dialect = self.dbname.parse()?;
        DatabaseTarget::new(
            dialect,
            &self.host,
            &self.user,
            &self.password,
            &self.database,
        )
    }
}

#[derive(Deserialize)]
pub struct QueryRequest {
    pub query: String,
}

#[derive(Deserialize)]
pub struct ChatRequest {
    pub database_config: DatabaseConfig,
    pub query_request: QueryRequest,
}

#[derive(Deserialize)]
pub struct RecommendRequest {
    pub database_config: DatabaseConfig,
}

/// A pipeline error on its way to the client.
#[derive(Debug)]
pub struct ApiError {
    error: QueryError,
    user_query: Option<String>,
}

impl ApiError {
    pub fn new(error: QueryError) -> Self {
        Self {
            error,
            user_query: None,
        }
    }

    pub fn with_query(mut self, query: impl Into<String>) -> Self {
        self.user_query = Some(query.into());
        self
    }
}

impl From<QueryError> for ApiError {
    fn from(error: QueryError) -> Self {
        Self::new(error)
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::new(QueryError::invalid_input(rejection.body_text()))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = status_for(&self.error);
        if status.is_server_error() {
            warn!(status = status.as_u16(), code = self.error.code(), error = %self.error, "Request failed");
        } else {
            info!(status = status.as_u16(), code = self.error.code(), "Request rejected");
        }

        let body = ErrorBody::new(&self.error, self.user_query.as_deref());
        (status, Json(body)).into_response()
    }
}

/// HTTP status for a pipeline error.
pub fn status_for(err: &QueryError) -> StatusCode {
    match err {
        QueryError::Timeout { .. } => StatusCode::GATEWAY_TIMEOUT,
        QueryError::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        _ => match err.category() {
            ErrorCategory::NotAnswerable => StatusCode::UNPROCESSABLE_ENTITY,
            ErrorCategory::InvalidRequest => StatusCode::BAD_REQUEST,
            ErrorCategory::Infrastructure => StatusCode::BAD_GATEWAY,
        },
    }
}

/// Run `fut` under the request deadline.
async fn with_deadline<T>(
    deadline: Duration,
    fut: impl Future<Output = PipelineResult<T>>,
) -> PipelineResult<T> {
    tokio::time::timeout(deadline, fut)
        .await
        .map_err(|_| QueryError::timeout("request", deadline.as_secs()))?
}

/// Build the axum router.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(health))
        .route("/chat", post(chat))
        .route("/recommend", post(recommend))
        .with_state(state)
}

async fn health() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

async fn chat(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<ChatRequest>, JsonRejection>,
) -> Result<Json<QueryResult>, ApiError> {
    let Json(request) = payload?;
    let question = request.query_request.query;

    let target = request
        .database_config
        .to_target()
        .map_err(|e| ApiError::new(e).with_query(&question))?;

    let result = with_deadline(
        state.request_timeout,
        state.orchestrator.run(&target, &question),
    )
    .await
    .map_err(|e| ApiError::new(e).with_query(&question))?;

    Ok(Json(result))
}

async fn recommend(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<RecommendRequest>, JsonRejection>,
) -> Result<Json<Value>, ApiError> {
    let Json(request) = payload?;
    let target = request.database_config.to_target()?;

    let questions = with_deadline(state.request_timeout, async {
        let schema = state.orchestrator.describe_target(&target).await?;
        Ok(state.recommender.recommend(&schema).await)
    })
    .await?;

    Ok(Json(json!({ "recommended_queries": questions })))
}

/// HTTP transport implementation.
pub struct HttpTransport {
    state: Arc<AppState>,
    /// Host to bind to
    host: String,
    /// Port to bind to
    port: u16,
}

impl HttpTransport {
    pub fn new(state: Arc<AppState>, host: impl Into<String>, port: u16) -> Self {
        Self {
            state,
            host: host.into(),
            port,
        }
    }

    /// Get the bind address.
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Transport for HttpTransport {
    async fn run(&self) -> PipelineResult<()> {
        let bind_addr = self.bind_addr();
        info!("Starting HTTP server on {}", bind_addr);

        let app = router(self.state.clone());

        let listener = TcpListener::bind(&bind_addr).await.map_err(|e| {
            QueryError::internal(format!("Failed to bind to {}: {}", bind_addr, e))
        })?;

        // In-flight requests get a bounded time to finish after the first signal
        const GRACEFUL_TIMEOUT: Duration = Duration::from_secs(30);

        let shutdown_notify = Arc::new(tokio::sync::Notify::new());
        let shutdown_notify_clone = shutdown_notify.clone();

        let shutdown_signal = async move {
            wait_for_signal().await;
            shutdown_notify_clone.notify_one();
        };

        let server = axum::serve(listener, app).with_graceful_shutdown(shutdown_signal);

        tokio::select! {
            result = server => {
                match result {
                    Ok(()) => info!("HTTP server stopped"),
                    Err(e) => {
                        error!(error = %e, "HTTP server error");
                        return Err(QueryError::internal(format!("HTTP server error: {}", e)));
                    }
                }
            }
            _ = async {
                shutdown_notify.notified().await;
                info!(
                    timeout_secs = GRACEFUL_TIMEOUT.as_secs(),
                    "Waiting for requests to finish (send signal again to force exit)..."
                );

                tokio::select! {
                    _ = tokio::time::sleep(GRACEFUL_TIMEOUT) => {
                        warn!("Graceful shutdown timeout, forcing exit");
                    }
                    _ = wait_for_signal() => {
                        warn!("Received second signal, forcing immediate exit");
                    }
                }
            } => {}
        }

        Ok(())
    }

    fn name(&self) -> &'static str {
        "http"
    }
}

/// Wait for a shutdown signal (SIGINT or SIGTERM).
async fn wait_for_signal() {
    let ctrl_c = signal::ctrl_c();

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received SIGINT"),
        _ = terminate => info!("Received SIGTERM"),
    }
}
