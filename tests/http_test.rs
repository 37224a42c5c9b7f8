//! HTTP boundary tests against a live axum server on an ephemeral port.

mod common;

use common::{ScriptedLlm, StubProvider, orchestrator, row};
use nl2sql_server::pipeline::{PipelineOptions, QuestionRecommender};
use nl2sql_server::transport::AppState;
use nl2sql_server::transport::http::router;
use serde_json::{Value, json};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;

/// Start a server and return its base URL.
async fn spawn_server(provider: &StubProvider, agent_reply: &str, llm_reply: &str) -> String {
    let llm = Arc::new(ScriptedLlm::replying(llm_reply));
    let state = Arc::new(AppState {
        orchestrator: Arc::new(orchestrator(
            provider,
            agent_reply,
            llm.clone(),
            PipelineOptions::default(),
        )),
        recommender: Arc::new(QuestionRecommender::new(llm)),
        request_timeout: Duration::from_secs(5),
    });

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router(state)).await.unwrap();
    });

    format!("http://{}", addr)
}

fn chat_body(dbname: &str, query: &str) -> Value {
    json!({
        "database_config": {
            "dbname": dbname,
            "host": "localhost",
            "user": "app",
            "password": "secret",
            "database": "shop"
        },
        "query_request": { "query": query }
    })
}

#[tokio::test]
async fn test_health() {
    let provider = StubProvider::new(Vec::new());
    let base = spawn_server(&provider, "unused", "unused").await;

    let response = reqwest::get(format!("{}/", base)).await.unwrap();
    assert_eq!(response.status(), 200);

    let body: Value = response.json().await.unwrap();
    assert_eq!(body["status"], "ok");
    assert_eq!(body["version"], env!("CARGO_PKG_VERSION"));
}

#[tokio::test]
async fn test_chat_success() {
    let provider = StubProvider::new(vec![row(json!({ "count": 42 }))]);
    let base = spawn_server(
        &provider,
        "```sql\nSELECT COUNT(*) AS count FROM users\n```",
        "There are 42 users.",
    )
    .await;

    let response = reqwest::Client::new()
        .post(format!("{}/chat", base))
        .json(&chat_body("postgresql", "How many users?"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);

    let body: Value = response.json().await.unwrap();
    assert_eq!(body["user_query"], "How many users?");
    assert_eq!(body["sql_query"], "SELECT COUNT(*) AS count FROM users");
    assert_eq!(body["sql_result"][0]["count"], 42);
    assert_eq!(body["summary"], "There are 42 users.");
    assert_eq!(body["truncated"], false);
}

#[tokio::test]
async fn test_chat_not_answerable_is_422() {
    let provider = StubProvider::new(Vec::new());
    let base = spawn_server(&provider, "I don't know", "unused").await;

    let response = reqwest::Client::new()
        .post(format!("{}/chat", base))
        .json(&chat_body("mysql", "What's the weather?"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 422);

    let body: Value = response.json().await.unwrap();
    assert_eq!(body["user_query"], "What's the weather?");
    assert_eq!(body["code"], "sql_generation_failed");
    assert_eq!(body["category"], "not_answerable");
    assert!(provider.executed().is_empty());
}

#[tokio::test]
async fn test_chat_unsafe_sql_is_422() {
    let provider = StubProvider::new(Vec::new());
    let base = spawn_server(&provider, "`DROP TABLE users`", "unused").await;

    let response = reqwest::Client::new()
        .post(format!("{}/chat", base))
        .json(&chat_body("mysql", "Drop everything"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 422);

    let body: Value = response.json().await.unwrap();
    assert_eq!(body["code"], "unsafe_or_invalid_sql");
    assert!(provider.executed().is_empty());
    assert!(provider.all_closed());
}

#[tokio::test]
async fn test_chat_unsupported_dialect_is_400() {
    let provider = StubProvider::new(Vec::new());
    let base = spawn_server(&provider, "unused", "unused").await;

    let response = reqwest::Client::new()
        .post(format!("{}/chat", base))
        .json(&chat_body("oracle", "How many users?"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 400);

    let body: Value = response.json().await.unwrap();
    assert_eq!(body["code"], "unsupported_dialect");
    assert_eq!(body["category"], "invalid_request");
}

#[tokio::test]
async fn test_chat_malformed_body_is_400() {
    let provider = StubProvider::new(Vec::new());
    let base = spawn_server(&provider, "unused", "unused").await;

    let response = reqwest::Client::new()
        .post(format!("{}/chat", base))
        .json(&json!({ "query_request": { "query": "hi" } }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 400);

    let body: Value = response.json().await.unwrap();
    assert_eq!(body["code"], "invalid_input");
}

#[tokio::test]
async fn test_chat_execution_error_is_502() {
    let provider = StubProvider::failing("relation \"userz\" does not exist");
    let base = spawn_server(&provider, "`SELECT * FROM userz`", "unused").await;

    let response = reqwest::Client::new()
        .post(format!("{}/chat", base))
        .json(&chat_body("postgresql", "List users"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 502);

    let body: Value = response.json().await.unwrap();
    assert_eq!(body["code"], "execution_error");
    assert_eq!(body["category"], "infrastructure");
    assert!(body["error"].as_str().unwrap().contains("userz"));
}

#[tokio::test]
async fn test_recommend_uses_model_questions() {
    let provider = StubProvider::new(Vec::new());
    let reply = r#"Here you go: ["How many users?", "Total order value?", "Top customers?", "Orders per user?", "Newest user?"]"#;
    let base = spawn_server(&provider, "unused", reply).await;

    let response = reqwest::Client::new()
        .post(format!("{}/recommend", base))
        .json(&json!({
            "database_config": {
                "dbname": "mysql",
                "host": "localhost",
                "user": "app",
                "password": "secret",
                "database": "shop"
            }
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);

    let body: Value = response.json().await.unwrap();
    let questions = body["recommended_queries"].as_array().unwrap();
    assert_eq!(questions.len(), 5);
    assert_eq!(questions[0], "How many users?");
    assert!(provider.all_closed());
}
