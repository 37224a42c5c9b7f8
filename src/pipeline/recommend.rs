//! Question Recommender.
//!
//! Suggests natural-language questions a user might ask about a schema. The
//! model is asked for a JSON array; when its reply is unusable, questions are
//! generated from the schema itself.

use crate::llm::{ChatMessage, CompletionRequest, LlmClient};
use crate::models::SchemaDescription;
use regex::Regex;
use std::sync::{Arc, LazyLock};
use tracing::{debug, warn};

/// Number of questions requested from the model.
pub const RECOMMENDATION_COUNT: usize = 5;

static JSON_ARRAY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)\[.*\]").expect("array regex is valid"));

pub struct QuestionRecommender {
    client: Arc<dyn LlmClient>,
    temperature: f32,
}

impl QuestionRecommender {
    pub fn new(client: Arc<dyn LlmClient>) -> Self {
        Self {
            client,
            temperature: 0.7,
        }
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    /// Recommend questions for `schema`. Never fails; falls back to templates.
    pub async fn recommend(&self, schema: &SchemaDescription) -> Vec<String> {
        let request = CompletionRequest::new(vec![
            ChatMessage::system(
                "You are a database expert that helps generate natural language queries.",
            ),
            ChatMessage::user(recommendation_prompt(schema)),
        ])
        .with_temperature(self.temperature)
        .with_max_tokens(1024);

        match self.client.complete(request).await {
            Ok(reply) => match parse_recommendations(&reply) {
                Some(questions) => {
                    debug!(count = questions.len(), "Parsed recommended questions");
                    return questions;
                }
                None => warn!("Model reply contained no usable questions, using templates"),
            },
            Err(e) => warn!(error = %e, "Recommendation request failed, using templates"),
        }

        template_questions(schema)
    }
}

fn recommendation_prompt(schema: &SchemaDescription) -> String {
    format!(
        "Given the following database schema:\n{}\n\n\
         Generate {} natural language queries that a business user might ask about this database.\n\
         Return them as a JSON array of strings. Each query should be clear and answerable using SQL.",
        schema.render(),
        RECOMMENDATION_COUNT,
    )
}

/// Parse a model reply: JSON array, then the first `[...]` region, then one
/// question per non-empty line.
pub fn parse_recommendations(reply: &str) -> Option<Vec<String>> {
    let questions = parse_json_array(reply.trim())
        .or_else(|| JSON_ARRAY.find(reply).and_then(|m| parse_json_array(m.as_str())))
        .unwrap_or_else(|| {
            reply
                .lines()
                .map(|line| line.trim().trim_matches(|c| c == '"' || c == '\'').trim())
                .filter(|line| !line.is_empty())
                .map(str::to_string)
                .collect()
        });

    if questions.is_empty() {
        None
    } else {
        Some(questions)
    }
}

fn parse_json_array(text: &str) -> Option<Vec<String>> {
    let values: Vec<serde_json::Value> = serde_json::from_str(text).ok()?;
    Some(
        values
            .into_iter()
            .filter_map(|v| match v {
                serde_json::Value::String(s) => Some(s.trim().to_string()),
                _ => None,
            })
            .filter(|s| !s.is_empty())
            .collect(),
    )
}

/// Questions derived directly from table and column names.
pub fn template_questions(schema: &SchemaDescription) -> Vec<String> {
    let mut questions = Vec::new();

    for (table, columns) in schema.tables() {
        questions.push(format!(
            "What are the details of all records in the '{table}' table?"
        ));
        questions.push(format!(
            "Show me all {} from the '{table}' table.",
            columns.join(", ")
        ));
        for column in columns {
            questions.push(format!("Give me the {column} from the '{table}' table."));
        }
        if columns.len() > 1 {
            questions.push(format!(
                "What is the average {} in the '{table}' table?",
                columns[0]
            ));
            questions.push(format!(
                "How many records are there in the '{table}' table?"
            ));
        }
    }

    questions
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::LlmError;
    use async_trait::async_trait;

    struct FixedClient(Option<&'static str>);

    #[async_trait]
    impl LlmClient for FixedClient {
        async fn complete(&self, _request: CompletionRequest) -> Result<String, LlmError> {
            self.0
                .map(str::to_string)
                .ok_or_else(|| LlmError::api_error(503, "unavailable"))
        }

        fn model_name(&self) -> &str {
            "fixed"
        }
    }

    fn schema() -> SchemaDescription {
        [("users", vec!["id", "name"]), ("logs", vec!["line"])]
            .into_iter()
            .collect()
    }

    #[test]
    fn test_parse_plain_json() {
        let parsed = parse_recommendations(r#"["How many users?", "List orders"]"#).unwrap();
        assert_eq!(parsed, vec!["How many users?", "List orders"]);
    }

    #[test]
    fn test_parse_embedded_json() {
        let reply = "Sure! Here you go:\n[\"Top customers?\", \"Total revenue?\"]\nEnjoy.";
        assert_eq!(
            parse_recommendations(reply).unwrap(),
            vec!["Top customers?", "Total revenue?"]
        );
    }

    #[test]
    fn test_parse_lines() {
        let reply = "\"Who signed up last week?\"\n\n'Which plan is most popular?'\n";
        assert_eq!(
            parse_recommendations(reply).unwrap(),
            vec!["Who signed up last week?", "Which plan is most popular?"]
        );
    }

    #[test]
    fn test_parse_blank_reply() {
        assert!(parse_recommendations("  \n ").is_none());
    }

    #[test]
    fn test_template_questions() {
        let questions = template_questions(&schema());
        // logs: 2 + 1 column; users: 2 + 2 columns + 2
        assert_eq!(questions.len(), 9);
        assert_eq!(
            questions[0],
            "What are the details of all records in the 'logs' table?"
        );
        assert!(questions.contains(&"What is the average id in the 'users' table?".to_string()));
        assert!(questions.contains(&"Show me all id, name from the 'users' table.".to_string()));
    }

    #[tokio::test]
    async fn test_recommend_uses_model_reply() {
        let recommender = QuestionRecommender::new(Arc::new(FixedClient(Some(
            r#"["a?", "b?", "c?", "d?", "e?"]"#,
        ))));
        assert_eq!(recommender.recommend(&schema()).await.len(), 5);
    }

    #[tokio::test]
    async fn test_recommend_falls_back_to_templates() {
        let recommender = QuestionRecommender::new(Arc::new(FixedClient(None)));
        let questions = recommender.recommend(&schema()).await;
        assert_eq!(questions, template_questions(&schema()));
    }
}
