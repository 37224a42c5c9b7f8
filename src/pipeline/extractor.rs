//! SQL Extractor.
//!
//! Pulls one candidate statement out of a free-form agent transcript. Sources
//! are tried in a fixed order and the first hit wins:
//!
//! 1. a purely numeric transcript is rejected outright
//! 2. a fenced code block tagged `sql`
//! 3. an inline code span in single backticks
//! 4. a keyword scan (`SELECT`, `INSERT`, ... in that order) up to end of text
//! 5. optionally, the whole transcript if any keyword appears as a word
//!
//! The extractor never judges safety; that is the validator's job.

use crate::error::{PipelineResult, QueryError};
use regex::Regex;
use std::sync::LazyLock;

/// Keywords scanned for, in priority order.
pub const SQL_KEYWORDS: [&str; 8] = [
    "SELECT", "INSERT", "UPDATE", "DELETE", "CREATE", "ALTER", "DROP", "SHOW",
];

static NUMERIC_ONLY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[0-9.]+$").expect("numeric regex is valid"));

static SQL_FENCE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)```(?i:sql)\b\s*(.*?)\s*```").expect("fence regex is valid")
});

static INLINE_SPAN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"`([^`]+)`").expect("inline span regex is valid"));

static KEYWORD_TAILS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    SQL_KEYWORDS
        .iter()
        .map(|kw| Regex::new(&format!(r"(?is)\b{kw}\s+.*")).expect("keyword regex is valid"))
        .collect()
});

static ANY_KEYWORD: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(r"(?i)\b(?:{})\b", SQL_KEYWORDS.join("|")))
        .expect("keyword regex is valid")
});

static FINAL_ANSWER_LABEL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^\s*final\s+answer\s*:\s*").expect("label regex is valid")
});

/// True when the trimmed text consists only of digits and dots.
pub fn is_numeric_only(text: &str) -> bool {
    NUMERIC_ONLY.is_match(text.trim())
}

/// Extracts candidate SQL from agent transcripts.
#[derive(Debug, Clone, Copy)]
pub struct SqlExtractor {
    keyword_fallback: bool,
}

impl Default for SqlExtractor {
    fn default() -> Self {
        Self {
            keyword_fallback: true,
        }
    }
}

impl SqlExtractor {
    /// `keyword_fallback` enables step 5: returning the whole transcript when
    /// a keyword appears anywhere but no statement could be isolated.
    pub fn new(keyword_fallback: bool) -> Self {
        Self { keyword_fallback }
    }

    /// Extract one SQL statement or fail with `NoSqlFound`.
    pub fn extract(&self, transcript: &str) -> PipelineResult<String> {
        if is_numeric_only(transcript) {
            return Err(QueryError::no_sql_found(transcript));
        }

        if let Some(caps) = SQL_FENCE.captures(transcript) {
            let sql = caps[1].trim();
            if !sql.is_empty() {
                return Ok(sql.to_string());
            }
        }

        if let Some(sql) = INLINE_SPAN
            .captures_iter(transcript)
            .map(|caps| caps.get(1).map_or("", |m| m.as_str()).trim())
            .find(|s| !s.is_empty())
        {
            return Ok(sql.to_string());
        }

        for re in KEYWORD_TAILS.iter() {
            if let Some(m) = re.find(transcript) {
                return Ok(m.as_str().trim().to_string());
            }
        }

        if self.keyword_fallback && ANY_KEYWORD.is_match(transcript) {
            return Ok(transcript.trim().to_string());
        }

        Err(QueryError::no_sql_found(transcript))
    }

    /// Second attempt over a cleaned-up copy of the same transcript.
    pub fn reextract(&self, transcript: &str) -> PipelineResult<String> {
        self.extract(&normalize_transcript(transcript))
    }
}

/// Normalize line endings, undo literal `\n`/`\t`/`\"` escapes, drop a
/// leading `Final Answer:` label and strip quotes wrapping the whole text.
pub fn normalize_transcript(transcript: &str) -> String {
    let text = transcript
        .replace("\r\n", "\n")
        .replace("\\r\\n", "\n")
        .replace("\\n", "\n")
        .replace("\\t", " ")
        .replace("\\\"", "\"");
    let text = FINAL_ANSWER_LABEL.replace(&text, "");
    let mut text = text.trim();

    loop {
        let stripped = ['"', '\'']
            .iter()
            .find_map(|q| text.strip_prefix(*q).and_then(|t| t.strip_suffix(*q)));
        match stripped {
            Some(inner) => text = inner.trim(),
            None => break,
        }
    }

    text.to_string()
}

/// Extract with the default (permissive) extractor.
pub fn extract_sql(transcript: &str) -> PipelineResult<String> {
    SqlExtractor::default().extract(transcript)
}
