//! SQL Safety Validator.
//!
//! The read-only gate: a statement is accepted only if it starts with
//! `SELECT` and looks like a real query. Rejection is a plain `false`; the
//! orchestrator decides what to do with it.

use crate::pipeline::extractor::is_numeric_only;
use regex::Regex;
use std::sync::LazyLock;

static LEADING_SELECT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^SELECT\b").expect("select regex is valid"));

// Checked after the leading SELECT, so a bare `SELECT 1` has nothing to match.
static QUERY_CLAUSE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(SELECT|FROM|WHERE|JOIN|GROUP\s+BY|ORDER\s+BY|HAVING|LIMIT)\b")
        .expect("clause regex is valid")
});

/// Decide whether `sql` may be executed.
pub fn is_valid_sql(sql: &str) -> bool {
    let sql = sql.trim();

    if is_numeric_only(sql) {
        return false;
    }

    let Some(select) = LEADING_SELECT.find(sql) else {
        return false;
    };

    QUERY_CLAUSE.is_match(&sql[select.end()..])
}

/// Human-readable reason for a rejection, for error messages.
pub fn rejection_reason(sql: &str) -> &'static str {
    let sql = sql.trim();
    if is_numeric_only(sql) {
        "numeric value instead of a query"
    } else if !LEADING_SELECT.is_match(sql) {
        "only SELECT statements are allowed"
    } else {
        "statement does not look like a query"
    }
}
