//! Randomized tests for SQL extraction, validation and the statement guard.
//!
//! Each test generates many inputs and checks a property that must hold for
//! all of them.

use nl2sql_server::error::QueryError;
use nl2sql_server::models::Dialect;
use nl2sql_server::pipeline::extractor::{SqlExtractor, extract_sql, normalize_transcript};
use nl2sql_server::pipeline::guard::check_single_query;
use nl2sql_server::pipeline::is_valid_sql;
use rand::Rng;
use rand::distributions::Alphanumeric;
use rand::seq::SliceRandom;

const ITERATIONS: usize = 200;

const PROSE_WORDS: &[&str] = &[
    "the", "answer", "is", "based", "on", "your", "tables", "here", "query", "should", "work",
    "I", "think", "this", "returns", "what", "you", "asked", "for",
];

const WRITE_KEYWORDS: &[&str] = &[
    "INSERT INTO", "UPDATE", "DELETE FROM", "DROP TABLE", "CREATE TABLE", "ALTER TABLE", "SHOW",
    "TRUNCATE", "GRANT ALL ON",
];

fn identifier(rng: &mut impl Rng) -> String {
    let len = rng.gen_range(1..8);
    let suffix: String = (0..len).map(|_| char::from(rng.sample(Alphanumeric))).collect();
    format!("c_{}", suffix.to_lowercase())
}

fn prose(rng: &mut impl Rng) -> String {
    (0..rng.gen_range(0..12))
        .map(|_| *PROSE_WORDS.choose(rng).unwrap())
        .collect::<Vec<_>>()
        .join(" ")
}

fn select_statement(rng: &mut impl Rng) -> String {
    let columns: Vec<String> = (0..rng.gen_range(1..4)).map(|_| identifier(rng)).collect();
    let mut sql = format!("SELECT {} FROM {}", columns.join(", "), identifier(rng));
    if rng.gen_bool(0.5) {
        sql.push_str(&format!(" WHERE {} > {}", columns[0], rng.gen_range(0..1000)));
    }
    if rng.gen_bool(0.3) {
        sql.push_str(&format!(" LIMIT {}", rng.gen_range(1..100)));
    }
    sql
}

#[test]
fn test_numeric_transcripts_never_yield_sql() {
    let mut rng = rand::thread_rng();
    for _ in 0..ITERATIONS {
        let len = rng.gen_range(1..20);
        let text: String = (0..len)
            .map(|_| *[b'0', b'1', b'5', b'9', b'.'].choose(&mut rng).unwrap() as char)
            .collect();
        let padded = format!("{}{}\n", " ".repeat(rng.gen_range(0..3)), text);

        let result = extract_sql(&padded);
        assert!(
            matches!(result, Err(QueryError::NoSqlFound { .. })),
            "numeric transcript {padded:?} produced {result:?}"
        );
    }
}

#[test]
fn test_fenced_block_wins_over_other_sources() {
    let mut rng = rand::thread_rng();
    for _ in 0..ITERATIONS {
        let fenced = select_statement(&mut rng);
        let decoy = format!("DELETE FROM {}", identifier(&mut rng));
        let tag = *["sql", "SQL", "Sql"].choose(&mut rng).unwrap();
        let transcript = format!(
            "{} `{}` {}\n```{}\n{}\n```\n{}",
            prose(&mut rng),
            decoy,
            prose(&mut rng),
            tag,
            fenced,
            prose(&mut rng)
        );

        assert_eq!(extract_sql(&transcript).unwrap(), fenced, "{transcript:?}");
    }
}

#[test]
fn test_extraction_is_idempotent_on_clean_select() {
    let mut rng = rand::thread_rng();
    for _ in 0..ITERATIONS {
        let sql = select_statement(&mut rng);
        let transcript = format!("{}\n```sql\n{}\n```", prose(&mut rng), sql);

        let first = extract_sql(&transcript).unwrap();
        let second = extract_sql(&first).unwrap();
        assert_eq!(first, second);
    }
}

#[test]
fn test_generated_selects_are_valid_and_pass_guard() {
    let mut rng = rand::thread_rng();
    for _ in 0..ITERATIONS {
        let sql = select_statement(&mut rng);
        assert!(is_valid_sql(&sql), "{sql}");
        for dialect in [Dialect::MySql, Dialect::Postgres] {
            assert!(check_single_query(&sql, dialect).is_ok(), "{sql}");
        }
    }
}

#[test]
fn test_statements_not_starting_with_select_are_invalid() {
    let mut rng = rand::thread_rng();
    for _ in 0..ITERATIONS {
        let keyword = *WRITE_KEYWORDS.choose(&mut rng).unwrap();
        // Embedding a SELECT later must not rescue the statement
        let sql = format!(
            "{}{} {} SELECT * FROM {}",
            " ".repeat(rng.gen_range(0..2)),
            keyword,
            identifier(&mut rng),
            identifier(&mut rng)
        );
        assert!(!is_valid_sql(&sql), "{sql}");
    }
}

#[test]
fn test_stacked_statements_fail_guard() {
    let mut rng = rand::thread_rng();
    for _ in 0..ITERATIONS {
        let sql = format!(
            "{}; DROP TABLE {}",
            select_statement(&mut rng),
            identifier(&mut rng)
        );
        assert!(is_valid_sql(&sql));
        let err = check_single_query(&sql, Dialect::Postgres).unwrap_err();
        assert!(matches!(err, QueryError::UnsafeOrInvalidSql { .. }));
    }
}

#[test]
fn test_normalization_recovers_escaped_selects() {
    let mut rng = rand::thread_rng();
    let extractor = SqlExtractor::new(false);
    for _ in 0..ITERATIONS {
        let sql = select_statement(&mut rng);
        let escaped = sql.replacen(' ', "\\n", 1);
        let transcript = format!("Final Answer: \"{}\"", escaped);

        assert!(extractor.extract(&transcript).is_err(), "{transcript:?}");
        let normalized = normalize_transcript(&transcript);
        assert_eq!(normalized, sql.replacen(' ', "\n", 1));
        assert_eq!(extractor.reextract(&transcript).unwrap(), normalized);
    }
}
