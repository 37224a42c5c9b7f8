//! Statement guard.
//!
//! Runs after the validator. Parses the statement in the session's dialect and
//! rejects anything other than exactly one query, such as
//! `SELECT 1 FROM t; DROP TABLE t`. Text the parser cannot handle is passed
//! through; the read-only session is the next line of defense.

use crate::error::{PipelineResult, QueryError};
use crate::models::Dialect;
use sqlparser::ast::{SetExpr, Statement};
use sqlparser::dialect::{Dialect as SqlDialect, MySqlDialect, PostgreSqlDialect};
use sqlparser::parser::Parser;
use tracing::debug;

fn get_dialect(dialect: Dialect) -> Box<dyn SqlDialect> {
    match dialect {
        Dialect::Postgres => Box::new(PostgreSqlDialect {}),
        Dialect::MySql => Box::new(MySqlDialect {}),
    }
}

/// Check that `sql` is a single read-only query.
///
/// ```
/// use nl2sql_server::models::Dialect;
/// use nl2sql_server::pipeline::guard::check_single_query;
///
/// assert!(check_single_query("SELECT * FROM users", Dialect::Postgres).is_ok());
/// assert!(check_single_query("SELECT 1 FROM t; DROP TABLE t", Dialect::Postgres).is_err());
/// ```
pub fn check_single_query(sql: &str, dialect: Dialect) -> PipelineResult<()> {
    let statements = match Parser::parse_sql(get_dialect(dialect).as_ref(), sql) {
        Ok(statements) => statements,
        Err(e) => {
            debug!(error = %e, "Statement guard could not parse SQL, passing through");
            return Ok(());
        }
    };

    match statements.as_slice() {
        [Statement::Query(query)] => {
            if !query.locks.is_empty() {
                return Err(QueryError::unsafe_sql(sql, "locking clauses are not allowed"));
            }
            if let SetExpr::Select(select) = query.body.as_ref() {
                if select.into.is_some() {
                    return Err(QueryError::unsafe_sql(sql, "SELECT INTO is not allowed"));
                }
            }
            Ok(())
        }
        [] => Err(QueryError::unsafe_sql(sql, "empty statement")),
        [_] => Err(QueryError::unsafe_sql(sql, "only queries are allowed")),
        _ => Err(QueryError::unsafe_sql(
            sql,
            format!("expected one statement, found {}", statements.len()),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_select_allowed() {
        for dialect in [Dialect::Postgres, Dialect::MySql] {
            assert!(check_single_query("SELECT COUNT(*) FROM users", dialect).is_ok());
            assert!(check_single_query("SELECT a FROM t WHERE b = 1;", dialect).is_ok());
        }
    }

    #[test]
    fn test_stacked_statements_rejected() {
        let err = check_single_query("SELECT * FROM t; DROP TABLE t", Dialect::MySql).unwrap_err();
        assert!(matches!(err, QueryError::UnsafeOrInvalidSql { .. }));
        assert!(err.to_string().contains("found 2"));
    }

    #[test]
    fn test_select_into_rejected() {
        let result = check_single_query("SELECT * INTO backup FROM users", Dialect::Postgres);
        assert!(matches!(result, Err(QueryError::UnsafeOrInvalidSql { .. })));
    }

    #[test]
    fn test_for_update_rejected() {
        let result = check_single_query("SELECT * FROM users FOR UPDATE", Dialect::Postgres);
        assert!(matches!(result, Err(QueryError::UnsafeOrInvalidSql { .. })));
    }

    #[test]
    fn test_unparseable_passes_through() {
        assert!(check_single_query("SELECT FROM WHERE ((", Dialect::Postgres).is_ok());
    }
}
