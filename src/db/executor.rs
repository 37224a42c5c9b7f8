//! Statement execution.
//!
//! Rows are streamed and only `row_limit + 1` are pulled from the server, so
//! an unbounded result never materializes in memory. The extra row tells us
//! whether the result was truncated.

use crate::db::connection::{DbConnection, RowSet};
use crate::db::types::RowToJson;
use crate::error::{PipelineResult, QueryError};
use crate::models::MAX_ROW_LIMIT;
use futures_util::StreamExt;
use std::time::Instant;
use tracing::{debug, warn};

/// Run `sql` on the connection and collect at most `row_limit` rows.
pub async fn fetch_rows(
    conn: &mut DbConnection,
    sql: &str,
    row_limit: u32,
) -> PipelineResult<RowSet> {
    let start = Instant::now();
    // limit=0 would mark every non-empty result as truncated
    let row_limit = row_limit.clamp(1, MAX_ROW_LIMIT);

    debug!(sql = %sql, limit = row_limit, "Executing query");

    let rows = match conn {
        DbConnection::MySql(c) => process_rows(mysql::fetch_rows(c, sql, row_limit).await?, row_limit),
        DbConnection::Postgres(c) => {
            process_rows(postgres::fetch_rows(c, sql, row_limit).await?, row_limit)
        }
    };

    debug!(
        row_count = rows.rows.len(),
        truncated = rows.truncated,
        elapsed_ms = start.elapsed().as_millis() as u64,
        "Query finished"
    );
    Ok(rows)
}

/// Convert driver rows into scalar maps, applying the row limit.
fn process_rows<R: RowToJson>(rows: Vec<R>, row_limit: u32) -> RowSet {
    let total_rows = rows.len();
    let truncated = total_rows > row_limit as usize;

    let json_rows = rows
        .iter()
        .take(row_limit as usize)
        .map(RowToJson::to_json_map)
        .collect();

    if truncated {
        warn!(limit = row_limit, "Query result truncated");
    }

    RowSet {
        rows: json_rows,
        truncated,
    }
}

fn collect_rows<R>(results: Vec<Result<R, sqlx::Error>>) -> PipelineResult<Vec<R>> {
    let mut rows = Vec::with_capacity(results.len());
    for result in results {
        rows.push(result.map_err(QueryError::from_execution)?);
    }
    Ok(rows)
}

// Raw (unprepared) execution: the statement has no parameters, and the text
// protocol lets every column type be read back as text if needed.

mod mysql {
    use super::*;
    use sqlx::mysql::MySqlRow;
    use sqlx::{Executor, MySqlConnection};

    pub async fn fetch_rows(
        conn: &mut MySqlConnection,
        sql: &str,
        row_limit: u32,
    ) -> PipelineResult<Vec<MySqlRow>> {
        let fetch_limit = row_limit as usize + 1;
        let results = conn.fetch(sql).take(fetch_limit).collect::<Vec<_>>().await;
        collect_rows(results)
    }
}

mod postgres {
    use super::*;
    use sqlx::postgres::PgRow;
    use sqlx::{Executor, PgConnection};

    pub async fn fetch_rows(
        conn: &mut PgConnection,
        sql: &str,
        row_limit: u32,
    ) -> PipelineResult<Vec<PgRow>> {
        let fetch_limit = row_limit as usize + 1;
        let results = conn.fetch(sql).take(fetch_limit).collect::<Vec<_>>().await;
        collect_rows(results)
    }
}
