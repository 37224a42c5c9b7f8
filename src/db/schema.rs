//! Schema Introspector.
//!
//! Catalog queries live in the `queries` submodule; each dialect module reads
//! tables first, then columns in ordinal order.

use crate::db::connection::DbConnection;
use crate::error::{PipelineResult, QueryError};
use crate::models::SchemaDescription;
use tracing::debug;

/// Describe every base table visible in the session's current schema.
pub async fn describe(conn: &mut DbConnection) -> PipelineResult<SchemaDescription> {
    let schema = match conn {
        DbConnection::Postgres(c) => postgres::describe(c).await,
        DbConnection::MySql(c) => mysql::describe(c).await,
    }
    .map_err(QueryError::from_introspection)?;

    debug!(tables = schema.table_count(), "Schema introspected");
    Ok(schema)
}

// =============================================================================
// SQL Query Templates
// =============================================================================

mod queries {
    pub mod postgres {
        pub const LIST_TABLES: &str = r#"
            SELECT table_name::text
            FROM information_schema.tables
            WHERE table_schema = current_schema()
              AND table_type = 'BASE TABLE'
            ORDER BY table_name
        "#;

        pub const LIST_COLUMNS: &str = r#"
            SELECT table_name::text, column_name::text
            FROM information_schema.columns
            WHERE table_schema = current_schema()
            ORDER BY table_name, ordinal_position
        "#;
    }

    pub mod mysql {
        pub const LIST_TABLES: &str = r#"
            SELECT TABLE_NAME
            FROM information_schema.TABLES
            WHERE TABLE_SCHEMA = DATABASE()
              AND TABLE_TYPE = 'BASE TABLE'
            ORDER BY TABLE_NAME
        "#;

        pub const LIST_COLUMNS: &str = r#"
            SELECT TABLE_NAME, COLUMN_NAME
            FROM information_schema.COLUMNS
            WHERE TABLE_SCHEMA = DATABASE()
            ORDER BY TABLE_NAME, ORDINAL_POSITION
        "#;
    }
}

/// Keep only columns of tables that were listed (views are excluded there).
fn build_schema(
    tables: Vec<String>,
    columns: impl IntoIterator<Item = (String, String)>,
) -> SchemaDescription {
    let mut schema = SchemaDescription::new();
    for table in &tables {
        schema.insert_table(table.clone(), Vec::new());
    }
    for (table, column) in columns {
        if schema.columns(&table).is_some() {
            schema.push_column(&table, column);
        }
    }
    schema
}

mod postgres {
    use super::*;
    use sqlx::{PgConnection, Row};

    pub async fn describe(conn: &mut PgConnection) -> Result<SchemaDescription, sqlx::Error> {
        let tables: Vec<String> = sqlx::query(queries::postgres::LIST_TABLES)
            .fetch_all(&mut *conn)
            .await?
            .iter()
            .map(|row| row.try_get::<String, _>(0))
            .collect::<Result<_, _>>()?;

        let columns: Vec<(String, String)> = sqlx::query(queries::postgres::LIST_COLUMNS)
            .fetch_all(&mut *conn)
            .await?
            .iter()
            .map(|row| Ok((row.try_get::<String, _>(0)?, row.try_get::<String, _>(1)?)))
            .collect::<Result<_, sqlx::Error>>()?;

        Ok(build_schema(tables, columns))
    }
}

mod mysql {
    use super::*;
    use sqlx::mysql::MySqlRow;
    use sqlx::{MySqlConnection, Row};

    /// MySQL 8 may report catalog columns as VARBINARY depending on charset settings.
    fn get_string(row: &MySqlRow, index: usize) -> Option<String> {
        row.try_get::<String, _>(index).ok().or_else(|| {
            row.try_get::<Vec<u8>, _>(index)
                .ok()
                .and_then(|bytes| String::from_utf8(bytes).ok())
        })
    }

    pub async fn describe(conn: &mut MySqlConnection) -> Result<SchemaDescription, sqlx::Error> {
        let tables: Vec<String> = sqlx::query(queries::mysql::LIST_TABLES)
            .fetch_all(&mut *conn)
            .await?
            .iter()
            .filter_map(|row| get_string(row, 0))
            .collect();

        let columns: Vec<(String, String)> = sqlx::query(queries::mysql::LIST_COLUMNS)
            .fetch_all(&mut *conn)
            .await?
            .iter()
            .filter_map(|row| Some((get_string(row, 0)?, get_string(row, 1)?)))
            .collect();

        Ok(build_schema(tables, columns))
    }
}
