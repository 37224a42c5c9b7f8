//! Database access layer.
//!
//! - Connection Provider and per-request sessions
//! - Schema introspection
//! - Row fetching with a row limit
//! - Row materialization into JSON scalars

pub mod connection;
pub mod executor;
pub mod schema;
pub mod types;

pub use connection::{
    ConnectionProvider, DbConnection, DbSession, RowSet, SqlSession, SqlxConnectionProvider,
};
pub use types::RowToJson;
