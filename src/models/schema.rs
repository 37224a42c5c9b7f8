//! Schema snapshot handed to the query agent.

use serde::Serialize;
use std::collections::BTreeMap;

/// Table name → ordered column names, captured once per request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct SchemaDescription {
    tables: BTreeMap<String, Vec<String>>,
}

impl SchemaDescription {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a table. A table seen twice keeps the later column list.
    pub fn insert_table(&mut self, table: impl Into<String>, columns: Vec<String>) {
        self.tables.insert(table.into(), columns);
    }

    /// Append a column to a table, creating the table entry if needed.
    pub fn push_column(&mut self, table: &str, column: impl Into<String>) {
        self.tables
            .entry(table.to_string())
            .or_default()
            .push(column.into());
    }

    pub fn columns(&self, table: &str) -> Option<&[String]> {
        self.tables.get(table).map(Vec::as_slice)
    }

    pub fn tables(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.tables
            .iter()
            .map(|(name, cols)| (name.as_str(), cols.as_slice()))
    }

    pub fn table_count(&self) -> usize {
        self.tables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }

    /// Render as one `table(col, col, ...)` line per table.
    pub fn render(&self) -> String {
        self.tables
            .iter()
            .map(|(name, cols)| format!("{}({})", name, cols.join(", ")))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

impl<T, C> FromIterator<(T, Vec<C>)> for SchemaDescription
where
    T: Into<String>,
    C: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (T, Vec<C>)>>(iter: I) -> Self {
        let tables = iter
            .into_iter()
            .map(|(t, cols)| (t.into(), cols.into_iter().map(Into::into).collect()))
            .collect();
        Self { tables }
    }
}
