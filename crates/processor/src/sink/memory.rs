//! In-memory table storage

use super::{TableSink, TableTarget};
use crate::error::{SinkError, SinkResult};
use async_trait::async_trait;
use dashmap::DashMap;
use retail_types::{TableRow, TableSchema};
use std::sync::Arc;

#[derive(Debug)]
struct StoredTable {
    schema: TableSchema,
    rows: Vec<TableRow>,
}

/// Table storage backed by process memory
///
/// Useful for embedding the pipeline and for tests. Clones share the same
/// tables.
#[derive(Debug, Clone, Default)]
pub struct InMemoryTableSink {
    tables: Arc<DashMap<String, StoredTable>>,
}

impl InMemoryTableSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rows appended to `table`, in append order
    pub fn rows(&self, table: &str) -> Vec<TableRow> {
        self.tables
            .get(table)
            .map(|t| t.rows.clone())
            .unwrap_or_default()
    }

    pub fn row_count(&self, table: &str) -> usize {
        self.tables.get(table).map(|t| t.rows.len()).unwrap_or(0)
    }

    /// Schema of `table`, if it has been created
    pub fn schema(&self, table: &str) -> Option<TableSchema> {
        self.tables.get(table).map(|t| t.schema.clone())
    }

    /// Names of every created table
    pub fn tables(&self) -> Vec<String> {
        let mut names: Vec<String> = self.tables.iter().map(|e| e.key().clone()).collect();
        names.sort();
        names
    }

    fn check_schema(stored: &StoredTable, target: &TableTarget) -> SinkResult<()> {
        if stored.schema != target.schema {
            return Err(SinkError::schema_mismatch(
                &target.table,
                format!(
                    "table exists with schema '{}', writer expects '{}'",
                    stored.schema, target.schema
                ),
            ));
        }
        Ok(())
    }
}

#[async_trait]
impl TableSink for InMemoryTableSink {
    async fn ensure_table(&self, target: &TableTarget) -> SinkResult<()> {
        let stored = self
            .tables
            .entry(target.table.clone())
            .or_insert_with(|| StoredTable {
                schema: target.schema.clone(),
                rows: Vec::new(),
            });
        Self::check_schema(&stored, target)
    }

    async fn append(&self, target: &TableTarget, row: &TableRow) -> SinkResult<()> {
        target
            .schema
            .validate_row(row)
            .map_err(|e| SinkError::schema_mismatch(&target.table, e.to_string()))?;

        let mut stored = self
            .tables
            .entry(target.table.clone())
            .or_insert_with(|| StoredTable {
                schema: target.schema.clone(),
                rows: Vec::new(),
            });
        Self::check_schema(&stored, target)?;
        stored.rows.push(row.clone());
        Ok(())
    }
}
