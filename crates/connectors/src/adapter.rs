use crate::error::DbError;
use async_trait::async_trait;
use model::core::{
    identifiers::ObjectKind,
    value::{ColumnMetadata, RowData},
};
use serde::{Deserialize, Serialize};

/// Spec and body text of one Oracle package.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PackageText {
    pub spec: String,
    pub body: String,
}

/// One user sequence as listed by the source, with its cached high-water
/// mark. System sequences (`ISEQ$$_%`) are filtered out by the adapter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SequenceInfo {
    pub schema: String,
    pub name: String,
    pub last_number: i64,
}

/// Lightweight per-table figures surfaced in the discovery document.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TableStats {
    pub row_count: u64,
    pub byte_size: u64,
}

/// Read-side contract against the source database. LOB columns are
/// materialized into in-memory values before a row leaves the adapter;
/// locator objects never cross this boundary.
#[async_trait]
pub trait SourceAdapter: Send + Sync {
    async fn list_tables(&self) -> Result<Vec<String>, DbError>;
    async fn list_views(&self) -> Result<Vec<String>, DbError>;
    /// User sequences only; `ISEQ$$_%` system sequences are never returned.
    async fn list_sequences(&self) -> Result<Vec<SequenceInfo>, DbError>;
    async fn list_procedures(&self) -> Result<Vec<String>, DbError>;
    async fn list_functions(&self) -> Result<Vec<String>, DbError>;
    async fn list_triggers(&self) -> Result<Vec<String>, DbError>;
    async fn list_packages(&self) -> Result<Vec<String>, DbError>;

    async fn get_ddl(&self, kind: ObjectKind, name: &str) -> Result<String, DbError>;
    async fn get_package_text(&self, name: &str) -> Result<PackageText, DbError>;

    async fn get_columns(&self, table: &str) -> Result<Vec<ColumnMetadata>, DbError>;
    async fn table_stats(&self, table: &str) -> Result<TableStats, DbError>;

    /// Fetches all rows of a table, fully materialized.
    async fn fetch_rows(&self, table: &str) -> Result<Vec<RowData>, DbError>;

    /// The schema the adapter reads from.
    fn schema(&self) -> String;
}

/// Write-side contract against the target database.
#[async_trait]
pub trait TargetAdapter: Send + Sync {
    /// Executes a single statement (no GO separators allowed).
    async fn execute(&self, sql: &str) -> Result<(), DbError>;

    /// Executes a multi-batch script, splitting on standalone GO lines and
    /// submitting each batch independently.
    async fn execute_ddl(&self, script: &str) -> Result<(), DbError>;

    async fn query_rows(&self, sql: &str) -> Result<Vec<RowData>, DbError>;

    async fn get_columns(
        &self,
        schema: &str,
        table: &str,
    ) -> Result<Vec<ColumnMetadata>, DbError>;

    async fn object_exists(
        &self,
        schema: &str,
        name: &str,
        kind: ObjectKind,
    ) -> Result<bool, DbError>;

    async fn truncate_table(&self, schema: &str, table: &str) -> Result<(), DbError>;

    /// Inserts one batch of rows inside a transaction. When
    /// `identity_columns` is non-empty the insert is wrapped in
    /// `SET IDENTITY_INSERT ON/OFF`, and OFF is issued on every exit path.
    /// The returned count comes from `SELECT @@ROWCOUNT`, not the driver.
    async fn bulk_insert(
        &self,
        qualified_table: &str,
        columns: &[String],
        rows: &[RowData],
        identity_columns: &[String],
    ) -> Result<u64, DbError>;
}
