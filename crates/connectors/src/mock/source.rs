use crate::{
    adapter::{PackageText, SequenceInfo, SourceAdapter, TableStats},
    error::DbError,
};
use async_trait::async_trait;
use model::core::{
    identifiers::ObjectKind,
    value::{ColumnMetadata, RowData},
};
use std::collections::BTreeMap;

/// In-memory source used by tests: objects and rows are registered up front
/// through the builder methods.
#[derive(Debug, Default)]
pub struct MockSource {
    schema: String,
    tables: BTreeMap<String, String>,
    views: BTreeMap<String, String>,
    procedures: BTreeMap<String, String>,
    functions: BTreeMap<String, String>,
    triggers: BTreeMap<String, String>,
    packages: BTreeMap<String, PackageText>,
    sequences: Vec<SequenceInfo>,
    columns: BTreeMap<String, Vec<ColumnMetadata>>,
    rows: BTreeMap<String, Vec<RowData>>,
}

impl MockSource {
    pub fn new(schema: &str) -> Self {
        MockSource {
            schema: schema.to_uppercase(),
            ..Default::default()
        }
    }

    pub fn with_table(mut self, name: &str, ddl: &str) -> Self {
        self.tables.insert(name.to_uppercase(), ddl.to_string());
        self
    }

    pub fn with_view(mut self, name: &str, ddl: &str) -> Self {
        self.views.insert(name.to_uppercase(), ddl.to_string());
        self
    }

    pub fn with_procedure(mut self, name: &str, ddl: &str) -> Self {
        self.procedures.insert(name.to_uppercase(), ddl.to_string());
        self
    }

    pub fn with_function(mut self, name: &str, ddl: &str) -> Self {
        self.functions.insert(name.to_uppercase(), ddl.to_string());
        self
    }

    pub fn with_trigger(mut self, name: &str, ddl: &str) -> Self {
        self.triggers.insert(name.to_uppercase(), ddl.to_string());
        self
    }

    pub fn with_package(mut self, name: &str, spec: &str, body: &str) -> Self {
        self.packages.insert(
            name.to_uppercase(),
            PackageText {
                spec: spec.to_string(),
                body: body.to_string(),
            },
        );
        self
    }

    pub fn with_sequence(mut self, name: &str, last_number: i64) -> Self {
        self.sequences.push(SequenceInfo {
            schema: self.schema.clone(),
            name: name.to_uppercase(),
            last_number,
        });
        self
    }

    pub fn with_columns(mut self, table: &str, columns: Vec<ColumnMetadata>) -> Self {
        self.columns.insert(table.to_uppercase(), columns);
        self
    }

    pub fn with_rows(mut self, table: &str, rows: Vec<RowData>) -> Self {
        self.rows.insert(table.to_uppercase(), rows);
        self
    }
}

#[async_trait]
impl SourceAdapter for MockSource {
    async fn list_tables(&self) -> Result<Vec<String>, DbError> {
        Ok(self.tables.keys().cloned().collect())
    }

    async fn list_views(&self) -> Result<Vec<String>, DbError> {
        Ok(self.views.keys().cloned().collect())
    }

    async fn list_sequences(&self) -> Result<Vec<SequenceInfo>, DbError> {
        // The contract filters Oracle's identity-backing system sequences.
        Ok(self
            .sequences
            .iter()
            .filter(|s| !s.name.starts_with("ISEQ$$_"))
            .cloned()
            .collect())
    }

    async fn list_procedures(&self) -> Result<Vec<String>, DbError> {
        Ok(self.procedures.keys().cloned().collect())
    }

    async fn list_functions(&self) -> Result<Vec<String>, DbError> {
        Ok(self.functions.keys().cloned().collect())
    }

    async fn list_triggers(&self) -> Result<Vec<String>, DbError> {
        Ok(self.triggers.keys().cloned().collect())
    }

    async fn list_packages(&self) -> Result<Vec<String>, DbError> {
        Ok(self.packages.keys().cloned().collect())
    }

    async fn get_ddl(&self, kind: ObjectKind, name: &str) -> Result<String, DbError> {
        let key = name.to_uppercase();
        let found = match kind {
            ObjectKind::Table => self.tables.get(&key),
            ObjectKind::View => self.views.get(&key),
            ObjectKind::Procedure => self.procedures.get(&key),
            ObjectKind::Function => self.functions.get(&key),
            ObjectKind::Trigger => self.triggers.get(&key),
            _ => None,
        };
        found
            .cloned()
            .ok_or_else(|| DbError::NotFound(format!("{kind} {name}")))
    }

    async fn get_package_text(&self, name: &str) -> Result<PackageText, DbError> {
        self.packages
            .get(&name.to_uppercase())
            .cloned()
            .ok_or_else(|| DbError::NotFound(format!("PACKAGE {name}")))
    }

    async fn get_columns(&self, table: &str) -> Result<Vec<ColumnMetadata>, DbError> {
        Ok(self
            .columns
            .get(&table.to_uppercase())
            .cloned()
            .unwrap_or_default())
    }

    async fn table_stats(&self, table: &str) -> Result<TableStats, DbError> {
        let rows = self.rows.get(&table.to_uppercase());
        Ok(TableStats {
            row_count: rows.map(|r| r.len() as u64).unwrap_or(0),
            byte_size: rows
                .map(|r| r.iter().map(|row| row.size_bytes() as u64).sum())
                .unwrap_or(0),
        })
    }

    async fn fetch_rows(&self, table: &str) -> Result<Vec<RowData>, DbError> {
        Ok(self
            .rows
            .get(&table.to_uppercase())
            .cloned()
            .unwrap_or_default())
    }

    fn schema(&self) -> String {
        self.schema.clone()
    }
}
