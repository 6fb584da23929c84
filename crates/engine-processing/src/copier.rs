use crate::error::CopyError;
use connectors::adapter::{SourceAdapter, TargetAdapter};
use model::core::value::RowData;
use planner::identity::reseed_statement;
use serde::Serialize;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Outcome of copying one table, carried into the final report.
#[derive(Debug, Clone, Serialize)]
pub struct CopyReport {
    pub table: String,
    pub rows_read: u64,
    /// Sum of the per-batch `@@ROWCOUNT` values, never the driver's count.
    pub rows_written: u64,
    pub batches: usize,
    pub identity_insert_used: bool,
    pub truncated: bool,
}

pub struct DataCopierParams {
    pub source: Arc<dyn SourceAdapter>,
    pub target: Arc<dyn TargetAdapter>,
    pub batch_size: usize,
    pub truncate_before_copy: bool,
    pub default_schema: String,
}

/// Streams table rows from the source into the target in transactional
/// batches. Rows arrive fully materialized from the source adapter; the
/// target adapter owns the IDENTITY_INSERT discipline per batch.
pub struct DataCopier {
    source: Arc<dyn SourceAdapter>,
    target: Arc<dyn TargetAdapter>,
    batch_size: usize,
    truncate_before_copy: bool,
    default_schema: String,
}

impl DataCopier {
    pub fn new(params: DataCopierParams) -> Self {
        DataCopier {
            source: params.source,
            target: params.target,
            batch_size: params.batch_size.max(1),
            truncate_before_copy: params.truncate_before_copy,
            default_schema: params.default_schema,
        }
    }

    pub async fn copy_table(
        &self,
        table: &str,
        cancel: &CancellationToken,
    ) -> Result<CopyReport, CopyError> {
        let qualified = format!("[{}].[{}]", self.default_schema, table);

        // Target column metadata decides whether IDENTITY_INSERT applies.
        let target_columns = self
            .target
            .get_columns(&self.default_schema, table)
            .await
            .map_err(|source| CopyError::TargetWrite {
                table: table.to_string(),
                source,
            })?;
        let identity_columns: Vec<String> = target_columns
            .iter()
            .filter(|c| c.is_identity)
            .map(|c| c.name.clone())
            .collect();

        if self.truncate_before_copy {
            self.target
                .truncate_table(&self.default_schema, table)
                .await
                .map_err(|source| CopyError::TargetWrite {
                    table: table.to_string(),
                    source,
                })?;
        }

        let rows = self
            .source
            .fetch_rows(table)
            .await
            .map_err(|source| CopyError::SourceRead {
                table: table.to_string(),
                source,
            })?;
        let rows_read = rows.len() as u64;

        let mut rows_written = 0u64;
        let mut batches = 0usize;
        for chunk in rows.chunks(self.batch_size) {
            if cancel.is_cancelled() {
                return Err(CopyError::Cancelled(table.to_string()));
            }
            let columns = column_order(chunk);
            let written = self
                .target
                .bulk_insert(&qualified, &columns, chunk, &identity_columns)
                .await
                .map_err(|source| CopyError::TargetWrite {
                    table: table.to_string(),
                    source,
                })?;
            rows_written += written;
            batches += 1;
        }

        // Leave the identity counter past the highest copied id.
        if !identity_columns.is_empty() && rows_written > 0 {
            let reseed = reseed_statement(&qualified, &identity_columns[0]);
            if let Err(err) = self.target.execute(&reseed).await {
                warn!(table = %qualified, error = %err, "reseed after copy failed");
            }
        }

        info!(
            table = %qualified,
            rows = rows_written,
            batches,
            identity = !identity_columns.is_empty(),
            "table copy complete"
        );

        Ok(CopyReport {
            table: qualified,
            rows_read,
            rows_written,
            batches,
            identity_insert_used: !identity_columns.is_empty(),
            truncated: self.truncate_before_copy,
        })
    }
}

fn column_order(rows: &[RowData]) -> Vec<String> {
    rows.first().map(|row| row.columns.clone()).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use connectors::mock::{MockSource, MockTarget};
    use model::core::value::{ColumnMetadata, Value};

    fn column(name: &str, identity: bool) -> ColumnMetadata {
        ColumnMetadata {
            name: name.to_string(),
            data_type: "int".into(),
            nullable: false,
            is_identity: identity,
            is_lob: false,
        }
    }

    fn rows(count: i64) -> Vec<RowData> {
        (1..=count)
            .map(|i| {
                RowData::new(
                    vec!["ID".into(), "BODY".into()],
                    vec![Value::Int(i), Value::Text(format!("doc {i}"))],
                )
            })
            .collect()
    }

    fn copier(
        source: MockSource,
        target: Arc<MockTarget>,
        batch_size: usize,
        truncate: bool,
    ) -> DataCopier {
        DataCopier::new(DataCopierParams {
            source: Arc::new(source),
            target,
            batch_size,
            truncate_before_copy: truncate,
            default_schema: "dbo".to_string(),
        })
    }

    #[tokio::test]
    async fn copies_all_rows_in_batches() {
        let source = MockSource::new("HR").with_rows("STG_DOCS", rows(5));
        let target = Arc::new(MockTarget::new());
        target.set_columns("dbo", "STG_DOCS", vec![column("ID", false), column("BODY", false)]);

        let report = copier(source, target.clone(), 2, false)
            .copy_table("STG_DOCS", &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(report.rows_read, 5);
        assert_eq!(report.rows_written, 5);
        assert_eq!(report.batches, 3);
        assert!(!report.identity_insert_used);
        assert_eq!(target.inserted_rows("dbo", "STG_DOCS").len(), 5);
    }

    #[tokio::test]
    async fn identity_tables_are_wrapped_and_reseeded() {
        let source = MockSource::new("HR").with_rows("EMP", rows(3));
        let target = Arc::new(MockTarget::new());
        target.set_columns("dbo", "EMP", vec![column("ID", true), column("BODY", false)]);

        let report = copier(source, target.clone(), 10, false)
            .copy_table("EMP", &CancellationToken::new())
            .await
            .unwrap();

        assert!(report.identity_insert_used);
        let executed = target.executed();
        assert!(executed.iter().any(|s| s.contains("IDENTITY_INSERT") && s.ends_with("ON")));
        assert!(executed.iter().any(|s| s.contains("IDENTITY_INSERT") && s.ends_with("OFF")));
        assert!(executed.iter().any(|s| s.contains("DBCC CHECKIDENT")));
    }

    #[tokio::test]
    async fn failed_batch_aborts_the_table_but_clears_identity_insert() {
        let source = MockSource::new("HR").with_rows("EMP", rows(4));
        let target = Arc::new(MockTarget::new());
        target.set_columns("dbo", "EMP", vec![column("ID", true)]);
        target.fail_matching("[dbo].[EMP]", "Cannot insert explicit value for identity column", 1);

        let result = copier(source, target.clone(), 2, false)
            .copy_table("EMP", &CancellationToken::new())
            .await;

        assert!(matches!(result, Err(CopyError::TargetWrite { .. })));
        let executed = target.executed();
        let ons = executed.iter().filter(|s| s.contains("IDENTITY_INSERT") && s.ends_with("ON")).count();
        let offs = executed.iter().filter(|s| s.contains("IDENTITY_INSERT") && s.ends_with("OFF")).count();
        assert_eq!(ons, offs, "IDENTITY_INSERT OFF must match every ON");
    }

    #[tokio::test]
    async fn truncate_option_clears_the_target_first() {
        let source = MockSource::new("HR").with_rows("T", rows(1));
        let target = Arc::new(MockTarget::new());
        target.set_columns("dbo", "T", vec![column("ID", false)]);

        copier(source, target.clone(), 100, true)
            .copy_table("T", &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(target.truncated(), vec!["dbo.t".to_string()]);
    }

    #[tokio::test]
    async fn lob_rows_arrive_materialized() {
        // The source contract materializes LOBs; the copier only ever sees
        // concrete Text/Bytes values, which is what reaches the driver.
        let source = MockSource::new("HR").with_rows("STG_DOCS", rows(5));
        let target = Arc::new(MockTarget::new());
        target.set_columns("dbo", "STG_DOCS", vec![column("ID", false), column("BODY", false)]);

        copier(source, target.clone(), 10, false)
            .copy_table("STG_DOCS", &CancellationToken::new())
            .await
            .unwrap();

        for row in target.inserted_rows("dbo", "STG_DOCS") {
            assert!(matches!(row.get("BODY"), Some(Value::Text(_))));
        }
    }
}
