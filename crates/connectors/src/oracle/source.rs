use crate::{
    adapter::{PackageText, SequenceInfo, SourceAdapter, TableStats},
    config::OracleConfig,
    error::{ConnectorError, DbError},
    oracle::convert::{is_lob_type, read_cell},
};
use async_trait::async_trait;
use model::core::{
    identifiers::ObjectKind,
    value::{ColumnMetadata, RowData, Value},
};
use oracle::Connection;
use std::sync::{Arc, Mutex};
use tracing::debug;

/// Source adapter over one Oracle connection. The driver is synchronous, so
/// every call runs on the blocking pool; the mutex serializes statement use
/// of the single connection.
pub struct OracleSourceAdapter {
    conn: Arc<Mutex<Connection>>,
    schema: String,
}

impl OracleSourceAdapter {
    pub async fn connect(cfg: &OracleConfig) -> Result<Self, ConnectorError> {
        let connect_string = cfg.connect_string();
        let user = cfg.user.clone();
        let password = cfg.password.clone();
        let conn = tokio::task::spawn_blocking(move || {
            Connection::connect(&user, &password, &connect_string)
        })
        .await
        .map_err(|err| ConnectorError::InvalidConfig(format!("connect task failed: {err}")))??;

        Ok(OracleSourceAdapter {
            conn: Arc::new(Mutex::new(conn)),
            schema: cfg.schema(),
        })
    }

    async fn with_conn<T, F>(&self, operation: F) -> Result<T, DbError>
    where
        F: FnOnce(&Connection) -> Result<T, oracle::Error> + Send + 'static,
        T: Send + 'static,
    {
        let conn = self.conn.clone();
        tokio::task::spawn_blocking(move || {
            let guard = conn.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
            operation(&guard)
        })
        .await
        .map_err(|err| DbError::Unknown(format!("blocking task failed: {err}")))?
        .map_err(DbError::from)
    }

    async fn list_objects(&self, object_type: &'static str) -> Result<Vec<String>, DbError> {
        let owner = self.schema.clone();
        self.with_conn(move |conn| {
            let rows = conn.query(
                "SELECT object_name FROM all_objects \
                 WHERE owner = :1 AND object_type = :2 ORDER BY object_name",
                &[&owner, &object_type],
            )?;
            let mut names = Vec::new();
            for row in rows {
                let row = row?;
                if let Some(name) = row.get::<_, Option<String>>(0)? {
                    names.push(name);
                }
            }
            Ok(names)
        })
        .await
    }
}

#[async_trait]
impl SourceAdapter for OracleSourceAdapter {
    async fn list_tables(&self) -> Result<Vec<String>, DbError> {
        let owner = self.schema.clone();
        self.with_conn(move |conn| {
            let rows = conn.query(
                "SELECT table_name FROM all_tables \
                 WHERE owner = :1 AND nested = 'NO' ORDER BY table_name",
                &[&owner],
            )?;
            let mut names = Vec::new();
            for row in rows {
                let row = row?;
                if let Some(name) = row.get::<_, Option<String>>(0)? {
                    names.push(name);
                }
            }
            Ok(names)
        })
        .await
    }

    async fn list_views(&self) -> Result<Vec<String>, DbError> {
        self.list_objects("VIEW").await
    }

    async fn list_sequences(&self) -> Result<Vec<SequenceInfo>, DbError> {
        let owner = self.schema.clone();
        self.with_conn(move |conn| {
            // ISEQ$$_% sequences back identity columns and are never migrated.
            let rows = conn.query(
                "SELECT sequence_owner, sequence_name, last_number FROM all_sequences \
                 WHERE sequence_owner = :1 AND sequence_name NOT LIKE 'ISEQ$$\\_%' ESCAPE '\\' \
                 ORDER BY sequence_name",
                &[&owner],
            )?;
            let mut sequences = Vec::new();
            for row in rows {
                let row = row?;
                sequences.push(SequenceInfo {
                    schema: row.get::<_, Option<String>>(0)?.unwrap_or_default(),
                    name: row.get::<_, Option<String>>(1)?.unwrap_or_default(),
                    last_number: row.get::<_, Option<i64>>(2)?.unwrap_or(0),
                });
            }
            Ok(sequences)
        })
        .await
    }

    async fn list_procedures(&self) -> Result<Vec<String>, DbError> {
        self.list_objects("PROCEDURE").await
    }

    async fn list_functions(&self) -> Result<Vec<String>, DbError> {
        self.list_objects("FUNCTION").await
    }

    async fn list_triggers(&self) -> Result<Vec<String>, DbError> {
        self.list_objects("TRIGGER").await
    }

    async fn list_packages(&self) -> Result<Vec<String>, DbError> {
        self.list_objects("PACKAGE").await
    }

    async fn get_ddl(&self, kind: ObjectKind, name: &str) -> Result<String, DbError> {
        let metadata_type = match kind {
            ObjectKind::Table => "TABLE",
            ObjectKind::View => "VIEW",
            ObjectKind::Sequence => "SEQUENCE",
            ObjectKind::Procedure => "PROCEDURE",
            ObjectKind::Function => "FUNCTION",
            ObjectKind::Trigger => "TRIGGER",
            ObjectKind::Package | ObjectKind::PackageMember => "PACKAGE",
        };
        let owner = self.schema.clone();
        let name = name.to_string();
        self.with_conn(move |conn| {
            let row = conn.query_row(
                "SELECT DBMS_METADATA.GET_DDL(:1, :2, :3) FROM dual",
                &[&metadata_type, &name, &owner],
            )?;
            // GET_DDL returns a CLOB; the driver materializes it here.
            Ok(row.get::<_, Option<String>>(0)?.unwrap_or_default())
        })
        .await
    }

    async fn get_package_text(&self, name: &str) -> Result<PackageText, DbError> {
        let owner = self.schema.clone();
        let name = name.to_string();
        self.with_conn(move |conn| {
            let mut text = PackageText::default();
            let rows = conn.query(
                "SELECT type, text FROM all_source \
                 WHERE owner = :1 AND name = :2 AND type IN ('PACKAGE', 'PACKAGE BODY') \
                 ORDER BY type, line",
                &[&owner, &name],
            )?;
            for row in rows {
                let row = row?;
                let source_type = row.get::<_, Option<String>>(0)?.unwrap_or_default();
                let line = row.get::<_, Option<String>>(1)?.unwrap_or_default();
                if source_type == "PACKAGE" {
                    text.spec.push_str(&line);
                } else {
                    text.body.push_str(&line);
                }
            }
            if text.spec.is_empty() && text.body.is_empty() {
                return Err(oracle::Error::NoDataFound);
            }
            Ok(text)
        })
        .await
    }

    async fn get_columns(&self, table: &str) -> Result<Vec<ColumnMetadata>, DbError> {
        let owner = self.schema.clone();
        let table = table.to_string();
        self.with_conn(move |conn| {
            let identity_rows = conn.query(
                "SELECT column_name FROM all_tab_identity_cols \
                 WHERE owner = :1 AND table_name = :2",
                &[&owner, &table],
            )?;
            let mut identity_columns = Vec::new();
            for row in identity_rows {
                let row = row?;
                if let Some(name) = row.get::<_, Option<String>>(0)? {
                    identity_columns.push(name);
                }
            }

            let rows = conn.query(
                "SELECT column_name, data_type, nullable FROM all_tab_columns \
                 WHERE owner = :1 AND table_name = :2 ORDER BY column_id",
                &[&owner, &table],
            )?;
            let mut columns = Vec::new();
            for row in rows {
                let row = row?;
                let name = row.get::<_, Option<String>>(0)?.unwrap_or_default();
                let data_type = row.get::<_, Option<String>>(1)?.unwrap_or_default();
                columns.push(ColumnMetadata {
                    nullable: row
                        .get::<_, Option<String>>(2)?
                        .is_some_and(|n| n == "Y"),
                    is_identity: identity_columns.iter().any(|c| c == &name),
                    is_lob: is_lob_type(&data_type),
                    name,
                    data_type,
                });
            }
            Ok(columns)
        })
        .await
    }

    async fn table_stats(&self, table: &str) -> Result<TableStats, DbError> {
        let owner = self.schema.clone();
        let table = table.to_string();
        self.with_conn(move |conn| {
            let row = conn.query_row(
                "SELECT NVL(num_rows, 0), NVL(num_rows * avg_row_len, 0) \
                 FROM all_tables WHERE owner = :1 AND table_name = :2",
                &[&owner, &table],
            )?;
            Ok(TableStats {
                row_count: row.get::<_, Option<i64>>(0)?.unwrap_or(0).max(0) as u64,
                byte_size: row.get::<_, Option<i64>>(1)?.unwrap_or(0).max(0) as u64,
            })
        })
        .await
    }

    async fn fetch_rows(&self, table: &str) -> Result<Vec<RowData>, DbError> {
        let owner = self.schema.clone();
        let table = table.to_string();
        self.with_conn(move |conn| {
            let sql = format!("SELECT * FROM \"{owner}\".\"{table}\"");
            let rows = conn.query(&sql, &[])?;
            let column_info: Vec<(String, oracle::sql_type::OracleType)> = rows
                .column_info()
                .iter()
                .map(|ci| (ci.name().to_string(), ci.oracle_type().clone()))
                .collect();

            let mut fetched = Vec::new();
            for row in rows {
                let row = row?;
                let mut values = Vec::with_capacity(column_info.len());
                for (idx, (_, column_type)) in column_info.iter().enumerate() {
                    let value = read_cell(&row, idx, column_type).unwrap_or_else(|err| {
                        debug!(error = %err, column = idx, "cell read failed, storing NULL");
                        Value::Null
                    });
                    values.push(value);
                }
                fetched.push(RowData::new(
                    column_info.iter().map(|(name, _)| name.clone()).collect(),
                    values,
                ));
            }
            Ok(fetched)
        })
        .await
    }

    fn schema(&self) -> String {
        self.schema.clone()
    }
}
