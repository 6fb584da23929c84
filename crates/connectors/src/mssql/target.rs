use crate::{
    adapter::TargetAdapter,
    config::MssqlConfig,
    error::{ConnectorError, DbError},
    mssql::encoder::render_insert,
};
use async_trait::async_trait;
use futures_util::TryStreamExt;
use model::core::{
    identifiers::ObjectKind,
    value::{ColumnMetadata, RowData, Value},
};
use plsql_syntax::batch::{contains_standalone_go, split_batches};
use tiberius::{AuthMethod, Client, Config, ColumnData, QueryItem};
use tokio::{net::TcpStream, sync::Mutex};
use tokio_util::compat::{Compat, TokioAsyncWriteCompatExt};
use tracing::{debug, warn};

type TdsClient = Client<Compat<TcpStream>>;

/// Target adapter over one SQL Server connection. All statements run on a
/// single connection guarded by a mutex; session flags like IDENTITY_INSERT
/// therefore apply to exactly the statements between toggles.
pub struct MssqlTargetAdapter {
    client: Mutex<TdsClient>,
}

impl MssqlTargetAdapter {
    pub async fn connect(cfg: &MssqlConfig) -> Result<Self, ConnectorError> {
        let mut config = Config::new();
        config.host(&cfg.host);
        config.port(cfg.port);
        config.database(&cfg.database);
        if cfg.trusted {
            #[cfg(windows)]
            config.authentication(AuthMethod::Integrated);
            #[cfg(not(windows))]
            return Err(ConnectorError::InvalidConfig(
                "trusted authentication is only available on Windows".into(),
            ));
        } else {
            config.authentication(AuthMethod::sql_server(&cfg.user, &cfg.password));
        }
        config.trust_cert();

        let tcp = TcpStream::connect(config.get_addr()).await?;
        tcp.set_nodelay(true)?;
        let client = Client::connect(config, tcp.compat_write()).await?;

        Ok(MssqlTargetAdapter {
            client: Mutex::new(client),
        })
    }

    async fn run_batch(&self, sql: &str) -> Result<(), DbError> {
        let mut client = self.client.lock().await;
        client.simple_query(sql).await?.into_results().await?;
        Ok(())
    }

    async fn query_internal(&self, sql: &str) -> Result<Vec<RowData>, DbError> {
        let mut client = self.client.lock().await;
        let mut stream = client.simple_query(sql).await?;
        let mut rows = Vec::new();
        while let Some(item) = stream.try_next().await? {
            if let QueryItem::Row(row) = item {
                rows.push(convert_row(row));
            }
        }
        Ok(rows)
    }

    /// Runs a script whose final statement is `SELECT @@ROWCOUNT` and
    /// returns that authoritative count.
    async fn run_counting(&self, sql: &str) -> Result<u64, DbError> {
        let rows = self.query_internal(sql).await?;
        let count = rows
            .last()
            .and_then(|row| row.values.first())
            .and_then(|value| value.as_i64())
            .unwrap_or(0);
        Ok(count.max(0) as u64)
    }
}

fn convert_row(row: tiberius::Row) -> RowData {
    let columns: Vec<String> = row
        .columns()
        .iter()
        .map(|c| c.name().to_string())
        .collect();
    let values = row.into_iter().map(convert_cell).collect();
    RowData::new(columns, values)
}

fn convert_cell(data: ColumnData<'_>) -> Value {
    match data {
        ColumnData::U8(v) => v.map(|x| Value::Int(x as i64)).unwrap_or(Value::Null),
        ColumnData::I16(v) => v.map(|x| Value::Int(x as i64)).unwrap_or(Value::Null),
        ColumnData::I32(v) => v.map(|x| Value::Int(x as i64)).unwrap_or(Value::Null),
        ColumnData::I64(v) => v.map(Value::Int).unwrap_or(Value::Null),
        ColumnData::F32(v) => v.map(|x| Value::Float(x as f64)).unwrap_or(Value::Null),
        ColumnData::F64(v) => v.map(Value::Float).unwrap_or(Value::Null),
        ColumnData::Bit(v) => v.map(Value::Boolean).unwrap_or(Value::Null),
        ColumnData::String(v) => v
            .map(|x| Value::Text(x.into_owned()))
            .unwrap_or(Value::Null),
        ColumnData::Binary(v) => v
            .map(|x| Value::Bytes(x.into_owned()))
            .unwrap_or(Value::Null),
        ColumnData::Numeric(v) => v
            .map(|x| Value::Decimal(x.to_string()))
            .unwrap_or(Value::Null),
        other => {
            debug!(?other, "unmapped column data variant read as NULL");
            Value::Null
        }
    }
}

#[async_trait]
impl TargetAdapter for MssqlTargetAdapter {
    async fn execute(&self, sql: &str) -> Result<(), DbError> {
        if contains_standalone_go(sql) {
            return Err(DbError::EmbeddedGo(first_line(sql)));
        }
        self.run_batch(sql).await
    }

    async fn execute_ddl(&self, script: &str) -> Result<(), DbError> {
        for batch in split_batches(script) {
            if contains_standalone_go(&batch) {
                return Err(DbError::EmbeddedGo(first_line(&batch)));
            }
            self.run_batch(&batch).await?;
        }
        Ok(())
    }

    async fn query_rows(&self, sql: &str) -> Result<Vec<RowData>, DbError> {
        self.query_internal(sql).await
    }

    async fn get_columns(
        &self,
        schema: &str,
        table: &str,
    ) -> Result<Vec<ColumnMetadata>, DbError> {
        let sql = format!(
            "SELECT c.COLUMN_NAME, c.DATA_TYPE, c.IS_NULLABLE, \
             COLUMNPROPERTY(OBJECT_ID(QUOTENAME(c.TABLE_SCHEMA) + '.' + QUOTENAME(c.TABLE_NAME)), c.COLUMN_NAME, 'IsIdentity') AS IS_IDENTITY, \
             c.CHARACTER_MAXIMUM_LENGTH \
             FROM INFORMATION_SCHEMA.COLUMNS c \
             WHERE c.TABLE_SCHEMA = '{}' AND c.TABLE_NAME = '{}' \
             ORDER BY c.ORDINAL_POSITION",
            sanitize(schema),
            sanitize(table),
        );
        let rows = self.query_internal(&sql).await?;
        Ok(rows
            .into_iter()
            .map(|row| {
                let data_type = row
                    .get("DATA_TYPE")
                    .and_then(|v| v.as_str().map(str::to_string))
                    .unwrap_or_default();
                let max_len = row.get("CHARACTER_MAXIMUM_LENGTH").and_then(|v| v.as_i64());
                ColumnMetadata {
                    name: row
                        .get("COLUMN_NAME")
                        .and_then(|v| v.as_str().map(str::to_string))
                        .unwrap_or_default(),
                    nullable: row
                        .get("IS_NULLABLE")
                        .and_then(|v| v.as_str())
                        .is_some_and(|v| v.eq_ignore_ascii_case("YES")),
                    is_identity: row
                        .get("IS_IDENTITY")
                        .and_then(|v| v.as_i64())
                        .unwrap_or(0)
                        == 1,
                    is_lob: matches!(data_type.to_lowercase().as_str(), "text" | "ntext" | "image" | "xml")
                        || max_len == Some(-1),
                    data_type,
                }
            })
            .collect())
    }

    async fn object_exists(
        &self,
        schema: &str,
        name: &str,
        kind: ObjectKind,
    ) -> Result<bool, DbError> {
        let type_filter = match kind {
            ObjectKind::Table => "AND o.type = 'U'",
            ObjectKind::View => "AND o.type = 'V'",
            ObjectKind::Procedure | ObjectKind::PackageMember => {
                "AND o.type IN ('P', 'FN', 'IF', 'TF')"
            }
            ObjectKind::Function => "AND o.type IN ('FN', 'IF', 'TF')",
            ObjectKind::Trigger => "AND o.type = 'TR'",
            ObjectKind::Sequence => "AND o.type = 'SO'",
            ObjectKind::Package => "AND 1 = 0",
        };
        let sql = format!(
            "SELECT COUNT(*) AS N FROM sys.objects o \
             JOIN sys.schemas s ON s.schema_id = o.schema_id \
             WHERE s.name = '{}' AND o.name = '{}' {type_filter}",
            sanitize(schema),
            sanitize(name),
        );
        let rows = self.query_internal(&sql).await?;
        Ok(rows
            .first()
            .and_then(|r| r.values.first())
            .and_then(|v| v.as_i64())
            .unwrap_or(0)
            > 0)
    }

    async fn truncate_table(&self, schema: &str, table: &str) -> Result<(), DbError> {
        self.run_batch(&format!("TRUNCATE TABLE [{}].[{}]", schema, table))
            .await
    }

    async fn bulk_insert(
        &self,
        qualified_table: &str,
        columns: &[String],
        rows: &[RowData],
        identity_columns: &[String],
    ) -> Result<u64, DbError> {
        if rows.is_empty() {
            return Ok(0);
        }

        let insert = render_insert(qualified_table, columns, rows);
        let with_identity = !identity_columns.is_empty();

        if with_identity {
            self.run_batch(&format!("SET IDENTITY_INSERT {qualified_table} ON"))
                .await?;
        }

        let script =
            format!("BEGIN TRAN;\n{insert};\nSELECT @@ROWCOUNT AS AFFECTED;\nCOMMIT TRAN;");
        let result = self.run_counting(&script).await;

        if let Err(ref err) = result {
            warn!(error = %err, table = qualified_table, "batch insert failed, rolling back");
            if let Err(rollback) = self.run_batch("IF @@TRANCOUNT > 0 ROLLBACK TRAN").await {
                warn!(error = %rollback, "rollback after failed batch also failed");
            }
        }

        // IDENTITY_INSERT must be switched off on every exit path.
        if with_identity
            && let Err(off) = self
                .run_batch(&format!("SET IDENTITY_INSERT {qualified_table} OFF"))
                .await
        {
            warn!(error = %off, table = qualified_table, "failed to clear IDENTITY_INSERT");
        }

        result
    }
}

fn sanitize(ident: &str) -> String {
    ident.replace('\'', "''")
}

fn first_line(text: &str) -> String {
    text.lines().next().unwrap_or_default().to_string()
}
