use crate::{adapter::TargetAdapter, error::DbError};
use async_trait::async_trait;
use model::core::{
    identifiers::ObjectKind,
    value::{ColumnMetadata, RowData},
};
use once_cell::sync::Lazy;
use plsql_syntax::batch::{contains_standalone_go, split_batches};
use regex::Regex;
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

static CREATE_STMT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?is)\bCREATE\s+(?:OR\s+ALTER\s+)?(TABLE|VIEW|PROCEDURE|PROC|FUNCTION|TRIGGER|SEQUENCE)\s+((?:\[[^\]]+\]|[A-Za-z0-9_$#]+)(?:\s*\.\s*(?:\[[^\]]+\]|[A-Za-z0-9_$#]+))?)",
    )
    .expect("valid CREATE regex")
});
static DROP_STMT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?is)\bDROP\s+(?:TABLE|VIEW|PROCEDURE|PROC|FUNCTION|TRIGGER|SEQUENCE)\s+(?:IF\s+EXISTS\s+)?((?:\[[^\]]+\]|[A-Za-z0-9_$#]+)(?:\s*\.\s*(?:\[[^\]]+\]|[A-Za-z0-9_$#]+))?)",
    )
    .expect("valid DROP regex")
});

#[derive(Debug)]
struct ScriptedFailure {
    needle: String,
    error: String,
    remaining: usize,
}

#[derive(Debug, Default)]
struct TargetState {
    executed: Vec<String>,
    failures: Vec<ScriptedFailure>,
    objects: HashSet<String>,
    columns: HashMap<String, Vec<ColumnMetadata>>,
    inserted: HashMap<String, Vec<RowData>>,
    truncated: Vec<String>,
    query_results: Vec<(String, Vec<RowData>)>,
}

/// In-memory target used by tests. Failures can be scripted per statement
/// substring with a bounded repeat count, which is how deploy-retry and
/// dependency-cycle scenarios are driven.
#[derive(Debug, Default)]
pub struct MockTarget {
    state: Mutex<TargetState>,
}

impl MockTarget {
    pub fn new() -> Self {
        MockTarget::default()
    }

    /// Scripts the next `times` executions of a statement containing
    /// `needle` to fail with `error`.
    pub fn fail_matching(&self, needle: &str, error: &str, times: usize) {
        let mut state = self.lock();
        state.failures.push(ScriptedFailure {
            needle: needle.to_string(),
            error: error.to_string(),
            remaining: times,
        });
    }

    pub fn set_columns(&self, schema: &str, table: &str, columns: Vec<ColumnMetadata>) {
        self.lock()
            .columns
            .insert(key(schema, table), columns);
    }

    pub fn add_existing_object(&self, schema: &str, name: &str) {
        self.lock().objects.insert(key(schema, name));
    }

    /// Registers rows returned by `query_rows` calls whose SQL contains
    /// `needle`.
    pub fn set_query_result(&self, needle: &str, rows: Vec<RowData>) {
        self.lock().query_results.push((needle.to_string(), rows));
    }

    /// Every batch submitted, in execution order.
    pub fn executed(&self) -> Vec<String> {
        self.lock().executed.clone()
    }

    pub fn inserted_rows(&self, schema: &str, table: &str) -> Vec<RowData> {
        self.lock()
            .inserted
            .get(&key(schema, table))
            .cloned()
            .unwrap_or_default()
    }

    pub fn truncated(&self) -> Vec<String> {
        self.lock().truncated.clone()
    }

    pub fn has_object(&self, schema: &str, name: &str) -> bool {
        self.lock().objects.contains(&key(schema, name))
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, TargetState> {
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Session toggles bypass failure scripting; scripted failures target
    /// the statements under test, not the bookkeeping around them.
    fn record(&self, sql: &str) {
        self.lock().executed.push(sql.to_string());
    }

    fn run_one(&self, sql: &str) -> Result<(), DbError> {
        let mut guard = self.lock();
        let state = &mut *guard;
        for failure in state.failures.iter_mut() {
            if failure.remaining > 0 && sql.contains(&failure.needle) {
                failure.remaining -= 1;
                let error = failure.error.clone();
                state.executed.push(format!("-- failed: {sql}"));
                return Err(DbError::Write(error));
            }
        }
        state.executed.push(sql.to_string());
        for caps in CREATE_STMT.captures_iter(sql) {
            let name = normalize_reference(&caps[2]);
            state.objects.insert(name);
        }
        for caps in DROP_STMT.captures_iter(sql) {
            let name = normalize_reference(&caps[1]);
            state.objects.remove(&name);
        }
        Ok(())
    }
}

fn key(schema: &str, name: &str) -> String {
    format!("{}.{}", schema.to_lowercase(), name.to_lowercase())
}

/// `[dbo].[T]` → `dbo.t`; unqualified names get the default schema.
fn normalize_reference(raw: &str) -> String {
    let cleaned: Vec<String> = raw
        .split('.')
        .map(|p| p.trim().trim_matches(['[', ']']).to_lowercase())
        .collect();
    match cleaned.len() {
        1 => format!("dbo.{}", cleaned[0]),
        _ => cleaned.join("."),
    }
}

#[async_trait]
impl TargetAdapter for MockTarget {
    async fn execute(&self, sql: &str) -> Result<(), DbError> {
        if contains_standalone_go(sql) {
            return Err(DbError::EmbeddedGo(sql.lines().next().unwrap_or("").into()));
        }
        self.run_one(sql)
    }

    async fn execute_ddl(&self, script: &str) -> Result<(), DbError> {
        for batch in split_batches(script) {
            if contains_standalone_go(&batch) {
                return Err(DbError::EmbeddedGo(
                    batch.lines().next().unwrap_or("").into(),
                ));
            }
            self.run_one(&batch)?;
        }
        Ok(())
    }

    async fn query_rows(&self, sql: &str) -> Result<Vec<RowData>, DbError> {
        let state = self.lock();
        Ok(state
            .query_results
            .iter()
            .find(|(needle, _)| sql.contains(needle.as_str()))
            .map(|(_, rows)| rows.clone())
            .unwrap_or_default())
    }

    async fn get_columns(
        &self,
        schema: &str,
        table: &str,
    ) -> Result<Vec<ColumnMetadata>, DbError> {
        Ok(self
            .lock()
            .columns
            .get(&key(schema, table))
            .cloned()
            .unwrap_or_default())
    }

    async fn object_exists(
        &self,
        schema: &str,
        name: &str,
        _kind: ObjectKind,
    ) -> Result<bool, DbError> {
        Ok(self.has_object(schema, name))
    }

    async fn truncate_table(&self, schema: &str, table: &str) -> Result<(), DbError> {
        self.lock().truncated.push(key(schema, table));
        Ok(())
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
        let with_identity = !identity_columns.is_empty();
        if with_identity {
            self.record(&format!("SET IDENTITY_INSERT {qualified_table} ON"));
        }

        let result = (|| {
            let mut guard = self.lock();
            let state = &mut *guard;
            for failure in state.failures.iter_mut() {
                if failure.remaining > 0 && qualified_table.contains(&failure.needle) {
                    failure.remaining -= 1;
                    return Err(DbError::Write(failure.error.clone()));
                }
            }
            let entry = state
                .inserted
                .entry(normalize_reference(qualified_table))
                .or_default();
            entry.extend(rows.iter().cloned());
            state.executed.push(format!(
                "INSERT INTO {qualified_table} ({}) -- {} rows",
                columns.join(", "),
                rows.len()
            ));
            Ok(rows.len() as u64)
        })();

        // OFF is emitted on every exit path, success or failure.
        if with_identity {
            self.record(&format!("SET IDENTITY_INSERT {qualified_table} OFF"));
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use model::core::value::Value;

    #[tokio::test]
    async fn scripted_failures_are_consumed() {
        let target = MockTarget::new();
        target.fail_matching("CREATE PROCEDURE", "Could not find stored procedure 'P2'.", 1);

        let sql = "CREATE PROCEDURE dbo.P1 AS BEGIN SELECT 1 END";
        assert!(target.execute(sql).await.is_err());
        assert!(target.execute(sql).await.is_ok());
        assert!(target.has_object("dbo", "p1"));
    }

    #[tokio::test]
    async fn embedded_go_is_refused() {
        let target = MockTarget::new();
        let err = target.execute("SELECT 1\nGO\nSELECT 2").await.unwrap_err();
        assert!(matches!(err, DbError::EmbeddedGo(_)));
    }

    #[tokio::test]
    async fn bulk_insert_toggles_identity_on_failure_too() {
        let target = MockTarget::new();
        target.fail_matching("[dbo].[EMP]", "Cannot insert explicit value", 1);

        let rows = vec![RowData::new(vec!["ID".into()], vec![Value::Int(1)])];
        let result = target
            .bulk_insert("[dbo].[EMP]", &["ID".into()], &rows, &["ID".into()])
            .await;
        assert!(result.is_err());

        let executed = target.executed();
        assert!(executed.iter().any(|s| s.contains("IDENTITY_INSERT") && s.ends_with("ON")));
        assert!(executed.iter().any(|s| s.contains("IDENTITY_INSERT") && s.ends_with("OFF")));
    }

    #[tokio::test]
    async fn create_or_alter_registers_object() {
        let target = MockTarget::new();
        target
            .execute("CREATE OR ALTER VIEW [dbo].[V1] AS SELECT 1 AS A")
            .await
            .unwrap();
        assert!(target.has_object("dbo", "v1"));
        target.execute("DROP VIEW [dbo].[V1]").await.unwrap();
        assert!(!target.has_object("dbo", "v1"));
    }
}
