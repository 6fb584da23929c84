use crate::core::identifiers::QualifiedName;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum FkValidationError {
    #[error("Foreign key {0}: constraint name is empty")]
    EmptyConstraintName(String),

    #[error("Foreign key {0}: column list is empty")]
    EmptyColumns(String),

    #[error(
        "Foreign key {name}: {source_count} source columns but {referenced} referenced columns"
    )]
    ColumnCountMismatch {
        name: String,
        source_count: usize,
        referenced: usize,
    },
}

/// Referential action carried over from the stripped clause.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReferentialAction {
    NoAction,
    Cascade,
    SetNull,
    SetDefault,
}

impl ReferentialAction {
    pub fn as_sql(&self) -> &'static str {
        match self {
            ReferentialAction::NoAction => "NO ACTION",
            ReferentialAction::Cascade => "CASCADE",
            ReferentialAction::SetNull => "SET NULL",
            ReferentialAction::SetDefault => "SET DEFAULT",
        }
    }
}

/// A foreign-key constraint stripped from a table's DDL, held until the
/// two-phase apply step. Identity is `(constraint_name, source table)`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForeignKeyDef {
    pub constraint_name: String,
    pub source_table: QualifiedName,
    pub source_columns: Vec<String>,
    pub referenced_table: QualifiedName,
    pub referenced_columns: Vec<String>,
    pub on_delete: Option<ReferentialAction>,
    pub on_update: Option<ReferentialAction>,
}

impl ForeignKeyDef {
    /// Checks the invariants that must hold before the definition may be
    /// emitted as an ALTER TABLE statement.
    pub fn validate(&self) -> Result<(), FkValidationError> {
        if self.constraint_name.trim().is_empty() {
            return Err(FkValidationError::EmptyConstraintName(
                self.source_table.to_string(),
            ));
        }
        if self.source_columns.is_empty() || self.referenced_columns.is_empty() {
            return Err(FkValidationError::EmptyColumns(self.constraint_name.clone()));
        }
        if self.source_columns.len() != self.referenced_columns.len() {
            return Err(FkValidationError::ColumnCountMismatch {
                name: self.constraint_name.clone(),
                source_count: self.source_columns.len(),
                referenced: self.referenced_columns.len(),
            });
        }
        Ok(())
    }

    pub fn is_self_referencing(&self) -> bool {
        self.source_table == self.referenced_table
    }

    /// Renders the `ALTER TABLE ... ADD CONSTRAINT` statement, preserving
    /// column order and referential actions from the stripped clause.
    pub fn to_alter_statement(&self) -> String {
        let mut sql = format!(
            "ALTER TABLE {} ADD CONSTRAINT [{}] FOREIGN KEY ({}) REFERENCES {} ({})",
            self.source_table.bracketed(),
            self.constraint_name,
            bracket_list(&self.source_columns),
            self.referenced_table.bracketed(),
            bracket_list(&self.referenced_columns),
        );
        if let Some(action) = self.on_delete {
            sql.push_str(" ON DELETE ");
            sql.push_str(action.as_sql());
        }
        if let Some(action) = self.on_update {
            sql.push_str(" ON UPDATE ");
            sql.push_str(action.as_sql());
        }
        sql.push(';');
        sql
    }
}

fn bracket_list(columns: &[String]) -> String {
    columns
        .iter()
        .map(|c| format!("[{c}]"))
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_fk() -> ForeignKeyDef {
        ForeignKeyDef {
            constraint_name: "FK_EMP_DEPT".into(),
            source_table: QualifiedName::new("dbo", "EMPLOYEES"),
            source_columns: vec!["DEPT_ID".into()],
            referenced_table: QualifiedName::new("dbo", "DEPARTMENTS"),
            referenced_columns: vec!["ID".into()],
            on_delete: Some(ReferentialAction::Cascade),
            on_update: None,
        }
    }

    #[test]
    fn valid_fk_passes_validation() {
        assert!(sample_fk().validate().is_ok());
    }

    #[test]
    fn column_count_mismatch_is_rejected() {
        let mut fk = sample_fk();
        fk.referenced_columns.push("EXTRA".into());
        assert!(matches!(
            fk.validate(),
            Err(FkValidationError::ColumnCountMismatch { .. })
        ));
    }

    #[test]
    fn alter_statement_preserves_actions() {
        let sql = sample_fk().to_alter_statement();
        assert_eq!(
            sql,
            "ALTER TABLE [dbo].[EMPLOYEES] ADD CONSTRAINT [FK_EMP_DEPT] \
             FOREIGN KEY ([DEPT_ID]) REFERENCES [dbo].[DEPARTMENTS] ([ID]) \
             ON DELETE CASCADE;"
        );
    }

    #[test]
    fn self_reference_detection() {
        let mut fk = sample_fk();
        fk.referenced_table = QualifiedName::new("dbo", "employees");
        assert!(fk.is_self_referencing());
    }
}
