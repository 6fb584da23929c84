use crate::sequence::IdentityPlan;
use once_cell::sync::Lazy;
use regex::Regex;

static COLUMN_TYPE: Lazy<Regex> = Lazy::new(|| {
    // column name (optionally bracket/double-quoted) followed by its type,
    // e.g. `EMP_ID INT`, `[EMP_ID] NUMERIC(10)`, `"emp_id" BIGINT`.
    Regex::new(r#"(?im)^(\s*(?:\[[^\]]+\]|"[^"]+"|[A-Za-z0-9_$#]+)\s+)([A-Za-z0-9_]+(?:\s*\([^)]*\))?)"#)
        .expect("valid column regex")
});

/// Rewrites the translated table DDL so the planned column carries
/// `IDENTITY(seed, 1)` right after its type.
pub fn inject_identity(ddl: &str, plan: &IdentityPlan) -> String {
    let mut out = String::with_capacity(ddl.len() + 24);
    let mut injected = false;

    for (idx, line) in ddl.lines().enumerate() {
        if idx > 0 {
            out.push('\n');
        }
        if !injected && line_defines_column(line, &plan.column) {
            if let Some(caps) = COLUMN_TYPE.captures(line) {
                let head_end = caps.get(2).map(|m| m.end()).unwrap_or(0);
                out.push_str(&line[..head_end]);
                out.push_str(&format!(" IDENTITY({},1)", plan.seed));
                out.push_str(&line[head_end..]);
                injected = true;
                continue;
            }
        }
        out.push_str(line);
    }
    out
}

fn line_defines_column(line: &str, column: &str) -> bool {
    let trimmed = line.trim_start();
    let name = trimmed
        .split_whitespace()
        .next()
        .unwrap_or("")
        .trim_matches(['[', ']', '"']);
    name.eq_ignore_ascii_case(column)
}

/// Statements wrapped around the data copy of an identity table. The
/// inserts between ON and OFF preserve the source ids; the reseed leaves
/// the column's counter past the highest copied id.
pub fn identity_insert_on(qualified_table: &str) -> String {
    format!("SET IDENTITY_INSERT {qualified_table} ON;")
}

pub fn identity_insert_off(qualified_table: &str) -> String {
    format!("SET IDENTITY_INSERT {qualified_table} OFF;")
}

pub fn reseed_statement(qualified_table: &str, column: &str) -> String {
    format!(
        "DECLARE @seed BIGINT = (SELECT MAX([{column}]) FROM {qualified_table});\n\
         IF @seed IS NOT NULL DBCC CHECKIDENT('{qualified_table}', RESEED, @seed);"
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use model::core::identifiers::QualifiedName;

    fn plan(seed: i64) -> IdentityPlan {
        IdentityPlan {
            sequence: QualifiedName::new("HR", "EMP_SEQ"),
            table: QualifiedName::new("HR", "EMP"),
            column: "EMP_ID".into(),
            seed,
            skipped_trigger: "HR.EMP_BI".into(),
        }
    }

    #[test]
    fn identity_lands_after_the_type() {
        let ddl = "CREATE TABLE [dbo].[EMP] (\n    [EMP_ID] INT NOT NULL PRIMARY KEY,\n    [NAME] NVARCHAR(100)\n)";
        let rewritten = inject_identity(ddl, &plan(42));
        assert!(rewritten.contains("[EMP_ID] INT IDENTITY(42,1) NOT NULL PRIMARY KEY"));
        assert!(rewritten.contains("[NAME] NVARCHAR(100)"));
    }

    #[test]
    fn parenthesized_types_keep_their_arguments() {
        let ddl = "CREATE TABLE T (\n    EMP_ID NUMERIC(10,0) NOT NULL\n)";
        let rewritten = inject_identity(ddl, &plan(1));
        assert!(rewritten.contains("EMP_ID NUMERIC(10,0) IDENTITY(1,1) NOT NULL"));
    }

    #[test]
    fn other_columns_are_untouched() {
        let ddl = "CREATE TABLE T (\n    OTHER_ID INT,\n    EMP_ID INT\n)";
        let rewritten = inject_identity(ddl, &plan(5));
        assert!(rewritten.contains("OTHER_ID INT,"));
        assert!(rewritten.contains("EMP_ID INT IDENTITY(5,1)"));
    }

    #[test]
    fn reseed_uses_checkident() {
        let sql = reseed_statement("[dbo].[EMP]", "EMP_ID");
        assert!(sql.contains("DBCC CHECKIDENT('[dbo].[EMP]', RESEED"));
        assert!(sql.contains("MAX([EMP_ID])"));
    }
}
