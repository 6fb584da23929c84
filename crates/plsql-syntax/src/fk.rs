use once_cell::sync::Lazy;
use regex::Regex;

// One identifier, possibly bracket- or double-quote-wrapped.
const IDENT: &str = r#"(?:\[[^\]]+\]|"[^"]+"|[A-Za-z0-9_$#]+)"#;

static FK_CLAUSE: Lazy<Regex> = Lazy::new(|| {
    let pattern = format!(
        r#"(?is),?\s*CONSTRAINT\s+({ident})\s+FOREIGN\s+KEY\s*\(([^)]*)\)\s*REFERENCES\s+({ident}(?:\s*\.\s*{ident})?)\s*\(([^)]*)\)((?:\s*ON\s+(?:DELETE|UPDATE)\s+(?:CASCADE|SET\s+NULL|SET\s+DEFAULT|NO\s+ACTION))*)"#,
        ident = IDENT
    );
    Regex::new(&pattern).expect("valid FK clause regex")
});

static ON_DELETE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?is)ON\s+DELETE\s+(CASCADE|SET\s+NULL|SET\s+DEFAULT|NO\s+ACTION)")
        .expect("valid regex")
});
static ON_UPDATE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?is)ON\s+UPDATE\s+(CASCADE|SET\s+NULL|SET\s+DEFAULT|NO\s+ACTION)")
        .expect("valid regex")
});

/// A foreign-key clause as found in the DDL, before resolution against the
/// run's default schema. Quoting is already stripped from all name fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FkClause {
    pub constraint_name: String,
    pub columns: Vec<String>,
    /// `table` or `schema.table`, unquoted.
    pub referenced: String,
    pub referenced_columns: Vec<String>,
    pub on_delete: Option<String>,
    pub on_update: Option<String>,
}

/// Result of removing FK clauses from a CREATE TABLE statement.
#[derive(Debug, Clone)]
pub struct StrippedDdl {
    pub ddl: String,
    pub clauses: Vec<FkClause>,
}

/// Strips every `CONSTRAINT ... FOREIGN KEY ... REFERENCES ...` clause from
/// a table DDL and returns both the cleaned DDL and the parsed clauses.
/// Handles unquoted, bracket-quoted and double-quoted identifiers, optional
/// schema qualification in any mixed quoting form, and trailing ON
/// DELETE/ON UPDATE actions in either order.
pub fn strip_foreign_keys(ddl: &str) -> StrippedDdl {
    let mut clauses = Vec::new();

    let cleaned = FK_CLAUSE
        .replace_all(ddl, |caps: &regex::Captures<'_>| {
            clauses.push(FkClause {
                constraint_name: unquote(&caps[1]),
                columns: split_columns(&caps[2]),
                referenced: unquote_reference(&caps[3]),
                referenced_columns: split_columns(&caps[4]),
                on_delete: ON_DELETE
                    .captures(&caps[5])
                    .map(|c| normalize_action(&c[1])),
                on_update: ON_UPDATE
                    .captures(&caps[5])
                    .map(|c| normalize_action(&c[1])),
            });
            String::new()
        })
        .into_owned();

    StrippedDdl {
        ddl: fix_dangling_commas(&cleaned),
        clauses,
    }
}

fn unquote(ident: &str) -> String {
    ident.trim().trim_matches(['[', ']', '"']).to_string()
}

/// `[S].[T]` → `S.T`, preserving an absent schema part.
fn unquote_reference(reference: &str) -> String {
    reference
        .split('.')
        .map(unquote)
        .collect::<Vec<_>>()
        .join(".")
}

fn split_columns(list: &str) -> Vec<String> {
    list.split(',')
        .map(unquote)
        .filter(|c| !c.is_empty())
        .collect()
}

fn normalize_action(action: &str) -> String {
    action.split_whitespace().collect::<Vec<_>>().join(" ").to_uppercase()
}

static LEADING_COMMA: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\(\s*,").expect("valid regex"));
static TRAILING_COMMA: Lazy<Regex> =
    Lazy::new(|| Regex::new(r",\s*\)").expect("valid regex"));
static DOUBLE_COMMA: Lazy<Regex> =
    Lazy::new(|| Regex::new(r",\s*,").expect("valid regex"));

/// A removed clause can leave the column list with a stray comma at either
/// end or two commas in a row; repair without disturbing the layout.
fn fix_dangling_commas(ddl: &str) -> String {
    let pass = DOUBLE_COMMA.replace_all(ddl, ",");
    let pass = LEADING_COMMA.replace_all(&pass, "(");
    TRAILING_COMMA.replace_all(&pass, "\n)").into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    const DDL: &str = r#"
CREATE TABLE [dbo].[EMPLOYEES] (
    EMP_ID INT NOT NULL,
    DEPT_ID INT,
    MGR_ID INT,
    CONSTRAINT PK_EMP PRIMARY KEY (EMP_ID),
    CONSTRAINT FK_EMP_DEPT FOREIGN KEY (DEPT_ID) REFERENCES [dbo].[DEPARTMENTS] (DEPT_ID) ON DELETE CASCADE,
    CONSTRAINT [FK_EMP_MGR] FOREIGN KEY (MGR_ID) REFERENCES EMPLOYEES (EMP_ID)
)
"#;

    #[test]
    fn strips_all_fk_clauses_and_keeps_the_rest() {
        let stripped = strip_foreign_keys(DDL);
        assert_eq!(stripped.clauses.len(), 2);
        assert!(!stripped.ddl.to_uppercase().contains("FOREIGN KEY"));
        assert!(stripped.ddl.contains("PK_EMP"));
        assert!(stripped.ddl.contains("EMP_ID INT NOT NULL"));
    }

    #[test]
    fn parses_reference_and_actions() {
        let stripped = strip_foreign_keys(DDL);
        let dept = &stripped.clauses[0];
        assert_eq!(dept.constraint_name, "FK_EMP_DEPT");
        assert_eq!(dept.columns, vec!["DEPT_ID"]);
        assert_eq!(dept.referenced, "dbo.DEPARTMENTS");
        assert_eq!(dept.referenced_columns, vec!["DEPT_ID"]);
        assert_eq!(dept.on_delete.as_deref(), Some("CASCADE"));
        assert!(dept.on_update.is_none());

        let mgr = &stripped.clauses[1];
        assert_eq!(mgr.constraint_name, "FK_EMP_MGR");
        assert_eq!(mgr.referenced, "EMPLOYEES");
    }

    #[test]
    fn handles_every_reference_quoting_form() {
        for reference in ["T", "[T]", "S.T", "[S].[T]", "[S].T", "S.[T]"] {
            let ddl = format!(
                "CREATE TABLE X (A INT, CONSTRAINT FK_X FOREIGN KEY (A) REFERENCES {reference} (B))"
            );
            let stripped = strip_foreign_keys(&ddl);
            assert_eq!(stripped.clauses.len(), 1, "form {reference}");
            let expected = reference.replace(['[', ']'], "");
            assert_eq!(stripped.clauses[0].referenced, expected, "form {reference}");
        }
    }

    #[test]
    fn multi_column_order_is_preserved() {
        let ddl = "CREATE TABLE X (A INT, B INT, CONSTRAINT FK FOREIGN KEY (B, A) REFERENCES Y (D, C))";
        let stripped = strip_foreign_keys(ddl);
        assert_eq!(stripped.clauses[0].columns, vec!["B", "A"]);
        assert_eq!(stripped.clauses[0].referenced_columns, vec!["D", "C"]);
    }

    #[test]
    fn fk_as_first_constraint_leaves_valid_column_list() {
        let ddl = "CREATE TABLE X (CONSTRAINT FK FOREIGN KEY (A) REFERENCES Y (B), A INT)";
        let stripped = strip_foreign_keys(ddl);
        assert_eq!(stripped.clauses.len(), 1);
        let cleaned: String = stripped.ddl.split_whitespace().collect::<Vec<_>>().join(" ");
        assert_eq!(cleaned, "CREATE TABLE X ( A INT)");
    }

    #[test]
    fn set_null_action_is_normalized() {
        let ddl = "CREATE TABLE X (A INT, CONSTRAINT FK FOREIGN KEY (A) REFERENCES Y (B) ON DELETE SET  NULL ON UPDATE NO ACTION)";
        let stripped = strip_foreign_keys(ddl);
        assert_eq!(stripped.clauses[0].on_delete.as_deref(), Some("SET NULL"));
        assert_eq!(stripped.clauses[0].on_update.as_deref(), Some("NO ACTION"));
    }

    #[test]
    fn table_without_fks_is_untouched() {
        let ddl = "CREATE TABLE PLAIN (ID INT PRIMARY KEY)";
        let stripped = strip_foreign_keys(ddl);
        assert!(stripped.clauses.is_empty());
        assert_eq!(stripped.ddl, ddl);
    }
}
