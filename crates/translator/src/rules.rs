use once_cell::sync::Lazy;
use plsql_syntax::tokens::mask_literals;
use regex::{Captures, Regex};

macro_rules! re {
    ($pattern:expr) => {
        Lazy::new(|| Regex::new($pattern).expect("valid rule regex"))
    };
}

static NUMBER_SIZED: Lazy<Regex> = re!(r"(?i)\bNUMBER\s*\(\s*(\d+)\s*(?:,\s*(\d+)\s*)?\)");
static NUMBER_BARE: Lazy<Regex> = re!(r"(?i)\bNUMBER\b");
static VARCHAR2_SIZED: Lazy<Regex> = re!(r"(?i)\bN?VARCHAR2\s*\(\s*(\d+)\s*(?:CHAR|BYTE)?\s*\)");
static VARCHAR2_BARE: Lazy<Regex> = re!(r"(?i)\bN?VARCHAR2\b");
static CHAR_SIZED: Lazy<Regex> = re!(r"(?i)\bN?CHAR\s*\(\s*(\d+)\s*(?:CHAR|BYTE)?\s*\)");
static CLOB: Lazy<Regex> = re!(r"(?i)\bN?CLOB\b");
static LONG_RAW: Lazy<Regex> = re!(r"(?i)\bLONG\s+RAW\b");
static RAW_SIZED: Lazy<Regex> = re!(r"(?i)\bRAW\s*\(\s*(\d+)\s*\)");
static BLOB: Lazy<Regex> = re!(r"(?i)\bBLOB\b");
static LONG: Lazy<Regex> = re!(r"(?i)\bLONG\b");
static TIMESTAMP_SIZED: Lazy<Regex> = re!(r"(?i)\bTIMESTAMP\s*\(\s*(\d)\s*\)(?:\s+WITH(?:\s+LOCAL)?\s+TIME\s+ZONE)?");
static TIMESTAMP_BARE: Lazy<Regex> = re!(r"(?i)\bTIMESTAMP\b(?:\s+WITH(?:\s+LOCAL)?\s+TIME\s+ZONE)?");
static DATE: Lazy<Regex> = re!(r"(?i)\bDATE\b");
static BINARY_FLOAT: Lazy<Regex> = re!(r"(?i)\bBINARY_FLOAT\b");
static BINARY_DOUBLE: Lazy<Regex> = re!(r"(?i)\bBINARY_DOUBLE\b");

/// Maps Oracle column data types onto their SQL Server equivalents.
/// Integer-scaled NUMBERs become the narrowest integer type that holds
/// them; a bare NUMBER primary-key style column becomes INT.
pub fn map_data_types(text: &str) -> String {
    let text = NUMBER_SIZED.replace_all(text, |caps: &Captures<'_>| {
        let precision: u32 = caps[1].parse().unwrap_or(38);
        let scale: u32 = caps
            .get(2)
            .map(|m| m.as_str().parse().unwrap_or(0))
            .unwrap_or(0);
        if scale == 0 {
            match precision {
                0..=4 => "SMALLINT".to_string(),
                5..=9 => "INT".to_string(),
                10..=18 => "BIGINT".to_string(),
                _ => format!("NUMERIC({precision},0)"),
            }
        } else {
            format!("NUMERIC({precision},{scale})")
        }
    });
    let text = NUMBER_BARE.replace_all(&text, "INT");
    let text = VARCHAR2_SIZED.replace_all(&text, "NVARCHAR($1)");
    let text = VARCHAR2_BARE.replace_all(&text, "NVARCHAR(MAX)");
    let text = CHAR_SIZED.replace_all(&text, "NCHAR($1)");
    let text = CLOB.replace_all(&text, "NVARCHAR(MAX)");
    let text = LONG_RAW.replace_all(&text, "VARBINARY(MAX)");
    let text = RAW_SIZED.replace_all(&text, "VARBINARY($1)");
    let text = BLOB.replace_all(&text, "VARBINARY(MAX)");
    let text = LONG.replace_all(&text, "NVARCHAR(MAX)");
    let text = TIMESTAMP_SIZED.replace_all(&text, "DATETIME2($1)");
    let text = TIMESTAMP_BARE.replace_all(&text, "DATETIME2");
    let text = DATE.replace_all(&text, "DATETIME2");
    let text = BINARY_FLOAT.replace_all(&text, "REAL");
    let text = BINARY_DOUBLE.replace_all(&text, "FLOAT");
    text.into_owned()
}

static MINUS: Lazy<Regex> = re!(r"(?i)\bMINUS\b");
static SYSDATE: Lazy<Regex> = re!(r"(?i)\bSYSDATE\b");
static SYSTIMESTAMP: Lazy<Regex> = re!(r"(?i)\bSYSTIMESTAMP\b");
static NVL: Lazy<Regex> = re!(r"(?i)\bNVL\s*\(");
static SUBSTR: Lazy<Regex> = re!(r"(?i)\bSUBSTR\s*\(");
static LENGTH_FN: Lazy<Regex> = re!(r"(?i)\bLENGTH\s*\(");
static FROM_DUAL: Lazy<Regex> = re!(r"(?i)\s*\bFROM\s+SYS\.DUAL\b|\s*\bFROM\s+DUAL\b");
static NEXTVAL: Lazy<Regex> =
    re!(r"(?i)\b([A-Z0-9_$#]+(?:\.[A-Z0-9_$#]+)?)\s*\.\s*NEXTVAL\b");
static QUOTED_IDENT: Lazy<Regex> = re!(r#""([A-Za-z0-9_$#]+)""#);
static SLASH_LINE: Lazy<Regex> = re!(r"(?m)^\s*/\s*$");

/// Dialect-level rewrites safe for any statement: set operators, pseudo
/// columns, built-in functions, DUAL, quoted identifiers, terminator lines.
/// String literal contents are left untouched.
pub fn apply_sql_rules(text: &str) -> String {
    let text = replace_masked(text, &MINUS, "EXCEPT");
    let text = replace_masked(&text, &SYSDATE, "GETDATE()");
    let text = replace_masked(&text, &SYSTIMESTAMP, "SYSDATETIME()");
    let text = replace_masked(&text, &NVL, "ISNULL(");
    let text = replace_masked(&text, &SUBSTR, "SUBSTRING(");
    let text = replace_masked(&text, &LENGTH_FN, "LEN(");
    let text = replace_masked(&text, &FROM_DUAL, "");
    let text = NEXTVAL.replace_all(&text, "NEXT VALUE FOR $1").into_owned();
    let text = QUOTED_IDENT.replace_all(&text, "[$1]").into_owned();
    let text = SLASH_LINE.replace_all(&text, "").into_owned();
    replace_concat_operator(&text)
}

/// Applies a regex replacement only where the match lies outside string
/// literals and comments.
fn replace_masked(text: &str, pattern: &Regex, replacement: &str) -> String {
    let masked = mask_literals(text);
    let mut out = String::with_capacity(text.len());
    let mut cursor = 0;
    for found in pattern.find_iter(&masked) {
        out.push_str(&text[cursor..found.start()]);
        out.push_str(replacement);
        cursor = found.end();
    }
    out.push_str(&text[cursor..]);
    out
}

/// `||` becomes `+` outside string literals.
fn replace_concat_operator(text: &str) -> String {
    let masked = mask_literals(text).into_bytes();
    let bytes = text.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if masked[i] == b'|' && masked.get(i + 1) == Some(&b'|') {
            out.push(b'+');
            i += 2;
        } else {
            out.push(bytes[i]);
            i += 1;
        }
    }
    String::from_utf8_lossy(&out).into_owned()
}

static STORAGE_CLAUSES: Lazy<Regex> = re!(
    r"(?i)\s*(?:PCTFREE\s+\d+|PCTUSED\s+\d+|INITRANS\s+\d+|MAXTRANS\s+\d+|TABLESPACE\s+[A-Z0-9_$#\x22]+|STORAGE\s*\([^)]*\)|SEGMENT\s+CREATION\s+(?:IMMEDIATE|DEFERRED)|COMPUTE\s+STATISTICS|NOCOMPRESS|COMPRESS|LOGGING|NOLOGGING|ENABLE\s+ROW\s+MOVEMENT)"
);
static USING_INDEX: Lazy<Regex> = re!(r"(?i)\s*USING\s+INDEX\b[^,)]*");

/// Table DDL pass: strip Oracle storage physics, then map the types and
/// apply the dialect rules.
pub fn convert_table_ddl(ddl: &str) -> String {
    let text = STORAGE_CLAUSES.replace_all(ddl, "").into_owned();
    let text = USING_INDEX.replace_all(&text, "").into_owned();
    let text = map_data_types(&text);
    apply_sql_rules(&text)
}

static SEQUENCE_NOISE: Lazy<Regex> =
    re!(r"(?i)\s*\b(?:NOCACHE|NOCYCLE|NOORDER|ORDER|CACHE\s+\d+|NOPARTITION|NOKEEP|NOSCALE|GLOBAL)\b");
static HUGE_MAXVALUE: Lazy<Regex> = re!(r"(?i)\s*MAXVALUE\s+9{10,}\d*");

/// Sequence DDL pass: the core CREATE SEQUENCE syntax carries over, the
/// Oracle-only cache/order knobs and the default 10^28 MAXVALUE do not.
pub fn convert_sequence_ddl(ddl: &str) -> String {
    let text = HUGE_MAXVALUE.replace_all(ddl, "").into_owned();
    let text = SEQUENCE_NOISE.replace_all(&text, "").into_owned();
    apply_sql_rules(&text)
}

static CREATE_OR_REPLACE: Lazy<Regex> = re!(r"(?i)\bCREATE\s+OR\s+REPLACE\b");
static NEW_BIND: Lazy<Regex> = re!(r"(?i):NEW\s*\.");
static OLD_BIND: Lazy<Regex> = re!(r"(?i):OLD\s*\.");

/// Best-effort lexical pass for PL/SQL code objects when no language model
/// is available: dialect rewrites plus the handful of mechanical mappings
/// that are always valid. Anything deeper is the LLM translator's job.
pub fn lexical_code_pass(ddl: &str) -> String {
    let text = CREATE_OR_REPLACE.replace_all(ddl, "CREATE OR ALTER").into_owned();
    let text = NEW_BIND.replace_all(&text, "inserted.").into_owned();
    let text = OLD_BIND.replace_all(&text, "deleted.").into_owned();
    apply_sql_rules(&text)
}

static CREATE_HEADER: Lazy<Regex> = re!(
    r#"(?i)\bCREATE\s+(?:OR\s+(?:REPLACE|ALTER)\s+)?(TABLE|VIEW|PROCEDURE|FUNCTION|TRIGGER|SEQUENCE)\s+(?:\[[^\]]+\]|"[^"]+"|[A-Za-z0-9_$#]+)(?:\s*\.\s*(?:\[[^\]]+\]|"[^"]+"|[A-Za-z0-9_$#]+))?"#
);

/// Rewrites the object name in the first CREATE header to the target's
/// bracket-quoted qualified name, optionally switching to CREATE OR ALTER.
pub fn retarget_create_header(ddl: &str, qualified_target: &str, or_alter: bool) -> String {
    CREATE_HEADER
        .replace(ddl, |caps: &Captures<'_>| {
            let kind = caps[1].to_uppercase();
            if or_alter && kind != "TABLE" && kind != "SEQUENCE" {
                format!("CREATE OR ALTER {kind} {qualified_target}")
            } else {
                format!("CREATE {kind} {qualified_target}")
            }
        })
        .into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn number_maps_by_precision_and_scale() {
        let mapped = map_data_types(
            "ID NUMBER(9), BIG_ID NUMBER(12,0), AMOUNT NUMBER(10,2), WIDE NUMBER(38), FLAG NUMBER(1), FREE NUMBER",
        );
        assert_eq!(
            mapped,
            "ID INT, BIG_ID BIGINT, AMOUNT NUMERIC(10,2), WIDE NUMERIC(38,0), FLAG SMALLINT, FREE INT"
        );
    }

    #[test]
    fn character_and_lob_types_map() {
        let mapped = map_data_types("A VARCHAR2(100), B VARCHAR2(40 CHAR), C CLOB, D BLOB, E RAW(16)");
        assert_eq!(
            mapped,
            "A NVARCHAR(100), B NVARCHAR(40), C NVARCHAR(MAX), D VARBINARY(MAX), E VARBINARY(16)"
        );
    }

    #[test]
    fn temporal_types_map() {
        let mapped = map_data_types("A DATE, B TIMESTAMP(6), C TIMESTAMP WITH TIME ZONE");
        assert_eq!(mapped, "A DATETIME2, B DATETIME2(6), C DATETIME2");
    }

    #[test]
    fn minus_becomes_except() {
        let sql = apply_sql_rules("SELECT a FROM t1 MINUS SELECT a FROM t2");
        assert_eq!(sql, "SELECT a FROM t1 EXCEPT SELECT a FROM t2");
    }

    #[test]
    fn minus_inside_string_survives() {
        let sql = apply_sql_rules("SELECT 'MINUS' FROM t1");
        assert_eq!(sql, "SELECT 'MINUS' FROM t1");
    }

    #[test]
    fn dual_and_functions_are_rewritten() {
        let sql = apply_sql_rules("SELECT NVL(a, SYSDATE), LENGTH(b) FROM DUAL");
        assert_eq!(sql, "SELECT ISNULL(a, GETDATE()), LEN(b)");
    }

    #[test]
    fn nextval_becomes_next_value_for() {
        let sql = apply_sql_rules("SELECT emp_seq.NEXTVAL");
        assert_eq!(sql, "SELECT NEXT VALUE FOR emp_seq");
        let sql = apply_sql_rules("VALUES (hr.emp_seq.NEXTVAL)");
        assert_eq!(sql, "VALUES (NEXT VALUE FOR hr.emp_seq)");
    }

    #[test]
    fn concat_operator_outside_strings_only() {
        let sql = apply_sql_rules("SELECT a || 'b||c' FROM t");
        assert_eq!(sql, "SELECT a + 'b||c' FROM t");
    }

    #[test]
    fn storage_clauses_are_stripped_from_tables() {
        let ddl = convert_table_ddl(
            "CREATE TABLE \"HR\".\"EMP\" (ID NUMBER(9) NOT NULL) SEGMENT CREATION IMMEDIATE PCTFREE 10 TABLESPACE \"USERS\"",
        );
        assert!(ddl.contains("ID INT NOT NULL"));
        assert!(!ddl.to_uppercase().contains("PCTFREE"));
        assert!(!ddl.to_uppercase().contains("TABLESPACE"));
        assert!(ddl.contains("[HR].[EMP]"));
    }

    #[test]
    fn sequence_noise_is_stripped() {
        let ddl = convert_sequence_ddl(
            "CREATE SEQUENCE \"HR\".\"EMP_SEQ\" MINVALUE 1 MAXVALUE 9999999999999999999999999999 INCREMENT BY 1 START WITH 42 CACHE 20 NOORDER NOCYCLE",
        );
        assert!(ddl.contains("START WITH 42"));
        assert!(!ddl.to_uppercase().contains("CACHE"));
        assert!(!ddl.to_uppercase().contains("NOCYCLE"));
        assert!(!ddl.contains("9999999999999999999999999999"));
    }

    #[test]
    fn retarget_rewrites_the_header_only() {
        let out = retarget_create_header(
            "CREATE OR REPLACE VIEW \"HR\".\"V1\" AS SELECT 1 FROM t",
            "[dbo].[V1]",
            true,
        );
        assert!(out.starts_with("CREATE OR ALTER VIEW [dbo].[V1] AS"));
    }

    #[test]
    fn tables_never_get_or_alter() {
        let out = retarget_create_header("CREATE TABLE EMP (ID INT)", "[dbo].[EMP]", true);
        assert!(out.starts_with("CREATE TABLE [dbo].[EMP]"));
    }
}
