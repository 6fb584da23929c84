use once_cell::sync::Lazy;
use plsql_syntax::tokens::mask_literals;
use regex::Regex;

static FENCE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)```(?:sql|tsql)?\s*(.*?)```").expect("valid fence regex"));

/// Tokens that have no meaning in T-SQL; their presence in a finished
/// translation means the conversion is incomplete.
const ORACLE_TOKENS: &[&str] = &[
    "VARCHAR2",
    "NVARCHAR2",
    "SYSDATE",
    "SYSTIMESTAMP",
    "NVL",
    "DUAL",
    "NEXTVAL",
    "CURRVAL",
    "ROWNUM",
    "MINUS",
    "DECODE",
    ":NEW",
    ":OLD",
    "PRAGMA",
    "DBMS_OUTPUT",
];

/// Extracts the SQL payload from a model response: fenced code wins, then
/// everything from the first DDL keyword; explanatory prose is discarded.
pub fn extract_sql(response: &str) -> String {
    if let Some(caps) = FENCE.captures(response) {
        return caps[1].trim().to_string();
    }
    static DDL_START: Lazy<Regex> = Lazy::new(|| {
        Regex::new(r"(?im)^\s*(CREATE|ALTER|DROP|SET|DECLARE|IF|BEGIN|WITH|SELECT|INSERT|UPDATE|DELETE|MERGE)\b")
            .expect("valid DDL start regex")
    });
    match DDL_START.find(response) {
        Some(found) => response[found.start()..].trim().to_string(),
        None => response.trim().to_string(),
    }
}

/// Oracle-only tokens still present outside strings and comments.
pub fn find_oracle_tokens(sql: &str) -> Vec<&'static str> {
    let masked = mask_literals(sql).to_uppercase();
    ORACLE_TOKENS
        .iter()
        .filter(|token| {
            let pattern = format!(r"\b{}\b", regex::escape(token));
            Regex::new(&pattern)
                .map(|re| re.is_match(&masked))
                .unwrap_or(false)
        })
        .copied()
        .collect()
}
