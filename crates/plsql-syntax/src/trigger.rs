use crate::tokens::{Token, mask_literals, tokenize};
use once_cell::sync::Lazy;
use regex::Regex;

static BEFORE_INSERT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\bBEFORE\s+INSERT\b").expect("valid regex"));
static FOR_EACH_ROW: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\bFOR\s+EACH\s+ROW\b").expect("valid regex"));
static ON_TABLE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?i)\bON\s+((?:\[[^\]]+\]|"[^"]+"|[A-Z0-9_$#]+)(?:\s*\.\s*(?:\[[^\]]+\]|"[^"]+"|[A-Z0-9_$#]+))?)"#)
        .expect("valid regex")
});
static PK_ASSIGNMENT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i):NEW\s*\.\s*([A-Z0-9_$#]+)\s*:=\s*(?:([A-Z0-9_$#]+)\s*\.\s*)?([A-Z0-9_$#]+)\s*\.\s*NEXTVAL\b",
    )
    .expect("valid regex")
});
static TRIGGER_NAME: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?i)\bTRIGGER\s+((?:"[^"]+"|[A-Z0-9_$#]+)(?:\s*\.\s*(?:"[^"]+"|[A-Z0-9_$#]+))?)"#)
        .expect("valid regex")
});

/// The single `:NEW.<col> := <seq>.NEXTVAL` assignment of a simple trigger.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PkAssignment {
    pub column: String,
    pub sequence_schema: Option<String>,
    pub sequence: String,
}

/// Result of classifying one trigger body.
#[derive(Debug, Clone)]
pub struct TriggerShape {
    pub trigger_name: Option<String>,
    pub table: Option<String>,
    pub is_before_insert_row: bool,
    pub assignment: Option<PkAssignment>,
    pub body_lines: usize,
    pub is_simple_pk: bool,
}

/// Classifies a trigger as a simple-PK trigger: `BEFORE INSERT ... FOR EACH
/// ROW`, exactly one `:NEW.<col> := <seq>.NEXTVAL` assignment, at most 15
/// body lines, no other DML, no LOOP/WHILE, no FOR beyond the FOR EACH ROW,
/// at most one IF statement. All keyword checks are word-bounded, so the FOR
/// inside "BEFORE" can never count.
pub fn classify_trigger(ddl: &str) -> TriggerShape {
    let masked = mask_literals(ddl);
    let tokens = tokenize(&masked);

    let trigger_name = TRIGGER_NAME
        .captures(&masked)
        .map(|c| normalize_name(&c[1]));
    let table = ON_TABLE.captures(&masked).map(|c| normalize_name(&c[1]));
    let is_before_insert_row =
        BEFORE_INSERT.is_match(&masked) && FOR_EACH_ROW.is_match(&masked);

    let assignments: Vec<PkAssignment> = PK_ASSIGNMENT
        .captures_iter(&masked)
        .map(|caps| PkAssignment {
            column: caps[1].to_uppercase(),
            sequence_schema: caps.get(2).map(|m| m.as_str().to_uppercase()),
            sequence: caps[3].to_uppercase(),
        })
        .collect();

    let body_lines = body_line_count(&masked);
    let simple_body = has_simple_body(&tokens);

    let is_simple_pk = is_before_insert_row
        && assignments.len() == 1
        && body_lines <= 15
        && simple_body;

    TriggerShape {
        trigger_name,
        table,
        is_before_insert_row,
        assignment: assignments.into_iter().next(),
        body_lines,
        is_simple_pk,
    }
}

fn normalize_name(raw: &str) -> String {
    raw.split('.')
        .map(|part| part.trim().trim_matches(['"', '[', ']']).to_uppercase())
        .collect::<Vec<_>>()
        .join(".")
}

/// Counts non-empty lines from the first BEGIN onward.
fn body_line_count(masked: &str) -> usize {
    let upper = masked.to_uppercase();
    let begin = tokenize(&upper)
        .into_iter()
        .find(|t| t.is_word("BEGIN"))
        .map(|t| t.start);
    match begin {
        Some(offset) => upper[offset..]
            .lines()
            .filter(|line| !line.trim().is_empty())
            .count(),
        None => 0,
    }
}

/// Token-level checks: at most one INSERT (the header's), no other DML
/// keywords, no LOOP or WHILE, at most one FOR, at most one IF opener
/// (END IF closers and ELSIF do not count as openers).
fn has_simple_body(tokens: &[Token]) -> bool {
    let mut insert_count = 0usize;
    let mut for_count = 0usize;
    let mut if_openers = 0usize;

    for (idx, token) in tokens.iter().enumerate() {
        match token.text.as_str() {
            "INSERT" => insert_count += 1,
            "UPDATE" | "DELETE" | "MERGE" | "SELECT" => return false,
            "LOOP" | "WHILE" => return false,
            "FOR" => for_count += 1,
            "IF" => {
                let closed_by_end = idx
                    .checked_sub(1)
                    .and_then(|prev| tokens.get(prev))
                    .is_some_and(|prev| prev.is_word("END"));
                if !closed_by_end {
                    if_openers += 1;
                }
            }
            _ => {}
        }
    }

    insert_count <= 1 && for_count <= 1 && if_openers <= 1
}

#[cfg(test)]
mod tests {
    use super::*;

    const SIMPLE: &str = r#"
CREATE OR REPLACE TRIGGER emp_bi
BEFORE INSERT ON emp
FOR EACH ROW
BEGIN
  :NEW.emp_id := emp_seq.NEXTVAL;
END;
"#;

    #[test]
    fn classifies_canonical_simple_pk_trigger() {
        let shape = classify_trigger(SIMPLE);
        assert!(shape.is_simple_pk);
        assert_eq!(shape.table.as_deref(), Some("EMP"));
        assert_eq!(shape.trigger_name.as_deref(), Some("EMP_BI"));
        let assignment = shape.assignment.unwrap();
        assert_eq!(assignment.column, "EMP_ID");
        assert_eq!(assignment.sequence, "EMP_SEQ");
    }

    #[test]
    fn before_containing_for_is_not_miscounted() {
        // "BEFORE" must not match the FOR counter; only the FOR EACH ROW
        // keyword is present, so the trigger stays simple.
        let shape = classify_trigger(SIMPLE);
        assert!(shape.is_simple_pk);
    }

    #[test]
    fn one_guarding_if_is_allowed() {
        let ddl = r#"
CREATE TRIGGER emp_bi BEFORE INSERT ON emp FOR EACH ROW
BEGIN
  IF :NEW.emp_id IS NULL THEN
    :NEW.emp_id := emp_seq.NEXTVAL;
  END IF;
END;
"#;
        let shape = classify_trigger(ddl);
        assert!(shape.is_simple_pk);
    }

    #[test]
    fn extra_dml_disqualifies() {
        let ddl = r#"
CREATE TRIGGER emp_bi BEFORE INSERT ON emp FOR EACH ROW
BEGIN
  :NEW.emp_id := emp_seq.NEXTVAL;
  INSERT INTO audit_log VALUES (:NEW.emp_id);
END;
"#;
        assert!(!classify_trigger(ddl).is_simple_pk);
    }

    #[test]
    fn loops_disqualify() {
        let ddl = r#"
CREATE TRIGGER emp_bi BEFORE INSERT ON emp FOR EACH ROW
BEGIN
  :NEW.emp_id := emp_seq.NEXTVAL;
  FOR i IN 1..3 LOOP
    NULL;
  END LOOP;
END;
"#;
        assert!(!classify_trigger(ddl).is_simple_pk);
    }

    #[test]
    fn long_bodies_disqualify() {
        let mut ddl = String::from(
            "CREATE TRIGGER emp_bi BEFORE INSERT ON emp FOR EACH ROW\nBEGIN\n  :NEW.emp_id := emp_seq.NEXTVAL;\n",
        );
        for i in 0..20 {
            ddl.push_str(&format!("  v_pad_{i} := {i};\n"));
        }
        ddl.push_str("END;\n");
        assert!(!classify_trigger(&ddl).is_simple_pk);
    }

    #[test]
    fn after_insert_is_not_simple() {
        let ddl = "CREATE TRIGGER t AFTER INSERT ON emp FOR EACH ROW BEGIN :NEW.id := s.NEXTVAL; END;";
        assert!(!classify_trigger(ddl).is_simple_pk);
    }

    #[test]
    fn schema_qualified_sequence_is_captured() {
        let ddl = r#"
CREATE TRIGGER emp_bi BEFORE INSERT ON hr.emp FOR EACH ROW
BEGIN
  :NEW.emp_id := hr.emp_seq.NEXTVAL;
END;
"#;
        let shape = classify_trigger(ddl);
        assert!(shape.is_simple_pk);
        assert_eq!(shape.table.as_deref(), Some("HR.EMP"));
        let a = shape.assignment.unwrap();
        assert_eq!(a.sequence_schema.as_deref(), Some("HR"));
    }
}
