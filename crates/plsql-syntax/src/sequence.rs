use crate::tokens::mask_literals;
use once_cell::sync::Lazy;
use regex::Regex;

/// `seq.NEXTVAL`, `schema.seq.NEXTVAL`, and the CURRVAL forms, word-bounded
/// and case-insensitive. Whitespace around the dots is tolerated because
/// formatted PL/SQL sometimes breaks the reference across lines.
static SEQUENCE_CALL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)\b(?:([A-Z][A-Z0-9_$#]*)\s*\.\s*)?([A-Z][A-Z0-9_$#]*)\s*\.\s*(NEXTVAL|CURRVAL)\b",
    )
    .expect("valid sequence call regex")
});

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallKind {
    NextVal,
    CurrVal,
}

/// One `X.NEXTVAL` / `X.CURRVAL` occurrence found in a PL/SQL body.
#[derive(Debug, Clone)]
pub struct SequenceCall {
    pub schema: Option<String>,
    pub sequence: String,
    pub kind: CallKind,
    pub offset: usize,
}

/// Scans a PL/SQL body for sequence pseudo-column references. Comments and
/// string literals are masked out first, so a NEXTVAL mentioned in a comment
/// is not attributed.
pub fn scan_sequence_calls(body: &str) -> Vec<SequenceCall> {
    let masked = mask_literals(body);
    SEQUENCE_CALL
        .captures_iter(&masked)
        .map(|caps| {
            let kind = if caps[3].eq_ignore_ascii_case("NEXTVAL") {
                CallKind::NextVal
            } else {
                CallKind::CurrVal
            };
            SequenceCall {
                schema: caps.get(1).map(|m| m.as_str().to_uppercase()),
                sequence: caps[2].to_uppercase(),
                kind,
                offset: caps.get(0).map(|m| m.start()).unwrap_or(0),
            }
        })
        .collect()
}

/// Convenience filter: calls that refer to one named sequence, matching
/// either the bare or the schema-qualified form.
pub fn calls_to<'a>(
    calls: &'a [SequenceCall],
    schema: &str,
    sequence: &str,
) -> impl Iterator<Item = &'a SequenceCall> {
    let schema = schema.to_uppercase();
    let sequence = sequence.to_uppercase();
    calls.iter().filter(move |call| {
        call.sequence == sequence
            && call
                .schema
                .as_ref()
                .is_none_or(|s| s.eq_ignore_ascii_case(&schema))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finds_bare_and_qualified_nextval() {
        let body = r#"
            BEGIN
              :NEW.emp_id := emp_seq.NEXTVAL;
              SELECT hr.audit_seq.NEXTVAL INTO v_id FROM dual;
            END;
        "#;
        let calls = scan_sequence_calls(body);
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0].sequence, "EMP_SEQ");
        assert!(calls[0].schema.is_none());
        assert_eq!(calls[1].schema.as_deref(), Some("HR"));
        assert_eq!(calls[1].sequence, "AUDIT_SEQ");
    }

    #[test]
    fn currval_is_distinguished() {
        let calls = scan_sequence_calls("v := emp_seq.CURRVAL;");
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].kind, CallKind::CurrVal);
    }

    #[test]
    fn commented_references_are_ignored() {
        let body = "-- emp_seq.NEXTVAL\n/* hr.emp_seq.NEXTVAL */\nv := emp_seq.NEXTVAL;";
        assert_eq!(scan_sequence_calls(body).len(), 1);
    }

    #[test]
    fn word_boundary_prevents_partial_matches() {
        // xemp_seq is a different sequence; NEXTVALS is not NEXTVAL.
        let calls = scan_sequence_calls("v := xemp_seq.NEXTVAL; w := emp_seq.NEXTVALS;");
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].sequence, "XEMP_SEQ");
    }

    #[test]
    fn filter_matches_bare_and_qualified() {
        let calls = scan_sequence_calls("a := emp_seq.NEXTVAL; b := hr.emp_seq.NEXTVAL;");
        assert_eq!(calls_to(&calls, "HR", "emp_seq").count(), 2);
        assert_eq!(calls_to(&calls, "SALES", "emp_seq").count(), 1);
    }
}
