use once_cell::sync::Lazy;
use regex::Regex;

static GO_LINE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^\s*GO\s*(?:;)?\s*$").expect("valid GO regex"));

/// Splits a multi-batch T-SQL script on standalone `GO` separator lines.
///
/// `GO` is a tooling convention, not T-SQL: it must be the only word on its
/// line (case-insensitive, surrounding whitespace tolerated) and must never
/// be submitted to the server as part of a batch. Empty batches produced by
/// consecutive separators are dropped.
pub fn split_batches(script: &str) -> Vec<String> {
    let mut batches = Vec::new();
    let mut current = String::new();

    for line in script.lines() {
        if GO_LINE.is_match(line) {
            push_batch(&mut batches, &mut current);
        } else {
            current.push_str(line);
            current.push('\n');
        }
    }
    push_batch(&mut batches, &mut current);

    batches
}

fn push_batch(batches: &mut Vec<String>, current: &mut String) {
    let trimmed = current.trim();
    if !trimmed.is_empty() {
        batches.push(trimmed.to_string());
    }
    current.clear();
}

/// True when the text still contains a standalone `GO` line. Submitting such
/// a batch is a programming error that the deployer reports distinctly.
pub fn contains_standalone_go(batch: &str) -> bool {
    batch.lines().any(|line| GO_LINE.is_match(line))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_on_go_lines() {
        let script = "CREATE TABLE t (id INT);\nGO\nINSERT INTO t VALUES (1);\nGO\n";
        let batches = split_batches(script);
        assert_eq!(batches.len(), 2);
        assert_eq!(batches[0], "CREATE TABLE t (id INT);");
        assert_eq!(batches[1], "INSERT INTO t VALUES (1);");
    }

    #[test]
    fn go_is_case_insensitive_and_whitespace_tolerant() {
        let script = "SELECT 1;\n  go  \nSELECT 2;\nGo\nSELECT 3;";
        assert_eq!(split_batches(script).len(), 3);
    }

    #[test]
    fn go_inside_a_word_does_not_split() {
        let script = "SELECT * FROM CATEGORIES;\n-- GOTO considered harmful\nGOTO done;";
        let batches = split_batches(script);
        assert_eq!(batches.len(), 1);
        assert!(batches[0].contains("CATEGORIES"));
    }

    #[test]
    fn consecutive_separators_yield_no_empty_batches() {
        let script = "GO\nGO\nSELECT 1;\nGO\nGO";
        let batches = split_batches(script);
        assert_eq!(batches, vec!["SELECT 1;".to_string()]);
    }

    #[test]
    fn detects_residual_standalone_go() {
        assert!(contains_standalone_go("SELECT 1;\nGO\nSELECT 2;"));
        assert!(!contains_standalone_go("SELECT 1;\n-- no separator here"));
        assert!(!contains_standalone_go("UPDATE t SET gone = 1 WHERE going = 2"));
    }
}
