use model::migration::category::{ErrorCategory, Severity};
use once_cell::sync::Lazy;
use regex::Regex;

/// First step of root-cause analysis: map raw target-database error text to
/// the error taxonomy. Patterns cover the SQL Server messages the engine
/// actually sees; the first match wins, so more specific messages come
/// before the generic syntax bucket.
static RULES: Lazy<Vec<(Regex, ErrorCategory)>> = Lazy::new(|| {
    let rule = |pattern: &str, category: ErrorCategory| {
        (
            Regex::new(&format!("(?i){pattern}")).expect("valid classifier regex"),
            category,
        )
    };
    vec![
        rule(r"incorrect syntax near\s+'?GO'?", ErrorCategory::GoBatchSyntax),
        rule(r"standalone GO separator", ErrorCategory::GoBatchSyntax),
        rule(r"could not find stored procedure", ErrorCategory::MissingProcedure),
        rule(
            r"is not a recognized built-in function|cannot find either column .* or the user-defined function",
            ErrorCategory::MissingFunction,
        ),
        rule(r"invalid object name '?[^']*v_", ErrorCategory::MissingView),
        rule(r"invalid view|view .* does not exist", ErrorCategory::MissingView),
        rule(r"invalid object name", ErrorCategory::MissingTable),
        rule(r"invalid column name", ErrorCategory::MissingColumn),
        rule(
            r"error converting data type|conversion failed|operand type clash|arithmetic overflow",
            ErrorCategory::TypeMismatch,
        ),
        rule(
            r"there is already an object named|already exists in the (current )?database",
            ErrorCategory::ObjectExists,
        ),
        rule(
            r"cannot insert explicit value for identity column|identity_insert is set to off|identity_insert is already on",
            ErrorCategory::IdentityViolation,
        ),
        rule(
            r"permission was denied|permission denied|user does not have permission",
            ErrorCategory::Permission,
        ),
        rule(r"timeout expired|query timeout|lock request time out", ErrorCategory::Timeout),
        rule(
            r"connection (was )?(closed|reset|refused|broken)|network-related|transport-level error|login failed",
            ErrorCategory::Connection,
        ),
        rule(
            r"text, ntext, and image data types|lob locator|invalid lob",
            ErrorCategory::LobParameter,
        ),
        rule(
            r"incorrect syntax|expecting|must declare the scalar variable|unclosed quotation",
            ErrorCategory::Syntax,
        ),
    ]
});

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Classification {
    pub category: ErrorCategory,
    pub severity: Severity,
}

pub fn classify_error(error_text: &str) -> Classification {
    let category = RULES
        .iter()
        .find(|(pattern, _)| pattern.is_match(error_text))
        .map(|(_, category)| *category)
        .unwrap_or(ErrorCategory::Unresolvable);
    Classification {
        category,
        severity: severity_for(category),
    }
}

fn severity_for(category: ErrorCategory) -> Severity {
    match category {
        ErrorCategory::Permission | ErrorCategory::Unresolvable => Severity::Critical,
        ErrorCategory::Syntax | ErrorCategory::TypeMismatch | ErrorCategory::GoBatchSyntax => {
            Severity::High
        }
        ErrorCategory::MissingTable
        | ErrorCategory::MissingView
        | ErrorCategory::MissingProcedure
        | ErrorCategory::MissingFunction
        | ErrorCategory::MissingColumn
        | ErrorCategory::IdentityViolation
        | ErrorCategory::Timeout
        | ErrorCategory::Connection
        | ErrorCategory::LobParameter => Severity::Medium,
        ErrorCategory::ObjectExists => Severity::Low,
    }
}

static QUOTED_NAME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"'([A-Za-z0-9_$#.\[\]]+)'").expect("valid name regex"));

/// Extracts the object names quoted inside an error message, e.g. the
/// missing reference in `Invalid object name 'dbo.DEPARTMENTS'.`.
pub fn referenced_names(error_text: &str) -> Vec<String> {
    QUOTED_NAME
        .captures_iter(error_text)
        .map(|caps| caps[1].replace(['[', ']'], ""))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn syntax_errors_classify_as_syntax() {
        let c = classify_error("Incorrect syntax near the keyword 'MINUS'.");
        assert_eq!(c.category, ErrorCategory::Syntax);
        assert_eq!(c.severity, Severity::High);
    }

    #[test]
    fn go_syntax_beats_generic_syntax() {
        let c = classify_error("Incorrect syntax near 'GO'.");
        assert_eq!(c.category, ErrorCategory::GoBatchSyntax);
    }

    #[test]
    fn missing_objects_are_dependencies() {
        assert_eq!(
            classify_error("Invalid object name 'dbo.DEPARTMENTS'.").category,
            ErrorCategory::MissingTable
        );
        assert_eq!(
            classify_error("Could not find stored procedure 'dbo.P2'.").category,
            ErrorCategory::MissingProcedure
        );
    }

    #[test]
    fn identity_violations_are_recognized() {
        let c = classify_error(
            "Cannot insert explicit value for identity column in table 'EMP' when IDENTITY_INSERT is set to OFF.",
        );
        assert_eq!(c.category, ErrorCategory::IdentityViolation);
    }

    #[test]
    fn object_exists_is_recognized() {
        let c = classify_error("There is already an object named 'EMP' in the database.");
        assert_eq!(c.category, ErrorCategory::ObjectExists);
    }

    #[test]
    fn unknown_errors_are_unresolvable() {
        let c = classify_error("Something nobody has seen before");
        assert_eq!(c.category, ErrorCategory::Unresolvable);
        assert_eq!(c.severity, Severity::Critical);
    }

    #[test]
    fn quoted_names_are_extracted() {
        let names = referenced_names("Invalid object name 'dbo.DEPARTMENTS'.");
        assert_eq!(names, vec!["dbo.DEPARTMENTS"]);
    }
}
