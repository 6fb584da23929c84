use serde::{Deserialize, Serialize};
use std::fmt;

/// Error taxonomy recognized from target-database error text. The repair
/// controller keys its transition table off these categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCategory {
    Syntax,
    MissingTable,
    MissingView,
    MissingProcedure,
    MissingFunction,
    MissingColumn,
    TypeMismatch,
    ObjectExists,
    IdentityViolation,
    Permission,
    Timeout,
    Connection,
    LobParameter,
    GoBatchSyntax,
    Unresolvable,
}

/// How the repair controller treats a failure of a given category.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureClass {
    /// Re-translate with repair context, bounded by `max_repair_attempts`.
    Transient,
    /// Missing referenced object; queued for a later dependency cycle.
    Dependency,
    /// Not recoverable by regeneration; abandon and report.
    Hard,
    /// Retry the I/O itself before escalating.
    Io,
    /// Needs a user resolution choice first.
    Conflict,
}

impl ErrorCategory {
    pub fn failure_class(&self) -> FailureClass {
        match self {
            ErrorCategory::Syntax
            | ErrorCategory::MissingColumn
            | ErrorCategory::TypeMismatch
            | ErrorCategory::IdentityViolation
            | ErrorCategory::LobParameter => FailureClass::Transient,
            ErrorCategory::MissingTable
            | ErrorCategory::MissingView
            | ErrorCategory::MissingProcedure
            | ErrorCategory::MissingFunction => FailureClass::Dependency,
            ErrorCategory::ObjectExists => FailureClass::Conflict,
            ErrorCategory::Timeout | ErrorCategory::Connection => FailureClass::Io,
            ErrorCategory::Permission
            | ErrorCategory::GoBatchSyntax
            | ErrorCategory::Unresolvable => FailureClass::Hard,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCategory::Syntax => "SYNTAX",
            ErrorCategory::MissingTable => "MISSING_TABLE",
            ErrorCategory::MissingView => "MISSING_VIEW",
            ErrorCategory::MissingProcedure => "MISSING_PROCEDURE",
            ErrorCategory::MissingFunction => "MISSING_FUNCTION",
            ErrorCategory::MissingColumn => "MISSING_COLUMN",
            ErrorCategory::TypeMismatch => "TYPE_MISMATCH",
            ErrorCategory::ObjectExists => "OBJECT_EXISTS",
            ErrorCategory::IdentityViolation => "IDENTITY_VIOLATION",
            ErrorCategory::Permission => "PERMISSION",
            ErrorCategory::Timeout => "TIMEOUT",
            ErrorCategory::Connection => "CONNECTION",
            ErrorCategory::LobParameter => "LOB_PARAMETER",
            ErrorCategory::GoBatchSyntax => "GO_BATCH_SYNTAX",
            ErrorCategory::Unresolvable => "UNRESOLVABLE",
        }
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Severity assigned by the root-cause analyzer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dependency_categories_map_to_dependency_class() {
        for cat in [
            ErrorCategory::MissingTable,
            ErrorCategory::MissingView,
            ErrorCategory::MissingProcedure,
            ErrorCategory::MissingFunction,
        ] {
            assert_eq!(cat.failure_class(), FailureClass::Dependency);
        }
    }

    #[test]
    fn permission_is_hard() {
        assert_eq!(
            ErrorCategory::Permission.failure_class(),
            FailureClass::Hard
        );
    }
}
