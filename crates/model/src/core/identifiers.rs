use serde::{Deserialize, Serialize};
use std::fmt;

/// The kinds of database objects the engine knows how to migrate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ObjectKind {
    Table,
    View,
    Sequence,
    Procedure,
    Function,
    Trigger,
    Package,
    /// A standalone procedure/function produced by decomposing a package.
    PackageMember,
}

impl ObjectKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ObjectKind::Table => "TABLE",
            ObjectKind::View => "VIEW",
            ObjectKind::Sequence => "SEQUENCE",
            ObjectKind::Procedure => "PROCEDURE",
            ObjectKind::Function => "FUNCTION",
            ObjectKind::Trigger => "TRIGGER",
            ObjectKind::Package => "PACKAGE",
            ObjectKind::PackageMember => "PACKAGE_MEMBER",
        }
    }

    /// Code objects are deployed with CREATE OR ALTER under the
    /// CREATE_OR_ALTER conflict strategy; tables and sequences are not.
    pub fn is_code(&self) -> bool {
        matches!(
            self,
            ObjectKind::View
                | ObjectKind::Procedure
                | ObjectKind::Function
                | ObjectKind::Trigger
                | ObjectKind::PackageMember
        )
    }
}

impl fmt::Display for ObjectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A fully qualified `schema.name` reference. All cross-object references
/// inside the engine use this form; comparisons are case-insensitive to
/// match how both Oracle and SQL Server resolve identifiers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QualifiedName {
    pub schema: String,
    pub name: String,
}

impl QualifiedName {
    pub fn new(schema: impl Into<String>, name: impl Into<String>) -> Self {
        QualifiedName {
            schema: schema.into(),
            name: name.into(),
        }
    }

    /// Parses `schema.name`, falling back to `default_schema` when the
    /// reference is unqualified. Bracket quoting is stripped.
    pub fn parse(raw: &str, default_schema: &str) -> Self {
        let unquote = |s: &str| s.trim().trim_matches(['[', ']', '"']).to_string();
        match raw.split_once('.') {
            Some((schema, name)) => QualifiedName::new(unquote(schema), unquote(name)),
            None => QualifiedName::new(default_schema, unquote(raw)),
        }
    }

    /// Renders the bracket-quoted form used in emitted T-SQL.
    pub fn bracketed(&self) -> String {
        format!("[{}].[{}]", self.schema, self.name)
    }
}

impl fmt::Display for QualifiedName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.schema, self.name)
    }
}

impl PartialEq for QualifiedName {
    fn eq(&self, other: &Self) -> bool {
        self.schema.eq_ignore_ascii_case(&other.schema)
            && self.name.eq_ignore_ascii_case(&other.name)
    }
}

impl Eq for QualifiedName {}

impl std::hash::Hash for QualifiedName {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.schema.to_lowercase().hash(state);
        self.name.to_lowercase().hash(state);
    }
}

impl PartialOrd for QualifiedName {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for QualifiedName {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.schema
            .to_lowercase()
            .cmp(&other.schema.to_lowercase())
            .then_with(|| self.name.to_lowercase().cmp(&other.name.to_lowercase()))
    }
}

/// Identity of a migratable object: `(schema, name, kind)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ObjectId {
    pub qualified: QualifiedName,
    pub kind: ObjectKind,
}

impl ObjectId {
    pub fn new(schema: &str, name: &str, kind: ObjectKind) -> Self {
        ObjectId {
            qualified: QualifiedName::new(schema, name),
            kind,
        }
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.kind, self.qualified)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_qualified_reference() {
        let q = QualifiedName::parse("HR.EMPLOYEES", "dbo");
        assert_eq!(q.schema, "HR");
        assert_eq!(q.name, "EMPLOYEES");
    }

    #[test]
    fn parse_unqualified_uses_default_schema() {
        let q = QualifiedName::parse("EMPLOYEES", "dbo");
        assert_eq!(q.schema, "dbo");
        assert_eq!(q.name, "EMPLOYEES");
    }

    #[test]
    fn parse_strips_bracket_quoting() {
        let q = QualifiedName::parse("[HR].[JOB HISTORY]", "dbo");
        assert_eq!(q.schema, "HR");
        assert_eq!(q.name, "JOB HISTORY");
    }

    #[test]
    fn comparison_is_case_insensitive() {
        let a = QualifiedName::new("HR", "Employees");
        let b = QualifiedName::new("hr", "EMPLOYEES");
        assert_eq!(a, b);
    }
}
