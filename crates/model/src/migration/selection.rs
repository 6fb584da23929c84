use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Global behavior when the target already holds an object being deployed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConflictStrategy {
    DropAndCreate,
    SkipExisting,
    #[default]
    CreateOrAlter,
    FailOnConflict,
}

/// Run-level error policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ErrorPolicy {
    #[default]
    Continue,
    StopOnFirstError,
}

/// Resolution choices offered when OBJECT_EXISTS fires with no configured
/// conflict strategy. Tables accept Append; code objects accept Alter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ConflictResolution {
    Drop,
    Skip,
    Append,
    Alter,
}

/// The UI-supplied selection document. Echoed verbatim into the run
/// directory as `migration_selection.json`.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct MigrationSelection {
    #[serde(default)]
    pub tables: BTreeSet<String>,
    #[serde(default)]
    pub views: BTreeSet<String>,
    #[serde(default)]
    pub sequences: BTreeSet<String>,
    #[serde(default)]
    pub procedures: BTreeSet<String>,
    #[serde(default)]
    pub functions: BTreeSet<String>,
    #[serde(default)]
    pub triggers: BTreeSet<String>,
    #[serde(default)]
    pub packages: BTreeSet<String>,
    /// Per-table "copy rows" flag, keyed by table name.
    #[serde(default)]
    pub include_data: BTreeMap<String, bool>,
    #[serde(default)]
    pub conflict_strategy: Option<ConflictStrategy>,
    #[serde(default)]
    pub error_policy: ErrorPolicy,
}

impl MigrationSelection {
    pub fn wants_data(&self, table: &str) -> bool {
        self.include_data
            .iter()
            .any(|(name, flag)| *flag && name.eq_ignore_ascii_case(table))
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
            && self.views.is_empty()
            && self.sequences.is_empty()
            && self.procedures.is_empty()
            && self.functions.is_empty()
            && self.triggers.is_empty()
            && self.packages.is_empty()
    }
}
