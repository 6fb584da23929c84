use crate::core::identifiers::QualifiedName;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// Per-sequence migration strategy, computed once after full analysis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SequenceStrategy {
    /// Replace the sequence + simple-PK trigger with an IDENTITY column.
    IdentityColumn,
    /// Emit a standalone CREATE SEQUENCE on the target.
    SqlServerSequence,
    /// One target sequence shared by several tables.
    SharedSequence,
    /// Usage too entangled to rewrite mechanically.
    ManualReview,
}

impl fmt::Display for SequenceStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SequenceStrategy::IdentityColumn => "IDENTITY_COLUMN",
            SequenceStrategy::SqlServerSequence => "SQL_SERVER_SEQUENCE",
            SequenceStrategy::SharedSequence => "SHARED_SEQUENCE",
            SequenceStrategy::ManualReview => "MANUAL_REVIEW",
        };
        f.write_str(s)
    }
}

/// Where a NEXTVAL/CURRVAL reference was found.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UsageSite {
    Trigger,
    Procedure,
    Function,
}

/// A single reference to the sequence inside a PL/SQL body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SequenceReference {
    pub site: UsageSite,
    /// Owning trigger/procedure/function.
    pub object: QualifiedName,
    pub nextval_count: usize,
    pub currval_count: usize,
}

/// Everything the analyzer learned about one sequence. `strategy` starts
/// unset and is written exactly once when analysis completes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SequenceUsage {
    pub sequence: QualifiedName,
    pub current_value: i64,
    pub references: Vec<SequenceReference>,
    /// Tables reached through triggers that use this sequence.
    pub associated_tables: BTreeSet<String>,
    /// PK column per associated table, where a simple-PK trigger names one.
    pub pk_columns: Vec<(String, String)>,
    /// True when every trigger reference is a classified simple-PK trigger.
    pub all_triggers_simple: bool,
    pub strategy: Option<SequenceStrategy>,
}

impl SequenceUsage {
    pub fn new(sequence: QualifiedName, current_value: i64) -> Self {
        SequenceUsage {
            sequence,
            current_value,
            references: Vec::new(),
            associated_tables: BTreeSet::new(),
            pk_columns: Vec::new(),
            all_triggers_simple: true,
            strategy: None,
        }
    }

    pub fn nextval_total(&self) -> usize {
        self.references.iter().map(|r| r.nextval_count).sum()
    }

    pub fn currval_total(&self) -> usize {
        self.references.iter().map(|r| r.currval_count).sum()
    }

    pub fn used_in(&self, site: UsageSite) -> bool {
        self.references.iter().any(|r| r.site == site)
    }

    pub fn trigger_references(&self) -> impl Iterator<Item = &SequenceReference> {
        self.references
            .iter()
            .filter(|r| r.site == UsageSite::Trigger)
    }
}
