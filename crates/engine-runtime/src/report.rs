use chrono::{DateTime, Utc};
use engine_processing::copier::CopyReport;
use model::{
    core::identifiers::ObjectId,
    migration::{object::ErrorAttempt, object::ObjectStatus, package::MigrationNote},
};
use serde::Serialize;
use std::collections::BTreeMap;
use translator::cost::CostTotals;

/// Final state of one object, with its complete error history.
#[derive(Debug, Clone, Serialize)]
pub struct ObjectResult {
    pub id: ObjectId,
    pub status: ObjectStatus,
    pub attempts: usize,
    pub error_history: Vec<ErrorAttempt>,
    /// Last attempted target text, kept for unresolved objects.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_target_text: Option<String>,
    /// Analyzer-derived advice for objects that stayed unresolved.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recommendation: Option<String>,
}

/// Per-FK application outcome of the two-phase constraint step.
#[derive(Debug, Clone, Serialize)]
pub struct FkResult {
    pub constraint_name: String,
    pub table: String,
    pub applied: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize, Default)]
pub struct RunTotals {
    pub deployed: usize,
    pub failed: usize,
    pub skipped: usize,
}

/// The `migration_results.json` document.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub run_id: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub cancelled: bool,
    pub totals: RunTotals,
    pub objects: Vec<ObjectResult>,
    pub foreign_keys: Vec<FkResult>,
    pub copies: Vec<CopyReport>,
    pub copy_failures: Vec<String>,
    /// Objects still queued on dependencies after the cycle budget.
    pub unresolved_dependencies: Vec<String>,
    pub package_notes: Vec<MigrationNote>,
    pub cost: BTreeMap<String, CostTotals>,
}

impl RunReport {
    /// Objects that never deployed, with their histories; the "unresolved"
    /// section of the user-visible report.
    pub fn unresolved(&self) -> impl Iterator<Item = &ObjectResult> {
        self.objects
            .iter()
            .filter(|o| o.status == ObjectStatus::Failed)
    }
}
