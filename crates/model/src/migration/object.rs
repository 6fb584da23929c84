use crate::{core::identifiers::ObjectId, migration::category::ErrorCategory};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle status of a migratable object within a single run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ObjectStatus {
    Pending,
    Translated,
    Deployed,
    Failed,
    Skipped,
}

/// One failed deployment attempt, kept verbatim for diagnostics and the
/// final report. Attempts are only ever appended.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorAttempt {
    pub attempt: usize,
    pub error_text: String,
    pub category: ErrorCategory,
    pub code_attempted: String,
    pub at: DateTime<Utc>,
    /// Which context sources the analyzer consulted for this attempt
    /// (e.g. "source-analysis", "target-metadata", "memory", "web-search").
    pub context_sources: Vec<String>,
}

/// A single source object flowing through the pipeline. Created by
/// discovery, owned by the orchestrator, never destroyed during a run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MigratableObject {
    pub id: ObjectId,
    pub source_text: String,
    pub target_text: Option<String>,
    pub status: ObjectStatus,
    /// Fully qualified names this object depends on.
    pub dependencies: Vec<String>,
    pub error_history: Vec<ErrorAttempt>,
}

impl MigratableObject {
    pub fn new(id: ObjectId, source_text: String) -> Self {
        MigratableObject {
            id,
            source_text,
            target_text: None,
            status: ObjectStatus::Pending,
            dependencies: Vec::new(),
            error_history: Vec::new(),
        }
    }

    pub fn record_attempt(&mut self, attempt: ErrorAttempt) {
        self.error_history.push(attempt);
    }

    pub fn last_error(&self) -> Option<&ErrorAttempt> {
        self.error_history.last()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::identifiers::ObjectKind;

    #[test]
    fn attempts_are_appended_in_order() {
        let id = ObjectId::new("HR", "EMP_VIEW", ObjectKind::View);
        let mut obj = MigratableObject::new(id, "SELECT 1 FROM dual".into());

        for idx in 0..3 {
            obj.record_attempt(ErrorAttempt {
                attempt: idx,
                error_text: format!("error {idx}"),
                category: ErrorCategory::Syntax,
                code_attempted: String::new(),
                at: Utc::now(),
                context_sources: vec![],
            });
        }

        assert_eq!(obj.error_history.len(), 3);
        assert_eq!(obj.last_error().unwrap().attempt, 2);
    }
}
