use crate::sanitize::find_oracle_tokens;
use model::{core::identifiers::ObjectKind, migration::category::Severity};
use plsql_syntax::tokens::mask_literals;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OverallQuality {
    Excellent,
    Good,
    NeedsImprovement,
    Poor,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Approval {
    Approved,
    RequiresChanges,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReviewIssue {
    pub severity: Severity,
    pub description: String,
}

/// Structured verdict on one translated object. `RequiresChanges` does not
/// block deployment; the orchestrator records it and enriches diagnostics
/// on any later failure.
#[derive(Debug, Clone, Serialize)]
pub struct ReviewOutcome {
    pub overall_quality: OverallQuality,
    pub approval: Approval,
    pub issues: Vec<ReviewIssue>,
}

impl ReviewOutcome {
    pub fn requires_changes(&self) -> bool {
        self.approval == Approval::RequiresChanges
    }
}

/// Deterministic lint over translated T-SQL.
pub struct Reviewer;

impl Reviewer {
    pub fn new() -> Self {
        Reviewer
    }

    pub fn review(&self, kind: ObjectKind, sql: &str) -> ReviewOutcome {
        let mut issues = Vec::new();

        if sql.trim().is_empty() {
            issues.push(ReviewIssue {
                severity: Severity::Critical,
                description: "translation is empty".into(),
            });
            return finish(issues);
        }

        for token in find_oracle_tokens(sql) {
            issues.push(ReviewIssue {
                severity: Severity::High,
                description: format!("Oracle-only token `{token}` survived translation"),
            });
        }

        let upper = mask_literals(sql).to_uppercase();
        if !upper.contains("CREATE ") && !upper.contains("ALTER ") {
            issues.push(ReviewIssue {
                severity: Severity::High,
                description: format!("no CREATE/ALTER statement found for {kind}"),
            });
        }

        let opens = upper.matches('(').count();
        let closes = upper.matches(')').count();
        if opens != closes {
            issues.push(ReviewIssue {
                severity: Severity::Medium,
                description: format!("unbalanced parentheses ({opens} open, {closes} close)"),
            });
        }

        if kind == ObjectKind::View && upper.contains("SELECT *") {
            issues.push(ReviewIssue {
                severity: Severity::Low,
                description: "view selects *; column drift on the target will go unnoticed".into(),
            });
        }

        finish(issues)
    }
}

impl Default for Reviewer {
    fn default() -> Self {
        Reviewer::new()
    }
}

fn finish(issues: Vec<ReviewIssue>) -> ReviewOutcome {
    let worst = issues.iter().map(|i| i.severity).max();
    let (overall_quality, approval) = match worst {
        Some(Severity::Critical) => (OverallQuality::Poor, Approval::RequiresChanges),
        Some(Severity::High) => (OverallQuality::NeedsImprovement, Approval::RequiresChanges),
        Some(Severity::Medium) => (OverallQuality::Good, Approval::Approved),
        Some(Severity::Low) => (OverallQuality::Good, Approval::Approved),
        None => (OverallQuality::Excellent, Approval::Approved),
    };
    ReviewOutcome {
        overall_quality,
        approval,
        issues,
    }
}
