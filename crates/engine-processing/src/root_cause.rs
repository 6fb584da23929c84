use crate::classify::{Classification, classify_error, referenced_names};
use connectors::adapter::TargetAdapter;
use engine_core::memory::{SharedMemory, store::RankedSolution};
use model::{
    core::{identifiers::ObjectId, value::ColumnMetadata},
    migration::category::ErrorCategory,
};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use std::sync::Arc;
use translator::providers::{SearchProvider, SearchResult};
use tracing::debug;

/// Oracle features whose presence in the source often explains a target
/// failure.
static SOURCE_FEATURES: Lazy<Vec<(&'static str, Regex)>> = Lazy::new(|| {
    let feature = |name: &'static str, pattern: &str| {
        (
            name,
            Regex::new(&format!("(?i){pattern}")).expect("valid feature regex"),
        )
    };
    vec![
        feature("ROWNUM", r"\bROWNUM\b"),
        feature("MINUS", r"\bMINUS\b"),
        feature("SYSDATE", r"\bSYSDATE\b"),
        feature("CONNECT BY", r"\bCONNECT\s+BY\b"),
        feature("DECODE", r"\bDECODE\s*\("),
        feature("NVL", r"\bNVL\s*\("),
        feature("outer join (+)", r"\(\+\)"),
        feature("sequence NEXTVAL/CURRVAL", r"\.(?:NEXTVAL|CURRVAL)\b"),
        feature("package-qualified call", r"\b[A-Z0-9_$#]+\.[A-Z0-9_$#]+\s*\("),
        feature("REF CURSOR", r"\bREF\s+CURSOR\b"),
        feature("autonomous transaction", r"\bAUTONOMOUS_TRANSACTION\b"),
    ]
});

#[derive(Debug, Clone, Serialize)]
pub struct SourceAnalysis {
    pub features: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Default)]
pub struct TargetMetadata {
    pub object_exists: bool,
    pub columns: Vec<ColumnMetadata>,
    /// References named by the error that are absent from the target.
    pub missing_references: Vec<String>,
}

#[derive(Debug, Clone, Default)]
pub struct KnowledgeContext {
    pub memory_solutions: Vec<RankedSolution>,
    pub search_results: Vec<SearchResult>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Confidence {
    Low,
    Medium,
    High,
}

impl Confidence {
    pub fn as_str(&self) -> &'static str {
        match self {
            Confidence::Low => "low",
            Confidence::Medium => "medium",
            Confidence::High => "high",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Synthesis {
    pub root_cause_text: String,
    pub confidence: Confidence,
    pub fix_strategy_label: String,
}

/// The full five-step analysis artifact.
#[derive(Debug, Clone)]
pub struct RootCauseReport {
    pub classification: Classification,
    pub source_analysis: SourceAnalysis,
    pub target_metadata: TargetMetadata,
    pub knowledge: KnowledgeContext,
    pub synthesis: Synthesis,
    /// Which context sources were consulted, for the error history record.
    pub consulted: Vec<String>,
}

/// Five-step analysis of a deploy failure: classify, inspect the source,
/// query the target, retrieve prior knowledge, synthesize. Reads
/// SharedMemory and the target but never mutates anything.
pub struct RootCauseAnalyzer {
    target: Arc<dyn TargetAdapter>,
    memory: Arc<SharedMemory>,
    search: Option<Arc<dyn SearchProvider>>,
    default_schema: String,
}

impl RootCauseAnalyzer {
    pub fn new(
        target: Arc<dyn TargetAdapter>,
        memory: Arc<SharedMemory>,
        search: Option<Arc<dyn SearchProvider>>,
        default_schema: &str,
    ) -> Self {
        RootCauseAnalyzer {
            target,
            memory,
            search,
            default_schema: default_schema.to_string(),
        }
    }

    pub async fn analyze(
        &self,
        object: &ObjectId,
        source_text: &str,
        error_text: &str,
    ) -> RootCauseReport {
        let mut consulted = vec!["classification".to_string(), "source-analysis".to_string()];

        // Step 1: classification.
        let classification = classify_error(error_text);

        // Step 2: source features likely implicated.
        let source_analysis = analyze_source(source_text);

        // Step 3: target-side state of the object and its references.
        let target_metadata = self
            .inspect_target(object, error_text, &classification)
            .await;
        consulted.push("target-metadata".to_string());

        // Step 4: prior knowledge, then optional web search.
        let memory_solutions = self.memory.ranked_solutions(error_text, 5).await;
        consulted.push("memory".to_string());
        let search_results = match &self.search {
            Some(provider) if memory_solutions.is_empty() => {
                consulted.push("web-search".to_string());
                let query = format!(
                    "SQL Server migration error: {}",
                    error_text.chars().take(200).collect::<String>()
                );
                provider.search(&query).await.unwrap_or_default()
            }
            _ => Vec::new(),
        };
        let knowledge = KnowledgeContext {
            memory_solutions,
            search_results,
        };

        // Step 5: synthesis the translator can condition on.
        let synthesis = synthesize(&classification, &source_analysis, &target_metadata, &knowledge);
        debug!(
            object = %object,
            category = %classification.category,
            confidence = synthesis.confidence.as_str(),
            "root-cause analysis complete"
        );

        RootCauseReport {
            classification,
            source_analysis,
            target_metadata,
            knowledge,
            synthesis,
            consulted,
        }
    }

    async fn inspect_target(
        &self,
        object: &ObjectId,
        error_text: &str,
        classification: &Classification,
    ) -> TargetMetadata {
        let object_exists = self
            .target
            .object_exists(
                &object.qualified.schema,
                &object.qualified.name,
                object.kind,
            )
            .await
            .unwrap_or(false);

        let columns = if object_exists {
            self.target
                .get_columns(&object.qualified.schema, &object.qualified.name)
                .await
                .unwrap_or_default()
        } else {
            Vec::new()
        };

        // Names quoted in an error only identify dependencies for the
        // dependency-class categories; a syntax error quotes keywords.
        let dependency_error = matches!(
            classification.category.failure_class(),
            model::migration::category::FailureClass::Dependency
        );
        let mut missing_references = Vec::new();
        if dependency_error {
            for name in referenced_names(error_text) {
                let qualified = model::core::identifiers::QualifiedName::parse(
                    &name,
                    &self.default_schema,
                );
                let exists = self
                    .target
                    .object_exists(&qualified.schema, &qualified.name, object.kind)
                    .await
                    .unwrap_or(false);
                if !exists {
                    missing_references.push(qualified.to_string());
                }
            }
        }

        TargetMetadata {
            object_exists,
            columns,
            missing_references,
        }
    }
}

fn analyze_source(source_text: &str) -> SourceAnalysis {
    let masked = plsql_syntax::tokens::mask_literals(source_text);
    SourceAnalysis {
        features: SOURCE_FEATURES
            .iter()
            .filter(|(_, pattern)| pattern.is_match(&masked))
            .map(|(name, _)| name.to_string())
            .collect(),
    }
}

fn synthesize(
    classification: &Classification,
    source: &SourceAnalysis,
    target: &TargetMetadata,
    knowledge: &KnowledgeContext,
) -> Synthesis {
    let fix_strategy_label = match classification.category {
        ErrorCategory::Syntax | ErrorCategory::GoBatchSyntax => "rewrite-syntax",
        ErrorCategory::MissingTable
        | ErrorCategory::MissingView
        | ErrorCategory::MissingProcedure
        | ErrorCategory::MissingFunction => "deploy-dependency-first",
        ErrorCategory::MissingColumn => "align-columns",
        ErrorCategory::TypeMismatch => "adjust-types",
        ErrorCategory::ObjectExists => "resolve-conflict",
        ErrorCategory::IdentityViolation => "wrap-identity-insert",
        ErrorCategory::Permission => "grant-permissions",
        ErrorCategory::Timeout | ErrorCategory::Connection => "retry-io",
        ErrorCategory::LobParameter => "materialize-lobs",
        ErrorCategory::Unresolvable => "manual-review",
    }
    .to_string();

    let mut parts = vec![format!(
        "Deployment failed with {} ({:?} severity).",
        classification.category, classification.severity
    )];
    if !source.features.is_empty() {
        parts.push(format!(
            "Source uses Oracle-specific constructs likely implicated: {}.",
            source.features.join(", ")
        ));
    }
    if !target.missing_references.is_empty() {
        parts.push(format!(
            "Referenced objects missing on the target: {}.",
            target.missing_references.join(", ")
        ));
    }
    if let Some(best) = knowledge.memory_solutions.first() {
        parts.push(format!(
            "A previous run fixed a similar error by: {}.",
            best.solution
        ));
    }

    let confidence = if knowledge
        .memory_solutions
        .first()
        .is_some_and(|s| s.score >= 0.99)
        || !target.missing_references.is_empty()
    {
        Confidence::High
    } else if !source.features.is_empty() || !knowledge.memory_solutions.is_empty() {
        Confidence::Medium
    } else {
        Confidence::Low
    };

    Synthesis {
        root_cause_text: parts.join(" "),
        confidence,
        fix_strategy_label,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use connectors::mock::MockTarget;
    use model::core::identifiers::ObjectKind;

    fn analyzer(target: Arc<MockTarget>) -> RootCauseAnalyzer {
        RootCauseAnalyzer::new(
            target as Arc<dyn TargetAdapter>,
            Arc::new(SharedMemory::in_memory()),
            None,
            "dbo",
        )
    }

    #[tokio::test]
    async fn minus_view_is_diagnosed_as_syntax_with_the_feature_named() {
        let target = Arc::new(MockTarget::new());
        let object = ObjectId::new("dbo", "V_DIFF", ObjectKind::View);
        let report = analyzer(target)
            .analyze(
                &object,
                "CREATE VIEW v_diff AS SELECT a FROM t1 MINUS SELECT a FROM t2",
                "Incorrect syntax near the keyword 'MINUS'.",
            )
            .await;

        assert_eq!(report.classification.category, ErrorCategory::Syntax);
        assert!(report.source_analysis.features.contains(&"MINUS".to_string()));
        assert_eq!(report.synthesis.fix_strategy_label, "rewrite-syntax");
        assert!(report.synthesis.root_cause_text.contains("MINUS"));
        assert_eq!(report.synthesis.confidence, Confidence::Medium);
    }

    #[tokio::test]
    async fn missing_reference_raises_confidence() {
        let target = Arc::new(MockTarget::new());
        let object = ObjectId::new("dbo", "P1", ObjectKind::Procedure);
        let report = analyzer(target)
            .analyze(
                &object,
                "CREATE PROCEDURE p1 AS BEGIN EXEC p2; END",
                "Could not find stored procedure 'dbo.P2'.",
            )
            .await;

        assert_eq!(
            report.classification.category,
            ErrorCategory::MissingProcedure
        );
        assert_eq!(
            report.target_metadata.missing_references,
            vec!["dbo.P2".to_string()]
        );
        assert_eq!(report.synthesis.confidence, Confidence::High);
        assert_eq!(report.synthesis.fix_strategy_label, "deploy-dependency-first");
    }

    #[tokio::test]
    async fn consulted_sources_are_recorded() {
        let target = Arc::new(MockTarget::new());
        let object = ObjectId::new("dbo", "X", ObjectKind::Table);
        let report = analyzer(target)
            .analyze(&object, "CREATE TABLE X (A INT)", "mystery failure")
            .await;
        assert!(report.consulted.contains(&"classification".to_string()));
        assert!(report.consulted.contains(&"memory".to_string()));
        assert!(!report.consulted.contains(&"web-search".to_string()));
    }
}
