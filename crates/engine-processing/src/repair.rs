use crate::{
    classify::{classify_error, referenced_names},
    error::RepairError,
    root_cause::{RootCauseAnalyzer, RootCauseReport},
};
use async_trait::async_trait;
use chrono::Utc;
use connectors::adapter::TargetAdapter;
use engine_core::{deploy::Deployer, memory::SharedMemory};
use model::{
    core::identifiers::{ObjectId, ObjectKind, QualifiedName},
    migration::{
        category::{ErrorCategory, FailureClass},
        object::{ErrorAttempt, MigratableObject, ObjectStatus},
        selection::{ConflictResolution, ConflictStrategy},
    },
};
use planner::{fk_manager::FkManager, sequence::IdentityPlan};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use translator::translate::{RepairHints, TranslationRequest, Translator};
use tracing::{debug, info, warn};

/// Final disposition of one object after the bounded deploy/repair loop.
#[derive(Debug, Clone)]
pub enum RepairOutcome {
    Deployed {
        attempts: usize,
    },
    Skipped {
        reason: String,
    },
    /// Failed on a missing dependency; the dependency manager retries it.
    QueuedForDependencies {
        unresolved: Vec<String>,
    },
    Abandoned {
        category: ErrorCategory,
        error: String,
        recommendation: Option<String>,
    },
    Cancelled,
}

/// Surface through which the external UI answers OBJECT_EXISTS conflicts.
/// The controller bounds the wait and falls back to the per-kind default.
#[async_trait]
pub trait ConflictPrompt: Send + Sync {
    async fn resolve(&self, object: &ObjectId) -> ConflictResolution;
}

pub struct RepairControllerParams {
    pub deployer: Deployer,
    pub analyzer: RootCauseAnalyzer,
    pub translator: Arc<Translator>,
    pub memory: Arc<SharedMemory>,
    pub target: Arc<dyn TargetAdapter>,
    pub prompt: Option<Arc<dyn ConflictPrompt>>,
    pub conflict_strategy: Option<ConflictStrategy>,
    pub max_repair_attempts: usize,
    pub resolution_timeout: Duration,
    pub io_retry_bound: usize,
    pub default_schema: String,
    /// IDENTITY conversion plans keyed by lowercased `schema.table`, needed
    /// when a table is re-translated during repair.
    pub identity_plans: HashMap<String, IdentityPlan>,
}

/// Drives one object through deploy → analyze → re-translate → deploy until
/// it lands, is queued on a dependency, or the attempt budget runs out.
pub struct RepairController {
    deployer: Deployer,
    analyzer: RootCauseAnalyzer,
    translator: Arc<Translator>,
    memory: Arc<SharedMemory>,
    target: Arc<dyn TargetAdapter>,
    prompt: Option<Arc<dyn ConflictPrompt>>,
    conflict_strategy: Option<ConflictStrategy>,
    max_repair_attempts: usize,
    resolution_timeout: Duration,
    io_retry_bound: usize,
    default_schema: String,
    identity_plans: HashMap<String, IdentityPlan>,
}

impl RepairController {
    pub fn new(params: RepairControllerParams) -> Self {
        RepairController {
            deployer: params.deployer,
            analyzer: params.analyzer,
            translator: params.translator,
            memory: params.memory,
            target: params.target,
            prompt: params.prompt,
            conflict_strategy: params.conflict_strategy,
            max_repair_attempts: params.max_repair_attempts.max(1),
            resolution_timeout: params.resolution_timeout,
            io_retry_bound: params.io_retry_bound.max(1),
            default_schema: params.default_schema,
            identity_plans: params.identity_plans,
        }
    }

    pub async fn run(
        &self,
        object: &mut MigratableObject,
        cancel: &CancellationToken,
    ) -> Result<RepairOutcome, RepairError> {
        let mut sql = object
            .target_text
            .clone()
            .ok_or_else(|| RepairError::NothingToDeploy(object.id.to_string()))?;
        let mut last_synthesis: Option<RootCauseReport> = None;

        loop {
            if cancel.is_cancelled() {
                return Ok(RepairOutcome::Cancelled);
            }

            let (success, error_text) = self.deploy_with_io_retry(&sql, cancel).await;
            if success {
                let attempts = object.error_history.len();
                object.status = ObjectStatus::Deployed;
                object.target_text = Some(sql.clone());
                self.record_success(object, &sql, last_synthesis.as_ref())
                    .await?;
                info!(object = %object.id, attempts, "deployed");
                return Ok(RepairOutcome::Deployed { attempts });
            }

            let error_text = error_text.unwrap_or_else(|| "unknown error".to_string());
            let classification = classify_error(&error_text);
            debug!(
                object = %object.id,
                category = %classification.category,
                "deploy attempt failed"
            );

            match classification.category.failure_class() {
                FailureClass::Conflict => {
                    self.record_attempt(object, &error_text, classification.category, &sql, vec![]);
                    match self.resolve_conflict(object).await {
                        ConflictAction::Retry(new_sql) => {
                            if object.error_history.len() >= self.max_repair_attempts {
                                object.status = ObjectStatus::Failed;
                                return Ok(abandoned(classification.category, error_text, None));
                            }
                            sql = new_sql.unwrap_or(sql);
                        }
                        ConflictAction::Skip(reason) => {
                            object.status = ObjectStatus::Skipped;
                            return Ok(RepairOutcome::Skipped { reason });
                        }
                        ConflictAction::AcceptExisting => {
                            object.status = ObjectStatus::Deployed;
                            self.record_success(object, &sql, None).await?;
                            return Ok(RepairOutcome::Deployed {
                                attempts: object.error_history.len(),
                            });
                        }
                        ConflictAction::Fail => {
                            object.status = ObjectStatus::Failed;
                            return Ok(abandoned(
                                classification.category,
                                error_text,
                                Some("conflict strategy is FAIL_ON_CONFLICT".to_string()),
                            ));
                        }
                    }
                }
                FailureClass::Dependency => {
                    self.record_attempt(object, &error_text, classification.category, &sql, vec![]);
                    object.status = ObjectStatus::Failed;
                    let unresolved = referenced_names(&error_text)
                        .into_iter()
                        .map(|name| {
                            QualifiedName::parse(&name, &self.default_schema).to_string()
                        })
                        .collect();
                    return Ok(RepairOutcome::QueuedForDependencies { unresolved });
                }
                FailureClass::Io | FailureClass::Hard => {
                    self.record_attempt(object, &error_text, classification.category, &sql, vec![]);
                    object.status = ObjectStatus::Failed;
                    return Ok(abandoned(classification.category, error_text, None));
                }
                FailureClass::Transient => {
                    if object.error_history.len() + 1 >= self.max_repair_attempts {
                        self.record_attempt(
                            object,
                            &error_text,
                            classification.category,
                            &sql,
                            vec![],
                        );
                        object.status = ObjectStatus::Failed;
                        let recommendation = last_synthesis
                            .as_ref()
                            .map(|report| report.synthesis.root_cause_text.clone());
                        return Ok(abandoned(classification.category, error_text, recommendation));
                    }

                    let report = self
                        .analyzer
                        .analyze(&object.id, &object.source_text, &error_text)
                        .await;
                    self.record_attempt(
                        object,
                        &error_text,
                        classification.category,
                        &sql,
                        report.consulted.clone(),
                    );

                    match self.retranslate(object, &report).await {
                        Ok(new_sql) => {
                            info!(
                                object = %object.id,
                                strategy = %report.synthesis.fix_strategy_label,
                                "re-translated after failure"
                            );
                            sql = new_sql;
                            object.status = ObjectStatus::Translated;
                            last_synthesis = Some(report);
                        }
                        Err(err) => {
                            warn!(object = %object.id, error = %err, "re-translation failed");
                            object.status = ObjectStatus::Failed;
                            return Ok(abandoned(
                                classification.category,
                                error_text,
                                Some(format!("re-translation failed: {err}")),
                            ));
                        }
                    }
                }
            }
        }
    }

    /// TIMEOUT/CONNECTION failures retry the same script a bounded number
    /// of times before the failure escalates.
    async fn deploy_with_io_retry(
        &self,
        sql: &str,
        cancel: &CancellationToken,
    ) -> (bool, Option<String>) {
        let mut io_attempts = 0;
        loop {
            let result = self.deployer.deploy(sql, cancel).await;
            if result.success {
                return (true, None);
            }
            let error_text = result.error_text.unwrap_or_default();
            let category = classify_error(&error_text).category;
            let is_io = matches!(category, ErrorCategory::Timeout | ErrorCategory::Connection);
            if !is_io || io_attempts + 1 >= self.io_retry_bound || cancel.is_cancelled() {
                return (false, Some(error_text));
            }
            io_attempts += 1;
            debug!(attempt = io_attempts, "retrying I/O failure");
            tokio::time::sleep(Duration::from_millis(200 * io_attempts as u64)).await;
        }
    }

    async fn retranslate(
        &self,
        object: &MigratableObject,
        report: &RootCauseReport,
    ) -> Result<String, RepairError> {
        let hints = RepairHints {
            root_cause: report.synthesis.root_cause_text.clone(),
            fix_strategy: report.synthesis.fix_strategy_label.clone(),
            confidence: report.synthesis.confidence.as_str().to_string(),
            prior_errors: object
                .error_history
                .iter()
                .map(|a| a.error_text.clone())
                .collect(),
            memory_solutions: report
                .knowledge
                .memory_solutions
                .iter()
                .map(|s| s.solution.clone())
                .collect(),
        };
        let request = TranslationRequest {
            object_name: &object.id.qualified.name,
            kind: object.id.kind,
            source_text: &object.source_text,
            repair: Some(&hints),
        };

        let translated = if object.id.kind == ObjectKind::Table {
            // FK definitions were already captured on the first pass; the
            // scratch manager only keeps the re-strip from duplicating them.
            let mut scratch = FkManager::new(&self.default_schema);
            let plan = self
                .identity_plans
                .get(&object.id.qualified.to_string().to_lowercase());
            self.translator
                .translate_table(&request, &mut scratch, plan)
                .await?
        } else {
            self.translator.translate(&request).await?
        };
        Ok(translated)
    }

    async fn resolve_conflict(&self, object: &MigratableObject) -> ConflictAction {
        let resolution = match self.conflict_strategy {
            Some(ConflictStrategy::FailOnConflict) => return ConflictAction::Fail,
            Some(ConflictStrategy::DropAndCreate) => ConflictResolution::Drop,
            Some(ConflictStrategy::SkipExisting) => ConflictResolution::Skip,
            Some(ConflictStrategy::CreateOrAlter) => {
                if object.id.kind == ObjectKind::Table {
                    ConflictResolution::Append
                } else {
                    ConflictResolution::Alter
                }
            }
            None => self.prompt_with_timeout(object).await,
        };

        match resolution {
            ConflictResolution::Drop => {
                let drop_sql = drop_statement(&object.id);
                if let Err(err) = self.target.execute(&drop_sql).await {
                    warn!(object = %object.id, error = %err, "drop before recreate failed");
                    return ConflictAction::Skip(format!("drop failed: {err}"));
                }
                ConflictAction::Retry(None)
            }
            ConflictResolution::Skip => {
                ConflictAction::Skip("object already exists, skipped by resolution".to_string())
            }
            ConflictResolution::Append => ConflictAction::AcceptExisting,
            ConflictResolution::Alter => {
                let altered = object.target_text.as_deref().map(to_create_or_alter);
                ConflictAction::Retry(altered)
            }
        }
    }

    /// Blocking resolution call with the configured bounded wait; on
    /// timeout the per-kind safe default applies (APPEND for tables, DROP
    /// for code).
    async fn prompt_with_timeout(&self, object: &MigratableObject) -> ConflictResolution {
        let default = default_resolution(object.id.kind);
        let Some(prompt) = &self.prompt else {
            return default;
        };
        match tokio::time::timeout(self.resolution_timeout, prompt.resolve(&object.id)).await {
            Ok(choice) => choice,
            Err(_) => {
                warn!(object = %object.id, "conflict prompt timed out, using default");
                default
            }
        }
    }

    fn record_attempt(
        &self,
        object: &mut MigratableObject,
        error_text: &str,
        category: ErrorCategory,
        sql: &str,
        context_sources: Vec<String>,
    ) {
        let attempt = ErrorAttempt {
            attempt: object.error_history.len(),
            error_text: error_text.to_string(),
            category,
            code_attempted: sql.to_string(),
            at: Utc::now(),
            context_sources,
        };
        object.record_attempt(attempt);
    }

    async fn record_success(
        &self,
        object: &MigratableObject,
        sql: &str,
        last_report: Option<&RootCauseReport>,
    ) -> Result<(), RepairError> {
        let source_fq = object.id.qualified.to_string();
        let target_fq = format!("{}.{}", self.default_schema, object.id.qualified.name);
        self.memory
            .record_table_mapping(&source_fq, &target_fq)
            .await?;

        // A success after repairs is knowledge worth keeping: the error and
        // what fixed it, plus the working translation pattern.
        if let Some(last_error) = object.error_history.last() {
            let solution = last_report
                .map(|report| report.synthesis.fix_strategy_label.clone())
                .unwrap_or_else(|| "re-translated".to_string());
            self.memory
                .store_error_solution(
                    &last_error.error_text,
                    &solution,
                    Some(last_error.category.as_str()),
                )
                .await?;
            self.memory
                .store_pattern(&object.source_text, sql, "deployed-after-repair")
                .await?;
        }
        Ok(())
    }
}

enum ConflictAction {
    /// Redeploy, optionally with replacement SQL.
    Retry(Option<String>),
    Skip(String),
    /// Keep the existing target object and treat the step as done.
    AcceptExisting,
    Fail,
}

fn abandoned(
    category: ErrorCategory,
    error: String,
    recommendation: Option<String>,
) -> RepairOutcome {
    RepairOutcome::Abandoned {
        category,
        error,
        recommendation,
    }
}

fn default_resolution(kind: ObjectKind) -> ConflictResolution {
    if kind == ObjectKind::Table {
        ConflictResolution::Append
    } else {
        ConflictResolution::Drop
    }
}

fn drop_statement(id: &ObjectId) -> String {
    let kind = match id.kind {
        ObjectKind::Table => "TABLE",
        ObjectKind::View => "VIEW",
        ObjectKind::Procedure | ObjectKind::PackageMember => "PROCEDURE",
        ObjectKind::Function => "FUNCTION",
        ObjectKind::Trigger => "TRIGGER",
        ObjectKind::Sequence => "SEQUENCE",
        ObjectKind::Package => "PROCEDURE",
    };
    format!("DROP {kind} IF EXISTS {}", id.qualified.bracketed())
}

fn to_create_or_alter(sql: &str) -> String {
    use once_cell::sync::Lazy;
    use regex::Regex;
    static CREATE: Lazy<Regex> = Lazy::new(|| {
        Regex::new(r"(?i)\bCREATE\s+(VIEW|PROCEDURE|FUNCTION|TRIGGER)\b")
            .expect("valid create regex")
    });
    CREATE.replace(sql, "CREATE OR ALTER $1").into_owned()
}
