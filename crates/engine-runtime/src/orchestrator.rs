use crate::{
    artifacts::RunArtifacts,
    error::MigrationError,
    report::{FkResult, ObjectResult, RunReport, RunTotals},
};
use chrono::Utc;
use connectors::adapter::{SourceAdapter, TargetAdapter};
use engine_core::{
    deploy::Deployer,
    event_bus::EventBus,
    memory::SharedMemory,
    settings::RunSettings,
};
use engine_processing::{
    classify::classify_error,
    copier::{CopyReport, DataCopier, DataCopierParams},
    dependency::DependencyManager,
    repair::{ConflictPrompt, RepairController, RepairControllerParams, RepairOutcome},
    root_cause::RootCauseAnalyzer,
};
use model::{
    core::identifiers::{ObjectId, ObjectKind},
    events::{MigrationPhase, ObjectProgress, RunCompleted, RunStarted},
    migration::{
        category::ErrorCategory,
        object::{ErrorAttempt, MigratableObject, ObjectStatus},
        package::MigrationNote,
        selection::{ErrorPolicy, MigrationSelection},
        sequence::UsageSite,
    },
};
use planner::{
    discovery::discover,
    fk_manager::FkManager,
    package::decompose,
    sequence::{IdentityPlan, SequenceAnalyzer},
};
use std::collections::{BTreeSet, HashMap};
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use translator::{
    cost::CostSink,
    providers::{LanguageModel, SearchProvider},
    review::Reviewer,
    translate::{TranslationRequest, Translator},
};
use tracing::{info, warn};
use uuid::Uuid;

pub struct OrchestratorParams {
    pub source: Arc<dyn SourceAdapter>,
    pub target: Arc<dyn TargetAdapter>,
    pub memory: Arc<SharedMemory>,
    pub settings: RunSettings,
    pub selection: MigrationSelection,
    pub llm: Option<Arc<dyn LanguageModel>>,
    pub search: Option<Arc<dyn SearchProvider>>,
    pub prompt: Option<Arc<dyn ConflictPrompt>>,
    pub events: EventBus,
    /// Root directory for run artifacts; `None` keeps the run file-less.
    pub artifacts_root: Option<PathBuf>,
    pub cost: Arc<CostSink>,
}

/// Top-level scheduler: composes discovery, sequence analysis, translation,
/// deployment, FK application, data copy, package decomposition and the
/// dependency cycles for one user selection. Owns every `MigratableObject`
/// of the run.
pub struct Orchestrator {
    source: Arc<dyn SourceAdapter>,
    target: Arc<dyn TargetAdapter>,
    memory: Arc<SharedMemory>,
    settings: RunSettings,
    selection: MigrationSelection,
    llm: Option<Arc<dyn LanguageModel>>,
    search: Option<Arc<dyn SearchProvider>>,
    prompt: Option<Arc<dyn ConflictPrompt>>,
    events: EventBus,
    artifacts_root: Option<PathBuf>,
    cost: Arc<CostSink>,
}

/// Mutable state threaded through the phases.
struct RunState {
    run_id: String,
    results: Vec<ObjectResult>,
    /// Objects parked on missing dependencies, still owned by the run.
    parked: HashMap<ObjectId, MigratableObject>,
    fk_results: Vec<FkResult>,
    copies: Vec<CopyReport>,
    copy_failures: Vec<String>,
    package_notes: Vec<MigrationNote>,
    dependency_manager: DependencyManager,
    cancelled: bool,
    stop_requested: bool,
}

impl Orchestrator {
    pub fn new(params: OrchestratorParams) -> Self {
        Orchestrator {
            source: params.source,
            target: params.target,
            memory: params.memory,
            settings: params.settings,
            selection: params.selection,
            llm: params.llm,
            search: params.search,
            prompt: params.prompt,
            events: params.events,
            artifacts_root: params.artifacts_root,
            cost: params.cost,
        }
    }

    pub async fn run(&self, cancel: CancellationToken) -> Result<RunReport, MigrationError> {
        let started_at = Utc::now();
        let run_id = format!("run-{}", Uuid::new_v4());
        info!(run_id = %run_id, "migration run starting");
        self.events
            .publish(RunStarted {
                run_id: run_id.clone(),
                timestamp: started_at,
            })
            .await;

        let artifacts = match &self.artifacts_root {
            Some(root) => Some(RunArtifacts::create(root).await?),
            None => None,
        };

        let discovery = discover(self.source.as_ref())
            .await
            .map_err(|err| MigrationError::Initialization(err.to_string()))?;
        if let Some(artifacts) = &artifacts {
            artifacts.write_json("discovery_result.json", &discovery).await?;
            artifacts
                .write_json("migration_selection.json", &self.selection)
                .await?;
        }

        self.memory
            .register_schema(&self.settings.default_schema)
            .await?;

        let mut state = RunState {
            run_id: run_id.clone(),
            results: Vec::new(),
            parked: HashMap::new(),
            fk_results: Vec::new(),
            copies: Vec::new(),
            copy_failures: Vec::new(),
            package_notes: Vec::new(),
            dependency_manager: DependencyManager::new(),
            cancelled: false,
            stop_requested: false,
        };

        // Phase 1: sequence and trigger analysis.
        let analyzer = self.analyze_sequences().await?;
        let identity_plans = self.index_identity_plans(&analyzer).await?;
        let skipped_triggers: BTreeSet<String> = analyzer
            .skipped_triggers()
            .iter()
            .filter_map(|fq| fq.rsplit('.').next().map(str::to_uppercase))
            .collect();
        if let Some(artifacts) = &artifacts {
            artifacts
                .write_text("sequence_migration_plan.txt", &analyzer.report())
                .await?;
        }

        let translator = Arc::new(self.build_translator(self.llm.clone()));
        let repair_llm = if self.settings.use_llm_repair {
            self.llm.clone()
        } else {
            None
        };
        let controller = self.build_controller(repair_llm, &identity_plans);
        let reviewer = Reviewer::new();
        let mut fk_manager = FkManager::new(&self.settings.default_schema);

        // Phase 2: tables.
        for table in self.selection.tables.clone() {
            if self.should_halt(&mut state, &cancel) {
                break;
            }
            self.migrate_table(
                &table,
                &translator,
                &controller,
                &reviewer,
                &mut fk_manager,
                &identity_plans,
                &artifacts,
                &mut state,
                &cancel,
            )
            .await?;
        }

        // Phase 3: foreign keys, once every selected table exists.
        if !fk_manager.is_empty() && !state.cancelled {
            self.apply_foreign_keys(&fk_manager, &artifacts, &mut state)
                .await?;
        }

        // Phase 4: row data.
        if !state.cancelled && !state.stop_requested {
            self.copy_data(&mut state, &cancel).await;
        }

        // Phase 5: packages decompose into standalone code objects.
        for package in self.selection.packages.clone() {
            if self.should_halt(&mut state, &cancel) {
                break;
            }
            self.migrate_package(
                &package,
                &translator,
                &controller,
                &reviewer,
                &artifacts,
                &mut state,
                &cancel,
            )
            .await?;
        }

        // Phase 6: standalone code objects.
        let code_work: Vec<(ObjectKind, String)> = self
            .selection
            .views
            .iter()
            .map(|n| (ObjectKind::View, n.clone()))
            .chain(
                self.selection
                    .procedures
                    .iter()
                    .map(|n| (ObjectKind::Procedure, n.clone())),
            )
            .chain(
                self.selection
                    .functions
                    .iter()
                    .map(|n| (ObjectKind::Function, n.clone())),
            )
            .chain(
                self.selection
                    .triggers
                    .iter()
                    .map(|n| (ObjectKind::Trigger, n.clone())),
            )
            .chain(
                self.selection
                    .sequences
                    .iter()
                    .map(|n| (ObjectKind::Sequence, n.clone())),
            )
            .collect();
        for (kind, name) in code_work {
            if self.should_halt(&mut state, &cancel) {
                break;
            }
            if kind == ObjectKind::Trigger && skipped_triggers.contains(&name.to_uppercase()) {
                self.skip_identity_trigger(&name, &mut state).await;
                continue;
            }
            if kind == ObjectKind::Sequence && !self.sequence_needs_ddl(&analyzer, &name) {
                self.skip_sequence(&name, &analyzer, &mut state).await;
                continue;
            }
            self.migrate_code_object(
                kind,
                &name,
                &translator,
                &controller,
                &reviewer,
                &artifacts,
                &mut state,
                &cancel,
            )
            .await?;
        }

        // Phase 7: dependency retry cycles.
        self.drive_dependency_cycles(&controller, &mut state, &cancel)
            .await;

        // Phase 8: report and flush.
        let unresolved_dependencies: Vec<String> = state
            .dependency_manager
            .remaining()
            .iter()
            .map(|p| format!("{} (missing: {})", p.id, p.unresolved.join(", ")))
            .collect();
        for (_, object) in state.parked.drain() {
            let result = object_result(&object, Some("unresolved dependencies".to_string()));
            state.results.push(result);
        }

        self.memory.flush().await?;

        let totals = RunTotals {
            deployed: count_status(&state.results, ObjectStatus::Deployed),
            failed: count_status(&state.results, ObjectStatus::Failed),
            skipped: count_status(&state.results, ObjectStatus::Skipped),
        };
        self.events
            .publish(RunCompleted {
                run_id: run_id.clone(),
                deployed: totals.deployed,
                failed: totals.failed,
                skipped: totals.skipped,
                timestamp: Utc::now(),
            })
            .await;

        let report = RunReport {
            run_id,
            started_at,
            finished_at: Utc::now(),
            cancelled: state.cancelled,
            totals,
            objects: state.results,
            foreign_keys: state.fk_results,
            copies: state.copies,
            copy_failures: state.copy_failures,
            unresolved_dependencies,
            package_notes: state.package_notes,
            cost: self.cost.totals(),
        };
        if let Some(artifacts) = &artifacts {
            artifacts.write_json("migration_results.json", &report).await?;
        }
        info!(
            deployed = report.totals.deployed,
            failed = report.totals.failed,
            skipped = report.totals.skipped,
            "migration run finished"
        );
        Ok(report)
    }

    async fn analyze_sequences(&self) -> Result<SequenceAnalyzer, MigrationError> {
        let schema = self.source.schema();
        let mut analyzer = SequenceAnalyzer::new(&schema);
        for sequence in self.source.list_sequences().await? {
            analyzer.register_sequence(&sequence);
        }
        for trigger in self.source.list_triggers().await? {
            match self.source.get_ddl(ObjectKind::Trigger, &trigger).await {
                Ok(ddl) => analyzer.inspect_trigger(&trigger, &ddl),
                Err(err) => warn!(trigger = %trigger, error = %err, "trigger body unavailable"),
            }
        }
        for procedure in self.source.list_procedures().await? {
            if let Ok(ddl) = self.source.get_ddl(ObjectKind::Procedure, &procedure).await {
                analyzer.inspect_code(UsageSite::Procedure, &procedure, &ddl);
            }
        }
        for function in self.source.list_functions().await? {
            if let Ok(ddl) = self.source.get_ddl(ObjectKind::Function, &function).await {
                analyzer.inspect_code(UsageSite::Function, &function, &ddl);
            }
        }
        analyzer.finalize();
        Ok(analyzer)
    }

    /// Registers identity columns in shared memory and keys the plans by
    /// the table's target name.
    async fn index_identity_plans(
        &self,
        analyzer: &SequenceAnalyzer,
    ) -> Result<HashMap<String, IdentityPlan>, MigrationError> {
        let mut plans = HashMap::new();
        for plan in analyzer.identity_plans() {
            let target_table = format!(
                "{}.{}",
                self.settings.default_schema, plan.table.name
            );
            self.memory
                .register_identity_column(&target_table, &plan.column)
                .await?;
            plans.insert(target_table.to_lowercase(), plan.clone());
        }
        Ok(plans)
    }

    fn build_translator(&self, llm: Option<Arc<dyn LanguageModel>>) -> Translator {
        let translator = Translator::new(
            self.memory.clone(),
            &self.settings.default_schema,
            self.settings.conflict_strategy.or(self.selection.conflict_strategy),
        );
        match llm {
            Some(llm) => translator.with_llm(llm),
            None => translator,
        }
    }

    fn build_controller(
        &self,
        repair_llm: Option<Arc<dyn LanguageModel>>,
        identity_plans: &HashMap<String, IdentityPlan>,
    ) -> RepairController {
        let search = if self.settings.use_web_search {
            self.search.clone()
        } else {
            None
        };
        RepairController::new(RepairControllerParams {
            deployer: Deployer::new(self.target.clone()),
            analyzer: RootCauseAnalyzer::new(
                self.target.clone(),
                self.memory.clone(),
                search,
                &self.settings.default_schema,
            ),
            translator: Arc::new(self.build_translator(repair_llm)),
            memory: self.memory.clone(),
            target: self.target.clone(),
            prompt: self.prompt.clone(),
            conflict_strategy: self
                .settings
                .conflict_strategy
                .or(self.selection.conflict_strategy),
            max_repair_attempts: self.settings.max_repair_attempts,
            resolution_timeout: self.settings.resolution_timeout(),
            io_retry_bound: 3,
            default_schema: self.settings.default_schema.clone(),
            identity_plans: identity_plans.clone(),
        })
    }

    fn should_halt(&self, state: &mut RunState, cancel: &CancellationToken) -> bool {
        if cancel.is_cancelled() {
            state.cancelled = true;
        }
        state.cancelled || state.stop_requested
    }

    #[allow(clippy::too_many_arguments)]
    async fn migrate_table(
        &self,
        table: &str,
        translator: &Arc<Translator>,
        controller: &RepairController,
        reviewer: &Reviewer,
        fk_manager: &mut FkManager,
        identity_plans: &HashMap<String, IdentityPlan>,
        artifacts: &Option<RunArtifacts>,
        state: &mut RunState,
        cancel: &CancellationToken,
    ) -> Result<(), MigrationError> {
        let id = ObjectId::new(&self.settings.default_schema, table, ObjectKind::Table);
        self.publish(state, &id, MigrationPhase::Fetch, "").await;

        let ddl = match self.source.get_ddl(ObjectKind::Table, table).await {
            Ok(ddl) => ddl,
            Err(err) => {
                self.record_fetch_failure(state, id, &err.server_text()).await;
                return Ok(());
            }
        };
        let mut object = MigratableObject::new(id.clone(), ddl);

        self.publish(state, &id, MigrationPhase::Translate, "").await;
        let request = TranslationRequest {
            object_name: table,
            kind: ObjectKind::Table,
            source_text: &object.source_text,
            repair: None,
        };
        let plan = identity_plans.get(&id.qualified.to_string().to_lowercase());
        let sql = match translator.translate_table(&request, fk_manager, plan).await {
            Ok(sql) => sql,
            Err(err) => {
                self.record_translate_failure(state, object, &err.to_string())
                    .await;
                return Ok(());
            }
        };
        object.target_text = Some(sql);
        object.status = ObjectStatus::Translated;

        self.review_and_deploy(object, controller, reviewer, artifacts, state, cancel)
            .await
    }

    #[allow(clippy::too_many_arguments)]
    async fn migrate_package(
        &self,
        package: &str,
        translator: &Arc<Translator>,
        controller: &RepairController,
        reviewer: &Reviewer,
        artifacts: &Option<RunArtifacts>,
        state: &mut RunState,
        cancel: &CancellationToken,
    ) -> Result<(), MigrationError> {
        let package_id = ObjectId::new(
            &self.settings.default_schema,
            package,
            ObjectKind::Package,
        );
        self.publish(state, &package_id, MigrationPhase::Fetch, "").await;

        let text = match self.source.get_package_text(package).await {
            Ok(text) => text,
            Err(err) => {
                self.record_fetch_failure(state, package_id, &err.server_text())
                    .await;
                return Ok(());
            }
        };

        let decomposed = decompose(package, &text);
        state.package_notes.extend(decomposed.notes.clone());
        for failure in &decomposed.failures {
            warn!(package = package, failure = %failure, "member skipped during decomposition");
        }
        self.publish(
            state,
            &package_id,
            MigrationPhase::Translate,
            &format!("decomposed into {} unit(s)", decomposed.units.len()),
        )
        .await;

        for unit in decomposed.units {
            if self.should_halt(state, cancel) {
                break;
            }
            let unit_id = ObjectId::new(
                &self.settings.default_schema,
                &unit.target_name(),
                ObjectKind::PackageMember,
            );
            if unit.body.is_empty() {
                let mut object = MigratableObject::new(unit_id.clone(), String::new());
                object.status = ObjectStatus::Skipped;
                self.publish(state, &unit_id, MigrationPhase::Skipped, "no body in package")
                    .await;
                state.results.push(object_result(
                    &object,
                    Some("declared in the package spec without a body".to_string()),
                ));
                continue;
            }

            let mut object = MigratableObject::new(unit_id.clone(), unit.body.clone());
            object.dependencies = unit
                .member_dependencies
                .iter()
                .map(|d| format!("{}.{}", self.settings.default_schema, d))
                .collect();

            self.publish(state, &unit_id, MigrationPhase::Translate, "").await;
            let request = TranslationRequest {
                object_name: &unit_id.qualified.name,
                kind: ObjectKind::PackageMember,
                source_text: &object.source_text,
                repair: None,
            };
            match translator.translate(&request).await {
                Ok(sql) => {
                    object.target_text = Some(sql);
                    object.status = ObjectStatus::Translated;
                    self.review_and_deploy(object, controller, reviewer, artifacts, state, cancel)
                        .await?;
                }
                Err(err) => {
                    self.record_translate_failure(state, object, &err.to_string())
                        .await;
                }
            }
        }
        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    async fn migrate_code_object(
        &self,
        kind: ObjectKind,
        name: &str,
        translator: &Arc<Translator>,
        controller: &RepairController,
        reviewer: &Reviewer,
        artifacts: &Option<RunArtifacts>,
        state: &mut RunState,
        cancel: &CancellationToken,
    ) -> Result<(), MigrationError> {
        let id = ObjectId::new(&self.settings.default_schema, name, kind);
        self.publish(state, &id, MigrationPhase::Fetch, "").await;

        let ddl = match self.source.get_ddl(kind, name).await {
            Ok(ddl) => ddl,
            Err(err) => {
                self.record_fetch_failure(state, id, &err.server_text()).await;
                return Ok(());
            }
        };
        let mut object = MigratableObject::new(id.clone(), ddl);

        self.publish(state, &id, MigrationPhase::Translate, "").await;
        let request = TranslationRequest {
            object_name: name,
            kind,
            source_text: &object.source_text,
            repair: None,
        };
        match translator.translate(&request).await {
            Ok(sql) => {
                object.target_text = Some(sql);
                object.status = ObjectStatus::Translated;
                self.review_and_deploy(object, controller, reviewer, artifacts, state, cancel)
                    .await
            }
            Err(err) => {
                self.record_translate_failure(state, object, &err.to_string())
                    .await;
                Ok(())
            }
        }
    }

    /// Review gate plus deployment through the repair controller, shared by
    /// every object kind.
    async fn review_and_deploy(
        &self,
        mut object: MigratableObject,
        controller: &RepairController,
        reviewer: &Reviewer,
        artifacts: &Option<RunArtifacts>,
        state: &mut RunState,
        cancel: &CancellationToken,
    ) -> Result<(), MigrationError> {
        let id = object.id.clone();
        let sql = object.target_text.clone().unwrap_or_default();

        let review = reviewer.review(id.kind, &sql);
        let review_detail = if review.requires_changes() {
            format!(
                "requires changes: {}",
                review
                    .issues
                    .iter()
                    .map(|i| i.description.as_str())
                    .collect::<Vec<_>>()
                    .join("; ")
            )
        } else {
            format!("{:?}", review.overall_quality)
        };
        // A requires_changes verdict never blocks deployment; it is
        // recorded and sharpens later failure diagnostics.
        self.publish(state, &id, MigrationPhase::Review, &review_detail)
            .await;

        self.publish(state, &id, MigrationPhase::Deploy, "").await;
        let outcome = controller.run(&mut object, cancel).await?;

        if let Some(artifacts) = artifacts {
            artifacts
                .write_object_pair(
                    id.kind,
                    &id.qualified.name,
                    &object.source_text,
                    object.target_text.as_deref(),
                )
                .await?;
        }

        match outcome {
            RepairOutcome::Deployed { attempts } => {
                let detail = if attempts > 0 {
                    format!("deployed after {attempts} repair attempt(s)")
                } else {
                    String::new()
                };
                self.publish(state, &id, MigrationPhase::Done, &detail).await;
                state.results.push(object_result(&object, None));
            }
            RepairOutcome::Skipped { reason } => {
                self.publish(state, &id, MigrationPhase::Skipped, &reason).await;
                state.results.push(object_result(&object, Some(reason)));
            }
            RepairOutcome::QueuedForDependencies { unresolved } => {
                self.publish(
                    state,
                    &id,
                    MigrationPhase::Repair,
                    &format!("waiting on {}", unresolved.join(", ")),
                )
                .await;
                state
                    .dependency_manager
                    .enqueue(id.clone(), unresolved.clone());
                object.dependencies = unresolved;
                state.parked.insert(id, object);
            }
            RepairOutcome::Abandoned {
                category,
                error,
                recommendation,
            } => {
                self.publish(state, &id, MigrationPhase::Failed, &error).await;
                state
                    .results
                    .push(object_result(&object, recommendation.clone()));
                if self.settings.error_policy == ErrorPolicy::StopOnFirstError {
                    warn!(object = %id, category = %category, "stopping run on first error");
                    state.stop_requested = true;
                }
            }
            RepairOutcome::Cancelled => {
                state.cancelled = true;
                state.results.push(object_result(&object, None));
            }
        }
        Ok(())
    }

    async fn apply_foreign_keys(
        &self,
        fk_manager: &FkManager,
        artifacts: &Option<RunArtifacts>,
        state: &mut RunState,
    ) -> Result<(), MigrationError> {
        let script = fk_manager.build_script();
        if let Some(artifacts) = artifacts {
            // Persisted for audit before anything executes.
            artifacts.write_text("apply_foreign_keys.sql", &script).await?;
        }

        for definition in fk_manager.ordered_definitions() {
            let statement = definition.to_alter_statement();
            let result = self.target.execute(&statement).await;
            match result {
                Ok(()) => state.fk_results.push(FkResult {
                    constraint_name: definition.constraint_name.clone(),
                    table: definition.source_table.to_string(),
                    applied: true,
                    error: None,
                }),
                Err(err) => {
                    // One FK failing never aborts the rest.
                    warn!(
                        constraint = %definition.constraint_name,
                        error = %err,
                        "foreign key application failed"
                    );
                    state.fk_results.push(FkResult {
                        constraint_name: definition.constraint_name.clone(),
                        table: definition.source_table.to_string(),
                        applied: false,
                        error: Some(err.server_text()),
                    });
                }
            }
        }
        Ok(())
    }

    async fn copy_data(&self, state: &mut RunState, cancel: &CancellationToken) {
        let tables_with_data: Vec<String> = self
            .selection
            .tables
            .iter()
            .filter(|t| self.selection.wants_data(t))
            .cloned()
            .collect();
        if tables_with_data.is_empty() {
            return;
        }

        let copier = DataCopier::new(DataCopierParams {
            source: self.source.clone(),
            target: self.target.clone(),
            batch_size: self.settings.batch_size,
            truncate_before_copy: self.settings.truncate_before_copy,
            default_schema: self.settings.default_schema.clone(),
        });

        for table in tables_with_data {
            if cancel.is_cancelled() {
                state.cancelled = true;
                return;
            }
            let deployed = state.results.iter().any(|r| {
                r.id.kind == ObjectKind::Table
                    && r.id.qualified.name.eq_ignore_ascii_case(&table)
                    && r.status == ObjectStatus::Deployed
            });
            if !deployed {
                state
                    .copy_failures
                    .push(format!("{table}: table was not deployed, copy skipped"));
                continue;
            }
            match copier.copy_table(&table, cancel).await {
                Ok(report) => state.copies.push(report),
                Err(err) => {
                    warn!(table = %table, error = %err, "data copy failed");
                    state.copy_failures.push(format!("{table}: {err}"));
                    if self.settings.error_policy == ErrorPolicy::StopOnFirstError {
                        state.stop_requested = true;
                        return;
                    }
                }
            }
        }
    }

    async fn drive_dependency_cycles(
        &self,
        controller: &RepairController,
        state: &mut RunState,
        cancel: &CancellationToken,
    ) {
        for cycle in 1..=self.settings.max_dependency_cycles {
            if state.dependency_manager.is_empty() || state.cancelled || state.stop_requested {
                break;
            }
            let ready = state
                .dependency_manager
                .take_satisfied(&self.memory, &self.target, &self.settings.default_schema)
                .await;
            if ready.is_empty() {
                info!(cycle, "no dependency-queued object became satisfiable");
                break;
            }
            info!(cycle, count = ready.len(), "re-submitting dependency-queued objects");

            for pending in ready {
                if self.should_halt(state, cancel) {
                    return;
                }
                let Some(mut object) = state.parked.remove(&pending.id) else {
                    continue;
                };
                self.publish(
                    state,
                    &pending.id,
                    MigrationPhase::Deploy,
                    &format!("dependency cycle {cycle}"),
                )
                .await;
                match controller.run(&mut object, cancel).await {
                    Ok(outcome) => {
                        self.settle_dependency_outcome(pending.id, object, outcome, state)
                            .await;
                    }
                    Err(err) => {
                        warn!(object = %pending.id, error = %err, "dependency retry failed");
                        state.results.push(object_result(&object, Some(err.to_string())));
                    }
                }
            }
        }
    }

    async fn settle_dependency_outcome(
        &self,
        id: ObjectId,
        object: MigratableObject,
        outcome: RepairOutcome,
        state: &mut RunState,
    ) {
        match outcome {
            RepairOutcome::Deployed { attempts } => {
                let detail = format!("deployed from dependency queue after {attempts} attempt(s)");
                self.publish(state, &id, MigrationPhase::Done, &detail).await;
                state.results.push(object_result(&object, None));
            }
            RepairOutcome::QueuedForDependencies { unresolved } => {
                state.dependency_manager.enqueue(id.clone(), unresolved);
                state.parked.insert(id, object);
            }
            RepairOutcome::Skipped { reason } => {
                self.publish(state, &id, MigrationPhase::Skipped, &reason).await;
                state.results.push(object_result(&object, Some(reason)));
            }
            RepairOutcome::Abandoned { error, recommendation, .. } => {
                self.publish(state, &id, MigrationPhase::Failed, &error).await;
                state.results.push(object_result(&object, recommendation));
            }
            RepairOutcome::Cancelled => {
                state.cancelled = true;
                state.results.push(object_result(&object, None));
            }
        }
    }

    fn sequence_needs_ddl(&self, analyzer: &SequenceAnalyzer, name: &str) -> bool {
        use model::migration::sequence::SequenceStrategy;
        match analyzer.strategy(&self.source.schema(), name) {
            Some(SequenceStrategy::SqlServerSequence)
            | Some(SequenceStrategy::SharedSequence) => true,
            Some(SequenceStrategy::IdentityColumn) => false,
            Some(SequenceStrategy::ManualReview) | None => false,
        }
    }

    async fn skip_identity_trigger(&self, name: &str, state: &mut RunState) {
        let id = ObjectId::new(&self.settings.default_schema, name, ObjectKind::Trigger);
        let detail = "replaced by an IDENTITY column";
        self.publish(state, &id, MigrationPhase::Skipped, detail).await;
        let mut object = MigratableObject::new(id, String::new());
        object.status = ObjectStatus::Skipped;
        state
            .results
            .push(object_result(&object, Some(detail.to_string())));
    }

    async fn skip_sequence(
        &self,
        name: &str,
        analyzer: &SequenceAnalyzer,
        state: &mut RunState,
    ) {
        let id = ObjectId::new(&self.settings.default_schema, name, ObjectKind::Sequence);
        let strategy = analyzer
            .strategy(&self.source.schema(), name)
            .map(|s| s.to_string())
            .unwrap_or_else(|| "UNANALYZED".to_string());
        let detail = format!("sequence strategy {strategy} emits no DDL");
        self.publish(state, &id, MigrationPhase::Skipped, &detail).await;
        let mut object = MigratableObject::new(id, String::new());
        object.status = ObjectStatus::Skipped;
        state.results.push(object_result(&object, Some(detail)));
    }

    async fn record_fetch_failure(&self, state: &mut RunState, id: ObjectId, error: &str) {
        warn!(object = %id, error = %error, "source fetch failed");
        self.publish(state, &id, MigrationPhase::Failed, error).await;
        let mut object = MigratableObject::new(id, String::new());
        object.status = ObjectStatus::Failed;
        object.record_attempt(ErrorAttempt {
            attempt: 0,
            error_text: error.to_string(),
            category: classify_error(error).category,
            code_attempted: String::new(),
            at: Utc::now(),
            context_sources: vec![],
        });
        state.results.push(object_result(&object, None));
    }

    async fn record_translate_failure(
        &self,
        state: &mut RunState,
        mut object: MigratableObject,
        error: &str,
    ) {
        warn!(object = %object.id, error = %error, "translation failed");
        let id = object.id.clone();
        self.publish(state, &id, MigrationPhase::Failed, error).await;
        object.status = ObjectStatus::Failed;
        object.record_attempt(ErrorAttempt {
            attempt: 0,
            error_text: error.to_string(),
            category: ErrorCategory::Unresolvable,
            code_attempted: String::new(),
            at: Utc::now(),
            context_sources: vec![],
        });
        state.results.push(object_result(&object, None));
    }

    async fn publish(&self, state: &RunState, id: &ObjectId, phase: MigrationPhase, detail: &str) {
        self.events
            .publish(ObjectProgress {
                run_id: state.run_id.clone(),
                object: id.clone(),
                phase,
                detail: detail.to_string(),
                timestamp: Utc::now(),
            })
            .await;
    }
}

fn object_result(object: &MigratableObject, recommendation: Option<String>) -> ObjectResult {
    ObjectResult {
        id: object.id.clone(),
        status: object.status,
        attempts: object.error_history.len(),
        error_history: object.error_history.clone(),
        last_target_text: object.target_text.clone(),
        recommendation,
    }
}

fn count_status(results: &[ObjectResult], status: ObjectStatus) -> usize {
    results.iter().filter(|r| r.status == status).count()
}
