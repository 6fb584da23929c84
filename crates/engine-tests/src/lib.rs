#![allow(dead_code)]

//! End-to-end scenarios over the mock adapters: the full orchestrator
//! pipeline without live databases.

use connectors::{
    adapter::{SourceAdapter, TargetAdapter},
    mock::{MockSource, MockTarget},
};
use engine_core::{event_bus::EventBus, memory::SharedMemory, settings::RunSettings};
use engine_runtime::{
    orchestrator::{Orchestrator, OrchestratorParams},
    report::RunReport,
};
use model::migration::selection::MigrationSelection;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use translator::{cost::CostSink, providers::LanguageModel};

#[cfg(test)]
mod scenarios;

/// Runs one full migration over mocks and returns the report plus the
/// shared memory used by the run.
pub async fn run_migration(
    source: MockSource,
    target: Arc<MockTarget>,
    selection: MigrationSelection,
    settings: RunSettings,
    llm: Option<Arc<dyn LanguageModel>>,
) -> (RunReport, Arc<SharedMemory>) {
    let memory = Arc::new(SharedMemory::in_memory());
    let orchestrator = Orchestrator::new(OrchestratorParams {
        source: Arc::new(source) as Arc<dyn SourceAdapter>,
        target: target as Arc<dyn TargetAdapter>,
        memory: memory.clone(),
        settings,
        selection,
        llm,
        search: None,
        prompt: None,
        events: EventBus::new(),
        artifacts_root: None,
        cost: Arc::new(CostSink::new()),
    });

    let report = orchestrator
        .run(CancellationToken::new())
        .await
        .expect("migration run should complete");
    (report, memory)
}
