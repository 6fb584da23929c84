use crate::{
    commands::Commands,
    conn::load_connections,
    error::CliError,
    prompt::StdinPrompt,
    shutdown::ShutdownCoordinator,
};
use clap::Parser;
use connectors::{
    adapter::{SourceAdapter, TargetAdapter},
    mssql::target::MssqlTargetAdapter,
    oracle::source::OracleSourceAdapter,
};
use engine_core::{event_bus::EventBus, memory::SharedMemory, settings::RunSettings};
use engine_processing::repair::ConflictPrompt;
use engine_runtime::orchestrator::{Orchestrator, OrchestratorParams};
use model::migration::selection::MigrationSelection;
use planner::{discovery::discover, sequence::SequenceAnalyzer};
use std::{process, sync::Arc};
use tokio_util::sync::CancellationToken;
use tracing::info;
use translator::{
    cost::CostSink,
    providers::{openai::OpenAiCompatibleClient, search::HttpSearchProvider},
};

mod commands;
mod conn;
mod error;
mod output;
mod prompt;
mod shutdown;

#[derive(Parser)]
#[command(
    name = "transora",
    version = "0.1.0",
    about = "Oracle to SQL Server schema and data migration tool"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let exit_code = match run_cli().await {
        Ok(()) => 0,
        Err(CliError::ShutdownRequested) => {
            info!("Run stopped gracefully, partial state saved");
            130
        }
        Err(err) => {
            tracing::error!("{err}");
            1
        }
    };
    process::exit(exit_code);
}

async fn run_cli() -> Result<(), CliError> {
    let cli = Cli::parse();
    let cancel = CancellationToken::new();
    let shutdown = ShutdownCoordinator::new(cancel.clone());
    shutdown.register_handlers();

    match cli.command {
        Commands::Discover {
            connections,
            output,
        } => {
            let source = connect_source(connections.as_deref()).await?;
            let document = discover(source.as_ref()).await?;
            let json = serde_json::to_string_pretty(&document)?;
            match output {
                Some(path) => std::fs::write(path, json)?,
                None => println!("{json}"),
            }
            Ok(())
        }

        Commands::Migrate {
            selection,
            connections,
            settings,
            interactive,
        } => {
            let selection: MigrationSelection =
                serde_json::from_str(&std::fs::read_to_string(&selection)?)?;
            let settings = match settings {
                Some(path) => RunSettings::from_json(&std::fs::read_to_string(&path)?)?,
                None => RunSettings::default(),
            };

            let configs = load_connections(connections.as_deref())?;
            let source: Arc<dyn SourceAdapter> =
                Arc::new(OracleSourceAdapter::connect(&configs.oracle).await?);
            let target: Arc<dyn TargetAdapter> =
                Arc::new(MssqlTargetAdapter::connect(&configs.mssql).await?);

            let memory = Arc::new(SharedMemory::load(&settings.shared_memory_path).await?);
            let cost = Arc::new(CostSink::new());
            let llm = llm_from_env(&settings, cost.clone());
            let search = search_from_env(&settings, cost.clone());
            let prompt: Option<Arc<dyn ConflictPrompt>> = if interactive {
                Some(Arc::new(StdinPrompt))
            } else {
                None
            };

            let events = EventBus::new();
            output::spawn_progress_printer(&events).await;

            let orchestrator = Orchestrator::new(OrchestratorParams {
                source,
                target,
                memory,
                artifacts_root: Some(settings.output_dir.clone().into()),
                settings,
                selection,
                llm,
                search,
                prompt,
                events,
                cost,
            });

            let report = orchestrator.run(cancel.clone()).await?;
            output::print_summary(&report);

            if shutdown.is_shutdown_requested() {
                return Err(CliError::ShutdownRequested);
            }
            Ok(())
        }

        Commands::Plan { connections } => {
            let source = connect_source(connections.as_deref()).await?;
            let mut analyzer = SequenceAnalyzer::new(&source.schema());
            for sequence in source.list_sequences().await? {
                analyzer.register_sequence(&sequence);
            }
            for trigger in source.list_triggers().await? {
                if let Ok(ddl) = source
                    .get_ddl(model::core::identifiers::ObjectKind::Trigger, &trigger)
                    .await
                {
                    analyzer.inspect_trigger(&trigger, &ddl);
                }
            }
            for procedure in source.list_procedures().await? {
                if let Ok(ddl) = source
                    .get_ddl(model::core::identifiers::ObjectKind::Procedure, &procedure)
                    .await
                {
                    analyzer.inspect_code(
                        model::migration::sequence::UsageSite::Procedure,
                        &procedure,
                        &ddl,
                    );
                }
            }
            for function in source.list_functions().await? {
                if let Ok(ddl) = source
                    .get_ddl(model::core::identifiers::ObjectKind::Function, &function)
                    .await
                {
                    analyzer.inspect_code(
                        model::migration::sequence::UsageSite::Function,
                        &function,
                        &ddl,
                    );
                }
            }
            analyzer.finalize();
            println!("{}", analyzer.report());
            Ok(())
        }

        Commands::TestConn { connections } => {
            let configs = load_connections(connections.as_deref())?;
            OracleSourceAdapter::connect(&configs.oracle).await?;
            println!("oracle: ok");
            MssqlTargetAdapter::connect(&configs.mssql).await?;
            println!("mssql: ok");
            Ok(())
        }
    }
}

async fn connect_source(connections: Option<&str>) -> Result<Arc<dyn SourceAdapter>, CliError> {
    let configs = load_connections(connections)?;
    Ok(Arc::new(OracleSourceAdapter::connect(&configs.oracle).await?))
}


fn llm_from_env(
    settings: &RunSettings,
    cost: Arc<CostSink>,
) -> Option<Arc<dyn translator::providers::LanguageModel>> {
    let api_key = std::env::var("TRANSORA_LLM_API_KEY").ok()?;
    let base_url = std::env::var("TRANSORA_LLM_BASE_URL")
        .unwrap_or_else(|_| "https://api.openai.com/v1".to_string());
    let chat_model =
        std::env::var("TRANSORA_LLM_MODEL").unwrap_or_else(|_| "gpt-4o".to_string());
    Some(Arc::new(OpenAiCompatibleClient::new(
        &base_url,
        &api_key,
        &chat_model,
        settings.llm_timeout(),
        cost,
    )))
}

fn search_from_env(
    settings: &RunSettings,
    cost: Arc<CostSink>,
) -> Option<Arc<dyn translator::providers::SearchProvider>> {
    let base_url = std::env::var("TRANSORA_SEARCH_URL").ok()?;
    Some(Arc::new(HttpSearchProvider::new(
        &base_url,
        settings.llm_timeout(),
        cost,
    )))
}
