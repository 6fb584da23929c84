use connectors::error::ConnectorError;
use engine_core::error::{MemoryError, SettingsError};
use engine_runtime::error::MigrationError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CliError {
    #[error("Failed to read file: {0}")]
    FileRead(#[from] std::io::Error),

    #[error("Failed to parse JSON document: {0}")]
    JsonParse(#[from] serde_json::Error),

    #[error("Connection setup failed: {0}")]
    Connector(#[from] ConnectorError),

    #[error("Database error: {0}")]
    Database(#[from] connectors::error::DbError),

    #[error("Discovery failed: {0}")]
    Discovery(#[from] planner::error::PlanError),

    #[error("Settings error: {0}")]
    Settings(#[from] SettingsError),

    #[error("Shared memory error: {0}")]
    Memory(#[from] MemoryError),

    #[error("Migration failed: {0}")]
    Migration(#[from] MigrationError),

    #[error("Missing connection configuration: {0}")]
    MissingConfig(String),

    #[error("Shutdown requested")]
    ShutdownRequested,
}
