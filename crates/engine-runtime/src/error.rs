use connectors::error::DbError;
use engine_core::error::{MemoryError, SettingsError};
use engine_processing::error::{CopyError, RepairError};
use thiserror::Error;
use translator::error::TranslateError;

/// Top-level errors for the migration engine.
#[derive(Debug, Error)]
pub enum MigrationError {
    #[error("Initialization error: {0}")]
    Initialization(String),

    #[error("Settings error: {0}")]
    Settings(#[from] SettingsError),

    #[error("Database error: {0}")]
    Database(#[from] DbError),

    #[error("Shared memory error: {0}")]
    Memory(#[from] MemoryError),

    #[error("Translation error: {0}")]
    Translate(#[from] TranslateError),

    #[error("Repair error: {0}")]
    Repair(#[from] RepairError),

    #[error("Data copy error: {0}")]
    Copy(#[from] CopyError),

    #[error("Artifact write failed: {0}")]
    Artifact(#[from] std::io::Error),

    #[error("Artifact serialization failed: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("Run was cancelled")]
    Cancelled,
}
