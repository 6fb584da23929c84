use connectors::error::DbError;
use thiserror::Error;
use translator::error::TranslateError;

#[derive(Debug, Error)]
pub enum RepairError {
    #[error("Object has no translated text to deploy: {0}")]
    NothingToDeploy(String),

    #[error("Re-translation failed: {0}")]
    Translate(#[from] TranslateError),

    #[error("Shared memory update failed: {0}")]
    Memory(#[from] engine_core::error::MemoryError),
}

#[derive(Debug, Error)]
pub enum CopyError {
    #[error("Source read failed for {table}: {source}")]
    SourceRead { table: String, source: DbError },

    #[error("Target write failed for {table}: {source}")]
    TargetWrite { table: String, source: DbError },

    #[error("Copy of {0} was cancelled")]
    Cancelled(String),
}
