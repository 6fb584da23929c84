use connectors::error::DbError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PlanError {
    #[error("Discovery query failed: {0}")]
    Discovery(#[from] DbError),

    #[error("Invalid foreign key {name}: {reason}")]
    InvalidForeignKey { name: String, reason: String },

    #[error("Package {0} could not be decomposed: {1}")]
    Decompose(String, String),
}
