use thiserror::Error;

#[derive(Debug, Error)]
pub enum MemoryError {
    #[error("Failed to read shared memory file: {0}")]
    Read(#[from] std::io::Error),

    #[error("Failed to decode shared memory file: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("Failed to persist shared memory: {0}")]
    Persist(String),
}

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("Invalid setting {name}: {reason}")]
    Invalid { name: String, reason: String },

    #[error("Failed to parse settings: {0}")]
    Parse(#[from] serde_json::Error),
}
