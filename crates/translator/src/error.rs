use thiserror::Error;

#[derive(Debug, Error)]
pub enum TranslateError {
    #[error("Language model request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Language model returned an unusable response: {0}")]
    BadResponse(String),

    #[error("Language model call timed out after {0} seconds")]
    Timeout(u64),

    #[error("No translation backend can handle {kind} {object}")]
    NoBackend { kind: String, object: String },

    #[error("Translation produced empty output for {0}")]
    EmptyOutput(String),
}
