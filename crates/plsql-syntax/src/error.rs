use thiserror::Error;

#[derive(Debug, Error)]
pub enum ScanError {
    #[error("Unbalanced parentheses near offset {0}")]
    UnbalancedParens(usize),

    #[error("Unterminated block starting near offset {0}")]
    UnterminatedBlock(usize),

    #[error("Malformed member declaration: {0}")]
    MalformedMember(String),
}
