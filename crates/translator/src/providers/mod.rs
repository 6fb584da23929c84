pub mod openai;
pub mod scripted;
pub mod search;

use crate::error::TranslateError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Opaque text-to-text provider. The engine only ever sends a system prompt
/// and a user payload and reads back plain text.
#[async_trait]
pub trait LanguageModel: Send + Sync {
    async fn complete(&self, system: &str, user: &str) -> Result<String, TranslateError>;

    /// Short classification answer (a single tag) for triage prompts.
    async fn classify(&self, system: &str, user: &str) -> Result<String, TranslateError> {
        let raw = self.complete(system, user).await?;
        Ok(raw
            .lines()
            .next()
            .unwrap_or_default()
            .trim()
            .to_uppercase())
    }
}

/// One condensed external search hit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResult {
    pub title: String,
    pub url: String,
    pub snippet: String,
}

/// Opaque web-search provider consulted by the root-cause analyzer.
#[async_trait]
pub trait SearchProvider: Send + Sync {
    /// Returns up to five condensed results.
    async fn search(&self, query: &str) -> Result<Vec<SearchResult>, TranslateError>;
}
