use crate::{
    error::TranslateError,
    providers::{LanguageModel, SearchProvider, SearchResult},
};
use async_trait::async_trait;
use std::sync::Mutex;

/// Deterministic stand-in for the language model, used by tests. Responses
/// are matched by a substring of the user payload; unmatched requests fall
/// back to echoing the payload.
#[derive(Default)]
pub struct ScriptedModel {
    responses: Mutex<Vec<(String, String)>>,
    calls: Mutex<Vec<String>>,
}

impl ScriptedModel {
    pub fn new() -> Self {
        ScriptedModel::default()
    }

    pub fn respond(&self, needle: &str, response: &str) {
        self.lock_responses()
            .push((needle.to_string(), response.to_string()));
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    fn lock_responses(&self) -> std::sync::MutexGuard<'_, Vec<(String, String)>> {
        self.responses
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl LanguageModel for ScriptedModel {
    async fn complete(&self, _system: &str, user: &str) -> Result<String, TranslateError> {
        self.calls
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(user.to_string());
        let responses = self.lock_responses();
        for (needle, response) in responses.iter() {
            if user.contains(needle.as_str()) {
                return Ok(response.clone());
            }
        }
        Ok(user.to_string())
    }
}

/// Search provider that returns canned results.
#[derive(Default)]
pub struct ScriptedSearch {
    results: Mutex<Vec<SearchResult>>,
}

impl ScriptedSearch {
    pub fn new() -> Self {
        ScriptedSearch::default()
    }

    pub fn add_result(&self, title: &str, url: &str, snippet: &str) {
        self.results
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(SearchResult {
                title: title.to_string(),
                url: url.to_string(),
                snippet: snippet.to_string(),
            });
    }
}

#[async_trait]
impl SearchProvider for ScriptedSearch {
    async fn search(&self, _query: &str) -> Result<Vec<SearchResult>, TranslateError> {
        Ok(self
            .results
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .iter()
            .take(5)
            .cloned()
            .collect())
    }
}
