use crate::{cost::CostSink, error::TranslateError, providers::{SearchProvider, SearchResult}};
use async_trait::async_trait;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;

const MAX_RESULTS: usize = 5;
const SNIPPET_CHARS: usize = 400;

/// Provider over a JSON search endpoint (SearxNG-style `/search?q=...`
/// responses). Results are condensed to at most five short snippets before
/// they reach the analyzer.
pub struct HttpSearchProvider {
    http: reqwest::Client,
    base_url: String,
    timeout: Duration,
    cost: Arc<CostSink>,
}

#[derive(Deserialize)]
struct SearchResponse {
    #[serde(default)]
    results: Vec<RawResult>,
}

#[derive(Deserialize)]
struct RawResult {
    #[serde(default)]
    title: String,
    #[serde(default)]
    url: String,
    #[serde(default)]
    content: String,
}

impl HttpSearchProvider {
    pub fn new(base_url: &str, timeout: Duration, cost: Arc<CostSink>) -> Self {
        HttpSearchProvider {
            http: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            timeout,
            cost,
        }
    }
}

#[async_trait]
impl SearchProvider for HttpSearchProvider {
    async fn search(&self, query: &str) -> Result<Vec<SearchResult>, TranslateError> {
        let url = format!("{}/search", self.base_url);
        let response = self
            .http
            .get(&url)
            .query(&[("q", query), ("format", "json")])
            .timeout(self.timeout)
            .send()
            .await?;
        self.cost.record("search", 0, 0);

        let parsed: SearchResponse = response.json().await?;
        Ok(parsed
            .results
            .into_iter()
            .take(MAX_RESULTS)
            .map(|raw| SearchResult {
                title: raw.title,
                url: raw.url,
                snippet: raw.content.chars().take(SNIPPET_CHARS).collect(),
            })
            .collect())
    }
}
