use crate::{cost::CostSink, error::TranslateError, providers::LanguageModel};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Client for any OpenAI-compatible chat-completions endpoint. The engine
/// treats it as an opaque `text -> text` provider; token usage is recorded
/// into the shared cost sink.
pub struct OpenAiCompatibleClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
    timeout: Duration,
    cost: Arc<CostSink>,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
    #[serde(default)]
    usage: Option<ChatUsage>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Deserialize)]
struct ChatChoiceMessage {
    content: Option<String>,
}

#[derive(Deserialize, Default)]
struct ChatUsage {
    #[serde(default)]
    prompt_tokens: u64,
    #[serde(default)]
    completion_tokens: u64,
}

impl OpenAiCompatibleClient {
    pub fn new(
        base_url: &str,
        api_key: &str,
        chat_model: &str,
        timeout: Duration,
        cost: Arc<CostSink>,
    ) -> Self {
        OpenAiCompatibleClient {
            http: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            model: chat_model.to_string(),
            timeout,
            cost,
        }
    }
}

#[async_trait]
impl LanguageModel for OpenAiCompatibleClient {
    async fn complete(&self, system: &str, user: &str) -> Result<String, TranslateError> {
        let request = ChatRequest {
            model: &self.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: system,
                },
                ChatMessage {
                    role: "user",
                    content: user,
                },
            ],
            temperature: 0.1,
        };

        let url = format!("{}/chat/completions", self.base_url);
        let send = self
            .http
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&request)
            .timeout(self.timeout)
            .send();

        let response = match send.await {
            Ok(response) => response,
            Err(err) if err.is_timeout() => {
                return Err(TranslateError::Timeout(self.timeout.as_secs()));
            }
            Err(err) => return Err(TranslateError::Http(err)),
        };

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(TranslateError::BadResponse(format!(
                "{status}: {}",
                body.chars().take(500).collect::<String>()
            )));
        }

        let parsed: ChatResponse = response.json().await?;
        if let Some(usage) = &parsed.usage {
            self.cost
                .record("llm", usage.prompt_tokens, usage.completion_tokens);
            debug!(
                prompt_tokens = usage.prompt_tokens,
                completion_tokens = usage.completion_tokens,
                "llm call complete"
            );
        } else {
            self.cost.record("llm", 0, 0);
        }

        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .filter(|content| !content.trim().is_empty())
            .ok_or_else(|| TranslateError::BadResponse("empty choices".into()))
    }
}
