//! OpenAI adapter (chat completions).
//!
//! Implements `ar-core`'s `CompletionClient` over the `chat/completions`
//! endpoint.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

use ar_core::{
    config::Config,
    errors::Error,
    model::{
        client::CompletionClient,
        types::{Completion, CompletionRequest},
    },
    Result,
};

#[derive(Clone, Debug)]
pub struct OpenAiClient {
    api_key: String,
    base_url: String,
    http: reqwest::Client,
}

impl OpenAiClient {
    /// `timeout: None` leaves requests unbounded.
    pub fn new(
        api_key: impl Into<String>,
        base_url: impl Into<String>,
        timeout: Option<Duration>,
    ) -> Result<Self> {
        let mut builder = reqwest::Client::builder();
        if let Some(t) = timeout {
            builder = builder.timeout(t);
        }
        let http = builder
            .build()
            .map_err(|e| Error::Config(format!("openai http client: {e}")))?;

        Ok(Self {
            api_key: api_key.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            http,
        })
    }

    pub fn from_config(cfg: &Config) -> Result<Self> {
        Self::new(
            cfg.openai_api_key.clone(),
            cfg.openai_base_url.clone(),
            cfg.completion_timeout,
        )
    }

    fn completions_url(&self) -> String {
        format!("{}/chat/completions", self.base_url)
    }
}

#[async_trait]
impl CompletionClient for OpenAiClient {
    async fn complete(&self, req: CompletionRequest) -> Result<Completion> {
        debug!(model = %req.model, messages = req.messages.len(), "openai chat completion");

        let resp = self
            .http
            .post(self.completions_url())
            .bearer_auth(&self.api_key)
            .json(&req)
            .send()
            .await
            .map_err(|e| Error::Completion(format!("openai request error: {e}")))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(Error::Completion(format!(
                "openai completion failed: {status} {}",
                body.chars().take(200).collect::<String>()
            )));
        }

        let body = resp
            .text()
            .await
            .map_err(|e| Error::Completion(format!("openai read error: {e}")))?;

        parse_completion(&body)
    }
}

#[derive(Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    #[serde(default)]
    index: u32,
    message: Option<ChoiceMessage>,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

/// Choices in `index` order; a choice with no content counts as empty text.
fn parse_completion(body: &str) -> Result<Completion> {
    let mut parsed: ChatCompletionResponse = serde_json::from_str(body)
        .map_err(|e| Error::Completion(format!("openai json error: {e}")))?;

    parsed.choices.sort_by_key(|c| c.index);

    Ok(Completion {
        choices: parsed
            .choices
            .into_iter()
            .map(|c| c.message.and_then(|m| m.content).unwrap_or_default())
            .collect(),
    })
}
