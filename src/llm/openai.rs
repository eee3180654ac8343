//! Client for the hosted OpenAI completions endpoint.

use crate::config::Config;
use crate::error::{AppError, AppResult};
use crate::llm::CompletionModel;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

/// Sampling temperature. Zero keeps SQL generation deterministic.
pub const TEMPERATURE: f32 = 0.0;

/// Upper bound on tokens generated per call.
pub const MAX_TOKENS: u32 = 256;

#[derive(Debug, Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    temperature: f32,
    max_tokens: u32,
    #[serde(skip_serializing_if = "no_stop")]
    stop: &'a [&'a str],
}

fn no_stop(stop: &&[&str]) -> bool {
    stop.is_empty()
}

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    choices: Vec<CompletionChoice>,
}

#[derive(Debug, Deserialize)]
struct CompletionChoice {
    text: String,
}

/// OpenAI completions client.
pub struct OpenAiCompletion {
    api_key: String,
    model: String,
    base_url: String,
    timeout: Duration,
    client: Client,
}

impl OpenAiCompletion {
    /// Create a new client.
    ///
    /// # Arguments
    ///
    /// * `api_key` - API key sent as a bearer token
    /// * `model` - Completion model name (e.g., "gpt-3.5-turbo-instruct")
    /// * `base_url` - API root, e.g. "https://api.openai.com/v1"
    /// * `timeout` - Per-request timeout
    pub fn new(
        api_key: impl Into<String>,
        model: impl Into<String>,
        base_url: impl Into<String>,
        timeout: Duration,
    ) -> AppResult<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AppError::internal(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            api_key: api_key.into(),
            model: model.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            timeout,
            client,
        })
    }

    /// Create from configuration.
    pub fn from_config(config: &Config) -> AppResult<Self> {
        let api_key = config
            .openai_api_key
            .as_deref()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| AppError::config("missing required environment variable: OPENAI_API_KEY"))?;

        Self::new(
            api_key.trim(),
            &config.model,
            &config.openai_base_url,
            config.llm_timeout_duration(),
        )
    }

    fn endpoint(&self) -> String {
        format!("{}/completions", self.base_url)
    }

    fn request_error(&self, err: reqwest::Error) -> AppError {
        if err.is_timeout() {
            AppError::timeout("completion request", self.timeout.as_secs_f64().ceil() as u32)
        } else {
            err.into()
        }
    }
}

#[async_trait]
impl CompletionModel for OpenAiCompletion {
    async fn complete(&self, prompt: &str, stop: &[&str]) -> AppResult<String> {
        let request = CompletionRequest {
            model: &self.model,
            prompt,
            temperature: TEMPERATURE,
            max_tokens: MAX_TOKENS,
            stop,
        };

        debug!(model = %self.model, prompt_chars = prompt.len(), "Requesting completion");

        let response = self
            .client
            .post(self.endpoint())
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| self.request_error(e))?;

        let status = response.status();
        let body = response.text().await.map_err(|e| self.request_error(e))?;

        if !status.is_success() {
            return Err(AppError::llm(
                format!("OpenAI API error {}: {}", status, body),
                Some(status.as_u16()),
            ));
        }

        let parsed: CompletionResponse = serde_json::from_str(&body).map_err(|e| {
            AppError::llm(format!("Failed to parse OpenAI response: {}", e), None)
        })?;

        parsed
            .choices
            .into_iter()
            .next()
            .map(|c| c.text)
            .ok_or_else(|| AppError::llm("No completion returned by OpenAI", None))
    }

    fn name(&self) -> &str {
        &self.model
    }
}
