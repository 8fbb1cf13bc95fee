//! OpenAI-compatible chat completion client

use super::{Generation, ModelConfig, Prompt, TextGenerator};
use crate::errors::{AppError, Result};
use crate::metrics;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};

const DEFAULT_API_BASE: &str = "https://api.openai.com/v1";

pub struct OpenAIGenerator {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    timeout: Duration,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    max_tokens: u32,
    temperature: f32,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatMessageResponse,
}

#[derive(Deserialize)]
struct ChatMessageResponse {
    content: String,
}

#[derive(Deserialize)]
struct ChatUsage {
    total_tokens: u64,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
    usage: Option<ChatUsage>,
}

impl OpenAIGenerator {
    pub fn new(api_key: String, base_url: Option<String>, timeout_secs: u64) -> Result<Self> {
        let timeout = Duration::from_secs(timeout_secs);
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AppError::Configuration {
                message: format!("failed to build HTTP client: {}", e),
            })?;

        Ok(Self {
            client,
            api_key,
            base_url: base_url.unwrap_or_else(|| DEFAULT_API_BASE.to_string()),
            timeout,
        })
    }

    async fn make_request(
        &self,
        prompt: &Prompt,
        config: &ModelConfig,
        idempotency_key: &str,
    ) -> Result<Generation> {
        let url = format!("{}/chat/completions", self.base_url.trim_end_matches('/'));

        let request = ChatRequest {
            model: &config.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: &prompt.system,
                },
                ChatMessage {
                    role: "user",
                    content: &prompt.user,
                },
            ],
            max_tokens: config.max_tokens,
            temperature: config.temperature,
        };

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Idempotency-Key", idempotency_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    AppError::GenerationTimeout {
                        timeout_ms: self.timeout.as_millis() as u64,
                    }
                } else {
                    AppError::GenerationError {
                        message: format!("Request failed: {}", e),
                    }
                }
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::GenerationError {
                message: format!("API error {}: {}", status, body),
            });
        }

        let result: ChatResponse = response.json().await.map_err(|e| AppError::GenerationError {
            message: format!("Failed to parse response: {}", e),
        })?;

        let text = result
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .filter(|t| !t.trim().is_empty())
            .ok_or_else(|| AppError::GenerationError {
                message: "Empty response".to_string(),
            })?;

        // Fall back to a chars/4 estimate when usage is not reported
        let tokens_used = result
            .usage
            .map(|u| u.total_tokens)
            .unwrap_or_else(|| ((prompt.user.len() + text.len()) / 4) as u64);

        Ok(Generation { text, tokens_used })
    }
}

#[async_trait]
impl TextGenerator for OpenAIGenerator {
    async fn generate(
        &self,
        prompt: &Prompt,
        config: &ModelConfig,
        idempotency_key: &str,
    ) -> Result<Generation> {
        let start = Instant::now();
        let result = self.make_request(prompt, config, idempotency_key).await;
        metrics::record_provider_call(self.name(), start.elapsed().as_secs_f64(), result.is_ok());
        if let Ok(generation) = &result {
            metrics::record_tokens(&config.model, generation.tokens_used);
        }
        result
    }

    fn name(&self) -> &str {
        "openai"
    }
}
