//! HTTP humanization client

use super::Humanizer;
use crate::errors::{AppError, Result};
use crate::metrics;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};

/// Posts `{text, aggressiveness}` and expects `{text}` back
pub struct HttpHumanizer {
    client: reqwest::Client,
    endpoint: String,
    api_key: Option<String>,
}

#[derive(Serialize)]
struct RewriteRequest<'a> {
    text: &'a str,
    aggressiveness: f32,
}

#[derive(Deserialize)]
struct RewriteResponse {
    text: String,
}

impl HttpHumanizer {
    pub fn new(endpoint: String, api_key: Option<String>, timeout_secs: u64) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| AppError::Configuration {
                message: format!("failed to build HTTP client: {}", e),
            })?;
        Ok(Self {
            client,
            endpoint,
            api_key,
        })
    }

    async fn make_request(&self, text: &str, aggressiveness: f32, idempotency_key: &str) -> Result<String> {
        let mut request = self
            .client
            .post(&self.endpoint)
            .header("Idempotency-Key", idempotency_key)
            .json(&RewriteRequest {
                text,
                aggressiveness: aggressiveness.clamp(0.0, 1.0),
            });
        if let Some(key) = &self.api_key {
            request = request.header("Authorization", format!("Bearer {}", key));
        }

        let response = request.send().await.map_err(|e| AppError::HumanizationError {
            message: format!("Request failed: {}", e),
        })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::HumanizationError {
                message: format!("API error {}: {}", status, body),
            });
        }

        let result: RewriteResponse =
            response.json().await.map_err(|e| AppError::HumanizationError {
                message: format!("Failed to parse response: {}", e),
            })?;

        if result.text.trim().is_empty() {
            return Err(AppError::HumanizationError {
                message: "Empty rewrite".to_string(),
            });
        }
        Ok(result.text)
    }
}

#[async_trait]
impl Humanizer for HttpHumanizer {
    async fn rewrite(&self, text: &str, aggressiveness: f32, idempotency_key: &str) -> Result<String> {
        let start = Instant::now();
        let result = self.make_request(text, aggressiveness, idempotency_key).await;
        metrics::record_provider_call(self.name(), start.elapsed().as_secs_f64(), result.is_ok());
        result
    }

    fn name(&self) -> &str {
        "humanizer"
    }
}
