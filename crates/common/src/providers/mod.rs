//! AI provider abstraction
//!
//! - `TextGenerator`: chat-completion style text generation (OpenAI-compatible)
//! - `Humanizer`: optional rewrite pass that reduces AI-detectability
//!
//! Every call carries an idempotency key derived from the run and stage so a
//! provider can deduplicate a resumed stage.

mod humanizer;
mod mock;
mod openai;

pub use humanizer::HttpHumanizer;
pub use mock::{MockGenerator, MockHumanizer};
pub use openai::OpenAIGenerator;

use crate::config::{GenerationConfig, HumanizationConfig};
use crate::db::models::PipelineStage;
use crate::errors::{AppError, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::sync::Arc;
use uuid::Uuid;

/// What a prompt asks for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PromptKind {
    Outline,
    Draft,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Prompt {
    pub kind: PromptKind,
    pub system: String,
    pub user: String,
}

/// Model parameters for one call
#[derive(Debug, Clone, PartialEq)]
pub struct ModelConfig {
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
}

impl From<&GenerationConfig> for ModelConfig {
    fn from(config: &GenerationConfig) -> Self {
        Self {
            model: config.model.clone(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
        }
    }
}

/// Generated text plus usage accounting
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Generation {
    pub text: String,
    pub tokens_used: u64,
}

/// Trait for text generation
#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate(
        &self,
        prompt: &Prompt,
        config: &ModelConfig,
        idempotency_key: &str,
    ) -> Result<Generation>;

    /// Provider name for logs and metrics
    fn name(&self) -> &str;
}

/// Trait for the humanization rewrite
#[async_trait]
pub trait Humanizer: Send + Sync {
    async fn rewrite(&self, text: &str, aggressiveness: f32, idempotency_key: &str) -> Result<String>;

    fn name(&self) -> &str;
}

/// `hex(sha256(run_id || stage))`
pub fn idempotency_key(run_id: Uuid, stage: PipelineStage) -> String {
    let mut hasher = Sha256::new();
    hasher.update(run_id.as_bytes());
    hasher.update(stage.as_str().as_bytes());
    hex::encode(hasher.finalize())
}

/// Create a generator based on configuration
pub fn create_generator(config: &GenerationConfig) -> Result<Arc<dyn TextGenerator>> {
    match config.provider.as_str() {
        "openai" => {
            let key = config.api_key.clone().ok_or_else(|| AppError::Configuration {
                message: "generation.api_key is required for the openai provider".to_string(),
            })?;
            Ok(Arc::new(OpenAIGenerator::new(
                key,
                config.api_base.clone(),
                config.timeout_secs,
            )?))
        }
        "mock" => Ok(Arc::new(MockGenerator::new())),
        other => Err(AppError::Configuration {
            message: format!("unknown generation provider: {}", other),
        }),
    }
}

/// `None` when humanization is disabled: content passes through unchanged
pub fn create_humanizer(config: &HumanizationConfig) -> Result<Option<Arc<dyn Humanizer>>> {
    if !config.enabled {
        return Ok(None);
    }
    let endpoint = config.endpoint.clone().ok_or_else(|| AppError::Configuration {
        message: "humanization.endpoint is required when humanization is enabled".to_string(),
    })?;
    Ok(Some(Arc::new(HttpHumanizer::new(
        endpoint,
        config.api_key.clone(),
        config.timeout_secs,
    )?)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_idempotency_key_is_stable_per_stage() {
        let run = Uuid::new_v4();
        let outline = idempotency_key(run, PipelineStage::GeneratingOutline);
        assert_eq!(outline, idempotency_key(run, PipelineStage::GeneratingOutline));
        assert_ne!(outline, idempotency_key(run, PipelineStage::Drafting));
        assert_eq!(outline.len(), 64);
    }

    #[test]
    fn test_factory_requires_key_for_openai() {
        let config = GenerationConfig {
            provider: "openai".to_string(),
            api_key: None,
            ..GenerationConfig::default()
        };
        assert!(create_generator(&config).is_err());

        let mock = GenerationConfig {
            provider: "mock".to_string(),
            ..GenerationConfig::default()
        };
        assert_eq!(create_generator(&mock).unwrap().name(), "mock");
    }

    #[test]
    fn test_disabled_humanizer_is_none() {
        let config = HumanizationConfig {
            enabled: false,
            ..HumanizationConfig::default()
        };
        assert!(create_humanizer(&config).unwrap().is_none());
    }
}
