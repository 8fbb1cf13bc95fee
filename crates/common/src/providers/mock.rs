//! Deterministic providers for tests and local development

use super::{Generation, Humanizer, ModelConfig, Prompt, PromptKind, TextGenerator};
use crate::errors::{AppError, Result};
use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

/// Mock generator: a numbered outline for outline prompts and a markdown
/// article (headings and a list) for draft prompts.
#[derive(Default)]
pub struct MockGenerator {
    calls: AtomicUsize,
    fail_on: Mutex<Option<PromptKind>>,
    draft_override: Mutex<Option<String>>,
}

impl MockGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail every call of `kind` with a provider error
    pub fn failing_on(kind: PromptKind) -> Self {
        let mock = Self::default();
        *mock.fail_on.lock().unwrap_or_else(|p| p.into_inner()) = Some(kind);
        mock
    }

    /// Return `text` for draft prompts
    pub fn with_draft(text: impl Into<String>) -> Self {
        let mock = Self::default();
        *mock.draft_override.lock().unwrap_or_else(|p| p.into_inner()) = Some(text.into());
        mock
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn mock_draft(prompt: &Prompt) -> String {
        let topic = prompt
            .user
            .lines()
            .find_map(|l| l.strip_prefix("Topic: "))
            .unwrap_or("the topic");
        let paragraph = format!(
            "This section explains {} with concrete examples and practical guidance. ",
            topic
        )
        .repeat(8);

        let mut draft = format!("# {}\n\n{}\n\n", topic, paragraph);
        for heading in ["Background", "Key Practices", "Summary"] {
            draft.push_str(&format!("## {}\n\n{}\n\n", heading, paragraph));
        }
        draft.push_str("- First takeaway\n- Second takeaway\n- Third takeaway\n");
        draft
    }
}

#[async_trait]
impl TextGenerator for MockGenerator {
    async fn generate(
        &self,
        prompt: &Prompt,
        _config: &ModelConfig,
        _idempotency_key: &str,
    ) -> Result<Generation> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        if *self.fail_on.lock().unwrap_or_else(|p| p.into_inner()) == Some(prompt.kind) {
            return Err(AppError::GenerationError {
                message: "mock provider unavailable".to_string(),
            });
        }

        let text = match prompt.kind {
            PromptKind::Outline => {
                "1. Introduction\n2. Background\n3. Key Practices\n4. Summary".to_string()
            }
            PromptKind::Draft => self
                .draft_override
                .lock()
                .unwrap_or_else(|p| p.into_inner())
                .clone()
                .unwrap_or_else(|| Self::mock_draft(prompt)),
        };
        let tokens_used = ((prompt.user.len() + text.len()) / 4) as u64;
        Ok(Generation { text, tokens_used })
    }

    fn name(&self) -> &str {
        "mock"
    }
}

/// Mock humanizer: returns the text unchanged and counts calls
#[derive(Default)]
pub struct MockHumanizer {
    calls: AtomicUsize,
    fail: bool,
}

impl MockHumanizer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        Self {
            calls: AtomicUsize::new(0),
            fail: true,
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Humanizer for MockHumanizer {
    async fn rewrite(&self, text: &str, _aggressiveness: f32, _idempotency_key: &str) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(AppError::HumanizationError {
                message: "mock humanizer unavailable".to_string(),
            });
        }
        Ok(text.to_string())
    }

    fn name(&self) -> &str {
        "mock-humanizer"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn prompt(kind: PromptKind) -> Prompt {
        Prompt {
            kind,
            system: String::new(),
            user: "Topic: Rust\n".to_string(),
        }
    }

    fn config() -> ModelConfig {
        ModelConfig {
            model: "mock".into(),
            temperature: 0.0,
            max_tokens: 100,
        }
    }

    #[tokio::test]
    async fn test_mock_generator_outputs() {
        let generator = MockGenerator::new();
        let outline = generator.generate(&prompt(PromptKind::Outline), &config(), "k").await.unwrap();
        assert!(outline.text.starts_with("1. Introduction"));

        let draft = generator.generate(&prompt(PromptKind::Draft), &config(), "k").await.unwrap();
        assert!(draft.text.contains("## Background"));
        assert!(draft.text.contains("- First takeaway"));
        assert!(draft.tokens_used > 0);
        assert_eq!(generator.calls(), 2);
    }

    #[tokio::test]
    async fn test_mock_generator_failure() {
        let generator = MockGenerator::failing_on(PromptKind::Draft);
        assert!(generator.generate(&prompt(PromptKind::Outline), &config(), "k").await.is_ok());
        assert!(generator.generate(&prompt(PromptKind::Draft), &config(), "k").await.is_err());
    }
}
