//! Article generation pipeline
//!
//! A run moves through fixed stages, persisting a checkpoint on entry to
//! each stage and the stage's payload when it finishes:
//!
//! `INITIALIZING(0) → GATHERING_CONTEXT(10) → SELECTING_CONTRIBUTOR(20) →
//! GENERATING_OUTLINE(30) → DRAFTING(40) → HUMANIZING(60) → QUALITY_CHECK(80)
//! → FINALIZING(90) → COMPLETE(100)`, or `ERROR` from any non-terminal stage.

mod error;
mod orchestrator;
pub mod prompts;
pub mod quality;

pub use error::PipelineError;
pub use orchestrator::{PipelineOrchestrator, PipelineOutcome, PipelineSettings};

use crate::db::models::{PipelineRun, PipelineStage, StringList};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

/// Everything a run needs to start
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct PipelineInput {
    pub tenant_id: Uuid,

    #[validate(length(min = 3, max = 500))]
    pub topic: String,

    #[validate(length(max = 200))]
    pub primary_keyword: Option<String>,

    #[validate(length(min = 1, max = 64))]
    pub content_type: String,

    pub contributor_id: Option<Uuid>,

    #[validate(range(min = 100, max = 20000))]
    pub target_word_count: Option<i32>,

    /// Caller-supplied outline; skips outline generation
    pub outline: Option<Vec<String>>,

    pub content_idea_id: Option<Uuid>,

    /// Regenerate into this article instead of creating a new one
    pub target_article_id: Option<Uuid>,

    pub queue_item_id: Option<Uuid>,
}

impl PipelineInput {
    pub fn new(tenant_id: Uuid, topic: impl Into<String>, content_type: impl Into<String>) -> Self {
        Self {
            tenant_id,
            topic: topic.into(),
            primary_keyword: None,
            content_type: content_type.into(),
            contributor_id: None,
            target_word_count: None,
            outline: None,
            content_idea_id: None,
            target_article_id: None,
            queue_item_id: None,
        }
    }
}

/// Fresh run row in `INITIALIZING`
pub fn new_run_record(input: &PipelineInput, now: DateTime<Utc>) -> PipelineRun {
    let outline = input
        .outline
        .clone()
        .filter(|o| o.iter().any(|s| !s.trim().is_empty()))
        .map(StringList::from);

    PipelineRun {
        id: Uuid::new_v4(),
        tenant_id: input.tenant_id,
        queue_item_id: input.queue_item_id,
        content_idea_id: input.content_idea_id,
        target_article_id: input.target_article_id,
        topic: input.topic.trim().to_string(),
        primary_keyword: input.primary_keyword.clone(),
        content_type: input.content_type.clone(),
        contributor_id: input.contributor_id,
        target_word_count: input.target_word_count,
        stage: PipelineStage::Initializing,
        progress: 0,
        outline,
        draft_content: None,
        content: None,
        quality_score: None,
        banned_phrase_hits: StringList::default(),
        article_id: None,
        tokens_used: 0,
        estimated_cost: 0.0,
        duration_ms: None,
        error: None,
        cancel_requested: false,
        created_at: now,
        updated_at: now,
        completed_at: None,
    }
}
