//! Persistence contracts consumed by the queue, pipeline and publish layers
//!
//! `Repository` implements these traits on Postgres; `InMemoryStore` backs
//! tests and local development.

pub mod memory;

pub use memory::InMemoryStore;

use crate::db::models::*;
use crate::errors::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Queue item persistence with atomic claims
#[async_trait]
pub trait QueueStore: Send + Sync {
    async fn insert_queue_item(&self, item: QueueItem) -> Result<QueueItem>;

    async fn get_queue_item(&self, id: Uuid) -> Result<Option<QueueItem>>;

    async fn list_queue_items(&self, tenant_id: Uuid) -> Result<Vec<QueueItem>>;

    /// Compare-and-set write: persists `item` only while the stored row is
    /// still at `item.version`, saving it at the next version. Returns `None`
    /// when another writer got there first.
    async fn update_queue_item_if(&self, item: QueueItem) -> Result<Option<QueueItem>>;

    /// Claim the highest-priority pending item, oldest first, moving it to
    /// `processing`. Concurrent callers never receive the same item.
    async fn claim_next(
        &self,
        tenant_id: Option<Uuid>,
        now: DateTime<Utc>,
    ) -> Result<Option<QueueItem>>;

    /// Claim a specific item if it is still pending
    async fn claim(&self, id: Uuid, now: DateTime<Utc>) -> Result<Option<QueueItem>>;

    async fn find_processing(&self) -> Result<Vec<QueueItem>>;

    /// Scheduled items whose `scheduled_for` has passed
    async fn find_due_scheduled(&self, now: DateTime<Utc>) -> Result<Vec<QueueItem>>;

    async fn find_failed(&self) -> Result<Vec<QueueItem>>;
}

/// Stage checkpoint written by the orchestrator. `None` payload fields leave
/// the stored value untouched.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StageUpdate {
    pub stage: Option<PipelineStage>,
    pub outline: Option<Vec<String>>,
    pub draft_content: Option<String>,
    pub content: Option<String>,
    pub quality_score: Option<i32>,
    pub banned_phrase_hits: Option<Vec<String>>,
    pub article_id: Option<Uuid>,
    pub contributor_id: Option<Uuid>,
    pub target_word_count: Option<i32>,
    pub tokens_used: Option<i64>,
}

impl StageUpdate {
    /// Enter `stage`, writing its progress checkpoint
    pub fn enter(stage: PipelineStage) -> Self {
        Self {
            stage: Some(stage),
            ..Default::default()
        }
    }
}

/// Final accounting written with the `COMPLETE` transition
#[derive(Debug, Clone, PartialEq)]
pub struct RunSummary {
    pub article_id: Uuid,
    pub tokens_used: i64,
    pub estimated_cost: f64,
    pub duration_ms: i64,
}

/// Pipeline runs plus the tenant data the pipeline reads
///
/// Every run write is conditional on the run being non-terminal; the
/// returned flag is `false` when nothing was written.
#[async_trait]
pub trait PipelineStore: Send + Sync {
    async fn create_run(&self, run: PipelineRun) -> Result<PipelineRun>;

    async fn get_run(&self, id: Uuid) -> Result<Option<PipelineRun>>;

    async fn record_stage(&self, run_id: Uuid, update: StageUpdate) -> Result<bool>;

    /// Move to `ERROR` keeping the last progress checkpoint
    async fn fail_run(&self, run_id: Uuid, error: &str) -> Result<bool>;

    /// Flag the run cancelled and terminate it
    async fn request_cancel(&self, run_id: Uuid) -> Result<bool>;

    async fn is_cancel_requested(&self, run_id: Uuid) -> Result<bool>;

    async fn complete_run(&self, run_id: Uuid, summary: RunSummary) -> Result<bool>;

    /// Non-terminal runs not updated since `older_than`
    async fn find_stale_runs(&self, older_than: DateTime<Utc>) -> Result<Vec<PipelineRun>>;

    async fn get_tenant_settings(&self, tenant_id: Uuid) -> Result<Option<TenantSettings>>;

    async fn get_contributor(&self, id: Uuid) -> Result<Option<Contributor>>;

    /// Contributors of a tenant in creation order
    async fn list_contributors(&self, tenant_id: Uuid) -> Result<Vec<Contributor>>;

    async fn get_content_idea(&self, id: Uuid) -> Result<Option<ContentIdea>>;

    async fn link_content_idea(&self, idea_id: Uuid, article_id: Uuid) -> Result<()>;
}

/// Articles, auto-publish configuration and internal links
#[async_trait]
pub trait ArticleStore: Send + Sync {
    async fn insert_article(&self, article: Article) -> Result<Article>;

    async fn get_article(&self, id: Uuid) -> Result<Option<Article>>;

    async fn update_article(&self, article: Article) -> Result<Article>;

    /// Articles in `status`, optionally restricted to one tenant
    async fn list_articles_by_status(
        &self,
        tenant_id: Option<Uuid>,
        status: ArticleStatus,
    ) -> Result<Vec<Article>>;

    async fn get_auto_publish_config(&self, tenant_id: Uuid) -> Result<Option<AutoPublishConfig>>;

    /// Whole-object replace
    async fn save_auto_publish_config(&self, config: AutoPublishConfig)
        -> Result<AutoPublishConfig>;

    /// Persist an accepted link and bump the target's `times_linked_to`
    async fn create_internal_link(&self, link: ArticleInternalLink)
        -> Result<ArticleInternalLink>;

    async fn list_internal_links(&self, source_article_id: Uuid)
        -> Result<Vec<ArticleInternalLink>>;
}

/// Everything the services need from persistence
pub trait ContentStore: QueueStore + PipelineStore + ArticleStore {}

impl<T> ContentStore for T where T: QueueStore + PipelineStore + ArticleStore {}

/// Message recorded on a run terminated by a cancel request
pub const CANCELLED_MESSAGE: &str = "Cancelled";

/// Apply a checkpoint to a loaded run. Shared by every store so the stage
/// ordering rules hold regardless of backend.
pub(crate) fn apply_stage_update(
    run: &mut PipelineRun,
    update: StageUpdate,
    now: DateTime<Utc>,
) -> Result<()> {
    if let Some(stage) = update.stage {
        if stage != run.stage && !run.stage.can_transition_to(stage) {
            return Err(crate::errors::AppError::InvalidTransition {
                from: run.stage.to_string(),
                to: stage.to_string(),
            });
        }
        run.stage = stage;
        if let Some(progress) = stage.progress() {
            run.progress = run.progress.max(progress);
        }
    }
    if let Some(outline) = update.outline {
        run.outline = Some(outline.into());
    }
    if let Some(draft) = update.draft_content {
        run.draft_content = Some(draft);
    }
    if let Some(content) = update.content {
        run.content = Some(content);
    }
    if let Some(score) = update.quality_score {
        run.quality_score = Some(score);
    }
    if let Some(hits) = update.banned_phrase_hits {
        run.banned_phrase_hits = hits.into();
    }
    if let Some(article_id) = update.article_id {
        run.article_id = Some(article_id);
    }
    if let Some(contributor_id) = update.contributor_id {
        run.contributor_id = Some(contributor_id);
    }
    if let Some(target) = update.target_word_count {
        run.target_word_count = Some(target);
    }
    if let Some(tokens) = update.tokens_used {
        run.tokens_used = tokens;
    }
    run.updated_at = now;
    Ok(())
}

pub(crate) fn apply_failure(run: &mut PipelineRun, error: &str, now: DateTime<Utc>) {
    run.stage = PipelineStage::Error;
    run.error = Some(error.to_string());
    run.completed_at = Some(now);
    run.updated_at = now;
}

pub(crate) fn apply_summary(run: &mut PipelineRun, summary: RunSummary, now: DateTime<Utc>) {
    run.stage = PipelineStage::Complete;
    run.progress = 100;
    run.article_id = Some(summary.article_id);
    run.tokens_used = summary.tokens_used;
    run.estimated_cost = summary.estimated_cost;
    run.duration_ms = Some(summary.duration_ms);
    run.completed_at = Some(now);
    run.updated_at = now;
}
