//! Queue item processor
//!
//! Claims one item, resolves what to generate, drives the pipeline run and
//! writes the outcome back to the queue.

use chrono::Utc;
use contentforge_common::{
    db::models::{Article, QueueItem},
    errors::AppError,
    pipeline::{PipelineError, PipelineInput, PipelineOrchestrator},
    queue::QueueService,
    store::{ArticleStore, ContentStore, PipelineStore},
};
use serde::Serialize;
use std::sync::Arc;
use tracing::{info, instrument, warn};
use uuid::Uuid;

/// Stored word counts outside this range are not used as-is for a target
const MIN_TARGET_WORD_COUNT: i32 = 100;
const MAX_TARGET_WORD_COUNT: i32 = 20_000;

/// Topic length bounds accepted by the pipeline
const MIN_TOPIC_CHARS: usize = 3;
const MAX_TOPIC_CHARS: usize = 500;

/// What happened to one claimed item
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ProcessOutcome {
    Completed { item_id: Uuid, run_id: Uuid, article_id: Uuid },
    Failed { item_id: Uuid, retryable: bool, error: String },
    /// Cancelled or timed out while running; the queue already moved on
    Abandoned { item_id: Uuid },
}

#[derive(Debug, thiserror::Error)]
pub enum WorkerError {
    #[error("Store error: {0}")]
    Store(#[from] AppError),

    #[error("Queue item {0} has no generation source")]
    MissingSource(Uuid),
}

/// Generation worker processor
#[derive(Clone)]
pub struct GenerationProcessor {
    store: Arc<dyn ContentStore>,
    queue: QueueService,
    orchestrator: PipelineOrchestrator,
}

impl GenerationProcessor {
    pub fn new(
        store: Arc<dyn ContentStore>,
        queue: QueueService,
        orchestrator: PipelineOrchestrator,
    ) -> Self {
        Self {
            store,
            queue,
            orchestrator,
        }
    }

    /// Claim and process the next pending item. `None` when the queue is empty.
    pub async fn process_next(&self) -> Result<Option<ProcessOutcome>, WorkerError> {
        match self.queue.claim_next(Utc::now()).await? {
            Some(item) => Ok(Some(self.process(item).await?)),
            None => Ok(None),
        }
    }

    /// Run the pipeline for a claimed item
    #[instrument(skip(self, item), fields(queue_item_id = %item.id, tenant_id = %item.tenant_id))]
    pub async fn process(&self, item: QueueItem) -> Result<ProcessOutcome, WorkerError> {
        let input = match self.resolve_input(&item).await {
            Ok(input) => input,
            Err(WorkerError::MissingSource(_)) => {
                return self
                    .fail(&item, "Generation source no longer exists".to_string(), false)
                    .await;
            }
            Err(e) => return Err(e),
        };

        let run = match self.orchestrator.start(input).await {
            Ok(run) => run,
            Err(e) => return self.fail(&item, e.to_string(), e.is_retryable()).await,
        };

        let Some(item) = self.queue.attach_run(&item, run.id).await? else {
            // Cancelled between claim and run creation
            self.store.request_cancel(run.id).await?;
            return Ok(ProcessOutcome::Abandoned { item_id: item.id });
        };

        match self.orchestrator.execute(run.id).await {
            Ok(outcome) => match self.queue.complete(&item, Utc::now()).await? {
                Some(_) => {
                    info!(
                        run_id = %run.id,
                        article_id = %outcome.article_id,
                        "Queue item completed"
                    );
                    Ok(ProcessOutcome::Completed {
                        item_id: item.id,
                        run_id: run.id,
                        article_id: outcome.article_id,
                    })
                }
                None => Ok(ProcessOutcome::Abandoned { item_id: item.id }),
            },
            Err(PipelineError::Cancelled) => {
                info!(run_id = %run.id, "Run cancelled, leaving queue item to its canceller");
                Ok(ProcessOutcome::Abandoned { item_id: item.id })
            }
            Err(e) => self.fail(&item, e.to_string(), e.is_retryable()).await,
        }
    }

    async fn fail(
        &self,
        item: &QueueItem,
        error: String,
        retryable: bool,
    ) -> Result<ProcessOutcome, WorkerError> {
        match self.queue.fail(item, &error, retryable, Utc::now()).await? {
            Some(_) => Ok(ProcessOutcome::Failed {
                item_id: item.id,
                retryable,
                error,
            }),
            None => Ok(ProcessOutcome::Abandoned { item_id: item.id }),
        }
    }

    /// Build pipeline input from the item's content idea or article
    async fn resolve_input(&self, item: &QueueItem) -> Result<PipelineInput, WorkerError> {
        let mut input = if let Some(idea_id) = item.content_idea_id {
            let idea = self
                .store
                .get_content_idea(idea_id)
                .await?
                .filter(|i| i.tenant_id == item.tenant_id)
                .ok_or(WorkerError::MissingSource(item.id))?;

            let mut input = PipelineInput::new(item.tenant_id, idea.topic, idea.content_type);
            input.primary_keyword = idea.primary_keyword;
            input.content_idea_id = Some(idea.id);
            input.target_article_id = idea.article_id;
            input
        } else if let Some(article_id) = item.article_id {
            let article = self
                .store
                .get_article(article_id)
                .await?
                .filter(|a| a.tenant_id == item.tenant_id)
                .ok_or(WorkerError::MissingSource(item.id))?;

            let mut input =
                PipelineInput::new(item.tenant_id, article_topic(&article), article.content_type.clone());
            input.target_word_count = article_target_word_count(article.word_count);
            input.primary_keyword = article.primary_keyword;
            input.contributor_id = article.contributor_id;
            input.content_idea_id = article.content_idea_id;
            input.target_article_id = Some(article.id);
            input
        } else {
            warn!("Queue item without a source");
            return Err(WorkerError::MissingSource(item.id));
        };

        input.queue_item_id = Some(item.id);
        Ok(input)
    }
}

/// Title, else keyword, else slug words; whichever is long enough first
fn article_topic(article: &Article) -> String {
    let slug_words = article.slug.replace('-', " ");
    let topic = [
        Some(article.title.trim()),
        article.primary_keyword.as_deref().map(str::trim),
        Some(slug_words.trim()),
    ]
    .into_iter()
    .flatten()
    .find(|t| t.chars().count() >= MIN_TOPIC_CHARS)
    .map(String::from)
    .unwrap_or_else(|| format!("{} ({})", article.title.trim(), article.content_type));

    topic.chars().take(MAX_TOPIC_CHARS).collect()
}

fn article_target_word_count(word_count: i32) -> Option<i32> {
    (word_count >= MIN_TARGET_WORD_COUNT).then(|| word_count.min(MAX_TARGET_WORD_COUNT))
}
