//! In-memory store for tests and local development

use super::{
    apply_failure, apply_stage_update, apply_summary, ArticleStore, PipelineStore, QueueStore,
    RunSummary, StageUpdate, CANCELLED_MESSAGE,
};
use crate::db::models::*;
use crate::errors::{AppError, Result};
use crate::queue::sort_queue;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use uuid::Uuid;

#[derive(Default)]
struct State {
    queue_items: HashMap<Uuid, QueueItem>,
    runs: HashMap<Uuid, PipelineRun>,
    articles: HashMap<Uuid, Article>,
    settings: HashMap<Uuid, TenantSettings>,
    contributors: HashMap<Uuid, Contributor>,
    content_ideas: HashMap<Uuid, ContentIdea>,
    auto_publish: HashMap<Uuid, AutoPublishConfig>,
    links: Vec<ArticleInternalLink>,
}

/// Mutex-guarded maps implementing every store trait. A single lock makes
/// claims and compare-and-set writes atomic.
#[derive(Default)]
pub struct InMemoryStore {
    state: Mutex<State>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, State> {
        // A panicking test thread must not wedge every later caller
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn put_tenant_settings(&self, settings: TenantSettings) {
        self.state().settings.insert(settings.tenant_id, settings);
    }

    pub fn put_contributor(&self, contributor: Contributor) {
        self.state().contributors.insert(contributor.id, contributor);
    }

    pub fn put_content_idea(&self, idea: ContentIdea) {
        self.state().content_ideas.insert(idea.id, idea);
    }

    pub fn runs(&self) -> Vec<PipelineRun> {
        self.state().runs.values().cloned().collect()
    }

    pub fn articles(&self) -> Vec<Article> {
        self.state().articles.values().cloned().collect()
    }
}

#[async_trait]
impl QueueStore for InMemoryStore {
    async fn insert_queue_item(&self, item: QueueItem) -> Result<QueueItem> {
        let mut state = self.state();
        if state.queue_items.contains_key(&item.id) {
            return Err(AppError::Conflict {
                message: format!("queue item {} already exists", item.id),
            });
        }
        state.queue_items.insert(item.id, item.clone());
        Ok(item)
    }

    async fn get_queue_item(&self, id: Uuid) -> Result<Option<QueueItem>> {
        Ok(self.state().queue_items.get(&id).cloned())
    }

    async fn list_queue_items(&self, tenant_id: Uuid) -> Result<Vec<QueueItem>> {
        let items = self
            .state()
            .queue_items
            .values()
            .filter(|i| i.tenant_id == tenant_id)
            .cloned()
            .collect();
        Ok(sort_queue(items))
    }

    async fn update_queue_item_if(&self, mut item: QueueItem) -> Result<Option<QueueItem>> {
        let mut state = self.state();
        match state.queue_items.get_mut(&item.id) {
            Some(stored) if stored.version == item.version => {
                item.version += 1;
                *stored = item.clone();
                Ok(Some(item))
            }
            Some(_) => Ok(None),
            None => Err(AppError::QueueItemNotFound {
                id: item.id.to_string(),
            }),
        }
    }

    async fn claim_next(
        &self,
        tenant_id: Option<Uuid>,
        now: DateTime<Utc>,
    ) -> Result<Option<QueueItem>> {
        let mut state = self.state();
        let candidates: Vec<QueueItem> = state
            .queue_items
            .values()
            .filter(|i| i.status == QueueStatus::Pending)
            .filter(|i| tenant_id.map_or(true, |t| i.tenant_id == t))
            .cloned()
            .collect();

        let Some(mut next) = sort_queue(candidates).into_iter().next() else {
            return Ok(None);
        };
        next.start_processing(now)?;
        next.version += 1;
        state.queue_items.insert(next.id, next.clone());
        Ok(Some(next))
    }

    async fn claim(&self, id: Uuid, now: DateTime<Utc>) -> Result<Option<QueueItem>> {
        let mut state = self.state();
        match state.queue_items.get_mut(&id) {
            Some(item) if item.status == QueueStatus::Pending => {
                item.start_processing(now)?;
                item.version += 1;
                Ok(Some(item.clone()))
            }
            Some(_) => Ok(None),
            None => Err(AppError::QueueItemNotFound { id: id.to_string() }),
        }
    }

    async fn find_processing(&self) -> Result<Vec<QueueItem>> {
        Ok(self
            .state()
            .queue_items
            .values()
            .filter(|i| i.status == QueueStatus::Processing)
            .cloned()
            .collect())
    }

    async fn find_due_scheduled(&self, now: DateTime<Utc>) -> Result<Vec<QueueItem>> {
        Ok(self
            .state()
            .queue_items
            .values()
            .filter(|i| i.status == QueueStatus::Scheduled)
            .filter(|i| i.scheduled_for.map_or(true, |at| at <= now))
            .cloned()
            .collect())
    }

    async fn find_failed(&self) -> Result<Vec<QueueItem>> {
        Ok(self
            .state()
            .queue_items
            .values()
            .filter(|i| i.status == QueueStatus::Failed)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl PipelineStore for InMemoryStore {
    async fn create_run(&self, run: PipelineRun) -> Result<PipelineRun> {
        self.state().runs.insert(run.id, run.clone());
        Ok(run)
    }

    async fn get_run(&self, id: Uuid) -> Result<Option<PipelineRun>> {
        Ok(self.state().runs.get(&id).cloned())
    }

    async fn record_stage(&self, run_id: Uuid, update: StageUpdate) -> Result<bool> {
        let mut state = self.state();
        let run = state
            .runs
            .get_mut(&run_id)
            .ok_or_else(|| AppError::PipelineRunNotFound { id: run_id.to_string() })?;
        if run.is_terminal() || run.cancel_requested {
            return Ok(false);
        }
        apply_stage_update(run, update, Utc::now())?;
        Ok(true)
    }

    async fn fail_run(&self, run_id: Uuid, error: &str) -> Result<bool> {
        let mut state = self.state();
        let run = state
            .runs
            .get_mut(&run_id)
            .ok_or_else(|| AppError::PipelineRunNotFound { id: run_id.to_string() })?;
        if run.is_terminal() {
            return Ok(false);
        }
        apply_failure(run, error, Utc::now());
        Ok(true)
    }

    async fn request_cancel(&self, run_id: Uuid) -> Result<bool> {
        let mut state = self.state();
        let run = state
            .runs
            .get_mut(&run_id)
            .ok_or_else(|| AppError::PipelineRunNotFound { id: run_id.to_string() })?;
        if run.is_terminal() {
            return Ok(false);
        }
        run.cancel_requested = true;
        apply_failure(run, CANCELLED_MESSAGE, Utc::now());
        Ok(true)
    }

    async fn is_cancel_requested(&self, run_id: Uuid) -> Result<bool> {
        Ok(self
            .state()
            .runs
            .get(&run_id)
            .map(|r| r.cancel_requested)
            .unwrap_or(false))
    }

    async fn complete_run(&self, run_id: Uuid, summary: RunSummary) -> Result<bool> {
        let mut state = self.state();
        let run = state
            .runs
            .get_mut(&run_id)
            .ok_or_else(|| AppError::PipelineRunNotFound { id: run_id.to_string() })?;
        if run.is_terminal() || run.cancel_requested {
            return Ok(false);
        }
        apply_summary(run, summary, Utc::now());
        Ok(true)
    }

    async fn find_stale_runs(&self, older_than: DateTime<Utc>) -> Result<Vec<PipelineRun>> {
        Ok(self
            .state()
            .runs
            .values()
            .filter(|r| !r.is_terminal() && r.updated_at < older_than)
            .cloned()
            .collect())
    }

    async fn get_tenant_settings(&self, tenant_id: Uuid) -> Result<Option<TenantSettings>> {
        Ok(self.state().settings.get(&tenant_id).cloned())
    }

    async fn get_contributor(&self, id: Uuid) -> Result<Option<Contributor>> {
        Ok(self.state().contributors.get(&id).cloned())
    }

    async fn list_contributors(&self, tenant_id: Uuid) -> Result<Vec<Contributor>> {
        let mut contributors: Vec<Contributor> = self
            .state()
            .contributors
            .values()
            .filter(|c| c.tenant_id == tenant_id)
            .cloned()
            .collect();
        contributors.sort_by_key(|c| (c.created_at, c.id));
        Ok(contributors)
    }

    async fn get_content_idea(&self, id: Uuid) -> Result<Option<ContentIdea>> {
        Ok(self.state().content_ideas.get(&id).cloned())
    }

    async fn link_content_idea(&self, idea_id: Uuid, article_id: Uuid) -> Result<()> {
        let mut state = self.state();
        let idea = state.content_ideas.get_mut(&idea_id).ok_or_else(|| AppError::NotFound {
            resource_type: "content_idea".to_string(),
            id: idea_id.to_string(),
        })?;
        idea.article_id = Some(article_id);
        idea.updated_at = Utc::now();
        Ok(())
    }
}

#[async_trait]
impl ArticleStore for InMemoryStore {
    async fn insert_article(&self, article: Article) -> Result<Article> {
        self.state().articles.insert(article.id, article.clone());
        Ok(article)
    }

    async fn get_article(&self, id: Uuid) -> Result<Option<Article>> {
        Ok(self.state().articles.get(&id).cloned())
    }

    async fn update_article(&self, article: Article) -> Result<Article> {
        let mut state = self.state();
        if !state.articles.contains_key(&article.id) {
            return Err(AppError::ArticleNotFound {
                id: article.id.to_string(),
            });
        }
        state.articles.insert(article.id, article.clone());
        Ok(article)
    }

    async fn list_articles_by_status(
        &self,
        tenant_id: Option<Uuid>,
        status: ArticleStatus,
    ) -> Result<Vec<Article>> {
        let mut articles: Vec<Article> = self
            .state()
            .articles
            .values()
            .filter(|a| a.status == status)
            .filter(|a| tenant_id.map_or(true, |t| a.tenant_id == t))
            .cloned()
            .collect();
        articles.sort_by_key(|a| (a.created_at, a.id));
        Ok(articles)
    }

    async fn get_auto_publish_config(&self, tenant_id: Uuid) -> Result<Option<AutoPublishConfig>> {
        Ok(self.state().auto_publish.get(&tenant_id).cloned())
    }

    async fn save_auto_publish_config(
        &self,
        config: AutoPublishConfig,
    ) -> Result<AutoPublishConfig> {
        self.state().auto_publish.insert(config.tenant_id, config.clone());
        Ok(config)
    }

    async fn create_internal_link(
        &self,
        link: ArticleInternalLink,
    ) -> Result<ArticleInternalLink> {
        let mut state = self.state();
        let target = state
            .articles
            .get_mut(&link.target_article_id)
            .ok_or_else(|| AppError::ArticleNotFound {
                id: link.target_article_id.to_string(),
            })?;
        target.times_linked_to += 1;
        state.links.push(link.clone());
        Ok(link)
    }

    async fn list_internal_links(
        &self,
        source_article_id: Uuid,
    ) -> Result<Vec<ArticleInternalLink>> {
        Ok(self
            .state()
            .links
            .iter()
            .filter(|l| l.source_article_id == source_article_id)
            .cloned()
            .collect())
    }
}
