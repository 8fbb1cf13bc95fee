//! Generation queue
//!
//! Provides:
//! - Pure queue item operations (ordering, retry backoff, timeouts, stats)
//! - `QueueService`, the store-backed command surface shared by the gateway
//!   and the worker

mod model;
mod stats;

pub use model::{create_queue_item, filter_by_status, retry_delay, sort_queue, NewQueueItem};
pub use stats::{calculate_stats, estimated_wait_time, queue_position, QueueStats};

use crate::config::QueueConfig;
use crate::db::models::{QueueItem, QueueStatus};
use crate::errors::{AppError, Result};
use crate::metrics;
use crate::store::ContentStore;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Default base delay for the retry backoff curve
pub const DEFAULT_BASE_RETRY_DELAY: Duration = Duration::from_millis(30_000);

/// Average processing time assumed before any item has completed
pub const DEFAULT_AVG_PROCESSING: Duration = Duration::from_millis(180_000);

/// Number of compare-and-set attempts before a command gives up
const MAX_CAS_ATTEMPTS: usize = 3;

/// Queue tuning, passed explicitly instead of living in a global
#[derive(Debug, Clone, PartialEq)]
pub struct QueueSettings {
    pub base_retry_delay: Duration,
    pub concurrent_workers: u32,
    pub default_avg_processing: Duration,
    pub default_max_attempts: i32,
    pub processing_timeout: Duration,
}

impl Default for QueueSettings {
    fn default() -> Self {
        Self {
            base_retry_delay: DEFAULT_BASE_RETRY_DELAY,
            concurrent_workers: 2,
            default_avg_processing: DEFAULT_AVG_PROCESSING,
            default_max_attempts: 3,
            processing_timeout: Duration::from_secs(600),
        }
    }
}

impl From<&QueueConfig> for QueueSettings {
    fn from(config: &QueueConfig) -> Self {
        Self {
            base_retry_delay: Duration::from_millis(config.base_retry_delay_ms),
            concurrent_workers: config.concurrent_workers.max(1),
            default_avg_processing: Duration::from_millis(config.default_avg_processing_ms),
            default_max_attempts: config.default_max_attempts.max(1),
            processing_timeout: config.processing_timeout(),
        }
    }
}

/// Position report for a single item
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueuePosition {
    pub item_id: Uuid,
    pub status: QueueStatus,
    /// `None` once the item is no longer waiting
    pub position: Option<usize>,
    pub estimated_wait_time_ms: Option<u64>,
}

/// Counts produced by one sweep pass
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SweepReport {
    pub timed_out: usize,
    pub promoted: usize,
    pub requeued: usize,
    /// Runs with no checkpoint within the processing timeout, moved to `ERROR`
    pub stalled_runs: usize,
}

/// Store-backed queue commands
#[derive(Clone)]
pub struct QueueService {
    store: Arc<dyn ContentStore>,
    settings: QueueSettings,
}

impl QueueService {
    pub fn new(store: Arc<dyn ContentStore>, settings: QueueSettings) -> Self {
        Self { store, settings }
    }

    pub fn settings(&self) -> &QueueSettings {
        &self.settings
    }

    /// Validate and persist a new item. The referenced source must exist
    /// within the same tenant.
    pub async fn enqueue(&self, input: NewQueueItem) -> Result<QueueItem> {
        let item = create_queue_item(input, self.settings.default_max_attempts, Utc::now())?;

        if let Some(idea_id) = item.content_idea_id {
            let idea = self.store.get_content_idea(idea_id).await?;
            if idea.map_or(true, |i| i.tenant_id != item.tenant_id) {
                return Err(AppError::NotFound {
                    resource_type: "content_idea".to_string(),
                    id: idea_id.to_string(),
                });
            }
        }
        if let Some(article_id) = item.article_id {
            let article = self.store.get_article(article_id).await?;
            if article.map_or(true, |a| a.tenant_id != item.tenant_id) {
                return Err(AppError::ArticleNotFound {
                    id: article_id.to_string(),
                });
            }
        }

        let item = self.store.insert_queue_item(item).await?;
        metrics::record_queue_transition(item.status.as_str());
        info!(
            queue_item_id = %item.id,
            tenant_id = %item.tenant_id,
            status = %item.status,
            priority = item.priority,
            "Queue item created"
        );
        Ok(item)
    }

    /// Fetch an item, hiding items of other tenants
    pub async fn get(&self, tenant_id: Uuid, id: Uuid) -> Result<QueueItem> {
        match self.store.get_queue_item(id).await? {
            Some(item) if item.tenant_id == tenant_id => Ok(item),
            _ => Err(AppError::QueueItemNotFound { id: id.to_string() }),
        }
    }

    /// Items in queue order, optionally restricted to `statuses`
    pub async fn list(&self, tenant_id: Uuid, statuses: &[QueueStatus]) -> Result<Vec<QueueItem>> {
        let items = sort_queue(self.store.list_queue_items(tenant_id).await?);
        if statuses.is_empty() {
            return Ok(items);
        }
        Ok(filter_by_status(&items, statuses).into_iter().cloned().collect())
    }

    pub async fn stats(&self, tenant_id: Uuid, now: DateTime<Utc>) -> Result<QueueStats> {
        let items = self.store.list_queue_items(tenant_id).await?;
        let stats = calculate_stats(&items, now, &self.settings);

        for status in [
            QueueStatus::Pending,
            QueueStatus::Scheduled,
            QueueStatus::Processing,
            QueueStatus::Failed,
        ] {
            metrics::record_queue_depth(status.as_str(), stats.count(status));
        }
        metrics::record_estimated_wait(stats.estimated_wait_time_ms);
        Ok(stats)
    }

    pub async fn position(&self, tenant_id: Uuid, id: Uuid, now: DateTime<Utc>) -> Result<QueuePosition> {
        let item = self.get(tenant_id, id).await?;
        let items = self.store.list_queue_items(tenant_id).await?;
        let stats = calculate_stats(&items, now, &self.settings);
        let position = queue_position(&items, id);

        Ok(QueuePosition {
            item_id: id,
            status: item.status,
            position,
            estimated_wait_time_ms: position
                .map(|p| estimated_wait_time(&stats, Some(p), &self.settings)),
        })
    }

    /// Load, mutate and compare-and-set write, re-reading on a lost race
    async fn mutate<F>(&self, tenant_id: Uuid, id: Uuid, mut apply: F) -> Result<QueueItem>
    where
        F: FnMut(&mut QueueItem) -> Result<()> + Send,
    {
        for _ in 0..MAX_CAS_ATTEMPTS {
            let mut next = self.get(tenant_id, id).await?;
            apply(&mut next)?;
            if let Some(saved) = self.store.update_queue_item_if(next).await? {
                return Ok(saved);
            }
            debug!(queue_item_id = %id, "Queue item changed concurrently, re-reading");
        }
        Err(AppError::Conflict {
            message: format!("queue item {} is changing too quickly", id),
        })
    }

    /// Like `mutate`, for the worker holding `claimed`. Applies only while the
    /// stored item is still that same processing attempt; `None` once it was
    /// cancelled, timed out or re-claimed.
    async fn mutate_attempt<F>(&self, claimed: &QueueItem, mut apply: F) -> Result<Option<QueueItem>>
    where
        F: FnMut(&mut QueueItem) -> Result<()> + Send,
    {
        for _ in 0..MAX_CAS_ATTEMPTS {
            let Some(mut next) = self.store.get_queue_item(claimed.id).await? else {
                return Err(AppError::QueueItemNotFound {
                    id: claimed.id.to_string(),
                });
            };
            if next.status != QueueStatus::Processing || next.attempts != claimed.attempts {
                return Ok(None);
            }
            apply(&mut next)?;
            if let Some(saved) = self.store.update_queue_item_if(next).await? {
                return Ok(Some(saved));
            }
            debug!(queue_item_id = %claimed.id, "Queue item changed concurrently, re-reading");
        }
        Err(AppError::Conflict {
            message: format!("queue item {} is changing too quickly", claimed.id),
        })
    }

    /// Cancel an item. A processing item also has its pipeline run
    /// terminated so in-flight results are discarded.
    pub async fn cancel(&self, tenant_id: Uuid, id: Uuid, now: DateTime<Utc>) -> Result<QueueItem> {
        let item = self.mutate(tenant_id, id, |item| item.cancel(now)).await?;
        if let Some(run_id) = item.pipeline_run_id {
            if self.store.request_cancel(run_id).await? {
                info!(queue_item_id = %id, run_id = %run_id, "Cancelled in-flight pipeline run");
            }
        }
        metrics::record_queue_transition(QueueStatus::Cancelled.as_str());
        Ok(item)
    }

    /// Manual retry of a failed item with attempts left
    pub async fn retry(&self, tenant_id: Uuid, id: Uuid, now: DateTime<Utc>) -> Result<QueueItem> {
        let item = self.mutate(tenant_id, id, |item| item.retry(now)).await?;
        metrics::record_queue_transition(QueueStatus::Pending.as_str());
        Ok(item)
    }

    pub async fn set_priority(
        &self,
        tenant_id: Uuid,
        id: Uuid,
        priority: i32,
        now: DateTime<Utc>,
    ) -> Result<QueueItem> {
        self.mutate(tenant_id, id, |item| item.set_priority(priority, now))
            .await
    }

    // ========================================================================
    // Worker operations
    // ========================================================================

    pub async fn claim_next(&self, now: DateTime<Utc>) -> Result<Option<QueueItem>> {
        let claimed = self.store.claim_next(None, now).await?;
        if let Some(item) = &claimed {
            metrics::record_queue_transition(QueueStatus::Processing.as_str());
            debug!(queue_item_id = %item.id, tenant_id = %item.tenant_id, "Claimed queue item");
        }
        Ok(claimed)
    }

    /// Record the run executing a claimed item. `None` when the item is no
    /// longer processing (cancelled or timed out).
    pub async fn attach_run(&self, item: &QueueItem, run_id: Uuid) -> Result<Option<QueueItem>> {
        let now = Utc::now();
        self.mutate_attempt(item, |next| {
            next.pipeline_run_id = Some(run_id);
            next.updated_at = now;
            Ok(())
        })
        .await
    }

    /// Complete a processing item; `None` when it was cancelled meanwhile
    pub async fn complete(&self, item: &QueueItem, now: DateTime<Utc>) -> Result<Option<QueueItem>> {
        let saved = self.mutate_attempt(item, |next| next.complete(now)).await?;
        if saved.is_some() {
            metrics::record_queue_transition(QueueStatus::Completed.as_str());
        }
        Ok(saved)
    }

    /// Fail a processing item; `None` when it was cancelled meanwhile
    pub async fn fail(
        &self,
        item: &QueueItem,
        error: &str,
        retryable: bool,
        now: DateTime<Utc>,
    ) -> Result<Option<QueueItem>> {
        let saved = self
            .mutate_attempt(item, |next| next.fail(error, retryable, now))
            .await?;
        if let Some(failed) = &saved {
            metrics::record_queue_transition(QueueStatus::Failed.as_str());
            warn!(
                queue_item_id = %failed.id,
                attempts = failed.attempts,
                max_attempts = failed.max_attempts,
                retryable = failed.should_retry(),
                error = error,
                "Queue item failed"
            );
        }
        Ok(saved)
    }

    /// One maintenance pass: time out stuck items, promote due scheduled
    /// items and re-queue failures whose backoff elapsed.
    pub async fn sweep(&self, now: DateTime<Utc>) -> Result<SweepReport> {
        let mut report = SweepReport::default();

        for item in self.store.find_processing().await? {
            if !item.has_timed_out(self.settings.processing_timeout, now) {
                continue;
            }
            let message = format!(
                "Processing timed out after {}s",
                self.settings.processing_timeout.as_secs()
            );
            if let Some(failed) = self.fail(&item, &message, true, now).await? {
                if let Some(run_id) = failed.pipeline_run_id {
                    self.store.fail_run(run_id, &message).await?;
                }
                report.timed_out += 1;
            }
        }

        // Runs started outside the queue have no item to time out
        let cutoff = chrono::Duration::from_std(self.settings.processing_timeout)
            .ok()
            .and_then(|timeout| now.checked_sub_signed(timeout));
        if let Some(cutoff) = cutoff {
            let message = format!(
                "Run stalled with no progress for {}s",
                self.settings.processing_timeout.as_secs()
            );
            for run in self.store.find_stale_runs(cutoff).await? {
                if self.store.fail_run(run.id, &message).await? {
                    warn!(run_id = %run.id, tenant_id = %run.tenant_id, stage = %run.stage, "Failed stalled pipeline run");
                    report.stalled_runs += 1;
                }
            }
        }

        for mut item in self.store.find_due_scheduled(now).await? {
            if item.promote_due(now) && self.store.update_queue_item_if(item).await?.is_some() {
                report.promoted += 1;
            }
        }

        for mut item in self.store.find_failed().await? {
            if !item.is_retry_due(now, self.settings.base_retry_delay) {
                continue;
            }
            item.retry(now)?;
            if self.store.update_queue_item_if(item).await?.is_some() {
                report.requeued += 1;
            }
        }

        if report != SweepReport::default() {
            info!(
                timed_out = report.timed_out,
                promoted = report.promoted,
                requeued = report.requeued,
                stalled_runs = report.stalled_runs,
                "Queue sweep applied transitions"
            );
        }
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::models::{ContentIdea, PipelineStage};
    use crate::store::{InMemoryStore, PipelineStore, QueueStore};
    use chrono::Duration as ChronoDuration;

    fn idea(tenant_id: Uuid) -> ContentIdea {
        ContentIdea {
            id: Uuid::new_v4(),
            tenant_id,
            topic: "Rust in production".to_string(),
            primary_keyword: Some("rust".to_string()),
            content_type: "blog_post".to_string(),
            article_id: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn setup() -> (Arc<InMemoryStore>, QueueService, Uuid) {
        let store = Arc::new(InMemoryStore::new());
        let service = QueueService::new(store.clone(), QueueSettings::default());
        (store, service, Uuid::new_v4())
    }

    async fn enqueue(store: &InMemoryStore, service: &QueueService, tenant: Uuid, priority: i32) -> QueueItem {
        let idea = idea(tenant);
        store.put_content_idea(idea.clone());
        service
            .enqueue(NewQueueItem {
                tenant_id: tenant,
                content_idea_id: Some(idea.id),
                article_id: None,
                priority,
                max_attempts: Some(3),
                scheduled_for: None,
            })
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_enqueue_rejects_foreign_source() {
        let (store, service, tenant) = setup();
        let foreign = idea(Uuid::new_v4());
        store.put_content_idea(foreign.clone());

        let result = service
            .enqueue(NewQueueItem {
                tenant_id: tenant,
                content_idea_id: Some(foreign.id),
                article_id: None,
                priority: 0,
                max_attempts: None,
                scheduled_for: None,
            })
            .await;
        assert!(matches!(result, Err(AppError::NotFound { .. })));
    }

    #[tokio::test]
    async fn test_priority_order_and_retry_lifecycle() {
        let (store, service, tenant) = setup();
        let a = enqueue(&store, &service, tenant, 0).await;
        let b = enqueue(&store, &service, tenant, 5).await;

        let listed = service.list(tenant, &[]).await.unwrap();
        assert_eq!(listed[0].id, b.id);
        assert_eq!(listed[1].id, a.id);

        let now = Utc::now();
        for attempt in 1..=3 {
            let claimed = service.claim_next(now).await.unwrap().unwrap();
            assert_eq!(claimed.id, b.id);
            let failed = service.fail(&claimed, "timeout", true, now).await.unwrap().unwrap();
            assert_eq!(failed.attempts, attempt);
            if failed.should_retry() {
                service.retry(tenant, b.id, now).await.unwrap();
            }
        }

        let b = service.get(tenant, b.id).await.unwrap();
        assert!(!b.should_retry());
        assert!(service.retry(tenant, b.id, now).await.is_err());
    }

    #[tokio::test]
    async fn test_cancel_preempts_completion() {
        let (store, service, tenant) = setup();
        enqueue(&store, &service, tenant, 0).await;

        let now = Utc::now();
        let claimed = service.claim_next(now).await.unwrap().unwrap();
        service.cancel(tenant, claimed.id, now).await.unwrap();

        assert!(service.complete(&claimed, now).await.unwrap().is_none());
        let stored = service.get(tenant, claimed.id).await.unwrap();
        assert_eq!(stored.status, QueueStatus::Cancelled);
    }

    #[tokio::test]
    async fn test_position_and_tenant_isolation() {
        let (store, service, tenant) = setup();
        let a = enqueue(&store, &service, tenant, 0).await;
        let b = enqueue(&store, &service, tenant, 1).await;

        let pos = service.position(tenant, a.id, Utc::now()).await.unwrap();
        assert_eq!(pos.position, Some(2));
        assert_eq!(pos.estimated_wait_time_ms, Some(180_000));

        service.set_priority(tenant, a.id, 10, Utc::now()).await.unwrap();
        let pos = service.position(tenant, b.id, Utc::now()).await.unwrap();
        assert_eq!(pos.position, Some(2));

        assert!(matches!(
            service.get(Uuid::new_v4(), a.id).await,
            Err(AppError::QueueItemNotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_sweep_times_out_promotes_and_requeues() {
        let (store, service, tenant) = setup();
        let start = Utc::now();

        let stuck = enqueue(&store, &service, tenant, 9).await;
        let claimed = service.claim_next(start).await.unwrap().unwrap();
        assert_eq!(claimed.id, stuck.id);

        let run = crate::pipeline::new_run_record(
            &crate::pipeline::PipelineInput::new(tenant, "topic", "blog_post"),
            start,
        );
        let run = store.create_run(run).await.unwrap();
        service.attach_run(&claimed, run.id).await.unwrap().unwrap();

        let idea = idea(tenant);
        store.put_content_idea(idea.clone());
        let scheduled = service
            .enqueue(NewQueueItem {
                tenant_id: tenant,
                content_idea_id: Some(idea.id),
                article_id: None,
                priority: 0,
                max_attempts: None,
                scheduled_for: Some(start + ChronoDuration::seconds(60)),
            })
            .await
            .unwrap();
        assert_eq!(scheduled.status, QueueStatus::Scheduled);

        let later = start + ChronoDuration::seconds(601);
        let report = service.sweep(later).await.unwrap();
        assert_eq!(report.timed_out, 1);
        assert_eq!(report.promoted, 1);
        assert_eq!(report.requeued, 0);

        let run = store.get_run(run.id).await.unwrap().unwrap();
        assert_eq!(run.stage, PipelineStage::Error);

        // First retry waits the 30s base delay
        let report = service.sweep(later + ChronoDuration::seconds(30)).await.unwrap();
        assert_eq!(report.requeued, 1);
        let stuck = service.get(tenant, stuck.id).await.unwrap();
        assert_eq!(stuck.status, QueueStatus::Pending);
        assert_eq!(stuck.attempts, 1);
    }

    #[tokio::test]
    async fn test_sweep_fails_runs_started_without_an_item() {
        let (store, service, tenant) = setup();
        let start = Utc::now();
        let input = crate::pipeline::PipelineInput::new(tenant, "Orphaned run", "blog_post");
        let stalled = store
            .create_run(crate::pipeline::new_run_record(&input, start))
            .await
            .unwrap();
        let fresh = store
            .create_run(crate::pipeline::new_run_record(
                &input,
                start + ChronoDuration::seconds(500),
            ))
            .await
            .unwrap();

        let report = service.sweep(start + ChronoDuration::seconds(601)).await.unwrap();
        assert_eq!(report.stalled_runs, 1);

        let stalled = store.get_run(stalled.id).await.unwrap().unwrap();
        assert_eq!(stalled.stage, PipelineStage::Error);
        assert_eq!(stalled.progress, 0);
        assert!(stalled.error.unwrap().contains("stalled"));

        let fresh = store.get_run(fresh.id).await.unwrap().unwrap();
        assert_eq!(fresh.stage, PipelineStage::Initializing);

        // The second run stalls later; failed runs are not revisited
        let report = service.sweep(start + ChronoDuration::days(30)).await.unwrap();
        assert_eq!(report.stalled_runs, 1);
        let report = service.sweep(start + ChronoDuration::days(31)).await.unwrap();
        assert_eq!(report.stalled_runs, 0);
    }

    #[tokio::test]
    async fn test_stale_snapshot_cannot_drop_attached_run() {
        let (store, service, tenant) = setup();
        enqueue(&store, &service, tenant, 0).await;

        let now = Utc::now();
        let claimed = service.claim_next(now).await.unwrap().unwrap();
        // Read before the worker attaches its run
        let snapshot = service.get(tenant, claimed.id).await.unwrap();

        let run = store
            .create_run(crate::pipeline::new_run_record(
                &crate::pipeline::PipelineInput::new(tenant, "topic", "blog_post"),
                now,
            ))
            .await
            .unwrap();
        service.attach_run(&claimed, run.id).await.unwrap().unwrap();

        let mut stale = snapshot;
        stale.priority = 7;
        assert!(store.update_queue_item_if(stale).await.unwrap().is_none());

        let bumped = service.set_priority(tenant, claimed.id, 7, now).await.unwrap();
        assert_eq!(bumped.pipeline_run_id, Some(run.id));

        // Cancel still sees the attached run
        let cancelled = service.cancel(tenant, claimed.id, now).await.unwrap();
        assert_eq!(cancelled.pipeline_run_id, Some(run.id));
        let run = store.get_run(run.id).await.unwrap().unwrap();
        assert!(run.cancel_requested);
        assert_eq!(run.stage, PipelineStage::Error);
    }

    #[tokio::test]
    async fn test_worker_writes_ignore_a_reclaimed_item() {
        let (store, service, tenant) = setup();
        enqueue(&store, &service, tenant, 0).await;

        let now = Utc::now();
        let first = service.claim_next(now).await.unwrap().unwrap();
        let later = now + ChronoDuration::seconds(601);
        assert_eq!(service.sweep(later).await.unwrap().timed_out, 1);
        service.retry(tenant, first.id, later).await.unwrap();
        let second = service.claim_next(later).await.unwrap().unwrap();
        assert_eq!(second.id, first.id);

        // The timed-out attempt must not complete the new one
        assert!(service.complete(&first, later).await.unwrap().is_none());
        assert!(service.attach_run(&first, Uuid::new_v4()).await.unwrap().is_none());
        assert!(service.complete(&second, later).await.unwrap().is_some());
    }
}
