//! Periodic maintenance: queue sweep plus the auto-publish pass

use chrono::{DateTime, Utc};
use contentforge_common::{
    errors::Result,
    publish::{AutoPublishReport, Publisher},
    queue::{QueueService, SweepReport},
};
use serde::Serialize;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SweepSummary {
    pub queue: SweepReport,
    pub publish: AutoPublishReport,
}

#[derive(Clone)]
pub struct Sweeper {
    queue: QueueService,
    publisher: Publisher,
}

impl Sweeper {
    pub fn new(queue: QueueService, publisher: Publisher) -> Self {
        Self { queue, publisher }
    }

    pub async fn run_once(&self, now: DateTime<Utc>) -> Result<SweepSummary> {
        let queue = self.queue.sweep(now).await?;
        let publish = self.publisher.run_auto_publish(now).await?;
        Ok(SweepSummary { queue, publish })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use contentforge_common::{
        db::models::{
            Article, ArticleStatus, AutoPublishConfig, PipelineStage, QueueStatus, RiskLevel,
            StringList,
        },
        pipeline::{new_run_record, PipelineInput},
        publish::MockPublishTarget,
        queue::{NewQueueItem, QueueSettings},
        store::{ArticleStore, InMemoryStore, PipelineStore, QueueStore},
    };
    use std::sync::Arc;
    use uuid::Uuid;

    fn ready_article(tenant_id: Uuid, now: DateTime<Utc>) -> Article {
        Article {
            id: Uuid::new_v4(),
            tenant_id,
            title: "Scaling Read Replicas".to_string(),
            slug: "scaling-read-replicas".to_string(),
            content: "Body".to_string(),
            status: ArticleStatus::Ready,
            content_type: "blog_post".to_string(),
            primary_keyword: None,
            topics: StringList::default(),
            keywords: StringList::default(),
            word_count: 1500,
            quality_score: Some(88),
            readability_score: None,
            seo_score: None,
            human_score: None,
            risk_level: Some(RiskLevel::Low),
            banned_phrase_hits: 0,
            human_reviewed: true,
            contributor_id: None,
            content_idea_id: None,
            pipeline_run_id: None,
            times_linked_to: 0,
            ready_at: Some(now - Duration::days(2)),
            scheduled_for: None,
            published_at: None,
            external_post_id: None,
            external_url: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[tokio::test]
    async fn test_sweep_promotes_and_publishes() {
        let store = Arc::new(InMemoryStore::new());
        let target = Arc::new(MockPublishTarget::new());
        let tenant = Uuid::new_v4();
        let now = Utc::now();

        let queue = QueueService::new(store.clone(), QueueSettings::default());
        let publisher = Publisher::new(store.clone(), Some(target.clone()));

        let article = store.insert_article(ready_article(tenant, now)).await.unwrap();
        let mut config = AutoPublishConfig::defaults_for(tenant);
        config.enabled = true;
        publisher.save_config(tenant, config).await.unwrap();

        let item = queue
            .enqueue(NewQueueItem {
                tenant_id: tenant,
                content_idea_id: None,
                article_id: Some(article.id),
                priority: 0,
                max_attempts: None,
                scheduled_for: Some(now - Duration::minutes(5)),
            })
            .await
            .unwrap();
        assert_eq!(item.status, QueueStatus::Scheduled);

        let summary = Sweeper::new(queue, publisher).run_once(now).await.unwrap();
        assert_eq!(summary.queue.promoted, 1);
        assert_eq!(summary.publish.published, 1);
        assert_eq!(target.requests().len(), 1);

        let promoted = store.get_queue_item(item.id).await.unwrap().unwrap();
        assert_eq!(promoted.status, QueueStatus::Pending);
    }

    #[tokio::test]
    async fn test_sweep_without_target_only_evaluates() {
        let store = Arc::new(InMemoryStore::new());
        let tenant = Uuid::new_v4();
        let now = Utc::now();
        let queue = QueueService::new(store.clone(), QueueSettings::default());
        let publisher = Publisher::new(store.clone(), None);

        let article = store.insert_article(ready_article(tenant, now)).await.unwrap();
        let mut config = AutoPublishConfig::defaults_for(tenant);
        config.enabled = true;
        publisher.save_config(tenant, config).await.unwrap();

        let summary = Sweeper::new(queue, publisher).run_once(now).await.unwrap();
        assert_eq!(summary.publish.evaluated, 1);
        assert_eq!(summary.publish.published, 0);
        assert_eq!(summary.publish.failed, 0);

        let stored = store.get_article(article.id).await.unwrap().unwrap();
        assert_eq!(stored.status, ArticleStatus::Ready);
    }

    #[tokio::test]
    async fn test_sweep_fails_stalled_direct_runs() {
        let store = Arc::new(InMemoryStore::new());
        let tenant = Uuid::new_v4();
        let started = Utc::now() - Duration::hours(1);
        let queue = QueueService::new(store.clone(), QueueSettings::default());
        let publisher = Publisher::new(store.clone(), None);

        let input = PipelineInput::new(tenant, "Started from the API", "blog_post");
        let run = store.create_run(new_run_record(&input, started)).await.unwrap();

        let summary = Sweeper::new(queue, publisher).run_once(Utc::now()).await.unwrap();
        assert_eq!(summary.queue.stalled_runs, 1);
        assert_eq!(summary.queue.timed_out, 0);

        let run = store.get_run(run.id).await.unwrap().unwrap();
        assert_eq!(run.stage, PipelineStage::Error);
    }
}
