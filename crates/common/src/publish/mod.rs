//! Auto-publish gate
//!
//! The gate decides whether and when an article may go live on its own.
//! Quality, risk and review checks block outright; publishing windows only
//! ever defer.

mod target;
mod windows;

pub use target::{
    create_publish_target, HttpPublishTarget, MockPublishTarget, PublishRequest, PublishResult,
    PublishStatus, PublishTarget,
};
pub use windows::{is_within_window, next_eligible_window};

use crate::db::models::{Article, ArticleStatus, AutoPublishConfig, RiskLevel};
use crate::errors::{AppError, Result};
use crate::metrics;
use crate::scoring::article_risk_level;
use crate::store::ContentStore;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

/// Why an article may not be auto-published
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum BlockReason {
    AutoPublishDisabled,
    NotReady { status: ArticleStatus },
    QualityBelowMinimum { score: Option<i32>, minimum: i32 },
    CriticalRisk,
    RiskAboveMaximum { level: RiskLevel, maximum: RiskLevel },
    HumanReviewRequired,
    InvalidTimezone { timezone: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "decision", rename_all = "snake_case")]
pub enum PublishDecision {
    Blocked { reasons: Vec<BlockReason> },
    PublishNow,
    Deferred { publish_at: DateTime<Utc> },
}

impl PublishDecision {
    pub fn label(&self) -> &'static str {
        match self {
            PublishDecision::Blocked { .. } => "blocked",
            PublishDecision::PublishNow => "publish_now",
            PublishDecision::Deferred { .. } => "deferred",
        }
    }
}

/// Quality, risk and review checks. A missing quality score counts as 0.
pub fn block_reasons(article: &Article, config: &AutoPublishConfig) -> Vec<BlockReason> {
    let mut reasons = Vec::new();

    if article.quality_score.unwrap_or(0) < config.minimum_quality_score {
        reasons.push(BlockReason::QualityBelowMinimum {
            score: article.quality_score,
            minimum: config.minimum_quality_score,
        });
    }

    let risk = article_risk_level(article);
    if risk == RiskLevel::Critical {
        reasons.push(BlockReason::CriticalRisk);
    } else if risk > config.maximum_risk_level {
        reasons.push(BlockReason::RiskAboveMaximum {
            level: risk,
            maximum: config.maximum_risk_level,
        });
    }

    if config.require_human_review && !article.human_reviewed {
        reasons.push(BlockReason::HumanReviewRequired);
    }

    reasons
}

pub fn can_auto_publish(article: &Article, config: &AutoPublishConfig) -> bool {
    block_reasons(article, config).is_empty()
}

/// Full decision for a `ready` article at `now`
pub fn evaluate(article: &Article, config: &AutoPublishConfig, now: DateTime<Utc>) -> PublishDecision {
    let mut reasons = Vec::new();
    if !config.enabled {
        reasons.push(BlockReason::AutoPublishDisabled);
    }
    if article.status != ArticleStatus::Ready {
        reasons.push(BlockReason::NotReady {
            status: article.status,
        });
    }
    reasons.extend(block_reasons(article, config));
    if !reasons.is_empty() {
        return PublishDecision::Blocked { reasons };
    }

    let mut earliest = now;
    if let Some(ready_at) = article.ready_at {
        earliest = earliest.max(ready_at + Duration::days(i64::from(config.default_days_after_ready)));
    }
    if let Some(scheduled_for) = article.scheduled_for {
        earliest = earliest.max(scheduled_for);
    }

    match next_eligible_window(config, earliest) {
        Some(at) if at <= now => PublishDecision::PublishNow,
        Some(at) => PublishDecision::Deferred { publish_at: at },
        None => PublishDecision::Blocked {
            reasons: vec![BlockReason::InvalidTimezone {
                timezone: config.timezone.clone(),
            }],
        },
    }
}

/// Counts from one auto-publish pass
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AutoPublishReport {
    pub evaluated: usize,
    pub published: usize,
    pub deferred: usize,
    pub blocked: usize,
    pub failed: usize,
}

/// Applies gate decisions and manual overrides to stored articles
#[derive(Clone)]
pub struct Publisher {
    store: Arc<dyn ContentStore>,
    target: Option<Arc<dyn PublishTarget>>,
}

impl Publisher {
    pub fn new(store: Arc<dyn ContentStore>, target: Option<Arc<dyn PublishTarget>>) -> Self {
        Self { store, target }
    }

    async fn tenant_article(&self, tenant_id: Uuid, article_id: Uuid) -> Result<Article> {
        self.store
            .get_article(article_id)
            .await?
            .filter(|a| a.tenant_id == tenant_id)
            .ok_or_else(|| AppError::ArticleNotFound {
                id: article_id.to_string(),
            })
    }

    /// Saved config, or the disabled defaults
    pub async fn config(&self, tenant_id: Uuid) -> Result<AutoPublishConfig> {
        Ok(self
            .store
            .get_auto_publish_config(tenant_id)
            .await?
            .unwrap_or_else(|| AutoPublishConfig::defaults_for(tenant_id)))
    }

    /// Whole-object replace after validation
    pub async fn save_config(&self, tenant_id: Uuid, mut config: AutoPublishConfig) -> Result<AutoPublishConfig> {
        config.tenant_id = tenant_id;
        config.validate()?;
        config.updated_at = Utc::now();
        let saved = self.store.save_auto_publish_config(config).await?;
        info!(tenant_id = %tenant_id, enabled = saved.enabled, "Auto-publish config saved");
        Ok(saved)
    }

    pub async fn decision(&self, tenant_id: Uuid, article_id: Uuid, now: DateTime<Utc>) -> Result<PublishDecision> {
        let article = self.tenant_article(tenant_id, article_id).await?;
        let config = self.config(tenant_id).await?;
        Ok(evaluate(&article, &config, now))
    }

    /// Mark an article reviewed; drafts and articles in review become ready
    pub async fn mark_reviewed(&self, tenant_id: Uuid, article_id: Uuid, now: DateTime<Utc>) -> Result<Article> {
        let mut article = self.tenant_article(tenant_id, article_id).await?;
        article.human_reviewed = true;
        if matches!(article.status, ArticleStatus::Draft | ArticleStatus::Review) {
            article.status = ArticleStatus::Ready;
            article.ready_at = Some(now);
        }
        article.updated_at = now;
        self.store.update_article(article).await
    }

    /// Manual override: publish immediately without consulting the gate
    #[instrument(skip(self))]
    pub async fn publish_now(&self, tenant_id: Uuid, article_id: Uuid, now: DateTime<Utc>) -> Result<Article> {
        let article = self.tenant_article(tenant_id, article_id).await?;
        if !article.status.can_transition_to(ArticleStatus::Published) {
            return Err(AppError::InvalidTransition {
                from: article.status.to_string(),
                to: ArticleStatus::Published.to_string(),
            });
        }
        self.send(article, now).await
    }

    async fn send(&self, mut article: Article, now: DateTime<Utc>) -> Result<Article> {
        let target = self.target.as_ref().ok_or_else(|| AppError::ServiceUnavailable {
            message: "no publishing target configured".to_string(),
        })?;

        let result = target
            .publish(&PublishRequest::for_article(&article, None, now))
            .await?;

        article.status = ArticleStatus::Published;
        article.published_at = Some(now);
        article.external_post_id = Some(result.post_id);
        article.external_url = result.url;
        article.updated_at = now;
        let article = self.store.update_article(article).await?;
        info!(article_id = %article.id, post_id = ?article.external_post_id, "Article published");
        Ok(article)
    }

    /// Evaluate every `ready` article: publish the eligible ones and record
    /// the next window on deferred ones
    #[instrument(skip(self))]
    pub async fn run_auto_publish(&self, now: DateTime<Utc>) -> Result<AutoPublishReport> {
        let articles = self.store.list_articles_by_status(None, ArticleStatus::Ready).await?;
        let mut configs: HashMap<Uuid, AutoPublishConfig> = HashMap::new();
        let mut report = AutoPublishReport::default();

        for article in articles {
            let config = match configs.get(&article.tenant_id) {
                Some(c) => c.clone(),
                None => {
                    let c = self.config(article.tenant_id).await?;
                    configs.insert(article.tenant_id, c.clone());
                    c
                }
            };
            if !config.enabled {
                continue;
            }

            report.evaluated += 1;
            let decision = evaluate(&article, &config, now);
            metrics::record_publish_decision(decision.label());

            match decision {
                PublishDecision::Blocked { reasons } => {
                    debug!(article_id = %article.id, reasons = ?reasons, "Auto-publish blocked");
                    report.blocked += 1;
                }
                PublishDecision::Deferred { publish_at } => {
                    report.deferred += 1;
                    if article.scheduled_for != Some(publish_at) {
                        let mut article = article;
                        article.scheduled_for = Some(publish_at);
                        article.updated_at = now;
                        self.store.update_article(article).await?;
                    }
                }
                PublishDecision::PublishNow if self.target.is_none() => {
                    debug!(article_id = %article.id, "Eligible, but no publishing target configured");
                }
                PublishDecision::PublishNow => {
                    let article_id = article.id;
                    match self.send(article, now).await {
                        Ok(_) => report.published += 1,
                        Err(e) => {
                            warn!(article_id = %article_id, error = %e, "Auto-publish failed");
                            report.failed += 1;
                        }
                    }
                }
            }
        }

        if report.evaluated > 0 {
            info!(
                evaluated = report.evaluated,
                published = report.published,
                deferred = report.deferred,
                blocked = report.blocked,
                failed = report.failed,
                "Auto-publish pass complete"
            );
        }
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::models::{PublishingWindow, PublishingWindows, StringList};
    use crate::store::{ArticleStore, InMemoryStore};

    fn utc(s: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(s).unwrap().with_timezone(&Utc)
    }

    fn article(tenant_id: Uuid, quality: i32, risk: RiskLevel) -> Article {
        let created = utc("2024-03-01T00:00:00Z");
        Article {
            id: Uuid::new_v4(),
            tenant_id,
            title: "Async Rust".to_string(),
            slug: "async-rust".to_string(),
            content: "# Async Rust\n\n- point".to_string(),
            status: ArticleStatus::Ready,
            content_type: "blog_post".to_string(),
            primary_keyword: None,
            topics: StringList::default(),
            keywords: StringList::default(),
            word_count: 1200,
            quality_score: Some(quality),
            readability_score: None,
            seo_score: None,
            human_score: None,
            risk_level: Some(risk),
            banned_phrase_hits: 0,
            human_reviewed: false,
            contributor_id: None,
            content_idea_id: None,
            pipeline_run_id: None,
            times_linked_to: 0,
            ready_at: Some(created),
            scheduled_for: None,
            published_at: None,
            external_post_id: None,
            external_url: None,
            created_at: created,
            updated_at: created,
        }
    }

    fn config(tenant_id: Uuid) -> AutoPublishConfig {
        let mut config = AutoPublishConfig::defaults_for(tenant_id);
        config.enabled = true;
        config.minimum_quality_score = 70;
        config.maximum_risk_level = RiskLevel::Medium;
        config.require_human_review = false;
        // Wednesdays 09:00-17:00 UTC
        config.publishing_windows = PublishingWindows(vec![PublishingWindow {
            day_of_week: 3,
            start_hour: 9,
            end_hour: 17,
        }]);
        config
    }

    #[test]
    fn test_gate_scenario() {
        let tenant = Uuid::new_v4();
        let cfg = config(tenant);
        let inside_window = utc("2024-03-06T10:00:00Z");

        let ok = article(tenant, 90, RiskLevel::Low);
        assert!(can_auto_publish(&ok, &cfg));
        assert_eq!(evaluate(&ok, &cfg, inside_window), PublishDecision::PublishNow);

        let critical = article(tenant, 90, RiskLevel::Critical);
        assert!(!can_auto_publish(&critical, &cfg));
        assert_eq!(
            evaluate(&critical, &cfg, inside_window),
            PublishDecision::Blocked {
                reasons: vec![BlockReason::CriticalRisk]
            }
        );
    }

    #[test]
    fn test_each_block_reason() {
        let tenant = Uuid::new_v4();
        let mut cfg = config(tenant);
        cfg.require_human_review = true;

        let a = article(tenant, 60, RiskLevel::High);
        assert_eq!(
            block_reasons(&a, &cfg),
            vec![
                BlockReason::QualityBelowMinimum {
                    score: Some(60),
                    minimum: 70
                },
                BlockReason::RiskAboveMaximum {
                    level: RiskLevel::High,
                    maximum: RiskLevel::Medium
                },
                BlockReason::HumanReviewRequired,
            ]
        );

        let mut unscored = article(tenant, 0, RiskLevel::Low);
        unscored.quality_score = None;
        unscored.human_reviewed = true;
        assert!(!can_auto_publish(&unscored, &cfg));

        // Boundary values pass
        let mut edge = article(tenant, 70, RiskLevel::Medium);
        edge.human_reviewed = true;
        assert!(can_auto_publish(&edge, &cfg));
    }

    #[test]
    fn test_outside_window_defers() {
        let tenant = Uuid::new_v4();
        let cfg = config(tenant);
        let a = article(tenant, 90, RiskLevel::Low);

        assert_eq!(
            evaluate(&a, &cfg, utc("2024-03-06T18:00:00Z")),
            PublishDecision::Deferred {
                publish_at: utc("2024-03-13T09:00:00Z")
            }
        );
    }

    #[test]
    fn test_days_after_ready_defers() {
        let tenant = Uuid::new_v4();
        let mut cfg = config(tenant);
        cfg.publishing_windows = PublishingWindows::default();
        cfg.default_days_after_ready = 2;

        let mut a = article(tenant, 90, RiskLevel::Low);
        a.ready_at = Some(utc("2024-03-06T10:00:00Z"));
        assert_eq!(
            evaluate(&a, &cfg, utc("2024-03-07T10:00:00Z")),
            PublishDecision::Deferred {
                publish_at: utc("2024-03-08T10:00:00Z")
            }
        );
        assert_eq!(
            evaluate(&a, &cfg, utc("2024-03-08T10:00:00Z")),
            PublishDecision::PublishNow
        );
    }

    #[test]
    fn test_disabled_and_not_ready_block() {
        let tenant = Uuid::new_v4();
        let mut cfg = config(tenant);
        cfg.enabled = false;
        let mut a = article(tenant, 90, RiskLevel::Low);
        a.status = ArticleStatus::Review;

        assert_eq!(
            evaluate(&a, &cfg, utc("2024-03-06T10:00:00Z")),
            PublishDecision::Blocked {
                reasons: vec![
                    BlockReason::AutoPublishDisabled,
                    BlockReason::NotReady {
                        status: ArticleStatus::Review
                    },
                ]
            }
        );
    }

    #[tokio::test]
    async fn test_auto_publish_pass() {
        let store = Arc::new(InMemoryStore::new());
        let target = Arc::new(MockPublishTarget::new());
        let tenant = Uuid::new_v4();
        store.save_auto_publish_config(config(tenant)).await.unwrap();

        let good = store.insert_article(article(tenant, 90, RiskLevel::Low)).await.unwrap();
        let weak = store.insert_article(article(tenant, 40, RiskLevel::Low)).await.unwrap();
        let other_tenant = store
            .insert_article(article(Uuid::new_v4(), 95, RiskLevel::Low))
            .await
            .unwrap();

        let publisher = Publisher::new(store.clone(), Some(target.clone()));
        let report = publisher
            .run_auto_publish(utc("2024-03-06T10:00:00Z"))
            .await
            .unwrap();

        assert_eq!(
            report,
            AutoPublishReport {
                evaluated: 2,
                published: 1,
                deferred: 0,
                blocked: 1,
                failed: 0,
            }
        );
        let good = store.get_article(good.id).await.unwrap().unwrap();
        assert_eq!(good.status, ArticleStatus::Published);
        assert_eq!(good.external_post_id.as_deref(), Some("1"));
        assert_eq!(
            store.get_article(weak.id).await.unwrap().unwrap().status,
            ArticleStatus::Ready
        );
        // Tenant without a saved config keeps the disabled default
        assert_eq!(
            store.get_article(other_tenant.id).await.unwrap().unwrap().status,
            ArticleStatus::Ready
        );
        assert_eq!(target.requests().len(), 1);
    }

    #[tokio::test]
    async fn test_deferred_article_gets_schedule() {
        let store = Arc::new(InMemoryStore::new());
        let tenant = Uuid::new_v4();
        store.save_auto_publish_config(config(tenant)).await.unwrap();
        let a = store.insert_article(article(tenant, 90, RiskLevel::Low)).await.unwrap();

        let publisher = Publisher::new(store.clone(), Some(Arc::new(MockPublishTarget::new())));
        let report = publisher
            .run_auto_publish(utc("2024-03-06T18:00:00Z"))
            .await
            .unwrap();
        assert_eq!(report.deferred, 1);
        assert_eq!(
            store.get_article(a.id).await.unwrap().unwrap().scheduled_for,
            Some(utc("2024-03-13T09:00:00Z"))
        );
    }

    #[tokio::test]
    async fn test_manual_publish_and_review() {
        let store = Arc::new(InMemoryStore::new());
        let tenant = Uuid::new_v4();
        let mut draft = article(tenant, 20, RiskLevel::High);
        draft.status = ArticleStatus::Draft;
        draft.ready_at = None;
        let draft = store.insert_article(draft).await.unwrap();

        let publisher = Publisher::new(store.clone(), Some(Arc::new(MockPublishTarget::new())));
        let now = utc("2024-03-06T10:00:00Z");

        let reviewed = publisher.mark_reviewed(tenant, draft.id, now).await.unwrap();
        assert!(reviewed.human_reviewed);
        assert_eq!(reviewed.status, ArticleStatus::Ready);
        assert_eq!(reviewed.ready_at, Some(now));

        // Override ignores quality and risk
        let published = publisher.publish_now(tenant, draft.id, now).await.unwrap();
        assert_eq!(published.status, ArticleStatus::Published);
        assert_eq!(published.published_at, Some(now));

        let err = publisher.publish_now(tenant, draft.id, now).await.unwrap_err();
        assert!(matches!(err, AppError::InvalidTransition { .. }));
        let err = publisher
            .publish_now(Uuid::new_v4(), draft.id, now)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::ArticleNotFound { .. }));
    }

    #[tokio::test]
    async fn test_save_config_validates() {
        let store = Arc::new(InMemoryStore::new());
        let publisher = Publisher::new(store, None);
        let tenant = Uuid::new_v4();

        let mut bad = config(tenant);
        bad.maximum_risk_level = RiskLevel::Critical;
        assert!(publisher.save_config(tenant, bad).await.is_err());

        let saved = publisher
            .save_config(Uuid::new_v4(), config(tenant))
            .await
            .unwrap();
        assert_ne!(saved.tenant_id, tenant);
        assert!(!publisher.config(tenant).await.unwrap().enabled);
    }
}
