//! Publishing targets: where an approved article is sent

use crate::config::PublishingConfig;
use crate::db::models::Article;
use crate::errors::{AppError, Result};
use crate::metrics;
use async_trait::async_trait;
use backoff::{future::retry, ExponentialBackoff};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PublishStatus {
    /// Live immediately
    Publish,
    /// Held by the target until `scheduled_for`
    Future,
    Draft,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PublishRequest {
    pub article_id: uuid::Uuid,
    pub title: String,
    pub slug: String,
    pub content: String,
    pub status: PublishStatus,
    pub categories: Vec<String>,
    pub tags: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scheduled_for: Option<DateTime<Utc>>,
}

impl PublishRequest {
    /// Request for `article`; a future `publish_at` asks the target to hold it
    pub fn for_article(article: &Article, publish_at: Option<DateTime<Utc>>, now: DateTime<Utc>) -> Self {
        let scheduled_for = publish_at.filter(|at| *at > now);
        Self {
            article_id: article.id,
            title: article.title.clone(),
            slug: article.slug.clone(),
            content: article.content.clone(),
            status: if scheduled_for.is_some() {
                PublishStatus::Future
            } else {
                PublishStatus::Publish
            },
            categories: article.topics.0.clone(),
            tags: article.keywords.0.clone(),
            scheduled_for,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublishResult {
    pub post_id: String,
    pub url: Option<String>,
}

#[async_trait]
pub trait PublishTarget: Send + Sync {
    async fn publish(&self, request: &PublishRequest) -> Result<PublishResult>;

    fn name(&self) -> &str;
}

/// Build the configured target; `None` when no endpoint is set
pub fn create_publish_target(config: &PublishingConfig) -> Result<Option<Arc<dyn PublishTarget>>> {
    match &config.endpoint {
        Some(endpoint) => Ok(Some(Arc::new(HttpPublishTarget::new(
            endpoint.clone(),
            config.api_key.clone(),
            config.timeout_secs,
        )?))),
        None => Ok(None),
    }
}

/// POSTs the request as JSON and expects `{post_id, url}` back.
/// Network errors and 5xx responses are retried with exponential backoff.
pub struct HttpPublishTarget {
    client: reqwest::Client,
    endpoint: String,
    api_key: Option<String>,
    max_elapsed: Duration,
}

impl HttpPublishTarget {
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
            max_elapsed: Duration::from_secs(timeout_secs.saturating_mul(3)),
        })
    }

    async fn send(&self, request: &PublishRequest) -> std::result::Result<PublishResult, backoff::Error<AppError>> {
        let mut builder = self
            .client
            .post(&self.endpoint)
            .header("Idempotency-Key", request.article_id.to_string())
            .json(request);
        if let Some(key) = &self.api_key {
            builder = builder.header("Authorization", format!("Bearer {}", key));
        }

        let response = builder.send().await.map_err(|e| {
            backoff::Error::transient(AppError::PublishError {
                message: format!("Request failed: {}", e),
            })
        })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let err = AppError::PublishError {
                message: format!("Target error {}: {}", status, body),
            };
            return Err(if status.is_server_error() || status.as_u16() == 429 {
                backoff::Error::transient(err)
            } else {
                backoff::Error::permanent(err)
            });
        }

        response.json::<PublishResult>().await.map_err(|e| {
            backoff::Error::permanent(AppError::PublishError {
                message: format!("Failed to parse response: {}", e),
            })
        })
    }
}

#[async_trait]
impl PublishTarget for HttpPublishTarget {
    async fn publish(&self, request: &PublishRequest) -> Result<PublishResult> {
        let start = Instant::now();
        let policy = ExponentialBackoff {
            max_elapsed_time: Some(self.max_elapsed),
            ..ExponentialBackoff::default()
        };

        let result = retry(policy, || async {
            self.send(request).await.map_err(|e| {
                if let backoff::Error::Transient { err, .. } = &e {
                    warn!(article_id = %request.article_id, error = %err, "Publish attempt failed, retrying");
                }
                e
            })
        })
        .await;

        metrics::record_provider_call(self.name(), start.elapsed().as_secs_f64(), result.is_ok());
        if let Ok(published) = &result {
            debug!(article_id = %request.article_id, post_id = %published.post_id, "Article sent to target");
        }
        result
    }

    fn name(&self) -> &str {
        "http_publish"
    }
}

/// Records requests and returns sequential post ids
#[derive(Default)]
pub struct MockPublishTarget {
    requests: Mutex<Vec<PublishRequest>>,
    failing: bool,
    counter: AtomicUsize,
}

impl MockPublishTarget {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        Self {
            failing: true,
            ..Self::default()
        }
    }

    pub fn requests(&self) -> Vec<PublishRequest> {
        self.requests.lock().unwrap_or_else(|p| p.into_inner()).clone()
    }
}

#[async_trait]
impl PublishTarget for MockPublishTarget {
    async fn publish(&self, request: &PublishRequest) -> Result<PublishResult> {
        self.requests
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .push(request.clone());

        if self.failing {
            return Err(AppError::PublishError {
                message: "mock target rejected the post".to_string(),
            });
        }

        let n = self.counter.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(PublishResult {
            post_id: n.to_string(),
            url: Some(format!("https://example.com/{}", request.slug)),
        })
    }

    fn name(&self) -> &str {
        "mock"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::models::{ArticleStatus, StringList};
    use chrono::Duration as ChronoDuration;

    fn article() -> Article {
        let now = Utc::now();
        Article {
            id: uuid::Uuid::new_v4(),
            tenant_id: uuid::Uuid::new_v4(),
            title: "Async Rust".to_string(),
            slug: "async-rust".to_string(),
            content: "# Async Rust".to_string(),
            status: ArticleStatus::Ready,
            content_type: "blog_post".to_string(),
            primary_keyword: Some("async rust".to_string()),
            topics: StringList(vec!["rust".to_string()]),
            keywords: StringList(vec!["async rust".to_string()]),
            word_count: 2,
            quality_score: Some(90),
            readability_score: None,
            seo_score: None,
            human_score: None,
            risk_level: None,
            banned_phrase_hits: 0,
            human_reviewed: true,
            contributor_id: None,
            content_idea_id: None,
            pipeline_run_id: None,
            times_linked_to: 0,
            ready_at: Some(now),
            scheduled_for: None,
            published_at: None,
            external_post_id: None,
            external_url: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_request_status_follows_schedule() {
        let a = article();
        let now = Utc::now();

        let immediate = PublishRequest::for_article(&a, Some(now), now);
        assert_eq!(immediate.status, PublishStatus::Publish);
        assert_eq!(immediate.scheduled_for, None);
        assert_eq!(immediate.tags, vec!["async rust".to_string()]);

        let later = now + ChronoDuration::hours(3);
        let future = PublishRequest::for_article(&a, Some(later), now);
        assert_eq!(future.status, PublishStatus::Future);
        assert_eq!(future.scheduled_for, Some(later));
    }

    #[test]
    fn test_no_endpoint_no_target() {
        assert!(create_publish_target(&PublishingConfig::default()).unwrap().is_none());
    }

    #[tokio::test]
    async fn test_mock_target_records_requests() {
        let target = MockPublishTarget::new();
        let request = PublishRequest::for_article(&article(), None, Utc::now());
        let result = target.publish(&request).await.unwrap();
        assert_eq!(result.post_id, "1");
        assert_eq!(target.requests().len(), 1);

        assert!(MockPublishTarget::failing().publish(&request).await.is_err());
    }
}
