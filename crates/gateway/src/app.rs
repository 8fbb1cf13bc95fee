//! Application state and router construction

use crate::handlers;
use crate::middleware::{
    metrics::track_metrics,
    rate_limit::{create_rate_limiter, rate_limit_middleware},
};
use axum::{
    middleware::{from_fn, from_fn_with_state},
    routing::{get, patch, post},
    Router,
};
use contentforge_common::{
    config::AppConfig,
    db::DbPool,
    pipeline::{PipelineOrchestrator, PipelineSettings},
    providers::{Humanizer, TextGenerator},
    publish::{PublishTarget, Publisher},
    queue::{QueueService, QueueSettings},
    store::ContentStore,
};
use std::sync::Arc;
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub store: Arc<dyn ContentStore>,
    /// `None` when running against the in-memory store
    pub db: Option<DbPool>,
    pub queue: QueueService,
    pub orchestrator: PipelineOrchestrator,
    pub publisher: Publisher,
}

impl AppState {
    pub fn new(
        config: Arc<AppConfig>,
        store: Arc<dyn ContentStore>,
        db: Option<DbPool>,
        generator: Arc<dyn TextGenerator>,
        humanizer: Option<Arc<dyn Humanizer>>,
        target: Option<Arc<dyn PublishTarget>>,
    ) -> Self {
        let queue = QueueService::new(store.clone(), QueueSettings::from(&config.queue));
        let orchestrator = PipelineOrchestrator::new(
            store.clone(),
            generator,
            humanizer,
            PipelineSettings::from(&config.generation),
        );
        let publisher = Publisher::new(store.clone(), target);

        Self {
            config,
            store,
            db,
            queue,
            orchestrator,
            publisher,
        }
    }
}

fn api_routes() -> Router<AppState> {
    Router::new()
        // Queue
        .route("/queue/stats", get(handlers::queue::stats))
        .route(
            "/queue/items",
            get(handlers::queue::list_items).post(handlers::queue::enqueue),
        )
        .route("/queue/items/{id}", get(handlers::queue::get_item))
        .route("/queue/items/{id}/position", get(handlers::queue::position))
        .route("/queue/items/{id}/cancel", post(handlers::queue::cancel))
        .route("/queue/items/{id}/retry", post(handlers::queue::retry))
        .route("/queue/items/{id}/priority", patch(handlers::queue::set_priority))
        // Pipeline
        .route("/pipeline/runs", post(handlers::pipeline::start_run))
        .route("/pipeline/runs/{id}", get(handlers::pipeline::get_run))
        .route("/pipeline/runs/{id}/cancel", post(handlers::pipeline::cancel_run))
        // Articles
        .route(
            "/articles/{id}/publish-decision",
            get(handlers::articles::publish_decision),
        )
        .route("/articles/{id}/review", post(handlers::articles::review))
        .route("/articles/{id}/publish", post(handlers::articles::publish))
        .route(
            "/articles/{id}/internal-links/suggestions",
            get(handlers::articles::suggest_links),
        )
        .route(
            "/articles/{id}/internal-links",
            post(handlers::articles::create_link),
        )
        // Keywords
        .route(
            "/keywords/opportunities",
            post(handlers::keywords::rank_opportunities),
        )
        // Settings
        .route(
            "/settings/auto-publish",
            get(handlers::settings::get_auto_publish).put(handlers::settings::put_auto_publish),
        )
}

/// Create the main application router
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let request_id = SetRequestIdLayer::x_request_id(MakeRequestUuid);
    let propagate_id = PropagateRequestIdLayer::x_request_id();

    let mut api = api_routes();
    if state.config.rate_limit.enabled {
        let limiter = create_rate_limiter(
            state.config.rate_limit.requests_per_second,
            state.config.rate_limit.burst,
        );
        api = api.layer(from_fn_with_state(limiter, rate_limit_middleware));
    }

    let v2 = Router::new()
        // Probes bypass the rate limiter
        .route("/health", get(handlers::health::health))
        .route("/ready", get(handlers::health::ready))
        .merge(api)
        .route_layer(from_fn(track_metrics));

    Router::new()
        .nest("/v2", v2)
        .layer(TimeoutLayer::new(state.config.request_timeout()))
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .layer(propagate_id)
        .layer(request_id)
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        body::Body,
        http::{Method, Request, StatusCode},
    };
    use chrono::{Duration, Utc};
    use contentforge_common::{
        auth::TENANT_HEADER,
        db::models::{Article, ArticleStatus, Contributor, RiskLevel, StringList},
        providers::MockGenerator,
        publish::MockPublishTarget,
        store::{ArticleStore, InMemoryStore, PipelineStore},
    };
    use http_body_util::BodyExt;
    use serde_json::{json, Value};
    use tower::ServiceExt;
    use uuid::Uuid;

    struct TestApp {
        router: Router,
        store: Arc<InMemoryStore>,
        target: Arc<MockPublishTarget>,
        tenant: Uuid,
    }

    fn test_app() -> TestApp {
        let store = Arc::new(InMemoryStore::new());
        let target = Arc::new(MockPublishTarget::new());
        let tenant = Uuid::new_v4();

        let mut config = AppConfig::default();
        config.rate_limit.enabled = false;

        let state = AppState::new(
            Arc::new(config),
            store.clone(),
            None,
            Arc::new(MockGenerator::new()),
            None,
            Some(target.clone()),
        );

        TestApp {
            router: create_router(state),
            store,
            target,
            tenant,
        }
    }

    impl TestApp {
        async fn send(&self, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
            self.send_as(self.tenant, method, uri, body).await
        }

        async fn send_as(
            &self,
            tenant: Uuid,
            method: Method,
            uri: &str,
            body: Option<Value>,
        ) -> (StatusCode, Value) {
            let builder = Request::builder()
                .method(method)
                .uri(uri)
                .header(TENANT_HEADER, tenant.to_string())
                .header("content-type", "application/json");
            let request = match body {
                Some(b) => builder.body(Body::from(b.to_string())).unwrap(),
                None => builder.body(Body::empty()).unwrap(),
            };

            let response = self.router.clone().oneshot(request).await.unwrap();
            let status = response.status();
            let bytes = response.into_body().collect().await.unwrap().to_bytes();
            let value = if bytes.is_empty() {
                Value::Null
            } else {
                serde_json::from_slice(&bytes).unwrap()
            };
            (status, value)
        }

        async fn article(&self, title: &str, status: ArticleStatus) -> Article {
            let now = Utc::now();
            let article = Article {
                id: Uuid::new_v4(),
                tenant_id: self.tenant,
                title: title.to_string(),
                slug: title.to_lowercase().replace(' ', "-"),
                content: "Body".to_string(),
                status,
                content_type: "blog_post".to_string(),
                primary_keyword: None,
                topics: StringList::from(vec!["rust".to_string()]),
                keywords: StringList::from(vec!["tokio".to_string()]),
                word_count: 1200,
                quality_score: Some(90),
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
                ready_at: Some(now - Duration::days(1)),
                scheduled_for: None,
                published_at: (status == ArticleStatus::Published).then_some(now - Duration::days(3)),
                external_post_id: None,
                external_url: None,
                created_at: now,
                updated_at: now,
            };
            self.store.insert_article(article).await.unwrap()
        }
    }

    #[tokio::test]
    async fn test_health_needs_no_tenant() {
        let app = test_app();
        let response = app
            .router
            .clone()
            .oneshot(Request::get("/v2/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers().contains_key("x-request-id"));
    }

    #[tokio::test]
    async fn test_ready_reports_memory_store() {
        let app = test_app();
        let (status, body) = app.send(Method::GET, "/v2/ready", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ready");
        assert_eq!(body["store"], "memory");
    }

    #[tokio::test]
    async fn test_missing_tenant_is_unauthorized() {
        let app = test_app();
        let response = app
            .router
            .clone()
            .oneshot(Request::get("/v2/queue/stats").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_enqueue_and_inspect_item() {
        let app = test_app();
        let article = app.article("Draft Article", ArticleStatus::Draft).await;

        let (status, body) = app
            .send(
                Method::POST,
                "/v2/queue/items",
                Some(json!({ "article_id": article.id, "priority": 5 })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["status"], "pending");
        let id = body["id"].as_str().unwrap().to_string();

        let (status, body) = app
            .send(Method::GET, &format!("/v2/queue/items/{}/position", id), None)
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["position"], 1);

        let (status, body) = app.send(Method::GET, "/v2/queue/stats", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["pending"], 1);

        let (status, body) = app
            .send(Method::GET, "/v2/queue/items?status=pending,scheduled", None)
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body.as_array().unwrap().len(), 1);

        let (status, _) = app
            .send(
                Method::PATCH,
                &format!("/v2/queue/items/{}/priority", id),
                Some(json!({ "priority": 50 })),
            )
            .await;
        assert_eq!(status, StatusCode::OK);

        let (status, body) = app
            .send(Method::POST, &format!("/v2/queue/items/{}/cancel", id), None)
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "cancelled");

        // Cancelled is terminal
        let (status, _) = app
            .send(Method::POST, &format!("/v2/queue/items/{}/retry", id), None)
            .await;
        assert_eq!(status, StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn test_enqueue_rejects_bad_input() {
        let app = test_app();

        let (status, _) = app
            .send(Method::POST, "/v2/queue/items", Some(json!({ "priority": 1 })))
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = app
            .send(Method::GET, "/v2/queue/items?status=bogus", None)
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_queue_items_are_tenant_scoped() {
        let app = test_app();
        let article = app.article("Scoped", ArticleStatus::Draft).await;
        let (_, body) = app
            .send(
                Method::POST,
                "/v2/queue/items",
                Some(json!({ "article_id": article.id })),
            )
            .await;
        let id = body["id"].as_str().unwrap().to_string();

        let (status, _) = app
            .send_as(Uuid::new_v4(), Method::GET, &format!("/v2/queue/items/{}", id), None)
            .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_pipeline_run_accepted_and_pollable() {
        let app = test_app();
        let now = Utc::now();
        app.store.put_contributor(Contributor {
            id: Uuid::new_v4(),
            tenant_id: app.tenant,
            name: "Ada".to_string(),
            voice_profile: "Plain and direct".to_string(),
            content_types: StringList::from(vec!["blog_post".to_string()]),
            is_active: true,
            created_at: now,
        });

        let (status, body) = app
            .send(
                Method::POST,
                "/v2/pipeline/runs",
                Some(json!({ "topic": "Async Rust in production", "content_type": "blog_post" })),
            )
            .await;
        assert_eq!(status, StatusCode::ACCEPTED);
        let run_id = body["run_id"].as_str().unwrap().to_string();
        assert_eq!(body["poll_url"], format!("/v2/pipeline/runs/{}", run_id));

        let (status, body) = app
            .send(Method::GET, &format!("/v2/pipeline/runs/{}", run_id), None)
            .await;
        assert_eq!(status, StatusCode::OK);
        assert!(body["progress"].as_i64().unwrap() >= 0);

        let (status, _) = app
            .send_as(
                Uuid::new_v4(),
                Method::GET,
                &format!("/v2/pipeline/runs/{}", run_id),
                None,
            )
            .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_cancel_terminal_run_conflicts() {
        let app = test_app();
        let mut input = contentforge_common::PipelineInput::new(app.tenant, "Cancel me", "blog_post");
        input.outline = Some(vec!["Intro".to_string()]);
        let run = app
            .store
            .create_run(contentforge_common::pipeline::new_run_record(&input, Utc::now()))
            .await
            .unwrap();

        let uri = format!("/v2/pipeline/runs/{}/cancel", run.id);
        let (status, body) = app.send(Method::POST, &uri, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["stage"], "ERROR");
        assert_eq!(body["cancel_requested"], true);

        let (status, _) = app.send(Method::POST, &uri, None).await;
        assert_eq!(status, StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn test_publish_decision_and_manual_publish() {
        let app = test_app();
        let article = app.article("Ready Article", ArticleStatus::Ready).await;

        // Tenant has no saved config, so auto-publish is disabled
        let (status, body) = app
            .send(
                Method::GET,
                &format!("/v2/articles/{}/publish-decision", article.id),
                None,
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["decision"], "blocked");

        let (status, body) = app
            .send(Method::POST, &format!("/v2/articles/{}/publish", article.id), None)
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "published");
        assert_eq!(app.target.requests().len(), 1);

        let (status, _) = app
            .send_as(
                Uuid::new_v4(),
                Method::POST,
                &format!("/v2/articles/{}/review", article.id),
                None,
            )
            .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_auto_publish_settings_round_trip() {
        let app = test_app();

        let (status, body) = app.send(Method::GET, "/v2/settings/auto-publish", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["enabled"], false);

        let settings = json!({
            "enabled": true,
            "minimum_quality_score": 80,
            "maximum_risk_level": "LOW",
            "require_human_review": false,
            "publishing_windows": [{ "day_of_week": 2, "start_hour": 9, "end_hour": 17 }],
            "timezone": "America/New_York",
            "default_days_after_ready": 1,
            "notify_on_publish": false
        });
        let (status, body) = app
            .send(Method::PUT, "/v2/settings/auto-publish", Some(settings.clone()))
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["tenant_id"], app.tenant.to_string());
        assert_eq!(body["minimum_quality_score"], 80);

        let mut invalid = settings;
        invalid["maximum_risk_level"] = json!("CRITICAL");
        let (status, _) = app
            .send(Method::PUT, "/v2/settings/auto-publish", Some(invalid))
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_internal_link_suggestions_and_accept() {
        let app = test_app();
        let source = app.article("Tokio Runtime Internals", ArticleStatus::Draft).await;
        let target = app.article("Tokio Runtime Tuning", ArticleStatus::Published).await;
        app.article("Unpublished Draft", ArticleStatus::Draft).await;

        let (status, body) = app
            .send(
                Method::GET,
                &format!("/v2/articles/{}/internal-links/suggestions?limit=5", source.id),
                None,
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        let suggestions = body.as_array().unwrap();
        assert_eq!(suggestions.len(), 1);
        assert_eq!(suggestions[0]["article_id"], target.id.to_string());

        let (status, body) = app
            .send(
                Method::POST,
                &format!("/v2/articles/{}/internal-links", source.id),
                Some(json!({ "target_article_id": target.id, "anchor_text": "runtime tuning" })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED);
        assert!(body["relevance_score"].as_i64().unwrap() > 0);

        let stored = app.store.get_article(target.id).await.unwrap().unwrap();
        assert_eq!(stored.times_linked_to, 1);

        // Self links are rejected
        let (status, _) = app
            .send(
                Method::POST,
                &format!("/v2/articles/{}/internal-links", source.id),
                Some(json!({ "target_article_id": source.id, "anchor_text": "self" })),
            )
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_keyword_opportunities_ranked() {
        let app = test_app();
        let (status, body) = app
            .send(
                Method::POST,
                "/v2/keywords/opportunities",
                Some(json!({
                    "keywords": [
                        { "keyword": "niche", "search_volume": 50 },
                        { "keyword": "popular", "search_volume": 20000, "keyword_difficulty": 20.0, "competition_level": 0.1 }
                    ]
                })),
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        let ranked = body.as_array().unwrap();
        assert_eq!(ranked[0]["keyword"], "popular");
        assert_eq!(ranked[0]["opportunity_score"], 90);
    }
}
