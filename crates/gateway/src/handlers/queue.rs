//! Generation queue handlers

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::app::AppState;
use contentforge_common::{
    auth::TenantContext,
    db::models::{QueueItem, QueueStatus},
    errors::{AppError, Result},
    queue::{NewQueueItem, QueuePosition, QueueStats},
};

/// Request to enqueue a content idea or an article for generation
#[derive(Debug, Deserialize)]
pub struct EnqueueRequest {
    pub content_idea_id: Option<Uuid>,
    pub article_id: Option<Uuid>,
    #[serde(default)]
    pub priority: i32,
    pub max_attempts: Option<i32>,
    pub scheduled_for: Option<DateTime<Utc>>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ListQuery {
    /// Comma separated statuses, e.g. `pending,scheduled`
    pub status: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct PriorityRequest {
    #[validate(range(min = -1000, max = 1000))]
    pub priority: i32,
}

/// Queue item with live progress for processing items
#[derive(Serialize)]
pub struct QueueItemResponse {
    #[serde(flatten)]
    pub item: QueueItem,
    pub estimated_progress: i32,
}

impl QueueItemResponse {
    fn new(item: QueueItem, state: &AppState) -> Self {
        let estimated_progress =
            item.estimated_progress(Utc::now(), state.queue.settings().default_avg_processing);
        Self {
            item,
            estimated_progress,
        }
    }
}

fn parse_statuses(raw: Option<&str>) -> Result<Vec<QueueStatus>> {
    let Some(raw) = raw else {
        return Ok(Vec::new());
    };
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            QueueStatus::parse(s)
                .ok_or_else(|| AppError::validation("status", format!("unknown status '{}'", s)))
        })
        .collect()
}

pub async fn stats(State(state): State<AppState>, ctx: TenantContext) -> Result<Json<QueueStats>> {
    Ok(Json(state.queue.stats(ctx.tenant_id, Utc::now()).await?))
}

pub async fn list_items(
    State(state): State<AppState>,
    ctx: TenantContext,
    Query(query): Query<ListQuery>,
) -> Result<Json<Vec<QueueItemResponse>>> {
    let statuses = parse_statuses(query.status.as_deref())?;
    let items = state.queue.list(ctx.tenant_id, &statuses).await?;
    Ok(Json(
        items
            .into_iter()
            .map(|item| QueueItemResponse::new(item, &state))
            .collect(),
    ))
}

pub async fn enqueue(
    State(state): State<AppState>,
    ctx: TenantContext,
    Json(request): Json<EnqueueRequest>,
) -> Result<(StatusCode, Json<QueueItemResponse>)> {
    let input = NewQueueItem {
        tenant_id: ctx.tenant_id,
        content_idea_id: request.content_idea_id,
        article_id: request.article_id,
        priority: request.priority,
        max_attempts: request.max_attempts,
        scheduled_for: request.scheduled_for,
    };
    let item = state.queue.enqueue(input).await?;

    tracing::info!(
        queue_item_id = %item.id,
        tenant_id = %ctx.tenant_id,
        request_id = %ctx.request_id,
        "Queue item enqueued"
    );

    Ok((StatusCode::CREATED, Json(QueueItemResponse::new(item, &state))))
}

pub async fn get_item(
    State(state): State<AppState>,
    ctx: TenantContext,
    Path(id): Path<Uuid>,
) -> Result<Json<QueueItemResponse>> {
    let item = state.queue.get(ctx.tenant_id, id).await?;
    Ok(Json(QueueItemResponse::new(item, &state)))
}

pub async fn position(
    State(state): State<AppState>,
    ctx: TenantContext,
    Path(id): Path<Uuid>,
) -> Result<Json<QueuePosition>> {
    Ok(Json(state.queue.position(ctx.tenant_id, id, Utc::now()).await?))
}

pub async fn cancel(
    State(state): State<AppState>,
    ctx: TenantContext,
    Path(id): Path<Uuid>,
) -> Result<Json<QueueItemResponse>> {
    let item = state.queue.cancel(ctx.tenant_id, id, Utc::now()).await?;
    Ok(Json(QueueItemResponse::new(item, &state)))
}

pub async fn retry(
    State(state): State<AppState>,
    ctx: TenantContext,
    Path(id): Path<Uuid>,
) -> Result<Json<QueueItemResponse>> {
    let item = state.queue.retry(ctx.tenant_id, id, Utc::now()).await?;
    Ok(Json(QueueItemResponse::new(item, &state)))
}

pub async fn set_priority(
    State(state): State<AppState>,
    ctx: TenantContext,
    Path(id): Path<Uuid>,
    Json(request): Json<PriorityRequest>,
) -> Result<Json<QueueItemResponse>> {
    request.validate()?;
    let item = state
        .queue
        .set_priority(ctx.tenant_id, id, request.priority, Utc::now())
        .await?;
    Ok(Json(QueueItemResponse::new(item, &state)))
}
