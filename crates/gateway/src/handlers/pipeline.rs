//! Pipeline run handlers

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::app::AppState;
use contentforge_common::{
    auth::TenantContext,
    db::models::{PipelineRun, PipelineStage},
    errors::{AppError, Result},
    pipeline::PipelineInput,
    store::PipelineStore,
};

/// Request to start a generation run outside the queue
#[derive(Debug, Deserialize)]
pub struct StartRunRequest {
    pub topic: String,
    pub content_type: String,
    pub primary_keyword: Option<String>,
    pub contributor_id: Option<Uuid>,
    pub target_word_count: Option<i32>,
    pub outline: Option<Vec<String>>,
    pub content_idea_id: Option<Uuid>,
    pub target_article_id: Option<Uuid>,
}

#[derive(Serialize)]
pub struct StartRunResponse {
    pub run_id: Uuid,
    pub stage: PipelineStage,
    pub progress: i32,
    pub poll_url: String,
}

async fn tenant_run(state: &AppState, tenant_id: Uuid, id: Uuid) -> Result<PipelineRun> {
    state
        .store
        .get_run(id)
        .await?
        .filter(|run| run.tenant_id == tenant_id)
        .ok_or_else(|| AppError::PipelineRunNotFound { id: id.to_string() })
}

/// Create a run and execute it in the background
pub async fn start_run(
    State(state): State<AppState>,
    ctx: TenantContext,
    Json(request): Json<StartRunRequest>,
) -> Result<(StatusCode, Json<StartRunResponse>)> {
    let input = PipelineInput {
        tenant_id: ctx.tenant_id,
        topic: request.topic,
        primary_keyword: request.primary_keyword,
        content_type: request.content_type,
        contributor_id: request.contributor_id,
        target_word_count: request.target_word_count,
        outline: request.outline,
        content_idea_id: request.content_idea_id,
        target_article_id: request.target_article_id,
        queue_item_id: None,
    };

    let run = state.orchestrator.start(input).await?;
    let run_id = run.id;

    let orchestrator = state.orchestrator.clone();
    tokio::spawn(async move {
        if let Err(e) = orchestrator.execute(run_id).await {
            tracing::warn!(run_id = %run_id, error = %e, "Background pipeline run failed");
        }
    });

    tracing::info!(
        run_id = %run_id,
        tenant_id = %ctx.tenant_id,
        request_id = %ctx.request_id,
        "Pipeline run accepted"
    );

    Ok((
        StatusCode::ACCEPTED,
        Json(StartRunResponse {
            run_id,
            stage: run.stage,
            progress: run.progress,
            poll_url: format!("/v2/pipeline/runs/{}", run_id),
        }),
    ))
}

pub async fn get_run(
    State(state): State<AppState>,
    ctx: TenantContext,
    Path(id): Path<Uuid>,
) -> Result<Json<PipelineRun>> {
    Ok(Json(tenant_run(&state, ctx.tenant_id, id).await?))
}

/// Terminate a run. The queue item driving it, if any, is cancelled too.
pub async fn cancel_run(
    State(state): State<AppState>,
    ctx: TenantContext,
    Path(id): Path<Uuid>,
) -> Result<Json<PipelineRun>> {
    let run = tenant_run(&state, ctx.tenant_id, id).await?;

    if !state.store.request_cancel(run.id).await? {
        return Err(AppError::Conflict {
            message: format!("pipeline run {} already finished", run.id),
        });
    }

    if let Some(item_id) = run.queue_item_id {
        if let Err(e) = state.queue.cancel(ctx.tenant_id, item_id, Utc::now()).await {
            tracing::warn!(run_id = %run.id, queue_item_id = %item_id, error = %e, "Queue item not cancelled");
        }
    }

    tracing::info!(run_id = %run.id, request_id = %ctx.request_id, "Pipeline run cancelled");
    Ok(Json(tenant_run(&state, ctx.tenant_id, id).await?))
}
