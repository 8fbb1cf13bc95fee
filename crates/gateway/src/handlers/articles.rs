//! Article publishing and internal-link handlers

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use uuid::Uuid;
use validator::Validate;

use crate::app::AppState;
use contentforge_common::{
    auth::TenantContext,
    db::models::{Article, ArticleInternalLink, ArticleStatus},
    errors::{AppError, Result},
    publish::PublishDecision,
    scoring::{rank_candidates, relevance_score, LinkCandidate, LinkSource, RelevanceScore},
    store::ArticleStore,
};

const DEFAULT_SUGGESTION_LIMIT: usize = 10;
const MAX_SUGGESTION_LIMIT: usize = 50;

#[derive(Debug, Default, Deserialize)]
pub struct SuggestionQuery {
    pub limit: Option<usize>,
}

#[derive(Serialize)]
pub struct LinkSuggestion {
    pub article_id: Uuid,
    pub title: String,
    pub slug: String,
    #[serde(flatten)]
    pub relevance: RelevanceScore,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateLinkRequest {
    pub target_article_id: Uuid,
    #[validate(length(min = 1, max = 200))]
    pub anchor_text: String,
}

async fn tenant_article(state: &AppState, tenant_id: Uuid, id: Uuid) -> Result<Article> {
    state
        .store
        .get_article(id)
        .await?
        .filter(|a| a.tenant_id == tenant_id)
        .ok_or_else(|| AppError::ArticleNotFound { id: id.to_string() })
}

pub async fn publish_decision(
    State(state): State<AppState>,
    ctx: TenantContext,
    Path(id): Path<Uuid>,
) -> Result<Json<PublishDecision>> {
    Ok(Json(state.publisher.decision(ctx.tenant_id, id, Utc::now()).await?))
}

pub async fn review(
    State(state): State<AppState>,
    ctx: TenantContext,
    Path(id): Path<Uuid>,
) -> Result<Json<Article>> {
    let article = state.publisher.mark_reviewed(ctx.tenant_id, id, Utc::now()).await?;
    tracing::info!(article_id = %id, request_id = %ctx.request_id, "Article reviewed");
    Ok(Json(article))
}

/// Manual publish; bypasses the auto-publish gate
pub async fn publish(
    State(state): State<AppState>,
    ctx: TenantContext,
    Path(id): Path<Uuid>,
) -> Result<Json<Article>> {
    let article = state.publisher.publish_now(ctx.tenant_id, id, Utc::now()).await?;
    tracing::info!(article_id = %id, request_id = %ctx.request_id, "Article published manually");
    Ok(Json(article))
}

/// Published articles of the tenant ranked by relevance to this one.
/// Targets already linked from the article are skipped.
pub async fn suggest_links(
    State(state): State<AppState>,
    ctx: TenantContext,
    Path(id): Path<Uuid>,
    Query(query): Query<SuggestionQuery>,
) -> Result<Json<Vec<LinkSuggestion>>> {
    let source = tenant_article(&state, ctx.tenant_id, id).await?;
    let limit = query
        .limit
        .unwrap_or(DEFAULT_SUGGESTION_LIMIT)
        .clamp(1, MAX_SUGGESTION_LIMIT);

    let linked: HashSet<Uuid> = state
        .store
        .list_internal_links(source.id)
        .await?
        .into_iter()
        .map(|l| l.target_article_id)
        .collect();

    let candidates: Vec<LinkCandidate> = state
        .store
        .list_articles_by_status(Some(ctx.tenant_id), ArticleStatus::Published)
        .await?
        .iter()
        .filter(|a| a.id != source.id && !linked.contains(&a.id))
        .map(LinkCandidate::from)
        .collect();

    let ranked = rank_candidates(&LinkSource::from(&source), candidates, Utc::now(), limit);
    Ok(Json(
        ranked
            .into_iter()
            .map(|(candidate, relevance)| LinkSuggestion {
                article_id: candidate.article_id,
                title: candidate.title,
                slug: candidate.slug,
                relevance,
            })
            .collect(),
    ))
}

/// Accept a link suggestion, recording the relevance at acceptance time
pub async fn create_link(
    State(state): State<AppState>,
    ctx: TenantContext,
    Path(id): Path<Uuid>,
    Json(request): Json<CreateLinkRequest>,
) -> Result<(StatusCode, Json<ArticleInternalLink>)> {
    request.validate()?;
    if request.target_article_id == id {
        return Err(AppError::validation(
            "target_article_id",
            "an article cannot link to itself",
        ));
    }

    let source = tenant_article(&state, ctx.tenant_id, id).await?;
    let target = tenant_article(&state, ctx.tenant_id, request.target_article_id).await?;
    if target.status != ArticleStatus::Published {
        return Err(AppError::validation(
            "target_article_id",
            "only published articles can be linked to",
        ));
    }

    let now = Utc::now();
    let score = relevance_score(&LinkSource::from(&source), &LinkCandidate::from(&target), now);
    let link = state
        .store
        .create_internal_link(ArticleInternalLink {
            id: Uuid::new_v4(),
            tenant_id: ctx.tenant_id,
            source_article_id: source.id,
            target_article_id: target.id,
            anchor_text: request.anchor_text,
            relevance_score: score.total,
            created_at: now,
        })
        .await?;

    tracing::info!(
        source_article_id = %source.id,
        target_article_id = %target.id,
        relevance = score.total,
        "Internal link created"
    );
    Ok((StatusCode::CREATED, Json(link)))
}
