//! Keyword research handlers

use axum::Json;
use serde::Deserialize;
use validator::Validate;

use contentforge_common::{
    auth::TenantContext,
    errors::Result,
    scoring::{self, KeywordMetrics, KeywordOpportunity},
};

#[derive(Debug, Deserialize, Validate)]
pub struct OpportunityRequest {
    #[validate(length(min = 1, max = 500), nested)]
    pub keywords: Vec<KeywordMetrics>,
}

/// Rank supplied keyword metrics by opportunity, best first
pub async fn rank_opportunities(
    _ctx: TenantContext,
    Json(request): Json<OpportunityRequest>,
) -> Result<Json<Vec<KeywordOpportunity>>> {
    request.validate()?;
    Ok(Json(scoring::rank_opportunities(request.keywords)))
}
