//! Tenant auto-publish settings

use axum::{extract::State, Json};
use chrono::Utc;
use serde::Deserialize;

use crate::app::AppState;
use contentforge_common::{
    auth::TenantContext,
    db::models::{AutoPublishConfig, PublishingWindows, RiskLevel},
    errors::Result,
};

/// Whole configuration; every field is replaced on save
#[derive(Debug, Deserialize)]
pub struct AutoPublishSettings {
    pub enabled: bool,
    pub minimum_quality_score: i32,
    pub maximum_risk_level: RiskLevel,
    pub require_human_review: bool,
    #[serde(default)]
    pub publishing_windows: PublishingWindows,
    pub timezone: String,
    #[serde(default)]
    pub default_days_after_ready: i32,
    #[serde(default)]
    pub notify_on_publish: bool,
    pub notification_email: Option<String>,
}

impl AutoPublishSettings {
    fn into_config(self, tenant_id: uuid::Uuid) -> AutoPublishConfig {
        AutoPublishConfig {
            tenant_id,
            enabled: self.enabled,
            minimum_quality_score: self.minimum_quality_score,
            maximum_risk_level: self.maximum_risk_level,
            require_human_review: self.require_human_review,
            publishing_windows: self.publishing_windows,
            timezone: self.timezone,
            default_days_after_ready: self.default_days_after_ready,
            notify_on_publish: self.notify_on_publish,
            notification_email: self.notification_email,
            updated_at: Utc::now(),
        }
    }
}

/// Saved settings, or the disabled defaults
pub async fn get_auto_publish(
    State(state): State<AppState>,
    ctx: TenantContext,
) -> Result<Json<AutoPublishConfig>> {
    Ok(Json(state.publisher.config(ctx.tenant_id).await?))
}

pub async fn put_auto_publish(
    State(state): State<AppState>,
    ctx: TenantContext,
    Json(settings): Json<AutoPublishSettings>,
) -> Result<Json<AutoPublishConfig>> {
    let config = state
        .publisher
        .save_config(ctx.tenant_id, settings.into_config(ctx.tenant_id))
        .await?;

    tracing::info!(
        tenant_id = %ctx.tenant_id,
        enabled = config.enabled,
        request_id = %ctx.request_id,
        "Auto-publish settings saved"
    );
    Ok(Json(config))
}
