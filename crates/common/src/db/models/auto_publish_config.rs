//! Per-tenant auto-publish configuration

use super::enums::RiskLevel;
use super::json::PublishingWindows;
use crate::errors::AppError;
use chrono_tz::Tz;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "auto_publish_configs")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub tenant_id: Uuid,

    pub enabled: bool,

    pub minimum_quality_score: i32,

    pub maximum_risk_level: RiskLevel,

    pub require_human_review: bool,

    #[sea_orm(column_type = "JsonBinary")]
    pub publishing_windows: PublishingWindows,

    /// IANA timezone name used to evaluate windows
    #[sea_orm(column_type = "Text")]
    pub timezone: String,

    pub default_days_after_ready: i32,

    pub notify_on_publish: bool,

    #[sea_orm(column_type = "Text", nullable)]
    pub notification_email: Option<String>,

    pub updated_at: DateTimeUtc,
}

impl Model {
    /// Conservative configuration for a tenant that never saved one:
    /// disabled, reviewed articles only.
    pub fn defaults_for(tenant_id: Uuid) -> Self {
        Self {
            tenant_id,
            enabled: false,
            minimum_quality_score: 70,
            maximum_risk_level: RiskLevel::Medium,
            require_human_review: true,
            publishing_windows: PublishingWindows::default(),
            timezone: "UTC".to_string(),
            default_days_after_ready: 0,
            notify_on_publish: false,
            notification_email: None,
            updated_at: chrono::Utc::now(),
        }
    }

    pub fn tz(&self) -> Option<Tz> {
        self.timezone.parse().ok()
    }

    /// Configs are saved whole; a config that fails here is rejected, not
    /// partially applied
    pub fn validate(&self) -> crate::errors::Result<()> {
        if !(0..=100).contains(&self.minimum_quality_score) {
            return Err(AppError::validation(
                "minimum_quality_score",
                "must be between 0 and 100",
            ));
        }
        if self.maximum_risk_level == RiskLevel::Critical {
            return Err(AppError::validation(
                "maximum_risk_level",
                "CRITICAL can never be auto-published",
            ));
        }
        if self.default_days_after_ready < 0 {
            return Err(AppError::validation(
                "default_days_after_ready",
                "must not be negative",
            ));
        }
        if self.tz().is_none() {
            return Err(AppError::validation(
                "timezone",
                format!("unknown timezone '{}'", self.timezone),
            ));
        }
        for window in &self.publishing_windows.0 {
            if window.day_of_week > 6 {
                return Err(AppError::validation(
                    "publishing_windows",
                    "day_of_week must be 0 (Sunday) to 6 (Saturday)",
                ));
            }
            if window.start_hour >= window.end_hour || window.end_hour > 24 {
                return Err(AppError::validation(
                    "publishing_windows",
                    "windows need start_hour < end_hour <= 24",
                ));
            }
        }
        if self.notify_on_publish
            && self.notification_email.as_deref().map_or(true, |e| !e.contains('@'))
        {
            return Err(AppError::validation(
                "notification_email",
                "required when notify_on_publish is set",
            ));
        }
        Ok(())
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::tenant::Entity",
        from = "Column::TenantId",
        to = "super::tenant::Column::Id"
    )]
    Tenant,
}

impl Related<super::tenant::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Tenant.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::models::PublishingWindow;

    #[test]
    fn test_defaults_are_valid() {
        assert!(Model::defaults_for(Uuid::nil()).validate().is_ok());
    }

    #[test]
    fn test_rejects_invalid_configs() {
        let base = Model::defaults_for(Uuid::nil());

        let mut c = base.clone();
        c.minimum_quality_score = 101;
        assert!(c.validate().is_err());

        let mut c = base.clone();
        c.maximum_risk_level = RiskLevel::Critical;
        assert!(c.validate().is_err());

        let mut c = base.clone();
        c.timezone = "Mars/Olympus".to_string();
        assert!(c.validate().is_err());

        let mut c = base.clone();
        c.publishing_windows = PublishingWindows(vec![PublishingWindow {
            day_of_week: 1,
            start_hour: 17,
            end_hour: 9,
        }]);
        assert!(c.validate().is_err());

        let mut c = base;
        c.notify_on_publish = true;
        assert!(c.validate().is_err());
        c.notification_email = Some("editor@example.com".to_string());
        assert!(c.validate().is_ok());
    }
}
