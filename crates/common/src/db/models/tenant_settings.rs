//! Per-tenant generation settings read by the pipeline's context stage

use super::json::StringList;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Target length used when neither the run input nor the tenant sets one
pub const DEFAULT_TARGET_WORD_COUNT: i32 = 1500;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "tenant_settings")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub tenant_id: Uuid,

    pub target_word_count: i32,

    #[sea_orm(column_type = "JsonBinary")]
    pub allowed_domains: StringList,

    #[sea_orm(column_type = "JsonBinary")]
    pub blocked_domains: StringList,

    #[sea_orm(column_type = "JsonBinary")]
    pub banned_phrases: StringList,

    pub default_contributor_id: Option<Uuid>,

    pub humanization_enabled: bool,

    pub humanization_aggressiveness: f32,

    pub updated_at: DateTimeUtc,
}

impl Model {
    /// Settings used for a tenant that never saved any
    pub fn defaults_for(tenant_id: Uuid) -> Self {
        Self {
            tenant_id,
            target_word_count: DEFAULT_TARGET_WORD_COUNT,
            allowed_domains: StringList::default(),
            blocked_domains: StringList::default(),
            banned_phrases: StringList::default(),
            default_contributor_id: None,
            humanization_enabled: true,
            humanization_aggressiveness: 0.5,
            updated_at: chrono::Utc::now(),
        }
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
