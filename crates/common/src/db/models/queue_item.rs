//! Generation queue item entity

use super::enums::QueueStatus;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "queue_items")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    pub tenant_id: Uuid,

    /// Exactly one of `content_idea_id` / `article_id` is set
    pub content_idea_id: Option<Uuid>,

    pub article_id: Option<Uuid>,

    /// Run executing (or last executed) this item
    pub pipeline_run_id: Option<Uuid>,

    /// Higher is served first
    pub priority: i32,

    pub status: QueueStatus,

    pub attempts: i32,

    pub max_attempts: i32,

    pub scheduled_for: Option<DateTimeUtc>,

    /// Only set while `status == processing`
    pub processing_started_at: Option<DateTimeUtc>,

    pub completed_at: Option<DateTimeUtc>,

    pub last_failed_at: Option<DateTimeUtc>,

    #[sea_orm(column_type = "Text", nullable)]
    pub last_error: Option<String>,

    pub created_at: DateTimeUtc,

    pub updated_at: DateTimeUtc,

    /// Bumped by every store write; compare-and-set writes match on it
    pub version: i32,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::tenant::Entity",
        from = "Column::TenantId",
        to = "super::tenant::Column::Id"
    )]
    Tenant,

    #[sea_orm(
        belongs_to = "super::content_idea::Entity",
        from = "Column::ContentIdeaId",
        to = "super::content_idea::Column::Id"
    )]
    ContentIdea,
}

impl Related<super::tenant::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Tenant.def()
    }
}

impl Related<super::content_idea::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::ContentIdea.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
