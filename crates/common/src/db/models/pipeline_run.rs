//! Pipeline run entity

use super::enums::PipelineStage;
use super::json::StringList;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "pipeline_runs")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    pub tenant_id: Uuid,

    pub queue_item_id: Option<Uuid>,

    pub content_idea_id: Option<Uuid>,

    /// Existing article being regenerated, if any
    pub target_article_id: Option<Uuid>,

    // Input
    #[sea_orm(column_type = "Text")]
    pub topic: String,

    #[sea_orm(column_type = "Text", nullable)]
    pub primary_keyword: Option<String>,

    #[sea_orm(column_type = "Text")]
    pub content_type: String,

    pub contributor_id: Option<Uuid>,

    pub target_word_count: Option<i32>,

    // Progress
    pub stage: PipelineStage,

    pub progress: i32,

    // Output, populated stage by stage
    #[sea_orm(column_type = "JsonBinary", nullable)]
    pub outline: Option<StringList>,

    #[sea_orm(column_type = "Text", nullable)]
    pub draft_content: Option<String>,

    #[sea_orm(column_type = "Text", nullable)]
    pub content: Option<String>,

    pub quality_score: Option<i32>,

    #[sea_orm(column_type = "JsonBinary")]
    pub banned_phrase_hits: StringList,

    pub article_id: Option<Uuid>,

    pub tokens_used: i64,

    pub estimated_cost: f64,

    pub duration_ms: Option<i64>,

    #[sea_orm(column_type = "Text", nullable)]
    pub error: Option<String>,

    pub cancel_requested: bool,

    pub created_at: DateTimeUtc,

    pub updated_at: DateTimeUtc,

    pub completed_at: Option<DateTimeUtc>,
}

impl Model {
    pub fn is_terminal(&self) -> bool {
        self.stage.is_terminal()
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
