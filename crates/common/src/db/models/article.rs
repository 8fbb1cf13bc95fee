//! Article entity: the durable output of a completed pipeline run

use super::enums::{ArticleStatus, RiskLevel};
use super::json::StringList;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "articles")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    pub tenant_id: Uuid,

    #[sea_orm(column_type = "Text")]
    pub title: String,

    #[sea_orm(column_type = "Text")]
    pub slug: String,

    #[sea_orm(column_type = "Text")]
    pub content: String,

    pub status: ArticleStatus,

    #[sea_orm(column_type = "Text")]
    pub content_type: String,

    #[sea_orm(column_type = "Text", nullable)]
    pub primary_keyword: Option<String>,

    #[sea_orm(column_type = "JsonBinary")]
    pub topics: StringList,

    #[sea_orm(column_type = "JsonBinary")]
    pub keywords: StringList,

    pub word_count: i32,

    // Quality attributes, populated by quality checks
    pub quality_score: Option<i32>,

    pub readability_score: Option<i32>,

    pub seo_score: Option<i32>,

    /// Lower is more human-like
    pub human_score: Option<i32>,

    /// Stored assessment; computed from the scores when absent
    pub risk_level: Option<RiskLevel>,

    pub banned_phrase_hits: i32,

    pub human_reviewed: bool,

    pub contributor_id: Option<Uuid>,

    pub content_idea_id: Option<Uuid>,

    pub pipeline_run_id: Option<Uuid>,

    /// Number of internal links pointing at this article
    pub times_linked_to: i32,

    pub ready_at: Option<DateTimeUtc>,

    pub scheduled_for: Option<DateTimeUtc>,

    pub published_at: Option<DateTimeUtc>,

    #[sea_orm(column_type = "Text", nullable)]
    pub external_post_id: Option<String>,

    #[sea_orm(column_type = "Text", nullable)]
    pub external_url: Option<String>,

    pub created_at: DateTimeUtc,

    pub updated_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::tenant::Entity",
        from = "Column::TenantId",
        to = "super::tenant::Column::Id"
    )]
    Tenant,

    #[sea_orm(has_many = "super::article_internal_link::Entity")]
    InternalLinks,
}

impl Related<super::tenant::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Tenant.def()
    }
}

impl Related<super::article_internal_link::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::InternalLinks.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
