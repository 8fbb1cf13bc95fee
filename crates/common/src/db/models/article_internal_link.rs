//! Accepted internal link between two articles

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "article_internal_links")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    pub tenant_id: Uuid,

    pub source_article_id: Uuid,

    pub target_article_id: Uuid,

    #[sea_orm(column_type = "Text")]
    pub anchor_text: String,

    /// Relevance score at the time the suggestion was accepted
    pub relevance_score: i32,

    pub created_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::article::Entity",
        from = "Column::SourceArticleId",
        to = "super::article::Column::Id"
    )]
    SourceArticle,
}

impl Related<super::article::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::SourceArticle.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
