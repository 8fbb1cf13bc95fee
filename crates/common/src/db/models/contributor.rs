//! Contributor entity: an authorial persona with a voice profile

use super::json::StringList;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "contributors")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    pub tenant_id: Uuid,

    #[sea_orm(column_type = "Text")]
    pub name: String,

    /// Free-form style guidance passed to the generation provider
    #[sea_orm(column_type = "Text")]
    pub voice_profile: String,

    /// Content types this contributor writes
    #[sea_orm(column_type = "JsonBinary")]
    pub content_types: StringList,

    pub is_active: bool,

    pub created_at: DateTimeUtc,
}

impl Model {
    pub fn writes(&self, content_type: &str) -> bool {
        self.content_types.contains_ignore_case(content_type)
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
