//! SeaORM entity models
//!
//! Database entities for ContentForge

mod enums;
mod json;

mod article;
mod article_internal_link;
mod auto_publish_config;
mod content_idea;
mod contributor;
mod pipeline_run;
mod queue_item;
mod tenant;
mod tenant_settings;

pub use enums::{ArticleStatus, PipelineStage, QueueStatus, RiskLevel};
pub use json::{PublishingWindow, PublishingWindows, StringList};

pub use tenant::{
    Entity as TenantEntity,
    Model as Tenant,
    ActiveModel as TenantActiveModel,
    Column as TenantColumn,
};

pub use tenant_settings::{
    Entity as TenantSettingsEntity,
    Model as TenantSettings,
    ActiveModel as TenantSettingsActiveModel,
    Column as TenantSettingsColumn,
    DEFAULT_TARGET_WORD_COUNT,
};

pub use contributor::{
    Entity as ContributorEntity,
    Model as Contributor,
    ActiveModel as ContributorActiveModel,
    Column as ContributorColumn,
};

pub use content_idea::{
    Entity as ContentIdeaEntity,
    Model as ContentIdea,
    ActiveModel as ContentIdeaActiveModel,
    Column as ContentIdeaColumn,
};

pub use queue_item::{
    Entity as QueueItemEntity,
    Model as QueueItem,
    ActiveModel as QueueItemActiveModel,
    Column as QueueItemColumn,
};

pub use pipeline_run::{
    Entity as PipelineRunEntity,
    Model as PipelineRun,
    ActiveModel as PipelineRunActiveModel,
    Column as PipelineRunColumn,
};

pub use article::{
    Entity as ArticleEntity,
    Model as Article,
    ActiveModel as ArticleActiveModel,
    Column as ArticleColumn,
};

pub use article_internal_link::{
    Entity as ArticleInternalLinkEntity,
    Model as ArticleInternalLink,
    ActiveModel as ArticleInternalLinkActiveModel,
    Column as ArticleInternalLinkColumn,
};

pub use auto_publish_config::{
    Entity as AutoPublishConfigEntity,
    Model as AutoPublishConfig,
    ActiveModel as AutoPublishConfigActiveModel,
    Column as AutoPublishConfigColumn,
};
