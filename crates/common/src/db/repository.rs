//! Postgres implementation of the store traits
//!
//! Queue claims use `FOR UPDATE SKIP LOCKED` so concurrent workers never
//! pick the same row. Run writes lock the run row and re-check its state
//! inside the transaction before applying a checkpoint.

use crate::db::models::*;
use crate::db::DbPool;
use crate::errors::{AppError, Result};
use crate::store::{
    apply_failure, apply_stage_update, apply_summary, ArticleStore, PipelineStore, QueueStore,
    RunSummary, StageUpdate, CANCELLED_MESSAGE,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sea_orm::sea_query::{Expr, OnConflict};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, DatabaseTransaction,
    DbBackend, DbErr, EntityTrait, IntoActiveModel, QueryFilter, QueryOrder, QuerySelect,
    Statement, TransactionTrait,
};
use tracing::debug;
use uuid::Uuid;

/// Picks the next pending item in queue order, skipping rows other
/// transactions hold
const CLAIM_NEXT_SQL: &str = r#"
    SELECT id FROM queue_items
    WHERE status = 'pending'
    ORDER BY priority DESC, created_at ASC
    FOR UPDATE SKIP LOCKED
    LIMIT 1
"#;

const CLAIM_NEXT_FOR_TENANT_SQL: &str = r#"
    SELECT id FROM queue_items
    WHERE status = 'pending' AND tenant_id = $1
    ORDER BY priority DESC, created_at ASC
    FOR UPDATE SKIP LOCKED
    LIMIT 1
"#;

/// Repository for data access operations
#[derive(Clone)]
pub struct Repository {
    pool: DbPool,
}

impl Repository {
    /// Create a new repository with the given connection pool
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Get the read connection
    fn read_conn(&self) -> &DatabaseConnection {
        self.pool.read()
    }

    /// Get the write connection
    fn write_conn(&self) -> &DatabaseConnection {
        self.pool.write()
    }

    // ========================================================================
    // Run helpers
    // ========================================================================

    async fn lock_run(txn: &DatabaseTransaction, run_id: Uuid) -> Result<PipelineRun> {
        PipelineRunEntity::find_by_id(run_id)
            .lock_exclusive()
            .one(txn)
            .await?
            .ok_or_else(|| AppError::PipelineRunNotFound {
                id: run_id.to_string(),
            })
    }

    /// Lock the run, let `apply` decide whether to write, and persist the
    /// result in one transaction
    async fn mutate_run<F>(&self, run_id: Uuid, apply: F) -> Result<bool>
    where
        F: FnOnce(&mut PipelineRun) -> Result<bool> + Send,
    {
        let txn = self.write_conn().begin().await?;
        let mut run = Self::lock_run(&txn, run_id).await?;

        if !apply(&mut run)? {
            txn.rollback().await?;
            return Ok(false);
        }

        run.into_active_model().reset_all().update(&txn).await?;
        txn.commit().await?;
        Ok(true)
    }
}

fn not_updated(err: DbErr, not_found: AppError) -> AppError {
    match err {
        DbErr::RecordNotUpdated | DbErr::RecordNotFound(_) => not_found,
        other => AppError::Database(other),
    }
}

#[async_trait]
impl QueueStore for Repository {
    async fn insert_queue_item(&self, item: QueueItem) -> Result<QueueItem> {
        item.into_active_model()
            .reset_all()
            .insert(self.write_conn())
            .await
            .map_err(Into::into)
    }

    // Point reads feed compare-and-set writes, so they go to the primary
    async fn get_queue_item(&self, id: Uuid) -> Result<Option<QueueItem>> {
        QueueItemEntity::find_by_id(id)
            .one(self.write_conn())
            .await
            .map_err(Into::into)
    }

    async fn list_queue_items(&self, tenant_id: Uuid) -> Result<Vec<QueueItem>> {
        QueueItemEntity::find()
            .filter(QueueItemColumn::TenantId.eq(tenant_id))
            .order_by_desc(QueueItemColumn::Priority)
            .order_by_asc(QueueItemColumn::CreatedAt)
            .all(self.read_conn())
            .await
            .map_err(Into::into)
    }

    async fn update_queue_item_if(&self, mut item: QueueItem) -> Result<Option<QueueItem>> {
        let id = item.id;
        let expected = item.version;
        item.version = expected + 1;
        let result = QueueItemEntity::update_many()
            .set(item.clone().into_active_model().reset_all())
            .filter(QueueItemColumn::Id.eq(id))
            .filter(QueueItemColumn::Version.eq(expected))
            .exec(self.write_conn())
            .await?;

        if result.rows_affected == 1 {
            return Ok(Some(item));
        }
        match self.get_queue_item(id).await? {
            Some(current) => {
                debug!(item_id = %id, expected, actual = current.version, "Conditional update lost");
                Ok(None)
            }
            None => Err(AppError::QueueItemNotFound { id: id.to_string() }),
        }
    }

    async fn claim_next(
        &self,
        tenant_id: Option<Uuid>,
        now: DateTime<Utc>,
    ) -> Result<Option<QueueItem>> {
        let txn = self.write_conn().begin().await?;

        let stmt = match tenant_id {
            Some(tenant) => Statement::from_sql_and_values(
                DbBackend::Postgres,
                CLAIM_NEXT_FOR_TENANT_SQL,
                vec![tenant.into()],
            ),
            None => Statement::from_string(DbBackend::Postgres, CLAIM_NEXT_SQL.to_string()),
        };
        let Some(row) = txn.query_one(stmt).await? else {
            txn.rollback().await?;
            return Ok(None);
        };
        let id: Uuid = row.try_get_by_index(0)?;

        let Some(mut item) = QueueItemEntity::find_by_id(id).one(&txn).await? else {
            txn.rollback().await?;
            return Ok(None);
        };
        item.start_processing(now)?;
        item.version += 1;
        let item = item.into_active_model().reset_all().update(&txn).await?;
        txn.commit().await?;

        debug!(item_id = %item.id, "Queue item claimed");
        Ok(Some(item))
    }

    async fn claim(&self, id: Uuid, now: DateTime<Utc>) -> Result<Option<QueueItem>> {
        let txn = self.write_conn().begin().await?;
        let item = QueueItemEntity::find_by_id(id)
            .lock_exclusive()
            .one(&txn)
            .await?
            .ok_or_else(|| AppError::QueueItemNotFound { id: id.to_string() })?;

        if item.status != QueueStatus::Pending {
            txn.rollback().await?;
            return Ok(None);
        }

        let mut item = item;
        item.start_processing(now)?;
        item.version += 1;
        let item = item.into_active_model().reset_all().update(&txn).await?;
        txn.commit().await?;
        Ok(Some(item))
    }

    async fn find_processing(&self) -> Result<Vec<QueueItem>> {
        QueueItemEntity::find()
            .filter(QueueItemColumn::Status.eq(QueueStatus::Processing))
            .all(self.read_conn())
            .await
            .map_err(Into::into)
    }

    async fn find_due_scheduled(&self, now: DateTime<Utc>) -> Result<Vec<QueueItem>> {
        QueueItemEntity::find()
            .filter(QueueItemColumn::Status.eq(QueueStatus::Scheduled))
            .filter(
                QueueItemColumn::ScheduledFor
                    .is_null()
                    .or(QueueItemColumn::ScheduledFor.lte(now)),
            )
            .all(self.read_conn())
            .await
            .map_err(Into::into)
    }

    async fn find_failed(&self) -> Result<Vec<QueueItem>> {
        QueueItemEntity::find()
            .filter(QueueItemColumn::Status.eq(QueueStatus::Failed))
            .all(self.read_conn())
            .await
            .map_err(Into::into)
    }
}

#[async_trait]
impl PipelineStore for Repository {
    async fn create_run(&self, run: PipelineRun) -> Result<PipelineRun> {
        run.into_active_model()
            .reset_all()
            .insert(self.write_conn())
            .await
            .map_err(Into::into)
    }

    async fn get_run(&self, id: Uuid) -> Result<Option<PipelineRun>> {
        PipelineRunEntity::find_by_id(id)
            .one(self.write_conn())
            .await
            .map_err(Into::into)
    }

    async fn record_stage(&self, run_id: Uuid, update: StageUpdate) -> Result<bool> {
        self.mutate_run(run_id, move |run| {
            if run.is_terminal() || run.cancel_requested {
                return Ok(false);
            }
            apply_stage_update(run, update, Utc::now())?;
            Ok(true)
        })
        .await
    }

    async fn fail_run(&self, run_id: Uuid, error: &str) -> Result<bool> {
        let error = error.to_string();
        self.mutate_run(run_id, move |run| {
            if run.is_terminal() {
                return Ok(false);
            }
            apply_failure(run, &error, Utc::now());
            Ok(true)
        })
        .await
    }

    async fn request_cancel(&self, run_id: Uuid) -> Result<bool> {
        self.mutate_run(run_id, |run| {
            if run.is_terminal() {
                return Ok(false);
            }
            run.cancel_requested = true;
            apply_failure(run, CANCELLED_MESSAGE, Utc::now());
            Ok(true)
        })
        .await
    }

    async fn is_cancel_requested(&self, run_id: Uuid) -> Result<bool> {
        let run = PipelineRunEntity::find_by_id(run_id)
            .one(self.write_conn())
            .await?;
        Ok(run.map(|r| r.cancel_requested).unwrap_or(false))
    }

    async fn complete_run(&self, run_id: Uuid, summary: RunSummary) -> Result<bool> {
        self.mutate_run(run_id, move |run| {
            if run.is_terminal() || run.cancel_requested {
                return Ok(false);
            }
            apply_summary(run, summary, Utc::now());
            Ok(true)
        })
        .await
    }

    async fn find_stale_runs(&self, older_than: DateTime<Utc>) -> Result<Vec<PipelineRun>> {
        PipelineRunEntity::find()
            .filter(
                PipelineRunColumn::Stage
                    .is_not_in([PipelineStage::Complete, PipelineStage::Error]),
            )
            .filter(PipelineRunColumn::UpdatedAt.lt(older_than))
            .all(self.read_conn())
            .await
            .map_err(Into::into)
    }

    async fn get_tenant_settings(&self, tenant_id: Uuid) -> Result<Option<TenantSettings>> {
        TenantSettingsEntity::find_by_id(tenant_id)
            .one(self.read_conn())
            .await
            .map_err(Into::into)
    }

    async fn get_contributor(&self, id: Uuid) -> Result<Option<Contributor>> {
        ContributorEntity::find_by_id(id)
            .one(self.read_conn())
            .await
            .map_err(Into::into)
    }

    async fn list_contributors(&self, tenant_id: Uuid) -> Result<Vec<Contributor>> {
        ContributorEntity::find()
            .filter(ContributorColumn::TenantId.eq(tenant_id))
            .order_by_asc(ContributorColumn::CreatedAt)
            .order_by_asc(ContributorColumn::Id)
            .all(self.read_conn())
            .await
            .map_err(Into::into)
    }

    async fn get_content_idea(&self, id: Uuid) -> Result<Option<ContentIdea>> {
        ContentIdeaEntity::find_by_id(id)
            .one(self.read_conn())
            .await
            .map_err(Into::into)
    }

    async fn link_content_idea(&self, idea_id: Uuid, article_id: Uuid) -> Result<()> {
        let result = ContentIdeaEntity::update_many()
            .col_expr(ContentIdeaColumn::ArticleId, Expr::value(Some(article_id)))
            .col_expr(ContentIdeaColumn::UpdatedAt, Expr::value(Utc::now()))
            .filter(ContentIdeaColumn::Id.eq(idea_id))
            .exec(self.write_conn())
            .await?;

        if result.rows_affected == 0 {
            return Err(AppError::NotFound {
                resource_type: "content_idea".to_string(),
                id: idea_id.to_string(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl ArticleStore for Repository {
    async fn insert_article(&self, article: Article) -> Result<Article> {
        article
            .into_active_model()
            .reset_all()
            .insert(self.write_conn())
            .await
            .map_err(Into::into)
    }

    async fn get_article(&self, id: Uuid) -> Result<Option<Article>> {
        ArticleEntity::find_by_id(id)
            .one(self.read_conn())
            .await
            .map_err(Into::into)
    }

    async fn update_article(&self, article: Article) -> Result<Article> {
        let id = article.id;
        article
            .into_active_model()
            .reset_all()
            .update(self.write_conn())
            .await
            .map_err(|e| not_updated(e, AppError::ArticleNotFound { id: id.to_string() }))
    }

    async fn list_articles_by_status(
        &self,
        tenant_id: Option<Uuid>,
        status: ArticleStatus,
    ) -> Result<Vec<Article>> {
        let mut query = ArticleEntity::find().filter(ArticleColumn::Status.eq(status));
        if let Some(tenant) = tenant_id {
            query = query.filter(ArticleColumn::TenantId.eq(tenant));
        }
        query
            .order_by_asc(ArticleColumn::CreatedAt)
            .order_by_asc(ArticleColumn::Id)
            .all(self.read_conn())
            .await
            .map_err(Into::into)
    }

    async fn get_auto_publish_config(&self, tenant_id: Uuid) -> Result<Option<AutoPublishConfig>> {
        AutoPublishConfigEntity::find_by_id(tenant_id)
            .one(self.read_conn())
            .await
            .map_err(Into::into)
    }

    async fn save_auto_publish_config(
        &self,
        config: AutoPublishConfig,
    ) -> Result<AutoPublishConfig> {
        AutoPublishConfigEntity::insert(config.clone().into_active_model().reset_all())
            .on_conflict(
                OnConflict::column(AutoPublishConfigColumn::TenantId)
                    .update_columns([
                        AutoPublishConfigColumn::Enabled,
                        AutoPublishConfigColumn::MinimumQualityScore,
                        AutoPublishConfigColumn::MaximumRiskLevel,
                        AutoPublishConfigColumn::RequireHumanReview,
                        AutoPublishConfigColumn::PublishingWindows,
                        AutoPublishConfigColumn::Timezone,
                        AutoPublishConfigColumn::DefaultDaysAfterReady,
                        AutoPublishConfigColumn::NotifyOnPublish,
                        AutoPublishConfigColumn::NotificationEmail,
                        AutoPublishConfigColumn::UpdatedAt,
                    ])
                    .to_owned(),
            )
            .exec(self.write_conn())
            .await?;
        Ok(config)
    }

    async fn create_internal_link(
        &self,
        link: ArticleInternalLink,
    ) -> Result<ArticleInternalLink> {
        let txn = self.write_conn().begin().await?;

        let bumped = ArticleEntity::update_many()
            .col_expr(
                ArticleColumn::TimesLinkedTo,
                Expr::col(ArticleColumn::TimesLinkedTo).add(1),
            )
            .filter(ArticleColumn::Id.eq(link.target_article_id))
            .exec(&txn)
            .await?;
        if bumped.rows_affected == 0 {
            txn.rollback().await?;
            return Err(AppError::ArticleNotFound {
                id: link.target_article_id.to_string(),
            });
        }

        let link = link.into_active_model().reset_all().insert(&txn).await?;
        txn.commit().await?;
        Ok(link)
    }

    async fn list_internal_links(
        &self,
        source_article_id: Uuid,
    ) -> Result<Vec<ArticleInternalLink>> {
        ArticleInternalLinkEntity::find()
            .filter(ArticleInternalLinkColumn::SourceArticleId.eq(source_article_id))
            .order_by_desc(ArticleInternalLinkColumn::RelevanceScore)
            .all(self.read_conn())
            .await
            .map_err(Into::into)
    }
}
