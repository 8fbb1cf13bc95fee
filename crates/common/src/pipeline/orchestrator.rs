//! Sequential stage machine driving one generation run
//!
//! Each run is a single non-reentrant flow. Suspension points are the
//! provider calls and store writes; every write is preceded by a
//! cancellation check and is itself conditional on the run being live, so
//! a cancelled run never moves again.

use super::error::PipelineError;
use super::prompts::{
    draft_prompt, extract_title, find_banned_phrases, outline_prompt, parse_outline, slugify,
    PromptContext,
};
use super::quality::{count_words, quality_score};
use super::{new_run_record, PipelineInput};
use crate::config::GenerationConfig;
use crate::db::models::*;
use crate::metrics;
use crate::providers::{idempotency_key, Generation, Humanizer, ModelConfig, Prompt, TextGenerator};
use crate::store::{apply_stage_update, ContentStore, RunSummary, StageUpdate};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;
use validator::Validate;

/// Model parameters and pricing for runs
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineSettings {
    pub model: ModelConfig,
    pub cost_per_1k_tokens: f64,
}

impl From<&GenerationConfig> for PipelineSettings {
    fn from(config: &GenerationConfig) -> Self {
        Self {
            model: ModelConfig::from(config),
            cost_per_1k_tokens: config.cost_per_1k_tokens,
        }
    }
}

/// Result of a completed run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineOutcome {
    pub run_id: Uuid,
    pub article_id: Uuid,
    pub quality_score: Option<i32>,
    pub banned_phrase_hits: Vec<String>,
    pub tokens_used: i64,
    pub estimated_cost: f64,
    pub duration_ms: i64,
}

impl PipelineOutcome {
    fn from_run(run: &PipelineRun, article_id: Uuid) -> Self {
        Self {
            run_id: run.id,
            article_id,
            quality_score: run.quality_score,
            banned_phrase_hits: run.banned_phrase_hits.0.clone(),
            tokens_used: run.tokens_used,
            estimated_cost: run.estimated_cost,
            duration_ms: run.duration_ms.unwrap_or_default(),
        }
    }
}

#[derive(Clone)]
pub struct PipelineOrchestrator {
    store: Arc<dyn ContentStore>,
    generator: Arc<dyn TextGenerator>,
    humanizer: Option<Arc<dyn Humanizer>>,
    settings: PipelineSettings,
}

impl PipelineOrchestrator {
    pub fn new(
        store: Arc<dyn ContentStore>,
        generator: Arc<dyn TextGenerator>,
        humanizer: Option<Arc<dyn Humanizer>>,
        settings: PipelineSettings,
    ) -> Self {
        Self {
            store,
            generator,
            humanizer,
            settings,
        }
    }

    /// Validate input and persist a new run in `INITIALIZING`
    #[instrument(skip(self, input), fields(tenant_id = %input.tenant_id))]
    pub async fn start(&self, input: PipelineInput) -> Result<PipelineRun, PipelineError> {
        input
            .validate()
            .map_err(|e| PipelineError::InvalidInput(e.to_string()))?;
        self.check_references(&input).await?;

        let run = self.store.create_run(new_run_record(&input, Utc::now())).await?;
        info!(run_id = %run.id, topic = %run.topic, "Pipeline run created");
        Ok(run)
    }

    /// Referenced idea and article must exist within the run's tenant
    async fn check_references(&self, input: &PipelineInput) -> Result<(), PipelineError> {
        if let Some(idea_id) = input.content_idea_id {
            let idea = self.store.get_content_idea(idea_id).await?;
            if idea.map_or(true, |i| i.tenant_id != input.tenant_id) {
                return Err(PipelineError::InvalidInput(format!(
                    "content idea {} not found",
                    idea_id
                )));
            }
        }
        if let Some(article_id) = input.target_article_id {
            let article = self.store.get_article(article_id).await?;
            if article.map_or(true, |a| a.tenant_id != input.tenant_id) {
                return Err(PipelineError::InvalidInput(format!(
                    "article {} not found",
                    article_id
                )));
            }
        }
        Ok(())
    }

    /// Start and execute in one call
    pub async fn run(&self, input: PipelineInput) -> Result<PipelineOutcome, PipelineError> {
        let run = self.start(input).await?;
        self.execute(run.id).await
    }

    /// Drive a run to a terminal stage. A non-terminal run resumes from its
    /// persisted outline, draft and content.
    #[instrument(skip(self), fields(run_id = %run_id))]
    pub async fn execute(&self, run_id: Uuid) -> Result<PipelineOutcome, PipelineError> {
        let run = self
            .store
            .get_run(run_id)
            .await?
            .ok_or(PipelineError::RunNotFound(run_id))?;

        match (run.stage, run.article_id) {
            (PipelineStage::Complete, Some(article_id)) => {
                return Ok(PipelineOutcome::from_run(&run, article_id));
            }
            (PipelineStage::Error, _) if run.cancel_requested => {
                return Err(PipelineError::Cancelled);
            }
            (PipelineStage::Complete, None) | (PipelineStage::Error, _) => {
                return Err(PipelineError::AlreadyFailed(run.error.unwrap_or_default()));
            }
            _ => {}
        }

        let started = Instant::now();
        match self.run_stages(run, started).await {
            Ok(outcome) => {
                metrics::record_run_outcome("complete");
                info!(
                    article_id = %outcome.article_id,
                    tokens_used = outcome.tokens_used,
                    duration_ms = outcome.duration_ms,
                    "Pipeline run complete"
                );
                Ok(outcome)
            }
            Err(PipelineError::Cancelled) => {
                metrics::record_run_outcome("cancelled");
                info!("Pipeline run cancelled");
                Err(PipelineError::Cancelled)
            }
            Err(e) => {
                if let Err(store_err) = self.store.fail_run(run_id, &e.to_string()).await {
                    error!(error = %store_err, "Failed to record pipeline failure");
                }
                metrics::record_run_outcome("error");
                warn!(error = %e, retryable = e.is_retryable(), "Pipeline run failed");
                Err(e)
            }
        }
    }

    async fn ensure_not_cancelled(&self, run_id: Uuid) -> Result<(), PipelineError> {
        if self.store.is_cancel_requested(run_id).await? {
            return Err(PipelineError::Cancelled);
        }
        Ok(())
    }

    /// Persist `update` and mirror it onto the local copy. Stages a resumed
    /// run already passed are not re-entered.
    async fn checkpoint(&self, run: &mut PipelineRun, mut update: StageUpdate) -> Result<(), PipelineError> {
        self.ensure_not_cancelled(run.id).await?;

        if update
            .stage
            .is_some_and(|s| s.progress() < run.stage.progress())
        {
            update.stage = None;
        }
        if update == StageUpdate::default() {
            return Ok(());
        }

        if !self.store.record_stage(run.id, update.clone()).await? {
            return Err(PipelineError::Cancelled);
        }
        apply_stage_update(run, update, Utc::now())?;
        Ok(())
    }

    async fn enter(&self, run: &mut PipelineRun, stage: PipelineStage) -> Result<Instant, PipelineError> {
        self.checkpoint(run, StageUpdate::enter(stage)).await?;
        debug!(stage = %stage, progress = run.progress, "Entered stage");
        Ok(Instant::now())
    }

    async fn generate(&self, run_id: Uuid, stage: PipelineStage, prompt: Prompt) -> Result<Generation, PipelineError> {
        self.generator
            .generate(&prompt, &self.settings.model, &idempotency_key(run_id, stage))
            .await
            .map_err(PipelineError::Provider)
    }

    async fn run_stages(&self, mut run: PipelineRun, started: Instant) -> Result<PipelineOutcome, PipelineError> {
        let mut tokens_used = run.tokens_used;

        // GATHERING_CONTEXT
        let t = self.enter(&mut run, PipelineStage::GatheringContext).await?;
        let settings = self
            .store
            .get_tenant_settings(run.tenant_id)
            .await?
            .unwrap_or_else(|| TenantSettings::defaults_for(run.tenant_id));
        let target_word_count = run
            .target_word_count
            .filter(|t| *t > 0)
            .unwrap_or(settings.target_word_count);
        let banned_phrases: Vec<String> = settings.banned_phrases.0.clone();
        self.checkpoint(
            &mut run,
            StageUpdate {
                target_word_count: Some(target_word_count),
                ..Default::default()
            },
        )
        .await?;
        metrics::record_stage(PipelineStage::GatheringContext.as_str(), t.elapsed().as_secs_f64());

        // SELECTING_CONTRIBUTOR
        let t = self.enter(&mut run, PipelineStage::SelectingContributor).await?;
        let contributor = self.select_contributor(&run, &settings).await?;
        self.checkpoint(
            &mut run,
            StageUpdate {
                contributor_id: Some(contributor.id),
                ..Default::default()
            },
        )
        .await?;
        debug!(contributor_id = %contributor.id, "Contributor selected");
        metrics::record_stage(PipelineStage::SelectingContributor.as_str(), t.elapsed().as_secs_f64());

        let topic = run.topic.clone();
        let primary_keyword = run.primary_keyword.clone();
        let content_type = run.content_type.clone();
        let ctx = PromptContext {
            topic: &topic,
            primary_keyword: primary_keyword.as_deref(),
            content_type: &content_type,
            voice_profile: Some(contributor.voice_profile.as_str()).filter(|v| !v.trim().is_empty()),
            target_word_count,
        };

        // GENERATING_OUTLINE
        let t = self.enter(&mut run, PipelineStage::GeneratingOutline).await?;
        let outline: Vec<String> = match run.outline.clone().filter(|o| !o.is_empty()) {
            Some(existing) => existing.into(),
            None => {
                let generation = self
                    .generate(run.id, PipelineStage::GeneratingOutline, outline_prompt(&ctx))
                    .await?;
                let outline = parse_outline(&generation.text);
                if outline.is_empty() {
                    return Err(PipelineError::EmptyOutput("outline"));
                }
                tokens_used += generation.tokens_used as i64;
                self.checkpoint(
                    &mut run,
                    StageUpdate {
                        outline: Some(outline.clone()),
                        tokens_used: Some(tokens_used),
                        ..Default::default()
                    },
                )
                .await?;
                outline
            }
        };
        metrics::record_stage(PipelineStage::GeneratingOutline.as_str(), t.elapsed().as_secs_f64());

        // DRAFTING
        let t = self.enter(&mut run, PipelineStage::Drafting).await?;
        let (draft, banned_hits) = match run.draft_content.clone() {
            Some(draft) => (draft, run.banned_phrase_hits.0.clone()),
            None => {
                let generation = self
                    .generate(
                        run.id,
                        PipelineStage::Drafting,
                        draft_prompt(&ctx, &outline, &banned_phrases),
                    )
                    .await?;
                if generation.text.trim().is_empty() {
                    return Err(PipelineError::EmptyOutput("draft"));
                }
                tokens_used += generation.tokens_used as i64;

                // Flagged for review, not rejected
                let hits = find_banned_phrases(&generation.text, &banned_phrases);
                if !hits.is_empty() {
                    warn!(hits = ?hits, "Draft contains banned phrases");
                }
                self.checkpoint(
                    &mut run,
                    StageUpdate {
                        draft_content: Some(generation.text.clone()),
                        banned_phrase_hits: Some(hits.clone()),
                        tokens_used: Some(tokens_used),
                        ..Default::default()
                    },
                )
                .await?;
                (generation.text, hits)
            }
        };
        metrics::record_stage(PipelineStage::Drafting.as_str(), t.elapsed().as_secs_f64());

        // HUMANIZING
        let t = self.enter(&mut run, PipelineStage::Humanizing).await?;
        let content = match run.content.clone() {
            Some(content) => content,
            None => {
                let content = match self.humanizer.as_ref().filter(|_| settings.humanization_enabled) {
                    Some(humanizer) => humanizer
                        .rewrite(
                            &draft,
                            settings.humanization_aggressiveness,
                            &idempotency_key(run.id, PipelineStage::Humanizing),
                        )
                        .await
                        .map_err(PipelineError::Provider)?,
                    None => draft.clone(),
                };
                self.checkpoint(
                    &mut run,
                    StageUpdate {
                        content: Some(content.clone()),
                        ..Default::default()
                    },
                )
                .await?;
                content
            }
        };
        metrics::record_stage(PipelineStage::Humanizing.as_str(), t.elapsed().as_secs_f64());

        // QUALITY_CHECK
        let t = self.enter(&mut run, PipelineStage::QualityCheck).await?;
        let quality = quality_score(&content, target_word_count);
        self.checkpoint(
            &mut run,
            StageUpdate {
                quality_score: Some(quality),
                ..Default::default()
            },
        )
        .await?;
        metrics::record_stage(PipelineStage::QualityCheck.as_str(), t.elapsed().as_secs_f64());

        // FINALIZING
        let t = self.enter(&mut run, PipelineStage::Finalizing).await?;
        let article_id = match run.article_id {
            Some(id) => id,
            None => {
                let id = self
                    .persist_article(&run, &content, quality, &banned_hits, contributor.id)
                    .await?;
                self.checkpoint(
                    &mut run,
                    StageUpdate {
                        article_id: Some(id),
                        ..Default::default()
                    },
                )
                .await?;
                id
            }
        };
        if let Some(idea_id) = run.content_idea_id {
            self.ensure_not_cancelled(run.id).await?;
            self.store.link_content_idea(idea_id, article_id).await?;
        }
        metrics::record_stage(PipelineStage::Finalizing.as_str(), t.elapsed().as_secs_f64());

        // COMPLETE
        let summary = RunSummary {
            article_id,
            tokens_used,
            estimated_cost: tokens_used as f64 * self.settings.cost_per_1k_tokens / 1000.0,
            duration_ms: started.elapsed().as_millis() as i64,
        };
        self.ensure_not_cancelled(run.id).await?;
        if !self.store.complete_run(run.id, summary.clone()).await? {
            return Err(PipelineError::Cancelled);
        }

        Ok(PipelineOutcome {
            run_id: run.id,
            article_id,
            quality_score: Some(quality),
            banned_phrase_hits: banned_hits,
            tokens_used: summary.tokens_used,
            estimated_cost: summary.estimated_cost,
            duration_ms: summary.duration_ms,
        })
    }

    /// Explicit contributor, else the first active one writing this content
    /// type, else the tenant default
    async fn select_contributor(
        &self,
        run: &PipelineRun,
        settings: &TenantSettings,
    ) -> Result<Contributor, PipelineError> {
        if let Some(id) = run.contributor_id {
            return match self.store.get_contributor(id).await? {
                Some(c) if c.tenant_id == run.tenant_id => Ok(c),
                _ => Err(PipelineError::NoContributor),
            };
        }

        let contributors = self.store.list_contributors(run.tenant_id).await?;
        if let Some(c) = contributors
            .iter()
            .find(|c| c.is_active && c.writes(&run.content_type))
        {
            return Ok(c.clone());
        }

        if let Some(default_id) = settings.default_contributor_id {
            if let Some(c) = contributors.into_iter().find(|c| c.id == default_id) {
                return Ok(c);
            }
        }
        Err(PipelineError::NoContributor)
    }

    /// Create the draft article, or rewrite the target article in place
    async fn persist_article(
        &self,
        run: &PipelineRun,
        content: &str,
        quality: i32,
        banned_hits: &[String],
        contributor_id: Uuid,
    ) -> Result<Uuid, PipelineError> {
        self.ensure_not_cancelled(run.id).await?;

        let now = Utc::now();
        let title = extract_title(content, &run.topic);
        let word_count = count_words(content) as i32;

        if let Some(target_id) = run.target_article_id {
            let mut article = self
                .store
                .get_article(target_id)
                .await?
                .filter(|a| a.tenant_id == run.tenant_id)
                .ok_or_else(|| PipelineError::InvalidInput(format!("article {} not found", target_id)))?;

            article.title = title;
            article.content = content.to_string();
            article.word_count = word_count;
            article.quality_score = Some(quality);
            article.banned_phrase_hits = banned_hits.len() as i32;
            article.risk_level = None;
            article.human_reviewed = false;
            article.contributor_id = Some(contributor_id);
            article.pipeline_run_id = Some(run.id);
            if article.status.can_transition_to(ArticleStatus::Draft) {
                article.status = ArticleStatus::Draft;
            }
            article.updated_at = now;

            let article = self.store.update_article(article).await?;
            info!(article_id = %article.id, "Article regenerated");
            return Ok(article.id);
        }

        let article = Article {
            id: Uuid::new_v4(),
            tenant_id: run.tenant_id,
            slug: slugify(&title),
            title,
            content: content.to_string(),
            status: ArticleStatus::Draft,
            content_type: run.content_type.clone(),
            primary_keyword: run.primary_keyword.clone(),
            topics: StringList(vec![run.topic.clone()]),
            keywords: StringList(run.primary_keyword.clone().into_iter().collect()),
            word_count,
            quality_score: Some(quality),
            readability_score: None,
            seo_score: None,
            human_score: None,
            risk_level: None,
            banned_phrase_hits: banned_hits.len() as i32,
            human_reviewed: false,
            contributor_id: Some(contributor_id),
            content_idea_id: run.content_idea_id,
            pipeline_run_id: Some(run.id),
            times_linked_to: 0,
            ready_at: None,
            scheduled_for: None,
            published_at: None,
            external_post_id: None,
            external_url: None,
            created_at: now,
            updated_at: now,
        };

        let article = self.store.insert_article(article).await?;
        info!(article_id = %article.id, slug = %article.slug, "Article created");
        Ok(article.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GenerationConfig;
    use crate::providers::{MockGenerator, MockHumanizer, PromptKind};
    use crate::store::{ArticleStore, InMemoryStore, PipelineStore};

    struct Fixture {
        store: Arc<InMemoryStore>,
        tenant_id: Uuid,
        contributor_id: Uuid,
    }

    fn fixture() -> Fixture {
        let store = Arc::new(InMemoryStore::new());
        let tenant_id = Uuid::new_v4();
        let contributor_id = Uuid::new_v4();

        let mut settings = TenantSettings::defaults_for(tenant_id);
        settings.target_word_count = 200;
        settings.banned_phrases = StringList(vec!["game changer".to_string()]);
        store.put_tenant_settings(settings);

        store.put_contributor(Contributor {
            id: contributor_id,
            tenant_id,
            name: "Ada".to_string(),
            voice_profile: "Precise and warm".to_string(),
            content_types: StringList(vec!["blog_post".to_string()]),
            is_active: true,
            created_at: Utc::now(),
        });

        Fixture {
            store,
            tenant_id,
            contributor_id,
        }
    }

    fn orchestrator(
        store: &Arc<InMemoryStore>,
        generator: Arc<MockGenerator>,
        humanizer: Option<Arc<MockHumanizer>>,
    ) -> PipelineOrchestrator {
        PipelineOrchestrator::new(
            store.clone(),
            generator,
            humanizer.map(|h| h as Arc<dyn Humanizer>),
            PipelineSettings::from(&GenerationConfig::default()),
        )
    }

    #[tokio::test]
    async fn test_full_run_creates_draft_article() {
        let fx = fixture();
        let humanizer = Arc::new(MockHumanizer::new());
        let orch = orchestrator(&fx.store, Arc::new(MockGenerator::new()), Some(humanizer.clone()));

        let outcome = orch
            .run(PipelineInput::new(fx.tenant_id, "Async Rust", "blog_post"))
            .await
            .unwrap();

        let run = fx.store.get_run(outcome.run_id).await.unwrap().unwrap();
        assert_eq!(run.stage, PipelineStage::Complete);
        assert_eq!(run.progress, 100);
        assert_eq!(run.contributor_id, Some(fx.contributor_id));
        assert_eq!(run.outline.as_ref().map(|o| o.len()), Some(4));
        assert!(run.tokens_used > 0);
        assert!(run.estimated_cost > 0.0);
        assert_eq!(humanizer.calls(), 1);

        let article = fx.store.get_article(outcome.article_id).await.unwrap().unwrap();
        assert_eq!(article.status, ArticleStatus::Draft);
        assert_eq!(article.quality_score, Some(100));
        assert_eq!(article.title, "Async Rust");
        assert_eq!(article.pipeline_run_id, Some(run.id));
    }

    #[tokio::test]
    async fn test_drafting_failure_keeps_checkpoint() {
        let fx = fixture();
        let orch = orchestrator(
            &fx.store,
            Arc::new(MockGenerator::failing_on(PromptKind::Draft)),
            None,
        );

        let run = orch
            .start(PipelineInput::new(fx.tenant_id, "Async Rust", "blog_post"))
            .await
            .unwrap();
        let err = orch.execute(run.id).await.unwrap_err();
        assert!(err.is_retryable());

        let run = fx.store.get_run(run.id).await.unwrap().unwrap();
        assert_eq!(run.stage, PipelineStage::Error);
        assert_eq!(run.progress, 40);
        assert!(run.error.as_deref().is_some_and(|e| !e.is_empty()));
        assert!(fx.store.articles().is_empty());
    }

    #[tokio::test]
    async fn test_unknown_or_foreign_idea_rejected_before_generation() {
        let fx = fixture();
        let generator = Arc::new(MockGenerator::new());
        let orch = orchestrator(&fx.store, generator.clone(), None);

        let foreign = ContentIdea {
            id: Uuid::new_v4(),
            tenant_id: Uuid::new_v4(),
            topic: "Someone else's idea".to_string(),
            primary_keyword: None,
            content_type: "blog_post".to_string(),
            article_id: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        fx.store.put_content_idea(foreign.clone());

        for idea_id in [Uuid::new_v4(), foreign.id] {
            let mut input = PipelineInput::new(fx.tenant_id, "Async Rust", "blog_post");
            input.content_idea_id = Some(idea_id);
            let err = orch.start(input).await.unwrap_err();
            assert!(matches!(err, PipelineError::InvalidInput(_)));
            assert!(!err.is_retryable());
        }

        let mut input = PipelineInput::new(fx.tenant_id, "Async Rust", "blog_post");
        input.target_article_id = Some(Uuid::new_v4());
        assert!(matches!(
            orch.start(input).await,
            Err(PipelineError::InvalidInput(_))
        ));

        assert!(fx.store.runs().is_empty());
        assert!(fx.store.articles().is_empty());
        assert_eq!(generator.calls(), 0);
        let stored = fx.store.get_content_idea(foreign.id).await.unwrap().unwrap();
        assert!(stored.article_id.is_none());
    }

    #[tokio::test]
    async fn test_no_contributor_is_fatal() {
        let fx = fixture();
        let orch = orchestrator(&fx.store, Arc::new(MockGenerator::new()), None);

        let err = orch
            .run(PipelineInput::new(fx.tenant_id, "Quarterly report", "whitepaper"))
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::NoContributor));
        assert!(!err.is_retryable());

        let run = fx.store.runs().pop().unwrap();
        assert_eq!(run.stage, PipelineStage::Error);
        assert_eq!(run.progress, 20);
        assert_eq!(run.error.as_deref(), Some("No contributor available"));
    }

    #[tokio::test]
    async fn test_default_contributor_fallback() {
        let fx = fixture();
        let mut settings = TenantSettings::defaults_for(fx.tenant_id);
        settings.default_contributor_id = Some(fx.contributor_id);
        fx.store.put_tenant_settings(settings);
        let orch = orchestrator(&fx.store, Arc::new(MockGenerator::new()), None);

        let outcome = orch
            .run(PipelineInput::new(fx.tenant_id, "Quarterly report", "whitepaper"))
            .await
            .unwrap();
        let run = fx.store.get_run(outcome.run_id).await.unwrap().unwrap();
        assert_eq!(run.contributor_id, Some(fx.contributor_id));
    }

    #[tokio::test]
    async fn test_supplied_outline_skips_generation() {
        let fx = fixture();
        let generator = Arc::new(MockGenerator::new());
        let orch = orchestrator(&fx.store, generator.clone(), None);

        let mut input = PipelineInput::new(fx.tenant_id, "Async Rust", "blog_post");
        input.outline = Some(vec!["Why".to_string(), "How".to_string()]);
        let outcome = orch.run(input).await.unwrap();

        // Only the draft call
        assert_eq!(generator.calls(), 1);
        let run = fx.store.get_run(outcome.run_id).await.unwrap().unwrap();
        assert_eq!(run.outline, Some(StringList(vec!["Why".into(), "How".into()])));
    }

    #[tokio::test]
    async fn test_banned_phrases_are_flagged_not_rejected() {
        let fx = fixture();
        let generator = Arc::new(MockGenerator::with_draft(
            "# Title\n\nThis is a game changer.\n\n- item\n",
        ));
        let orch = orchestrator(&fx.store, generator, None);

        let outcome = orch
            .run(PipelineInput::new(fx.tenant_id, "Async Rust", "blog_post"))
            .await
            .unwrap();
        assert_eq!(outcome.banned_phrase_hits, vec!["game changer".to_string()]);

        let article = fx.store.get_article(outcome.article_id).await.unwrap().unwrap();
        assert_eq!(article.banned_phrase_hits, 1);
        // Short draft: 15 + 20 + 15 + 35
        assert_eq!(article.quality_score, Some(85));
    }

    #[tokio::test]
    async fn test_cancelled_run_does_not_move() {
        let fx = fixture();
        let orch = orchestrator(&fx.store, Arc::new(MockGenerator::new()), None);

        let run = orch
            .start(PipelineInput::new(fx.tenant_id, "Async Rust", "blog_post"))
            .await
            .unwrap();
        assert!(fx.store.request_cancel(run.id).await.unwrap());

        let err = orch.execute(run.id).await.unwrap_err();
        assert!(err.is_cancelled());
        let run = fx.store.get_run(run.id).await.unwrap().unwrap();
        assert_eq!(run.progress, 0);
        assert!(fx.store.articles().is_empty());
    }

    #[tokio::test]
    async fn test_resume_reuses_persisted_draft() {
        let fx = fixture();
        let generator = Arc::new(MockGenerator::new());
        let orch = orchestrator(&fx.store, generator.clone(), None);

        let run = orch
            .start(PipelineInput::new(fx.tenant_id, "Async Rust", "blog_post"))
            .await
            .unwrap();
        for stage in [
            PipelineStage::GatheringContext,
            PipelineStage::SelectingContributor,
            PipelineStage::GeneratingOutline,
            PipelineStage::Drafting,
        ] {
            fx.store.record_stage(run.id, StageUpdate::enter(stage)).await.unwrap();
        }
        fx.store
            .record_stage(
                run.id,
                StageUpdate {
                    outline: Some(vec!["Intro".into()]),
                    draft_content: Some("# Resumed\n\n- point\n".into()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        let outcome = orch.execute(run.id).await.unwrap();
        assert_eq!(generator.calls(), 0);
        let article = fx.store.get_article(outcome.article_id).await.unwrap().unwrap();
        assert_eq!(article.title, "Resumed");
    }

    #[tokio::test]
    async fn test_regeneration_updates_existing_article() {
        let fx = fixture();
        let orch = orchestrator(&fx.store, Arc::new(MockGenerator::new()), None);
        let first = orch
            .run(PipelineInput::new(fx.tenant_id, "Async Rust", "blog_post"))
            .await
            .unwrap();

        let mut input = PipelineInput::new(fx.tenant_id, "Async Rust", "blog_post");
        input.target_article_id = Some(first.article_id);
        let second = orch.run(input).await.unwrap();

        assert_eq!(second.article_id, first.article_id);
        assert_eq!(fx.store.articles().len(), 1);
        let article = fx.store.get_article(first.article_id).await.unwrap().unwrap();
        assert_eq!(article.pipeline_run_id, Some(second.run_id));
    }

    #[tokio::test]
    async fn test_completed_run_is_not_re_executed() {
        let fx = fixture();
        let generator = Arc::new(MockGenerator::new());
        let orch = orchestrator(&fx.store, generator.clone(), None);
        let outcome = orch
            .run(PipelineInput::new(fx.tenant_id, "Async Rust", "blog_post"))
            .await
            .unwrap();
        let calls = generator.calls();

        let again = orch.execute(outcome.run_id).await.unwrap();
        assert_eq!(again.article_id, outcome.article_id);
        assert_eq!(generator.calls(), calls);
    }
}
