//! Status enumerations shared by entities and the domain layer

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Queue item status
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, Hash, EnumIter, DeriveActiveEnum, Serialize, Deserialize,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(20))")]
#[serde(rename_all = "snake_case")]
pub enum QueueStatus {
    #[sea_orm(string_value = "pending")]
    Pending,
    #[sea_orm(string_value = "scheduled")]
    Scheduled,
    #[sea_orm(string_value = "processing")]
    Processing,
    #[sea_orm(string_value = "completed")]
    Completed,
    #[sea_orm(string_value = "failed")]
    Failed,
    #[sea_orm(string_value = "cancelled")]
    Cancelled,
}

impl QueueStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            QueueStatus::Pending => "pending",
            QueueStatus::Scheduled => "scheduled",
            QueueStatus::Processing => "processing",
            QueueStatus::Completed => "completed",
            QueueStatus::Failed => "failed",
            QueueStatus::Cancelled => "cancelled",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pending" => Some(QueueStatus::Pending),
            "scheduled" => Some(QueueStatus::Scheduled),
            "processing" => Some(QueueStatus::Processing),
            "completed" => Some(QueueStatus::Completed),
            "failed" => Some(QueueStatus::Failed),
            "cancelled" => Some(QueueStatus::Cancelled),
            _ => None,
        }
    }

    /// Statuses that still occupy a place in line
    pub fn is_actionable(&self) -> bool {
        matches!(self, QueueStatus::Pending | QueueStatus::Scheduled)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, QueueStatus::Completed | QueueStatus::Cancelled)
    }
}

impl fmt::Display for QueueStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Ordered stages of a generation pipeline run
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, Hash, EnumIter, DeriveActiveEnum, Serialize, Deserialize,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(32))")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PipelineStage {
    #[sea_orm(string_value = "INITIALIZING")]
    Initializing,
    #[sea_orm(string_value = "GATHERING_CONTEXT")]
    GatheringContext,
    #[sea_orm(string_value = "SELECTING_CONTRIBUTOR")]
    SelectingContributor,
    #[sea_orm(string_value = "GENERATING_OUTLINE")]
    GeneratingOutline,
    #[sea_orm(string_value = "DRAFTING")]
    Drafting,
    #[sea_orm(string_value = "HUMANIZING")]
    Humanizing,
    #[sea_orm(string_value = "QUALITY_CHECK")]
    QualityCheck,
    #[sea_orm(string_value = "FINALIZING")]
    Finalizing,
    #[sea_orm(string_value = "COMPLETE")]
    Complete,
    #[sea_orm(string_value = "ERROR")]
    Error,
}

impl PipelineStage {
    /// Stages in execution order, excluding `Error`
    pub const ORDERED: [PipelineStage; 9] = [
        PipelineStage::Initializing,
        PipelineStage::GatheringContext,
        PipelineStage::SelectingContributor,
        PipelineStage::GeneratingOutline,
        PipelineStage::Drafting,
        PipelineStage::Humanizing,
        PipelineStage::QualityCheck,
        PipelineStage::Finalizing,
        PipelineStage::Complete,
    ];

    /// Fixed progress checkpoint for the stage. `Error` has none: a failed
    /// run keeps the progress of its last successful checkpoint.
    pub fn progress(&self) -> Option<i32> {
        match self {
            PipelineStage::Initializing => Some(0),
            PipelineStage::GatheringContext => Some(10),
            PipelineStage::SelectingContributor => Some(20),
            PipelineStage::GeneratingOutline => Some(30),
            PipelineStage::Drafting => Some(40),
            PipelineStage::Humanizing => Some(60),
            PipelineStage::QualityCheck => Some(80),
            PipelineStage::Finalizing => Some(90),
            PipelineStage::Complete => Some(100),
            PipelineStage::Error => None,
        }
    }

    fn ordinal(&self) -> Option<usize> {
        Self::ORDERED.iter().position(|s| s == self)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, PipelineStage::Complete | PipelineStage::Error)
    }

    /// Stages only move forward; `Error` is reachable from any non-terminal stage.
    pub fn can_transition_to(&self, next: PipelineStage) -> bool {
        if self.is_terminal() {
            return false;
        }
        if next == PipelineStage::Error {
            return true;
        }
        match (self.ordinal(), next.ordinal()) {
            (Some(from), Some(to)) => to > from,
            _ => false,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PipelineStage::Initializing => "INITIALIZING",
            PipelineStage::GatheringContext => "GATHERING_CONTEXT",
            PipelineStage::SelectingContributor => "SELECTING_CONTRIBUTOR",
            PipelineStage::GeneratingOutline => "GENERATING_OUTLINE",
            PipelineStage::Drafting => "DRAFTING",
            PipelineStage::Humanizing => "HUMANIZING",
            PipelineStage::QualityCheck => "QUALITY_CHECK",
            PipelineStage::Finalizing => "FINALIZING",
            PipelineStage::Complete => "COMPLETE",
            PipelineStage::Error => "ERROR",
        }
    }
}

impl fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Article lifecycle status
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, Hash, EnumIter, DeriveActiveEnum, Serialize, Deserialize,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(20))")]
#[serde(rename_all = "snake_case")]
pub enum ArticleStatus {
    #[sea_orm(string_value = "idea")]
    Idea,
    #[sea_orm(string_value = "outline")]
    Outline,
    #[sea_orm(string_value = "drafting")]
    Drafting,
    /// Produced by a completed pipeline run, awaiting editorial work
    #[sea_orm(string_value = "draft")]
    Draft,
    #[sea_orm(string_value = "humanizing")]
    Humanizing,
    #[sea_orm(string_value = "review")]
    Review,
    #[sea_orm(string_value = "ready")]
    Ready,
    #[sea_orm(string_value = "scheduled")]
    Scheduled,
    #[sea_orm(string_value = "published")]
    Published,
    #[sea_orm(string_value = "archived")]
    Archived,
}

impl ArticleStatus {
    const LIFECYCLE: [ArticleStatus; 10] = [
        ArticleStatus::Idea,
        ArticleStatus::Outline,
        ArticleStatus::Drafting,
        ArticleStatus::Draft,
        ArticleStatus::Humanizing,
        ArticleStatus::Review,
        ArticleStatus::Ready,
        ArticleStatus::Scheduled,
        ArticleStatus::Published,
        ArticleStatus::Archived,
    ];

    fn ordinal(&self) -> usize {
        Self::LIFECYCLE
            .iter()
            .position(|s| s == self)
            .unwrap_or_default()
    }

    /// Forward-only lifecycle. `published -> archived` is the only consumer
    /// transition out of `published`; manual edits bypass this check.
    pub fn can_transition_to(&self, next: ArticleStatus) -> bool {
        match (self, next) {
            (ArticleStatus::Published, ArticleStatus::Archived) => true,
            (ArticleStatus::Published, _) | (ArticleStatus::Archived, _) => false,
            (from, to) => to.ordinal() > from.ordinal(),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ArticleStatus::Idea => "idea",
            ArticleStatus::Outline => "outline",
            ArticleStatus::Drafting => "drafting",
            ArticleStatus::Draft => "draft",
            ArticleStatus::Humanizing => "humanizing",
            ArticleStatus::Review => "review",
            ArticleStatus::Ready => "ready",
            ArticleStatus::Scheduled => "scheduled",
            ArticleStatus::Published => "published",
            ArticleStatus::Archived => "archived",
        }
    }
}

impl fmt::Display for ArticleStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Coarse risk classification, ordered `Low < Medium < High < Critical`
#[derive(
    Clone,
    Copy,
    Debug,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    EnumIter,
    DeriveActiveEnum,
    Serialize,
    Deserialize,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(10))")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RiskLevel {
    #[sea_orm(string_value = "LOW")]
    Low,
    #[sea_orm(string_value = "MEDIUM")]
    Medium,
    #[sea_orm(string_value = "HIGH")]
    High,
    #[sea_orm(string_value = "CRITICAL")]
    Critical,
}

impl RiskLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            RiskLevel::Low => "LOW",
            RiskLevel::Medium => "MEDIUM",
            RiskLevel::High => "HIGH",
            RiskLevel::Critical => "CRITICAL",
        }
    }
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
