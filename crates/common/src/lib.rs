//! ContentForge Common Library
//!
//! Shared code for the gateway and the generation worker including:
//! - Database models, store traits and the Postgres repository
//! - Generation queue model and service
//! - Article pipeline orchestration and provider clients
//! - Relevance, opportunity and risk scoring
//! - Auto-publish gating and publishing targets
//! - Error types, configuration, metrics and tracing setup

pub mod auth;
pub mod config;
pub mod db;
pub mod errors;
pub mod metrics;
pub mod pipeline;
pub mod providers;
pub mod publish;
pub mod queue;
pub mod scoring;
pub mod store;
pub mod telemetry;

// Re-export commonly used types
pub use config::AppConfig;
pub use db::Repository;
pub use errors::{AppError, Result};
pub use pipeline::{PipelineInput, PipelineOrchestrator};
pub use queue::QueueService;
pub use store::{ContentStore, InMemoryStore};

/// Application version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
