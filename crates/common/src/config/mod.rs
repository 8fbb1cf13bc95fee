//! Configuration management for ContentForge services
//!
//! Supports loading configuration from:
//! - Environment variables (prefixed with APP__)
//! - Configuration files (config.toml, config.yaml)
//! - Default values

use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Main application configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AppConfig {
    /// Server configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// Database configuration
    pub database: DatabaseConfig,

    /// Text generation provider configuration
    #[serde(default)]
    pub generation: GenerationConfig,

    /// Humanization provider configuration
    #[serde(default)]
    pub humanization: HumanizationConfig,

    /// Publishing target configuration
    #[serde(default)]
    pub publishing: PublishingConfig,

    /// Generation queue configuration
    #[serde(default)]
    pub queue: QueueConfig,

    /// Observability configuration
    #[serde(default)]
    pub observability: ObservabilityConfig,

    /// Rate limiting configuration
    #[serde(default)]
    pub rate_limit: RateLimitConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    /// Host to bind to
    #[serde(default = "default_host")]
    pub host: String,

    /// Port to listen on
    #[serde(default = "default_port")]
    pub port: u16,

    /// Request timeout in seconds
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    /// Shutdown timeout in seconds
    #[serde(default = "default_shutdown_timeout")]
    pub shutdown_timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DatabaseConfig {
    /// Primary database URL (for writes)
    pub url: String,

    /// Read replica URL (optional, falls back to primary)
    pub read_url: Option<String>,

    /// Maximum number of connections
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,

    /// Minimum number of connections
    #[serde(default = "default_min_connections")]
    pub min_connections: u32,

    /// Connection timeout in seconds
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,

    /// Idle timeout in seconds
    #[serde(default = "default_idle_timeout")]
    pub idle_timeout_secs: u64,

    /// Apply pending migrations on startup
    #[serde(default)]
    pub run_migrations: bool,

    /// Directory holding the SQL migrations
    #[serde(default = "default_migrations_dir")]
    pub migrations_dir: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct GenerationConfig {
    /// Generation provider: openai, mock
    #[serde(default = "default_generation_provider")]
    pub provider: String,

    /// API key for the generation service
    pub api_key: Option<String>,

    /// API base URL (for OpenAI-compatible endpoints)
    pub api_base: Option<String>,

    /// Model to use
    #[serde(default = "default_generation_model")]
    pub model: String,

    /// Request timeout in seconds
    #[serde(default = "default_generation_timeout")]
    pub timeout_secs: u64,

    /// Sampling temperature
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Maximum output tokens per call
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    /// Price per thousand tokens, used for run cost estimates
    #[serde(default = "default_cost_per_1k")]
    pub cost_per_1k_tokens: f64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct HumanizationConfig {
    /// Enable the humanization stage
    #[serde(default)]
    pub enabled: bool,

    /// Rewrite endpoint
    pub endpoint: Option<String>,

    /// API key for the humanization service
    pub api_key: Option<String>,

    /// Default rewrite aggressiveness (0.0 - 1.0)
    #[serde(default = "default_aggressiveness")]
    pub aggressiveness: f32,

    /// Request timeout in seconds
    #[serde(default = "default_humanization_timeout")]
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PublishingConfig {
    /// Publishing target endpoint (no endpoint disables publishing calls)
    pub endpoint: Option<String>,

    /// API key for the publishing target
    pub api_key: Option<String>,

    /// Request timeout in seconds
    #[serde(default = "default_publish_timeout")]
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct QueueConfig {
    /// Base retry delay in milliseconds (backoff is base * 3^(attempts-1))
    #[serde(default = "default_base_retry_delay")]
    pub base_retry_delay_ms: u64,

    /// Number of workers processing the queue concurrently
    #[serde(default = "default_concurrent_workers")]
    pub concurrent_workers: u32,

    /// Average processing time assumed when no history exists
    #[serde(default = "default_avg_processing")]
    pub default_avg_processing_ms: u64,

    /// Maximum attempts for new queue items
    #[serde(default = "default_max_attempts")]
    pub default_max_attempts: i32,

    /// Processing timeout in seconds
    #[serde(default = "default_processing_timeout")]
    pub processing_timeout_secs: u64,

    /// Idle poll interval for claim loops in milliseconds
    #[serde(default = "default_poll_interval")]
    pub poll_interval_ms: u64,

    /// Interval between sweeps in seconds
    #[serde(default = "default_sweep_interval")]
    pub sweep_interval_secs: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ObservabilityConfig {
    /// Log level (debug, info, warn, error) or a full EnvFilter directive
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Enable JSON logging
    #[serde(default = "default_json_logging")]
    pub json_logging: bool,

    /// OpenTelemetry OTLP endpoint
    pub otel_endpoint: Option<String>,

    /// Metrics port (0 to disable)
    #[serde(default = "default_metrics_port")]
    pub metrics_port: u16,

    /// Service name for tracing
    #[serde(default = "default_service_name")]
    pub service_name: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RateLimitConfig {
    /// Requests per second
    #[serde(default = "default_rate_limit")]
    pub requests_per_second: u32,

    /// Burst capacity
    #[serde(default = "default_burst")]
    pub burst: u32,

    /// Enable rate limiting
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

// Default value functions
fn default_host() -> String { "0.0.0.0".to_string() }
fn default_port() -> u16 { 8080 }
fn default_request_timeout() -> u64 { 30 }
fn default_shutdown_timeout() -> u64 { 30 }
fn default_max_connections() -> u32 { 50 }
fn default_min_connections() -> u32 { 5 }
fn default_connect_timeout() -> u64 { 10 }
fn default_idle_timeout() -> u64 { 300 }
fn default_migrations_dir() -> String { "migrations".to_string() }
fn default_generation_provider() -> String { "openai".to_string() }
fn default_generation_model() -> String { "gpt-4o-mini".to_string() }
fn default_generation_timeout() -> u64 { 120 }
fn default_temperature() -> f32 { 0.7 }
fn default_max_tokens() -> u32 { 4096 }
fn default_cost_per_1k() -> f64 { 0.002 }
fn default_aggressiveness() -> f32 { 0.5 }
fn default_humanization_timeout() -> u64 { 60 }
fn default_publish_timeout() -> u64 { 30 }
fn default_base_retry_delay() -> u64 { 30_000 }
fn default_concurrent_workers() -> u32 { 2 }
fn default_avg_processing() -> u64 { 180_000 }
fn default_max_attempts() -> i32 { 3 }
fn default_processing_timeout() -> u64 { 600 }
fn default_poll_interval() -> u64 { 2_000 }
fn default_sweep_interval() -> u64 { 30 }
fn default_log_level() -> String { "info".to_string() }
fn default_json_logging() -> bool { true }
fn default_metrics_port() -> u16 { 9090 }
fn default_service_name() -> String { "contentforge".to_string() }
fn default_rate_limit() -> u32 { 50 }
fn default_burst() -> u32 { 100 }
fn default_enabled() -> bool { true }

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            request_timeout_secs: default_request_timeout(),
            shutdown_timeout_secs: default_shutdown_timeout(),
        }
    }
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            provider: default_generation_provider(),
            api_key: None,
            api_base: None,
            model: default_generation_model(),
            timeout_secs: default_generation_timeout(),
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
            cost_per_1k_tokens: default_cost_per_1k(),
        }
    }
}

impl Default for HumanizationConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            endpoint: None,
            api_key: None,
            aggressiveness: default_aggressiveness(),
            timeout_secs: default_humanization_timeout(),
        }
    }
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            base_retry_delay_ms: default_base_retry_delay(),
            concurrent_workers: default_concurrent_workers(),
            default_avg_processing_ms: default_avg_processing(),
            default_max_attempts: default_max_attempts(),
            processing_timeout_secs: default_processing_timeout(),
            poll_interval_ms: default_poll_interval(),
            sweep_interval_secs: default_sweep_interval(),
        }
    }
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            json_logging: default_json_logging(),
            otel_endpoint: None,
            metrics_port: default_metrics_port(),
            service_name: default_service_name(),
        }
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            requests_per_second: default_rate_limit(),
            burst: default_burst(),
            enabled: default_enabled(),
        }
    }
}

impl AppConfig {
    /// Load configuration from environment and files
    pub fn load() -> Result<Self, ConfigError> {
        let env = std::env::var("APP_ENV").unwrap_or_else(|_| "development".to_string());

        let config = Config::builder()
            // Start with defaults
            .set_default("server.host", "0.0.0.0")?
            .set_default("server.port", 8080)?

            // Load base config file
            .add_source(File::with_name("config/default").required(false))

            // Load environment-specific config
            .add_source(File::with_name(&format!("config/{}", env)).required(false))

            // Load local overrides
            .add_source(File::with_name("config/local").required(false))

            // Load from environment variables with APP__ prefix
            // e.g., APP__QUEUE__CONCURRENT_WORKERS=4
            .add_source(
                Environment::with_prefix("APP")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let config: AppConfig = config.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Reject combinations that cannot run
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.generation.provider == "openai" && self.generation.api_key.is_none() {
            return Err(ConfigError::Message(
                "generation.api_key is required for the openai provider".to_string(),
            ));
        }
        if self.humanization.enabled && self.humanization.endpoint.is_none() {
            return Err(ConfigError::Message(
                "humanization.endpoint is required when humanization is enabled".to_string(),
            ));
        }
        if self.queue.concurrent_workers == 0 {
            return Err(ConfigError::Message(
                "queue.concurrent_workers must be at least 1".to_string(),
            ));
        }
        if self.queue.default_max_attempts < 1 {
            return Err(ConfigError::Message(
                "queue.default_max_attempts must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Get request timeout as Duration
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.server.request_timeout_secs)
    }

    /// Get shutdown timeout as Duration
    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.server.shutdown_timeout_secs)
    }

    /// Get the read database URL (falls back to primary)
    pub fn read_database_url(&self) -> &str {
        self.database.read_url.as_deref().unwrap_or(&self.database.url)
    }
}

impl QueueConfig {
    /// Processing timeout as Duration
    pub fn processing_timeout(&self) -> Duration {
        Duration::from_secs(self.processing_timeout_secs)
    }

    /// Sweep interval as Duration
    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }

    /// Claim loop idle interval as Duration
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

impl Default for PublishingConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            api_key: None,
            timeout_secs: default_publish_timeout(),
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            database: DatabaseConfig {
                url: "postgres://localhost/contentforge".to_string(),
                read_url: None,
                max_connections: default_max_connections(),
                min_connections: default_min_connections(),
                connect_timeout_secs: default_connect_timeout(),
                idle_timeout_secs: default_idle_timeout(),
                run_migrations: false,
                migrations_dir: default_migrations_dir(),
            },
            generation: GenerationConfig::default(),
            humanization: HumanizationConfig::default(),
            publishing: PublishingConfig::default(),
            queue: QueueConfig::default(),
            observability: ObservabilityConfig::default(),
            rate_limit: RateLimitConfig::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.queue.base_retry_delay_ms, 30_000);
        assert_eq!(config.queue.concurrent_workers, 2);
        assert_eq!(config.queue.default_avg_processing_ms, 180_000);
    }

    #[test]
    fn test_queue_durations() {
        let config = AppConfig::default();
        assert_eq!(config.queue.poll_interval(), Duration::from_millis(2_000));
        assert_eq!(config.queue.sweep_interval(), Duration::from_secs(30));
        assert_eq!(config.queue.processing_timeout(), Duration::from_secs(600));
    }

    #[test]
    fn test_read_database_fallback() {
        let config = AppConfig::default();
        assert_eq!(config.read_database_url(), "postgres://localhost/contentforge");
    }

    #[test]
    fn test_openai_requires_api_key() {
        let config = AppConfig::default();
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.generation.provider = "mock".to_string();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_zero_workers_rejected() {
        let mut config = AppConfig::default();
        config.generation.provider = "mock".to_string();
        config.queue.concurrent_workers = 0;
        assert!(config.validate().is_err());
    }
}
