//! Database layer for ContentForge
//!
//! Provides:
//! - SeaORM entity models
//! - Postgres implementation of the store traits
//! - Connection pool management and migrations

pub mod models;
mod repository;

pub use repository::Repository;

use crate::config::DatabaseConfig;
use crate::errors::{AppError, Result};
use sea_orm::{ConnectOptions, Database, DatabaseConnection};
use sqlx::migrate::Migrator;
use std::path::Path;
use std::time::Duration;
use tracing::info;

/// Primary connection plus an optional read replica. Queue claims and
/// compare-and-set writes always go to the primary.
#[derive(Clone)]
pub struct DbPool {
    pub primary: DatabaseConnection,
    pub replica: Option<DatabaseConnection>,
}

async fn connect(url: &str, role: &str, config: &DatabaseConfig) -> Result<DatabaseConnection> {
    let mut opts = ConnectOptions::new(url);
    opts.max_connections(config.max_connections)
        .min_connections(config.min_connections)
        .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
        .idle_timeout(Duration::from_secs(config.idle_timeout_secs))
        .sqlx_logging(false);

    info!(role, "Connecting to database");
    Database::connect(opts)
        .await
        .map_err(|e| AppError::DatabaseConnection {
            message: format!("Failed to connect to {}: {}", role, e),
        })
}

impl DbPool {
    pub async fn new(config: &DatabaseConfig) -> Result<Self> {
        let primary = connect(&config.url, "primary", config).await?;
        let replica = match config.read_url.as_deref() {
            Some(url) if url != config.url => Some(connect(url, "replica", config).await?),
            _ => None,
        };

        info!(replica = replica.is_some(), "Database connections established");
        Ok(Self { primary, replica })
    }

    /// Get the connection for reads (replica if available, otherwise primary)
    pub fn read(&self) -> &DatabaseConnection {
        self.replica.as_ref().unwrap_or(&self.primary)
    }

    /// Get the connection for writes (always primary)
    pub fn write(&self) -> &DatabaseConnection {
        &self.primary
    }

    /// Apply pending SQL migrations from `dir` on the primary
    pub async fn migrate(&self, dir: &str) -> Result<()> {
        let migrator = Migrator::new(Path::new(dir))
            .await
            .map_err(|e| AppError::Migration {
                message: format!("Failed to load migrations from {}: {}", dir, e),
            })?;

        migrator
            .run(self.primary.get_postgres_connection_pool())
            .await
            .map_err(|e| AppError::Migration {
                message: e.to_string(),
            })?;

        info!(dir = %dir, "Migrations applied");
        Ok(())
    }

    /// `SELECT 1` on every connection
    pub async fn ping(&self) -> Result<()> {
        use sea_orm::ConnectionTrait;

        let connections = std::iter::once(("primary", &self.primary))
            .chain(self.replica.as_ref().map(|r| ("replica", r)));
        for (role, conn) in connections {
            conn.execute_unprepared("SELECT 1")
                .await
                .map_err(|e| AppError::DatabaseConnection {
                    message: format!("{} ping failed: {}", role, e),
                })?;
        }
        Ok(())
    }
}
