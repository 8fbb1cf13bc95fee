//! Liveness and readiness probes

use axum::{extract::State, http::StatusCode, Json};
use contentforge_common::db::DbPool;
use serde::Serialize;
use std::time::Instant;

use crate::app::AppState;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
}

#[derive(Serialize)]
pub struct ReadyResponse {
    pub status: &'static str,
    /// `postgres` or `memory`
    pub store: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub database: Option<DatabaseCheck>,
}

#[derive(Serialize)]
pub struct DatabaseCheck {
    pub up: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latency_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

async fn check_database(db: &DbPool) -> DatabaseCheck {
    let start = Instant::now();
    match db.ping().await {
        Ok(()) => DatabaseCheck {
            up: true,
            latency_ms: Some(start.elapsed().as_millis() as u64),
            error: None,
        },
        Err(e) => DatabaseCheck {
            up: false,
            latency_ms: None,
            error: Some(e.to_string()),
        },
    }
}

pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        version: contentforge_common::VERSION,
    })
}

/// 503 while the database is unreachable
pub async fn ready(State(state): State<AppState>) -> (StatusCode, Json<ReadyResponse>) {
    let database = match &state.db {
        Some(db) => Some(check_database(db).await),
        None => None,
    };
    let ready = database.as_ref().map_or(true, |d| d.up);

    let response = ReadyResponse {
        status: if ready { "ready" } else { "not_ready" },
        store: if state.db.is_some() { "postgres" } else { "memory" },
        database,
    };
    let code = if ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (code, Json(response))
}
