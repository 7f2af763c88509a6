/// Health check endpoint
///
/// # Endpoint
///
/// ```text
/// GET /health
/// ```
///
/// # Response
///
/// ```json
/// {
///   "status": "healthy",
///   "version": "0.1.0",
///   "database": "connected",
///   "cache": "redis"
/// }
/// ```
///
/// `status` is `degraded` when either dependency is unreachable. The cache
/// field names the backend, or `unavailable`.

use crate::app::AppState;
use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};
use taskvault_shared::db::pool::{get_pool_stats, health_check as database_health_check};

/// Health check response
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    /// Service status
    pub status: String,

    /// Application version
    pub version: String,

    /// Database status
    pub database: String,

    /// Cache backend, or `unavailable`
    pub cache: String,

    /// Open database connections
    pub connections: usize,
}

/// Health check handler
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let database_ok = database_health_check(&state.db).await.is_ok();

    let store = state.cache.cache_store();
    let cache_ok = matches!(store.ping().await, Ok(true));

    Json(HealthResponse {
        status: if database_ok && cache_ok {
            "healthy".to_string()
        } else {
            "degraded".to_string()
        },
        version: env!("CARGO_PKG_VERSION").to_string(),
        database: if database_ok { "connected" } else { "disconnected" }.to_string(),
        cache: if cache_ok { store.backend() } else { "unavailable" }.to_string(),
        connections: get_pool_stats(&state.db).total_connections,
    })
}
