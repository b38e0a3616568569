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
///   "pool": { "active_connections": 1, "idle_connections": 4, "total_connections": 5 }
/// }
/// ```
///
/// `database` is `"memory"` when the server runs on the in-memory store.

use crate::app::AppState;
use axum::{extract::State, Json};
use blockbuster_shared::db::pool::{get_pool_stats, health_check as ping_database, PoolStats};
use serde::{Deserialize, Serialize};

/// Health check response
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    /// Service status
    pub status: String,

    /// Application version
    pub version: String,

    /// Database status
    pub database: String,

    /// Connection pool usage
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pool: Option<PoolStats>,
}

/// Reports service health including database connectivity
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let (database, pool) = match &state.pool {
        Some(pool) => {
            let status = match ping_database(pool).await {
                Ok(()) => "connected",
                Err(_) => "disconnected",
            };
            (status, Some(get_pool_stats(pool)))
        }
        None => ("memory", None),
    };

    Json(HealthResponse {
        status: if database == "disconnected" {
            "degraded".to_string()
        } else {
            "healthy".to_string()
        },
        version: blockbuster_shared::VERSION.to_string(),
        database: database.to_string(),
        pool,
    })
}
