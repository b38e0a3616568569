/// Store overview
///
/// ```text
/// GET /stats
/// ```
///
/// ```json
/// {
///   "total_movies": 12,
///   "total_users": 4,
///   "total_loans": 9,
///   "active_loans": 3,
///   "available_movies": 10,
///   "recent_loans": [ ... ],
///   "generated_at": "2025-01-03T12:00:00Z"
/// }
/// ```

use crate::{app::AppState, error::ApiResult};
use axum::{extract::State, Json};
use blockbuster_shared::{models::loan::Loan, service::DashboardSummary};
use chrono::{DateTime, Utc};
use serde::Serialize;

const RECENT_LOANS: usize = 5;

#[derive(Debug, Serialize)]
pub struct StatsResponse {
    #[serde(flatten)]
    pub summary: DashboardSummary,

    /// Latest loans, newest first
    pub recent_loans: Vec<Loan>,

    pub generated_at: DateTime<Utc>,
}

pub async fn stats(State(state): State<AppState>) -> ApiResult<Json<StatsResponse>> {
    let summary = state.services.dashboard.summary().await?;
    let recent_loans = state.services.dashboard.recent_loans(RECENT_LOANS).await?;

    Ok(Json(StatsResponse {
        summary,
        recent_loans,
        generated_at: Utc::now(),
    }))
}
