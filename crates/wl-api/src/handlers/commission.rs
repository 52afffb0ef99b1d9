use axum::extract::{Query, State};
use axum::Json;
use serde::Deserialize;

use wl_common::commission::{
    compute_commission, CommissionBreakdown, CommissionSummary, SummaryWindow,
};
use wl_common::db::{fetch_commission_summary, get_user_level};

use crate::auth::AuthUser;
use crate::error::ApiError;
use crate::SharedState;

#[derive(Debug, Deserialize)]
pub struct QuoteRequest {
    pub gross_cents: i64,
    /// Loyalty level override; looked up from storage when omitted.
    pub user_level: Option<i32>,
}

pub async fn quote(
    State(state): State<SharedState>,
    auth: AuthUser,
    Json(request): Json<QuoteRequest>,
) -> Result<Json<CommissionBreakdown>, ApiError> {
    if request.gross_cents < 0 {
        return Err(ApiError::BadRequest(
            "gross_cents must be non-negative".into(),
        ));
    }

    let level = match request.user_level {
        Some(level) if level >= 1 => level,
        Some(_) => {
            return Err(ApiError::BadRequest("user_level must be at least 1".into()));
        }
        None => {
            let user_id = auth.require_user_id()?;
            get_user_level(&state.pool, user_id).await?
        }
    };

    Ok(Json(compute_commission(request.gross_cents, level)))
}

#[derive(Debug, Deserialize)]
pub struct SummaryQuery {
    #[serde(default = "default_window")]
    pub window: SummaryWindow,
}

fn default_window() -> SummaryWindow {
    SummaryWindow::Month
}

/// Rolling commission totals for the calling user's outgoing transactions.
pub async fn summary(
    State(state): State<SharedState>,
    auth: AuthUser,
    Query(query): Query<SummaryQuery>,
) -> Result<Json<CommissionSummary>, ApiError> {
    let user_id = auth.require_user_id()?;
    let summary = fetch_commission_summary(&state.pool, user_id, query.window).await?;
    Ok(Json(summary))
}
