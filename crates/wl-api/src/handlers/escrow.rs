use axum::extract::{Path, State};
use axum::Json;
use serde::Deserialize;

use wl_common::escrow::store::Delivery;
use wl_common::escrow::{RefundOutcome, ReleaseOutcome};

use crate::auth::AuthUser;
use crate::error::ApiError;
use crate::SharedState;

#[derive(Debug, Deserialize)]
pub struct DeliverRequest {
    pub file_ref: String,
    #[serde(default)]
    pub content_hash: String,
}

/// Freelancer submits milestone work for review.
pub async fn deliver(
    State(state): State<SharedState>,
    Path(milestone_id): Path<i64>,
    auth: AuthUser,
    Json(request): Json<DeliverRequest>,
) -> Result<Json<Delivery>, ApiError> {
    let caller_id = auth.require_user_id()?;
    let delivery = state
        .escrow
        .deliver_milestone(
            milestone_id,
            caller_id,
            &request.file_ref,
            &request.content_hash,
        )
        .await?;
    Ok(Json(delivery))
}

#[derive(Debug, Default, Deserialize)]
pub struct ReleaseRequest {
    /// Omit for a full release of the milestone amount.
    pub amount_cents: Option<i64>,
}

/// Client accepts the milestone and releases held funds.
pub async fn release(
    State(state): State<SharedState>,
    Path(milestone_id): Path<i64>,
    auth: AuthUser,
    Json(request): Json<ReleaseRequest>,
) -> Result<Json<ReleaseOutcome>, ApiError> {
    let caller_id = auth.require_user_id()?;
    let outcome = state
        .escrow
        .release_milestone(milestone_id, caller_id, request.amount_cents)
        .await?;
    Ok(Json(outcome))
}

/// Dispute path: held funds go back to the client.
pub async fn refund(
    State(state): State<SharedState>,
    Path(milestone_id): Path<i64>,
    auth: AuthUser,
) -> Result<Json<RefundOutcome>, ApiError> {
    let caller_id = auth.require_user_id()?;
    let outcome = state.escrow.refund_milestone(milestone_id, caller_id).await?;
    Ok(Json(outcome))
}
