use axum::Json;

use wl_common::matching::{score_client_fit, ClientFitScore};
use wl_common::JobPosting;

use crate::auth::AuthUser;
use crate::error::ApiError;

/// Score a posting's client independent of skill match: a 0-100 score plus
/// capped, order-fixed reason and risk lists.
pub async fn client_fit(
    _auth: AuthUser,
    Json(job): Json<JobPosting>,
) -> Result<Json<ClientFitScore>, ApiError> {
    Ok(Json(score_client_fit(&job)))
}
