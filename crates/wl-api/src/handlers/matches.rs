use axum::{extract::State, Json};
use serde::Deserialize;

use wl_common::matching::{rank_jobs, RankedJob};
use wl_common::{FreelancerProfile, JobPosting};

use crate::auth::AuthUser;
use crate::error::ApiError;
use crate::SharedState;

const MAX_JOBS_PER_REQUEST: usize = 500;

#[derive(Debug, Deserialize)]
pub struct RankRequest {
    pub profile: FreelancerProfile,
    pub jobs: Vec<JobPosting>,
    /// Optional cap on how many ranked results come back.
    pub limit: Option<usize>,
}

/// Rank a pool of jobs against a freelancer profile. Pure computation; the
/// caller assembles the pool and owns persistence of anything it keeps.
pub async fn rank(
    State(_state): State<SharedState>,
    _auth: AuthUser,
    Json(request): Json<RankRequest>,
) -> Result<Json<Vec<RankedJob>>, ApiError> {
    if request.jobs.len() > MAX_JOBS_PER_REQUEST {
        return Err(ApiError::BadRequest(format!(
            "at most {MAX_JOBS_PER_REQUEST} jobs per request"
        )));
    }

    let mut ranked = rank_jobs(&request.profile, &request.jobs);
    if let Some(limit) = request.limit {
        ranked.truncate(limit);
    }
    Ok(Json(ranked))
}
