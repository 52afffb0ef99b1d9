use axum::extract::State;
use axum::http::StatusCode;

use crate::SharedState;

pub async fn livez() -> &'static str {
    "ok"
}

/// Flips to 503 during shutdown so load balancers drain before axum stops
/// accepting connections.
pub async fn readyz(State(state): State<SharedState>) -> Result<&'static str, StatusCode> {
    if state.readiness.load(std::sync::atomic::Ordering::SeqCst) {
        Ok("ok")
    } else {
        Err(StatusCode::SERVICE_UNAVAILABLE)
    }
}
