use axum::body::Bytes;
use axum::extract::State;
use axum::routing::post;
use axum::{Json, Router};
use tracing::warn;

use crate::api::AppState;
use crate::model::{OverlapDecision, OverlapQuery};
use crate::service::overlap::MISSING_PARAMETERS;

pub fn routes() -> Router<AppState> {
    Router::new().route("/sessions/overlap", post(check_overlap))
}

/// POST /sessions/overlap
///
/// Always 200: an undecodable body, missing input and store failures all
/// come back as a fail-open decision with `error` set. The body is decoded
/// here rather than by the `Json` extractor so that none of them turn into
/// a 4xx rejection.
async fn check_overlap(State(svc): State<AppState>, body: Bytes) -> Json<OverlapDecision> {
    let query: OverlapQuery = match serde_json::from_slice(&body) {
        Ok(query) => query,
        Err(e) => {
            warn!("undecodable overlap query: {e}");
            return Json(OverlapDecision::fail_open(MISSING_PARAMETERS));
        }
    };
    Json(svc.check_overlap(&query).await)
}
