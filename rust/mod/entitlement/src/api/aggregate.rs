use axum::body::Bytes;
use axum::extract::State;
use axum::routing::post;
use axum::{Json, Router};

use team_core::ServiceError;

use crate::api::AppState;
use crate::model::{AggregateRequest, AggregatedEntitlement};

pub fn routes() -> Router<AppState> {
    Router::new().route("/entitlements/aggregate", post(aggregate))
}

/// POST /entitlements/aggregate
///
/// Returns the merged entitlement. Collaborator failures only shrink the
/// result, so any well-formed request gets a 200. A body that is not an
/// `AggregateRequest` is a 400 `VALIDATION_FAILED`.
async fn aggregate(
    State(svc): State<AppState>,
    body: Bytes,
) -> Result<Json<AggregatedEntitlement>, ServiceError> {
    let request: AggregateRequest = serde_json::from_slice(&body)
        .map_err(|e| ServiceError::Validation(format!("aggregate request: {e}")))?;
    Ok(Json(svc.aggregate(&request).await))
}

#[cfg(test)]
mod tests {
    use axum::http::StatusCode;
    use serde_json::json;

    use crate::api::build_router;
    use crate::api::test_util::{post_json, post_raw};
    use crate::service::test_support::{fixture, policy, RecordingSink, StaticDirectory};

    #[tokio::test]
    async fn test_aggregate_route() {
        let fx = fixture(
            StaticDirectory::default().with("ou-1", &["acc2"]),
            RecordingSink::default(),
        );
        fx.policies
            .put_policy(&policy(json!({
                "id": "rec-g1",
                "entityId": "g1",
                "duration": 10,
                "accounts": [{"id": "acc1", "name": "Dev"}],
                "ous": [{"id": "ou-1", "name": "Workloads"}],
                "permissions": [{"id": "p1", "name": "Admin"}],
                "approvalRequired": false
            })))
            .unwrap();

        let app = build_router(fx.service.clone());
        let (status, body) = post_json(
            app,
            "/entitlements/aggregate",
            json!({"id": "req-1", "userId": "u1", "groupIds": ["g1"], "username": "alice"}),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["id"], "req-1");
        assert_eq!(body["username"], "alice");
        let entry = &body["policy"][0];
        assert_eq!(entry["duration"], "10");
        assert_eq!(entry["approvalRequired"], false);
        assert_eq!(entry["accounts"][1]["id"], "acc2");
        assert_eq!(entry["permissions"][0]["name"], "Admin");
        assert_eq!(fx.sink.count(), 1);
    }

    #[tokio::test]
    async fn test_aggregate_with_publish_failure_is_ok() {
        let fx = fixture(StaticDirectory::default(), RecordingSink::failing());
        let app = build_router(fx.service.clone());
        let (status, body) = post_json(
            app,
            "/entitlements/aggregate",
            json!({"id": "req-2", "userId": "u1", "groupIds": [], "username": "bob"}),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["policy"], json!([]));
    }

    #[tokio::test]
    async fn test_malformed_body_is_rejected() {
        let fx = fixture(StaticDirectory::default(), RecordingSink::default());
        let app = build_router(fx.service.clone());
        let (status, body) = post_raw(app, "/entitlements/aggregate", "{not json".into()).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], "VALIDATION_FAILED");
        assert_eq!(fx.sink.count(), 0);

        // Correlation id is required.
        let app = build_router(fx.service.clone());
        let (status, body) = post_json(app, "/entitlements/aggregate", json!({"userId": "u1"})).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["message"].as_str().unwrap().contains("id"));
        assert_eq!(fx.sink.count(), 0);
    }
}
