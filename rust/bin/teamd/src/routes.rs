//! Route registration — module routes + system endpoints.

use axum::response::IntoResponse;
use axum::routing::get;
use axum::Router;

/// Build the complete router.
///
/// Module routers carry absolute paths and their own state, so they are
/// merged at the root.
pub fn build_router(module_routes: Vec<(&str, Router)>) -> Router {
    let mut app = Router::new()
        .route("/health", get(health))
        .route("/version", get(version));

    for (name, router) in module_routes {
        tracing::debug!("mounting module {}", name);
        app = app.merge(router);
    }
    app
}

async fn health() -> impl IntoResponse {
    axum::Json(serde_json::json!({
        "status": "ok",
    }))
}

async fn version() -> impl IntoResponse {
    axum::Json(serde_json::json!({
        "name": "teamd",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}
