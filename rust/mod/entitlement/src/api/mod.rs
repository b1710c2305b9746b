mod aggregate;
mod overlap;

use std::sync::Arc;

use axum::Router;

use crate::service::EntitlementService;

/// Shared application state.
pub type AppState = Arc<EntitlementService>;

/// Build the entitlement API router.
///
/// Paths are absolute (`/entitlements/...`, `/sessions/...`); the server
/// merges this router at the root.
pub fn build_router(svc: Arc<EntitlementService>) -> Router {
    Router::new()
        .merge(aggregate::routes())
        .merge(overlap::routes())
        .with_state(svc)
}
