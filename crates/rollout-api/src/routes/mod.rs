//! API routes.

pub mod approvals;
pub mod clusters;
pub mod deployments;
pub mod health;

use crate::AppState;
use axum::Router;

/// Build the main API router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .nest("/api/v1", api_router())
        .merge(health::router())
        .with_state(state)
}

fn api_router() -> Router<AppState> {
    Router::new()
        .nest("/deployments", deployments::router())
        .nest("/approvals", approvals::router())
        .nest("/clusters", clusters::router())
}
