pub mod health;
pub mod notify_runs;

use axum::Router;

use crate::state::AppState;

/// Build the complete API router with all routes.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .merge(health::router())
        .merge(notify_runs::router())
        .with_state(state)
}
