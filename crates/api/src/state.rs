//! Shared application state for the Axum API server.

use herald_common::config::AppConfig;
use herald_engine::NotifyService;
use sqlx::PgPool;

/// Application state shared across all route handlers via Axum `State`.
#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub notify: NotifyService,
    pub config: AppConfig,
}

impl AppState {
    pub fn new(pool: PgPool, notify: NotifyService, config: AppConfig) -> Self {
        Self {
            pool,
            notify,
            config,
        }
    }
}
