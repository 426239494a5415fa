//! Notification run routes: trigger a run and read stored run reports.

use axum::extract::{Path, Query, State};
use axum::routing::get;
use axum::{Json, Router};
use serde::Deserialize;
use uuid::Uuid;

use herald_common::error::AppError;
use herald_common::types::ScheduledRun;
use herald_engine::{LockPolicy, TriggerOutcome};

use crate::state::AppState;

/// Furthest day a manual run may look ahead.
pub const MAX_DAYS_AHEAD: u32 = 365;

const DEFAULT_LIST_LIMIT: i64 = 20;
const MAX_LIST_LIMIT: i64 = 100;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/notify-runs", get(list_runs).post(trigger_run))
        .route("/api/notify-runs/{id}", get(get_run))
}

#[derive(Debug, Default, Deserialize)]
pub struct TriggerParams {
    /// Defaults to `NOTIFY_DAYS_AHEAD`.
    #[serde(default)]
    pub days_ahead: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ListParams {
    pub limit: Option<i64>,
}

pub fn validate_days_ahead(days_ahead: u32) -> Result<u32, AppError> {
    if days_ahead > MAX_DAYS_AHEAD {
        return Err(AppError::Validation(format!(
            "days_ahead must be at most {MAX_DAYS_AHEAD}, got {days_ahead}"
        )));
    }
    Ok(days_ahead)
}

pub fn validate_limit(limit: Option<i64>) -> Result<i64, AppError> {
    match limit {
        None => Ok(DEFAULT_LIST_LIMIT),
        Some(n) if (1..=MAX_LIST_LIMIT).contains(&n) => Ok(n),
        Some(n) => Err(AppError::Validation(format!(
            "limit must be between 1 and {MAX_LIST_LIMIT}, got {n}"
        ))),
    }
}

/// POST /api/notify-runs — Run the notification now and return its report.
async fn trigger_run(
    State(state): State<AppState>,
    Json(params): Json<TriggerParams>,
) -> Result<Json<ScheduledRun>, AppError> {
    let days_ahead =
        validate_days_ahead(params.days_ahead.unwrap_or(state.config.notify_days_ahead))?;

    tracing::info!(days_ahead, "Manual notification run requested");
    match state
        .notify
        .trigger(days_ahead, LockPolicy::ReleaseAfterRun)
        .await
    {
        TriggerOutcome::Completed(run) => Ok(Json(run)),
        TriggerOutcome::Locked(date) => Err(AppError::RunLocked(format!(
            "A notification run for {date} is already in progress"
        ))),
    }
}

/// GET /api/notify-runs — Most recent run reports, newest first.
async fn list_runs(
    State(state): State<AppState>,
    Query(params): Query<ListParams>,
) -> Result<Json<Vec<ScheduledRun>>, AppError> {
    let limit = validate_limit(params.limit)?;
    let runs = state.notify.runs().list_recent(limit).await?;
    Ok(Json(runs))
}

/// GET /api/notify-runs/{id} — A single run report.
async fn get_run(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ScheduledRun>, AppError> {
    let run = state.notify.runs().get(id).await?;
    Ok(Json(run))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_days_ahead_bounds() {
        assert_eq!(validate_days_ahead(0).unwrap(), 0);
        assert_eq!(validate_days_ahead(MAX_DAYS_AHEAD).unwrap(), MAX_DAYS_AHEAD);
        assert!(matches!(
            validate_days_ahead(MAX_DAYS_AHEAD + 1),
            Err(AppError::Validation(_))
        ));
    }

    #[test]
    fn test_list_limit() {
        assert_eq!(validate_limit(None).unwrap(), 20);
        assert_eq!(validate_limit(Some(5)).unwrap(), 5);
        assert!(validate_limit(Some(0)).is_err());
        assert!(validate_limit(Some(101)).is_err());
    }

    #[test]
    fn test_trigger_params_default() {
        let params: TriggerParams = serde_json::from_str("{}").unwrap();
        assert_eq!(params.days_ahead, None);
        let params: TriggerParams = serde_json::from_str(r#"{"days_ahead": 3}"#).unwrap();
        assert_eq!(params.days_ahead, Some(3));
    }
}
