//! Persisted run reports in the `workflow_runs` table.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use sqlx::types::Json;
use uuid::Uuid;

use herald_common::error::AppError;
use herald_common::types::{RunState, ScheduledRun};

use crate::run_log::RunLogSink;

#[derive(sqlx::FromRow)]
struct RunRow {
    id: Uuid,
    schedule: String,
    state: String,
    log: Json<Vec<String>>,
    result: serde_json::Value,
    started_at: DateTime<Utc>,
    finished_at: Option<DateTime<Utc>>,
}

impl TryFrom<RunRow> for ScheduledRun {
    type Error = AppError;

    fn try_from(row: RunRow) -> Result<Self, Self::Error> {
        let state: RunState = row.state.parse().map_err(AppError::Internal)?;
        Ok(ScheduledRun {
            id: row.id,
            schedule: row.schedule,
            state,
            log: row.log.0,
            result: row.result,
            started_at: row.started_at,
            finished_at: row.finished_at,
        })
    }
}

/// Run repository and [`RunLogSink`] backed by PostgreSQL.
#[derive(Debug, Clone)]
pub struct PgRunLog {
    pool: PgPool,
}

impl PgRunLog {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Get a single run report by ID.
    pub async fn get(&self, run_id: Uuid) -> Result<ScheduledRun, AppError> {
        let row: RunRow = sqlx::query_as("SELECT * FROM workflow_runs WHERE id = $1")
            .bind(run_id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Run {} not found", run_id)))?;

        row.try_into()
    }

    /// The most recent runs, newest first.
    pub async fn list_recent(&self, limit: i64) -> Result<Vec<ScheduledRun>, AppError> {
        let rows: Vec<RunRow> =
            sqlx::query_as("SELECT * FROM workflow_runs ORDER BY started_at DESC LIMIT $1")
                .bind(limit)
                .fetch_all(&self.pool)
                .await?;

        rows.into_iter().map(ScheduledRun::try_from).collect()
    }
}

#[async_trait]
impl RunLogSink for PgRunLog {
    async fn start(&self, run: &ScheduledRun) -> anyhow::Result<()> {
        sqlx::query(
            r#"
            INSERT INTO workflow_runs (id, schedule, state, log, result, started_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(run.id)
        .bind(&run.schedule)
        .bind(run.state.to_string())
        .bind(Json(&run.log))
        .bind(&run.result)
        .bind(run.started_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn append(&self, run_id: Uuid, line: &str) -> anyhow::Result<()> {
        sqlx::query("UPDATE workflow_runs SET log = log || jsonb_build_array($2::text) WHERE id = $1")
            .bind(run_id)
            .bind(line)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    async fn finish(&self, run: &ScheduledRun) -> anyhow::Result<()> {
        // Upsert so a report survives even when the start row was never written.
        sqlx::query(
            r#"
            INSERT INTO workflow_runs (id, schedule, state, log, result, started_at, finished_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT (id) DO UPDATE
            SET state = $3, log = $4, result = $5, finished_at = $7
            "#,
        )
        .bind(run.id)
        .bind(&run.schedule)
        .bind(run.state.to_string())
        .bind(Json(&run.log))
        .bind(&run.result)
        .bind(run.started_at)
        .bind(run.finished_at)
        .execute(&self.pool)
        .await?;

        tracing::info!(run_id = %run.id, state = %run.state, "Run report stored");
        Ok(())
    }
}
