//! Run logger: append-only log and terminal report of one scheduled run.
//!
//! Every line lands in the in-memory [`ScheduledRun`], is mirrored as a
//! `tracing` event, and is forwarded to an optional persistent sink. Sink
//! failures are swallowed: logging must never abort notification delivery.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use uuid::Uuid;

use herald_common::types::{RunState, ScheduledRun};

/// Persistent storage for run reports.
#[async_trait]
pub trait RunLogSink: Send + Sync {
    /// Record a freshly started run.
    async fn start(&self, run: &ScheduledRun) -> anyhow::Result<()>;

    /// Append one log line to a running run.
    async fn append(&self, run_id: Uuid, line: &str) -> anyhow::Result<()>;

    /// Store the sealed report.
    async fn finish(&self, run: &ScheduledRun) -> anyhow::Result<()>;
}

/// Logger owned by exactly one run; pass it explicitly to every component.
pub struct RunLogger {
    run: ScheduledRun,
    sink: Option<Arc<dyn RunLogSink>>,
}

impl RunLogger {
    /// Start an in-memory run log.
    pub fn new(schedule: impl Into<String>) -> Self {
        Self {
            run: ScheduledRun::start(schedule),
            sink: None,
        }
    }

    /// Start a run log mirrored into `sink`.
    pub async fn with_sink(schedule: impl Into<String>, sink: Arc<dyn RunLogSink>) -> Self {
        let run = ScheduledRun::start(schedule);
        if let Err(e) = sink.start(&run).await {
            tracing::warn!(run_id = %run.id, error = %e, "Failed to persist run start");
        }
        Self {
            run,
            sink: Some(sink),
        }
    }

    pub fn run_id(&self) -> Uuid {
        self.run.id
    }

    pub fn lines(&self) -> &[String] {
        &self.run.log
    }

    /// Append a line to the run log. Never fails.
    pub async fn append_log(&mut self, line: impl Into<String>) {
        let line = line.into();
        tracing::info!(run_id = %self.run.id, schedule = %self.run.schedule, "{}", line);

        if let Some(sink) = &self.sink
            && let Err(e) = sink.append(self.run.id, &line).await
        {
            tracing::warn!(run_id = %self.run.id, error = %e, "Failed to persist run log line");
        }
        self.run.log.push(line);
    }

    /// Seal the run with a terminal state and result payload.
    ///
    /// `RunState::Running` is not terminal; passing it seals the run as failed.
    pub async fn finish(mut self, state: RunState, result: serde_json::Value) -> ScheduledRun {
        let state = if state.is_terminal() {
            state
        } else {
            self.append_log("Run sealed without a terminal state").await;
            RunState::Failed
        };

        self.run.state = state;
        self.run.result = result;
        self.run.finished_at = Some(Utc::now());

        if let Some(sink) = &self.sink
            && let Err(e) = sink.finish(&self.run).await
        {
            tracing::warn!(run_id = %self.run.id, error = %e, "Failed to persist run report");
        }

        tracing::info!(
            run_id = %self.run.id,
            state = %self.run.state,
            lines = self.run.log.len(),
            "Run finished"
        );
        self.run
    }
}
