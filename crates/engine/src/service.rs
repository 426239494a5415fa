//! Production wiring of a notification run: PostgreSQL store and run log,
//! configured push transport, Redis run lock.

use std::sync::Arc;

use chrono::{Local, NaiveDate};
use redis::aio::ConnectionManager;
use sqlx::PgPool;

use herald_common::config::AppConfig;
use herald_common::types::{RunState, RunStats, ScheduledRun};
use herald_notifier::PushTransport;

use crate::composer::MessageComposer;
use crate::orchestrator::{NotifySchedule, SCHEDULE_NAME, target_date};
use crate::pg_store::PgStore;
use crate::run_lock::{RedisRunGuard, RunGuard, RunLock};
use crate::run_log::{RunLogSink, RunLogger};
use crate::runs::PgRunLog;
use crate::store::NotifyStore;

pub type PgNotifySchedule = NotifySchedule<PgStore, Arc<dyn PushTransport>>;

/// What happens to the run lock once a run has finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockPolicy {
    /// Keep the lock until its TTL expires; other replicas skip the date.
    HoldUntilExpiry,
    /// Release the lock as soon as the run is sealed.
    ReleaseAfterRun,
}

#[derive(Debug)]
pub enum TriggerOutcome {
    Completed(ScheduledRun),
    /// Another run for this target date holds the lock.
    Locked(NaiveDate),
}

#[derive(Clone)]
pub struct NotifyService {
    schedule: Arc<PgNotifySchedule>,
    runs: Arc<PgRunLog>,
    guard: Arc<dyn RunGuard>,
}

impl NotifyService {
    pub fn new(
        schedule: Arc<PgNotifySchedule>,
        runs: Arc<PgRunLog>,
        guard: Arc<dyn RunGuard>,
    ) -> Self {
        Self {
            schedule,
            runs,
            guard,
        }
    }

    /// Wire the service from configuration.
    pub fn from_config(
        config: &AppConfig,
        pool: PgPool,
        redis: ConnectionManager,
    ) -> anyhow::Result<Self> {
        let transport = herald_notifier::transport_from_config(config)?;
        let schedule = NotifySchedule::new(
            PgStore::new(pool.clone()),
            transport,
            MessageComposer::new(config.project_name.clone()),
        );
        let guard = RedisRunGuard::new(RunLock::new(config.run_lock_ttl_seconds), redis);

        Ok(Self::new(
            Arc::new(schedule),
            Arc::new(PgRunLog::new(pool)),
            Arc::new(guard),
        ))
    }

    pub fn runs(&self) -> &PgRunLog {
        &self.runs
    }

    /// Run the notification for `today + days_ahead` under the run lock.
    pub async fn trigger(&self, days_ahead: u32, policy: LockPolicy) -> TriggerOutcome {
        trigger_run(
            self.schedule.as_ref(),
            self.guard.as_ref(),
            self.runs.clone(),
            Local::now().date_naive(),
            days_ahead,
            policy,
        )
        .await
    }
}

/// Take the run lock, run `schedule` and seal the report into `sink`.
///
/// Every outcome except a held lock leaves a sealed report; a lock that
/// cannot be checked seals the run as failed without notifying anyone.
pub async fn trigger_run<S, T>(
    schedule: &NotifySchedule<S, T>,
    guard: &dyn RunGuard,
    sink: Arc<dyn RunLogSink>,
    today: NaiveDate,
    days_ahead: u32,
    policy: LockPolicy,
) -> TriggerOutcome
where
    S: NotifyStore,
    T: PushTransport,
{
    // Out-of-range dates cannot collide; the run itself reports the failure.
    let Some(date) = target_date(today, days_ahead) else {
        let logger = RunLogger::with_sink(SCHEDULE_NAME, sink).await;
        return TriggerOutcome::Completed(schedule.run_from(today, days_ahead, logger).await);
    };

    let acquired = guard.try_acquire(date).await;
    let acquired = match acquired {
        Ok(acquired) => acquired,
        Err(e) => {
            let reason = format!("{e:#}");
            tracing::error!(%date, error = %reason, "Run lock unavailable");
            let mut logger = RunLogger::with_sink(SCHEDULE_NAME, sink).await;
            logger.append_log("Start food notify schedule").await;
            logger
                .append_log(format!("Error: run lock unavailable: {reason}"))
                .await;
            let result = serde_json::to_value(RunStats::default()).unwrap_or_default();
            return TriggerOutcome::Completed(logger.finish(RunState::Failed, result).await);
        }
    };
    if !acquired {
        return TriggerOutcome::Locked(date);
    }

    let logger = RunLogger::with_sink(SCHEDULE_NAME, sink).await;
    let run = schedule.run_from(today, days_ahead, logger).await;

    if policy == LockPolicy::ReleaseAfterRun
        && let Err(e) = guard.release(date).await
    {
        tracing::warn!(%date, error = %e, "Failed to release run lock");
    }

    tracing::info!(
        run_id = %run.id,
        state = %run.state,
        %date,
        "Notification run finished"
    );
    TriggerOutcome::Completed(run)
}
