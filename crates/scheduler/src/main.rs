use chrono::Local;
use clap::Parser;

use herald_common::config::AppConfig;
use herald_common::types::RunState;
use herald_common::{db, redis_pool};
use herald_engine::{LockPolicy, NotifyService, TriggerOutcome};
use herald_scheduler::timing::delay_until_next_fire;

#[derive(Debug, Parser)]
#[command(author, version, about = "Sends the daily meal notifications")]
struct Cli {
    /// Run once right now instead of waiting for NOTIFY_HOUR
    #[arg(long)]
    once: bool,

    /// Notify about offers this many days ahead (default: NOTIFY_DAYS_AHEAD)
    #[arg(long)]
    days_ahead: Option<u32>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "herald_scheduler=info,herald_engine=info,herald_notifier=info".into()
            }),
        )
        .json()
        .init();

    let cli = Cli::parse();
    tracing::info!("MealHerald scheduler starting...");

    // Load configuration
    let config = AppConfig::from_env()?;
    let days_ahead = cli.days_ahead.unwrap_or(config.notify_days_ahead);

    let pool = db::create_pool(&config.database_url, config.db_max_connections).await?;
    db::run_migrations(&pool).await?;
    let redis = redis_pool::create_redis_pool(&config.redis_url).await?;

    let service = NotifyService::from_config(&config, pool, redis)?;

    if cli.once {
        return run_once(&service, days_ahead).await;
    }

    tracing::info!(
        notify_hour = config.notify_hour,
        days_ahead,
        "Starting daily notification loop"
    );

    // Run with graceful shutdown on Ctrl+C
    tokio::select! {
        _ = run_daily(&service, config.notify_hour, days_ahead) => {}
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Received shutdown signal, stopping gracefully...");
        }
    }

    tracing::info!("MealHerald scheduler stopped.");
    Ok(())
}

/// Single run; a failed run is a failed process.
async fn run_once(service: &NotifyService, days_ahead: u32) -> anyhow::Result<()> {
    match service.trigger(days_ahead, LockPolicy::ReleaseAfterRun).await {
        TriggerOutcome::Completed(run) => {
            tracing::info!(run_id = %run.id, state = %run.state, result = %run.result, "Run complete");
            if run.state == RunState::Failed {
                anyhow::bail!("notification run {} failed", run.id);
            }
            Ok(())
        }
        TriggerOutcome::Locked(date) => {
            tracing::warn!(%date, "Another run for this date holds the lock, nothing to do");
            Ok(())
        }
    }
}

async fn run_daily(service: &NotifyService, hour: u32, days_ahead: u32) {
    loop {
        let delay = delay_until_next_fire(&Local::now(), hour);
        tracing::info!(wait_secs = delay.as_secs(), "Waiting for next notification run");
        tokio::time::sleep(delay).await;

        match service.trigger(days_ahead, LockPolicy::HoldUntilExpiry).await {
            TriggerOutcome::Completed(run) => {
                tracing::info!(run_id = %run.id, state = %run.state, result = %run.result, "Run complete");
            }
            TriggerOutcome::Locked(date) => {
                tracing::info!(%date, "Run skipped, another replica holds the lock");
            }
        }
    }
}
