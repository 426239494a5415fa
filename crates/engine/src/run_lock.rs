//! Run lock: Redis-backed guard against two replicas notifying the same day.
//!
//! Uses Redis `SET NX EX` for atomic check-and-set with automatic TTL expiry.

use async_trait::async_trait;
use chrono::NaiveDate;
use redis::AsyncCommands;
use redis::aio::ConnectionManager;

/// Default lock lifetime in seconds (1 hour).
pub const DEFAULT_LOCK_TTL_SECONDS: u64 = 3600;

/// Redis-backed lock keyed by the run's target date.
#[derive(Debug, Clone, Copy)]
pub struct RunLock {
    ttl_seconds: u64,
}

impl RunLock {
    pub fn new(ttl_seconds: u64) -> Self {
        Self { ttl_seconds }
    }

    pub fn ttl_seconds(&self) -> u64 {
        self.ttl_seconds
    }

    pub fn key(target_date: NaiveDate) -> String {
        format!("notify:run-lock:{}", target_date.format("%Y-%m-%d"))
    }

    /// Take the lock for `target_date`.
    ///
    /// Returns `true` if this caller now holds the lock, `false` if another
    /// run for the same date holds it.
    pub async fn try_acquire(
        &self,
        redis: &mut ConnectionManager,
        target_date: NaiveDate,
    ) -> anyhow::Result<bool> {
        let key = Self::key(target_date);

        // Some("OK") if the key was set, None if it already exists
        let result: Option<String> = redis::cmd("SET")
            .arg(&key)
            .arg("1")
            .arg("NX")
            .arg("EX")
            .arg(self.ttl_seconds)
            .query_async(redis)
            .await?;

        let acquired = result.is_some();
        if !acquired {
            tracing::info!(%target_date, "Run lock held elsewhere");
        }

        Ok(acquired)
    }

    /// Drop the lock for `target_date` before its TTL runs out.
    pub async fn release(
        &self,
        redis: &mut ConnectionManager,
        target_date: NaiveDate,
    ) -> anyhow::Result<()> {
        redis.del::<_, ()>(Self::key(target_date)).await?;
        Ok(())
    }
}

impl Default for RunLock {
    fn default() -> Self {
        Self::new(DEFAULT_LOCK_TTL_SECONDS)
    }
}

/// Exclusive claim on a target date, held by at most one run.
#[async_trait]
pub trait RunGuard: Send + Sync {
    /// `true` if the caller now holds the claim for `target_date`.
    async fn try_acquire(&self, target_date: NaiveDate) -> anyhow::Result<bool>;

    async fn release(&self, target_date: NaiveDate) -> anyhow::Result<()>;
}

/// [`RunLock`] bound to a Redis connection.
#[derive(Clone)]
pub struct RedisRunGuard {
    lock: RunLock,
    redis: ConnectionManager,
}

impl RedisRunGuard {
    pub fn new(lock: RunLock, redis: ConnectionManager) -> Self {
        Self { lock, redis }
    }
}

#[async_trait]
impl RunGuard for RedisRunGuard {
    async fn try_acquire(&self, target_date: NaiveDate) -> anyhow::Result<bool> {
        let mut redis = self.redis.clone();
        self.lock.try_acquire(&mut redis, target_date).await
    }

    async fn release(&self, target_date: NaiveDate) -> anyhow::Result<()> {
        let mut redis = self.redis.clone();
        self.lock.release(&mut redis, target_date).await
    }
}
