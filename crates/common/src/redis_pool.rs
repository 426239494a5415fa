use redis::Client;
use redis::aio::ConnectionManager;

/// Connect to Redis for the scheduler's cross-replica run lock.
pub async fn create_redis_pool(redis_url: &str) -> anyhow::Result<ConnectionManager> {
    let manager = ConnectionManager::new(Client::open(redis_url)?).await?;

    tracing::info!("Connected to Redis for run locking");
    Ok(manager)
}
