use serde::Deserialize;

/// Default Expo push endpoint.
pub const DEFAULT_EXPO_PUSH_URL: &str = "https://exp.host/--/api/v2/push/send";

/// Global application configuration loaded from environment variables.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// PostgreSQL connection string
    pub database_url: String,

    /// Redis connection string (used for the scheduler run lock)
    pub redis_url: String,

    /// Maximum number of PostgreSQL connections in the pool (default: 20)
    pub db_max_connections: u32,

    /// Display name used as the notification title
    pub project_name: Option<String>,

    /// Local hour of day at which the daily run fires (default: 10)
    pub notify_hour: u32,

    /// How many days ahead the daily run looks for offers (default: 1)
    pub notify_days_ahead: u32,

    /// TTL of the Redis run lock in seconds (default: 3600)
    pub run_lock_ttl_seconds: u64,

    /// Expo push API endpoint
    pub expo_push_url: String,

    /// Optional Expo access token for authenticated push requests
    pub expo_access_token: Option<String>,

    /// Log notifications instead of sending them
    pub push_dry_run: bool,

    /// Socket address the API server binds to (default: 0.0.0.0:3000)
    pub api_bind_addr: String,
}

impl AppConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the configuration from an arbitrary key lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let config = Self {
            database_url: lookup("DATABASE_URL")
                .ok_or_else(|| anyhow::anyhow!("DATABASE_URL environment variable is required"))?,
            redis_url: lookup("REDIS_URL").unwrap_or_else(|| "redis://localhost:6379".to_string()),
            db_max_connections: lookup("DB_MAX_CONNECTIONS")
                .unwrap_or_else(|| "20".to_string())
                .parse()
                .map_err(|_| anyhow::anyhow!("DB_MAX_CONNECTIONS must be a valid u32"))?,
            project_name: lookup("PROJECT_NAME").filter(|name| !name.trim().is_empty()),
            notify_hour: lookup("NOTIFY_HOUR")
                .unwrap_or_else(|| "10".to_string())
                .parse()
                .map_err(|_| anyhow::anyhow!("NOTIFY_HOUR must be a valid u32"))?,
            notify_days_ahead: lookup("NOTIFY_DAYS_AHEAD")
                .unwrap_or_else(|| "1".to_string())
                .parse()
                .map_err(|_| anyhow::anyhow!("NOTIFY_DAYS_AHEAD must be a non-negative integer"))?,
            run_lock_ttl_seconds: lookup("RUN_LOCK_TTL_SECONDS")
                .unwrap_or_else(|| "3600".to_string())
                .parse()
                .map_err(|_| anyhow::anyhow!("RUN_LOCK_TTL_SECONDS must be a valid u64"))?,
            expo_push_url: lookup("EXPO_PUSH_URL")
                .unwrap_or_else(|| DEFAULT_EXPO_PUSH_URL.to_string()),
            expo_access_token: lookup("EXPO_ACCESS_TOKEN"),
            push_dry_run: lookup("PUSH_DRY_RUN")
                .map(|v| matches!(v.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes"))
                .unwrap_or(false),
            api_bind_addr: lookup("API_BIND_ADDR").unwrap_or_else(|| "0.0.0.0:3000".to_string()),
        };

        if config.notify_hour > 23 {
            anyhow::bail!("NOTIFY_HOUR must be between 0 and 23");
        }
        if config.run_lock_ttl_seconds == 0 {
            anyhow::bail!("RUN_LOCK_TTL_SECONDS must be > 0");
        }

        Ok(config)
    }
}
