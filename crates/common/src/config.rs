use serde::Deserialize;

/// Global application configuration loaded from environment variables.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// PostgreSQL connection string
    pub database_url: String,

    /// Maximum number of PostgreSQL connections in the pool (default: 20)
    pub db_max_connections: u32,

    /// Seconds between dispatch cycles (default: 30)
    pub poll_interval_secs: u64,

    /// Seconds to wait after a cycle could not list pending work (default: 60)
    pub error_backoff_secs: u64,

    /// Failed attempts before a notification is marked failed (default: 3)
    pub max_retries: u32,

    /// Per-request timeout for relay deliveries in seconds (default: 10)
    pub delivery_timeout_secs: u64,

    /// Relay endpoint for email delivery
    pub email_relay_url: Option<String>,

    /// Relay endpoint for SMS delivery
    pub sms_relay_url: Option<String>,

    /// Relay endpoint for push delivery
    pub push_relay_url: Option<String>,
}

impl AppConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build configuration from an arbitrary key lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        Ok(Self {
            database_url: lookup("DATABASE_URL")
                .ok_or_else(|| anyhow::anyhow!("DATABASE_URL environment variable is required"))?,
            db_max_connections: parse_or(&lookup, "DB_MAX_CONNECTIONS", 20)?,
            poll_interval_secs: parse_or(&lookup, "NOTIFIER_POLL_INTERVAL_SECS", 30)?,
            error_backoff_secs: parse_or(&lookup, "NOTIFIER_ERROR_BACKOFF_SECS", 60)?,
            max_retries: parse_or(&lookup, "NOTIFIER_MAX_RETRIES", 3)?,
            delivery_timeout_secs: parse_or(&lookup, "NOTIFIER_DELIVERY_TIMEOUT_SECS", 10)?,
            email_relay_url: non_empty(lookup("EMAIL_RELAY_URL")),
            sms_relay_url: non_empty(lookup("SMS_RELAY_URL")),
            push_relay_url: non_empty(lookup("PUSH_RELAY_URL")),
        })
    }
}

fn parse_or<T: std::str::FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
    default: T,
) -> anyhow::Result<T> {
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| anyhow::anyhow!("{key} must be a valid {}", std::any::type_name::<T>())),
        None => Ok(default),
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}
