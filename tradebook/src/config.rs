use std::str::FromStr;
use std::time::Duration;

use crate::trade::coordinator::RetryPolicy;

#[derive(Clone, Debug)]
pub struct AppConfig {
    /// Database connection string.
    pub database_url: String,

    /// Upper bound on pooled SQLite connections.
    pub max_connections: u32,

    /// How long a connection waits on the database write lock before the
    /// driver reports `SQLITE_BUSY`.
    ///
    /// A busy report surfaces as a retryable conflict, so this and
    /// `submit_max_attempts` together bound how long a submission can stall.
    pub busy_timeout_ms: u64,

    // =========================
    // Submission retry
    // =========================
    /// Attempts per `SubmitTrade` before a conflict is surfaced to the caller.
    pub submit_max_attempts: u32,

    /// Base backoff between attempts; attempt `n` sleeps `n * backoff`.
    pub submit_retry_backoff_ms: u64,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database_url: "sqlite://tradebook.db".to_string(),
            max_connections: 8,
            busy_timeout_ms: 5_000,
            submit_max_attempts: 5,
            submit_retry_backoff_ms: 20,
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();

        Self {
            database_url: std::env::var("DATABASE_URL").unwrap_or(defaults.database_url),
            max_connections: env_or("DB_MAX_CONNECTIONS", defaults.max_connections),
            busy_timeout_ms: env_or("DB_BUSY_TIMEOUT_MS", defaults.busy_timeout_ms),
            submit_max_attempts: env_or("SUBMIT_MAX_ATTEMPTS", defaults.submit_max_attempts),
            submit_retry_backoff_ms: env_or(
                "SUBMIT_RETRY_BACKOFF_MS",
                defaults.submit_retry_backoff_ms,
            ),
        }
    }

    pub fn busy_timeout(&self) -> Duration {
        Duration::from_millis(self.busy_timeout_ms)
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(
            self.submit_max_attempts,
            Duration::from_millis(self.submit_retry_backoff_ms),
        )
    }
}

fn env_or<T>(key: &str, default: T) -> T
where
    T: FromStr + std::fmt::Display,
{
    match std::env::var(key) {
        Ok(raw) => raw.trim().parse().unwrap_or_else(|_| {
            tracing::warn!(key, value = %raw, fallback = %default, "unparseable config value");
            default
        }),
        Err(_) => default,
    }
}
