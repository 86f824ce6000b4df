use std::time::Duration;

use stax_core::job::DEFAULT_JOB_TIMEOUT;

/// Default delay between dispatcher cycles.
const DEFAULT_DISPATCH_INTERVAL_SECS: u64 = 20;

/// Default delay between completion watcher cycles.
const DEFAULT_COMPLETION_INTERVAL_SECS: u64 = 10;

const DEFAULT_BACKEND_TIMEOUT_SECS: u64 = 30;
const DEFAULT_DB_MAX_CONNECTIONS: u32 = 10;
const DEFAULT_SHUTDOWN_TIMEOUT_SECS: u64 = 10;
const DEFAULT_STORE_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{0} environment variable is required")]
    Missing(&'static str),

    #[error("{name} must be a positive integer, got '{value}'")]
    Invalid { name: &'static str, value: String },
}

/// Worker configuration loaded from environment variables.
#[derive(Clone)]
pub struct WorkerConfig {
    pub database_url: String,
    /// Database holding the job queue; defaults to `database_url`.
    pub queue_database_url: String,
    pub backend_uri: String,
    pub backend_auth_token: String,
    pub dispatch_interval: Duration,
    pub completion_interval: Duration,
    pub job_timeout: Duration,
    pub backend_timeout: Duration,
    pub db_max_connections: u32,
    /// Limit on one store or queue call, also sent as `statement_timeout`.
    pub store_timeout: Duration,
    /// How long to wait for both loops to stop after a shutdown signal.
    pub shutdown_timeout: Duration,
}

impl std::fmt::Debug for WorkerConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerConfig")
            .field("backend_uri", &self.backend_uri)
            .field("backend_auth_token", &"<redacted>")
            .field("dispatch_interval", &self.dispatch_interval)
            .field("completion_interval", &self.completion_interval)
            .field("job_timeout", &self.job_timeout)
            .field("backend_timeout", &self.backend_timeout)
            .field("db_max_connections", &self.db_max_connections)
            .field("store_timeout", &self.store_timeout)
            .field("shutdown_timeout", &self.shutdown_timeout)
            .finish_non_exhaustive()
    }
}

impl WorkerConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                    | Default        |
    /// |----------------------------|----------------|
    /// | `DATABASE_URL`             | required       |
    /// | `QUEUE_DATABASE_URL`       | `DATABASE_URL` |
    /// | `BACKEND_URI`              | required       |
    /// | `BACKEND_AUTH_TOKEN`       | required       |
    /// | `DISPATCH_INTERVAL_SECS`   | `20`           |
    /// | `COMPLETION_INTERVAL_SECS` | `10`           |
    /// | `JOB_TIMEOUT_SECS`         | `600`          |
    /// | `BACKEND_TIMEOUT_SECS`     | `30`           |
    /// | `DB_MAX_CONNECTIONS`       | `10`           |
    /// | `STORE_TIMEOUT_SECS`       | `30`           |
    /// | `SHUTDOWN_TIMEOUT_SECS`    | `10`           |
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| lookup(name).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let required = |name: &'static str| var(name).ok_or(ConfigError::Missing(name));
        let number = |name: &'static str, default: u64| -> Result<u64, ConfigError> {
            match var(name) {
                None => Ok(default),
                Some(value) => match value.parse::<u64>() {
                    Ok(n) if n > 0 => Ok(n),
                    _ => Err(ConfigError::Invalid { name, value }),
                },
            }
        };

        let database_url = required("DATABASE_URL")?;
        let queue_database_url = var("QUEUE_DATABASE_URL").unwrap_or_else(|| database_url.clone());

        let db_max_connections = number("DB_MAX_CONNECTIONS", u64::from(DEFAULT_DB_MAX_CONNECTIONS))?;
        let db_max_connections =
            u32::try_from(db_max_connections).map_err(|_| ConfigError::Invalid {
                name: "DB_MAX_CONNECTIONS",
                value: db_max_connections.to_string(),
            })?;

        Ok(Self {
            database_url,
            queue_database_url,
            backend_uri: required("BACKEND_URI")?,
            backend_auth_token: required("BACKEND_AUTH_TOKEN")?,
            dispatch_interval: Duration::from_secs(number(
                "DISPATCH_INTERVAL_SECS",
                DEFAULT_DISPATCH_INTERVAL_SECS,
            )?),
            completion_interval: Duration::from_secs(number(
                "COMPLETION_INTERVAL_SECS",
                DEFAULT_COMPLETION_INTERVAL_SECS,
            )?),
            job_timeout: Duration::from_secs(number(
                "JOB_TIMEOUT_SECS",
                DEFAULT_JOB_TIMEOUT.as_secs(),
            )?),
            backend_timeout: Duration::from_secs(number(
                "BACKEND_TIMEOUT_SECS",
                DEFAULT_BACKEND_TIMEOUT_SECS,
            )?),
            db_max_connections,
            store_timeout: Duration::from_secs(number(
                "STORE_TIMEOUT_SECS",
                DEFAULT_STORE_TIMEOUT_SECS,
            )?),
            shutdown_timeout: Duration::from_secs(number(
                "SHUTDOWN_TIMEOUT_SECS",
                DEFAULT_SHUTDOWN_TIMEOUT_SECS,
            )?),
        })
    }
}
