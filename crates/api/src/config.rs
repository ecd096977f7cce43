use std::str::FromStr;
use std::time::Duration;

use labcoord_core::retry::DEFAULT_RETRY_WINDOW_SECS;

/// Server configuration loaded from environment variables.
///
/// All fields have sensible defaults suitable for local development.
/// In production, override via environment variables.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address (default: `0.0.0.0`).
    pub host: String,
    /// Bind port (default: `5080`).
    pub port: u16,
    /// Allowed CORS origins, parsed from comma-separated `CORS_ORIGINS` env var.
    pub cors_origins: Vec<String>,
    /// HTTP request timeout in seconds (default: `30`).
    pub request_timeout_secs: u64,
    /// How long shutdown waits for retry loops to wind down (default: `30`).
    pub shutdown_timeout_secs: u64,
    /// Batch retry window when the request gives none (default: one hour).
    pub default_retry_window_secs: u64,
    /// Per-machine capacity probe timeout in seconds (default: `10`).
    pub probe_timeout_secs: u64,
    /// Job submission timeout in seconds (default: `30`).
    pub submit_timeout_secs: u64,
    /// Webhook delivery timeout in seconds (default: `10`).
    pub webhook_timeout_secs: u64,
    /// Largest accepted request body in bytes (default: 100 MiB).
    pub max_upload_bytes: usize,
}

impl ServerConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                     | Default                 |
    /// |-----------------------------|-------------------------|
    /// | `HOST`                      | `0.0.0.0`               |
    /// | `PORT`                      | `5080`                  |
    /// | `CORS_ORIGINS`              | `http://localhost:5173` |
    /// | `REQUEST_TIMEOUT_SECS`      | `30`                    |
    /// | `SHUTDOWN_TIMEOUT_SECS`     | `30`                    |
    /// | `DEFAULT_RETRY_WINDOW_SECS` | `3600`                  |
    /// | `PROBE_TIMEOUT_SECS`        | `10`                    |
    /// | `SUBMIT_TIMEOUT_SECS`       | `30`                    |
    /// | `WEBHOOK_TIMEOUT_SECS`      | `10`                    |
    /// | `MAX_UPLOAD_BYTES`          | `104857600`             |
    pub fn from_env() -> Self {
        let host = std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".into());

        let cors_origins: Vec<String> = std::env::var("CORS_ORIGINS")
            .unwrap_or_else(|_| "http://localhost:5173".into())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        Self {
            host,
            port: env_parse("PORT", 5080),
            cors_origins,
            request_timeout_secs: env_parse("REQUEST_TIMEOUT_SECS", 30),
            shutdown_timeout_secs: env_parse("SHUTDOWN_TIMEOUT_SECS", 30),
            default_retry_window_secs: env_parse("DEFAULT_RETRY_WINDOW_SECS", DEFAULT_RETRY_WINDOW_SECS),
            probe_timeout_secs: env_parse("PROBE_TIMEOUT_SECS", 10),
            submit_timeout_secs: env_parse("SUBMIT_TIMEOUT_SECS", 30),
            webhook_timeout_secs: env_parse("WEBHOOK_TIMEOUT_SECS", 10),
            max_upload_bytes: env_parse("MAX_UPLOAD_BYTES", 100 * 1024 * 1024),
        }
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_secs(self.probe_timeout_secs)
    }

    pub fn submit_timeout(&self) -> Duration {
        Duration::from_secs(self.submit_timeout_secs)
    }

    pub fn webhook_timeout(&self) -> Duration {
        Duration::from_secs(self.webhook_timeout_secs)
    }
}

/// Read `name` from the environment, panicking on an unparseable value.
fn env_parse<T>(name: &str, default: T) -> T
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .unwrap_or_else(|e| panic!("{name} must be a valid {}: {e}", std::any::type_name::<T>())),
        Err(_) => default,
    }
}
