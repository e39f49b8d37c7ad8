use pgsteward_grants::{DEFAULT_SCHEMA, ELEVATED_LOGIN};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Postgres connection settings plus an optional default target so CLI
/// invocations can omit `--instance`/`--database`.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DatabaseConfig {
    #[serde(default)]
    pub instance_id: Option<String>,

    #[serde(default)]
    pub database_id: Option<String>,

    /// TOML: `database.schema`. Default: `public`.
    #[serde(default = "default_schema")]
    pub schema: String,

    /// Connect here instead of the instance's primary IP, e.g. `127.0.0.1`
    /// for a local Cloud SQL Auth Proxy. TOML: `database.host`.
    #[serde(default)]
    pub host: Option<String>,

    /// TOML: `database.port`. Default: `5432`.
    #[serde(default = "default_port")]
    pub port: u16,

    /// Require TLS on every connection. Default: `true`.
    #[serde(default = "default_true")]
    pub require_tls: bool,

    /// Built-in login used for elevated sessions.
    /// TOML: `database.elevated_login`. Default: `firebasesuperuser`.
    #[serde(default = "default_elevated_login")]
    pub elevated_login: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            instance_id: None,
            database_id: None,
            schema: default_schema(),
            host: None,
            port: default_port(),
            require_tls: true,
            elevated_login: default_elevated_login(),
        }
    }
}

/// Retry and polling cadence.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RetryConfig {
    /// Total attempts when creating a database user races the built-in IAM role.
    /// TOML: `retry.identity_attempts`. Default: `3`.
    #[serde(default = "default_identity_attempts")]
    pub identity_attempts: usize,

    /// Linear backoff unit between those attempts, in milliseconds.
    /// TOML: `retry.identity_backoff_ms`. Default: `1000`.
    #[serde(default = "default_identity_backoff_ms")]
    pub identity_backoff_ms: u64,

    /// Interval between long-running operation polls, in milliseconds.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Polls before giving up on a long-running operation.
    #[serde(default = "default_max_polls")]
    pub max_polls: usize,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            identity_attempts: default_identity_attempts(),
            identity_backoff_ms: default_identity_backoff_ms(),
            poll_interval_ms: default_poll_interval_ms(),
            max_polls: default_max_polls(),
        }
    }
}

impl RetryConfig {
    pub fn identity_backoff(&self) -> Duration {
        Duration::from_millis(self.identity_backoff_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

fn default_schema() -> String {
    DEFAULT_SCHEMA.to_string()
}

fn default_port() -> u16 {
    5432
}

fn default_true() -> bool {
    true
}

fn default_elevated_login() -> String {
    ELEVATED_LOGIN.to_string()
}

fn default_identity_attempts() -> usize {
    3
}

fn default_identity_backoff_ms() -> u64 {
    1000
}

fn default_poll_interval_ms() -> u64 {
    2000
}

fn default_max_polls() -> usize {
    90
}
