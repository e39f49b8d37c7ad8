mod auth;
mod basic;
mod database;
mod endpoints;

pub use auth::AuthConfig;
pub use basic::BasicConfig;
pub use database::{DatabaseConfig, RetryConfig};
pub use endpoints::EndpointsConfig;

use crate::error::StewardError;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Application configuration managed by Figment.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct Config {
    /// Project and caller settings (see `basic` table in pgsteward.toml).
    #[serde(default)]
    pub basic: BasicConfig,

    /// Where access tokens come from (see `auth` table).
    #[serde(default)]
    pub auth: AuthConfig,

    /// Google API base URLs (see `endpoints` table).
    #[serde(default)]
    pub endpoints: EndpointsConfig,

    /// Postgres connection settings and default target (see `database` table).
    #[serde(default)]
    pub database: DatabaseConfig,

    /// Retry and polling cadence (see `retry` table).
    #[serde(default)]
    pub retry: RetryConfig,
}

pub const DEFAULT_CONFIG_FILE: &str = "pgsteward.toml";
const ENV_PREFIX: &str = "PGSTEWARD_";

impl Config {
    /// Builds a Figment that merges defaults, a TOML file and `PGSTEWARD_*`
    /// environment variables, in that order of precedence.
    ///
    /// Nested keys use a double underscore: `PGSTEWARD_BASIC__PROJECT_ID`.
    pub fn figment(path: Option<&Path>) -> Figment {
        let file = path
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE));
        let figment = Figment::new().merge(Serialized::defaults(Config::default()));
        let figment = if file.is_file() {
            figment.merge(Toml::file(file))
        } else {
            figment
        };
        figment.merge(Env::prefixed(ENV_PREFIX).split("__"))
    }

    /// Loads and validates configuration. An explicitly named file must exist.
    pub fn load(path: Option<&Path>) -> Result<Self, StewardError> {
        if let Some(path) = path
            && !path.is_file()
        {
            return Err(StewardError::Config(format!(
                "config file not found: {}",
                path.display()
            )));
        }
        let cfg: Self = Self::figment(path)
            .extract()
            .map_err(|err| StewardError::Config(err.to_string()))?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<(), StewardError> {
        if self.basic.project_id.trim().is_empty() {
            return Err(StewardError::Config(
                "basic.project_id must be set and non-empty".to_string(),
            ));
        }
        if self.basic.project_number.trim().is_empty() {
            return Err(StewardError::Config(
                "basic.project_number must be set and non-empty".to_string(),
            ));
        }
        if self.retry.identity_attempts == 0 {
            return Err(StewardError::Config(
                "retry.identity_attempts must be at least 1".to_string(),
            ));
        }
        if self.database.elevated_login.trim().is_empty() {
            return Err(StewardError::Config(
                "database.elevated_login must be non-empty".to_string(),
            ));
        }
        Ok(())
    }
}
