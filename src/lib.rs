pub mod admin;
pub mod auth;
pub mod bootstrap;
pub mod config;
pub mod error;
pub mod identity;
pub mod migrate;
pub mod prompt;
pub mod retry;
pub mod setup;
pub mod sql;
pub mod steward;
pub mod target;
mod utils;

pub use error::{IsRetryable, StewardError};
pub use identity::{AuthMode, DatabaseIdentity, map_identity};
pub use migrate::{diff_schema, migrate_schema};
pub use setup::{
    SchemaSetupStatus, SchemaSnapshot, check_role_is_granted, inspect_schema,
    setup_sql_permissions,
};
pub use steward::{RunFlags, Steward};
pub use target::Target;
