use pgsteward_grants::GrantError;
use reqwest::StatusCode;
use thiserror::Error as ThisError;

use super::IsRetryable;

#[derive(Debug, ThisError)]
pub enum StewardError {
    #[error(
        "Missing required IAM permission to {action}. This requires 'roles/cloudsql.admin' or an equivalent role"
    )]
    PermissionDenied { action: String },

    #[error(
        "Some SQL commands in this migration require admin permissions. Ask a user with 'roles/cloudsql.admin' to apply them:\n{statements}"
    )]
    AdminStatementsRequired { statements: String },

    #[error(
        "Command aborted. {login} has not been granted the {role} SQL role. Ask a user with 'roles/cloudsql.admin' to run `pgsteward setup` and grant the owner role"
    )]
    RoleNotGranted { role: String, login: String },

    #[error("Database user {login} raced the built-in IAM role: {message}")]
    TransientRoleRace { login: String, message: String },

    #[error(
        "Command aborted. This schema migration includes potentially destructive changes. Rerun with --force to execute it anyway"
    )]
    DestructiveChangeRejected,

    #[error(
        "Command aborted. Your database schema is incompatible with your data service schema. Run `pgsteward migrate` to migrate it"
    )]
    MigrationRequired,

    #[error("Command aborted.")]
    MigrationAborted,

    #[error(
        "Command aborted. These connectors are incompatible with the new schema: {connectors}. Deploy them first with the Firebase CLI (`{command}`), or rerun with --force to delete them"
    )]
    InvalidConnectors { connectors: String, command: String },

    #[error(
        "Schema {schema} already contains tables owned by other roles; rerun `pgsteward setup` without --non-interactive/--force to choose how to set it up"
    )]
    InteractiveSetupRequired { schema: String },

    #[error(
        "Brownfield databases are protected from SQL changes. Run `pgsteward setup` and transfer ownership to apply migrations"
    )]
    BrownfieldProtected,

    #[error(
        "The owner role is only available in greenfield schemas; schema {schema} is {status}. Run `pgsteward setup` and transfer ownership first"
    )]
    OwnerRequiresGreenfield { schema: String, status: String },

    #[error("Error executing `{statement}`: {source}")]
    EngineExecution {
        statement: String,
        #[source]
        source: sqlx::Error,
    },

    #[error("Cloud SQL instance {instance} has no primary IP address")]
    NoPrimaryIp { instance: String },

    #[error("Operation {name} is still pending")]
    OperationPending { name: String },

    #[error("Operation {name} failed: {message}")]
    OperationFailed { name: String, message: String },

    #[error("Upstream error with status {status}: {message}")]
    Upstream { status: StatusCode, message: String },

    #[error("Invalid schema: {0}")]
    InvalidSchema(String),

    #[error(transparent)]
    InvalidIdentifier(#[from] GrantError),

    #[error("No credentials found. Set auth.access_token, auth.credentials_file or GOOGLE_APPLICATION_CREDENTIALS")]
    NoCredentials,

    #[error("OAuth2 error: {0}")]
    Oauth(String),

    #[error("Prompt failed: {0}")]
    Prompt(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Unexpected error: {0}")]
    Unexpected(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("HTTP request error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("URL parse error: {0}")]
    Url(#[from] url::ParseError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl IsRetryable for StewardError {
    fn is_retryable(&self) -> bool {
        match self {
            StewardError::TransientRoleRace { .. } | StewardError::OperationPending { .. } => true,
            StewardError::Reqwest(err) => err.is_timeout() || err.is_connect(),
            StewardError::Upstream { status, .. } => {
                *status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
            }
            _ => false,
        }
    }
}
