//! Maps Google accounts to Postgres login names and makes sure those logins exist.

use crate::admin::SqlAdminApi;
use crate::error::{IsRetryable, StewardError, is_already_exists, is_builtin_role_race};
use crate::retry::LinearBackoff;
use crate::target::Target;
use backon::Retryable;
use pgsteward_grants::{GrantError, Ident};
use pgsteward_schema::{User, UserType};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info, warn};

pub const SERVICE_ACCOUNT_SUFFIX: &str = ".gserviceaccount.com";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuthMode {
    IamUser,
    IamServiceAccount,
    BuiltIn,
}

impl AuthMode {
    pub fn user_type(self) -> UserType {
        match self {
            AuthMode::IamUser => UserType::CloudIamUser,
            AuthMode::IamServiceAccount => UserType::CloudIamServiceAccount,
            AuthMode::BuiltIn => UserType::BuiltIn,
        }
    }
}

/// A Postgres login and how it authenticates.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DatabaseIdentity {
    pub login_name: String,
    pub auth_mode: AuthMode,
}

impl DatabaseIdentity {
    pub fn built_in(login_name: impl Into<String>) -> Self {
        Self {
            login_name: login_name.into(),
            auth_mode: AuthMode::BuiltIn,
        }
    }

    pub fn login(&self) -> Result<Ident, GrantError> {
        Ident::new(self.login_name.as_str())
    }
}

/// Service accounts log in without the `.gserviceaccount.com` suffix; every
/// other account logs in under its full address.
pub fn map_identity(account: &str) -> DatabaseIdentity {
    match account.strip_suffix(SERVICE_ACCOUNT_SUFFIX) {
        Some(login) => DatabaseIdentity {
            login_name: login.to_string(),
            auth_mode: AuthMode::IamServiceAccount,
        },
        None => DatabaseIdentity {
            login_name: account.to_string(),
            auth_mode: AuthMode::IamUser,
        },
    }
}

/// Account of the data service agent for a project.
pub fn service_agent_account(project_number: &str, domain: &str) -> String {
    format!("service-{project_number}@{domain}")
}

/// Creates the database user for `identity` unless it already exists.
///
/// Creation on a fresh instance can race the built-in `cloudsqliamuser` role;
/// that failure is retried on `backoff`. Any other failure is returned as-is.
pub async fn ensure_identity_exists(
    admin: &dyn SqlAdminApi,
    target: &Target,
    identity: &DatabaseIdentity,
    backoff: LinearBackoff,
) -> Result<(), StewardError> {
    let attempt = || async {
        let existing = admin
            .get_user(&target.project_id, &target.instance_id, &identity.login_name)
            .await?;
        if existing.is_some() {
            debug!(login = %identity.login_name, "Database user already exists");
            return Ok(());
        }

        let user = User {
            name: identity.login_name.clone(),
            instance: Some(target.instance_id.clone()),
            project: Some(target.project_id.clone()),
            user_type: Some(identity.auth_mode.user_type()),
            password: None,
        };
        match admin
            .create_user(&target.project_id, &target.instance_id, &user)
            .await
        {
            Ok(()) => {
                info!(login = %identity.login_name, instance = %target.instance_id, "Created database user");
                Ok(())
            }
            Err(err) if is_already_exists(&err) => Ok(()),
            Err(err) if is_builtin_role_race(&err) => Err(StewardError::TransientRoleRace {
                login: identity.login_name.clone(),
                message: err.to_string(),
            }),
            Err(err) => Err(err),
        }
    };

    attempt
        .retry(backoff)
        .when(|e: &StewardError| e.is_retryable())
        .notify(|err, dur: Duration| {
            warn!(
                "Creating database user retrying after error {}, sleeping {:?}",
                err, dur
            );
        })
        .await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn service_accounts_drop_their_suffix() {
        let id = map_identity("sa@proj.iam.gserviceaccount.com");
        assert_eq!(id.login_name, "sa@proj.iam");
        assert_eq!(id.auth_mode, AuthMode::IamServiceAccount);
        assert_eq!(id.auth_mode.user_type(), UserType::CloudIamServiceAccount);
    }

    #[test]
    fn user_accounts_are_kept_verbatim() {
        let id = map_identity("alice@example.com");
        assert_eq!(id.login_name, "alice@example.com");
        assert_eq!(id.auth_mode, AuthMode::IamUser);
    }

    #[test]
    fn service_agent_uses_project_number() {
        let account = service_agent_account("1234", "gcp-sa-firebasedataconnect.iam.gserviceaccount.com");
        assert_eq!(
            account,
            "service-1234@gcp-sa-firebasedataconnect.iam.gserviceaccount.com"
        );
        assert_eq!(
            map_identity(&account).login_name,
            "service-1234@gcp-sa-firebasedataconnect.iam"
        );
    }
}
