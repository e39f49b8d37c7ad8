use crate::error::StewardError;
use crate::identity::{ensure_identity_exists, map_identity};
use crate::sql::{ExecContext, SqlBatch, SqlExecutor, query};
use crate::steward::Steward;
use crate::target::Target;
use pgsteward_grants::privileges::grant_role;
use pgsteward_grants::{Ident, ManagedRole, queries};
use tracing::info;

use super::inspect::{SchemaSetupStatus, inspect_schema};

/// Whether `granted` is directly granted to `grantee`, read from the catalog
/// as the caller.
pub async fn check_role_is_granted(
    executor: &dyn SqlExecutor,
    target: &Target,
    granted: &str,
    grantee: &str,
) -> Result<bool, StewardError> {
    let rows = query(executor, target, queries::role_is_granted(granted, grantee)).await?;
    Ok(rows
        .first()
        .and_then(|row| row.bool("granted"))
        .unwrap_or(false))
}

/// Grants one managed role to an account's database login, creating the
/// login first when needed. The owner role is only handed out in greenfield
/// schemas; elsewhere it would let the grantee bypass brownfield protection.
pub async fn grant_role_to_user(
    steward: &Steward,
    target: &Target,
    role: ManagedRole,
    account: &str,
) -> Result<(), StewardError> {
    if role == ManagedRole::Owner {
        let snapshot = inspect_schema(steward.executor.as_ref(), target).await?;
        if snapshot.setup_status != SchemaSetupStatus::GreenField {
            return Err(StewardError::OwnerRequiresGreenfield {
                schema: target.schema.clone(),
                status: snapshot.setup_status.to_string(),
            });
        }
    }

    let identity = map_identity(account);
    ensure_identity_exists(
        steward.admin.as_ref(),
        target,
        &identity,
        steward.identity_backoff,
    )
    .await?;

    let roles = target.role_names()?;
    let login = Ident::new(identity.login_name.as_str())?;
    let batch = SqlBatch::new([grant_role(roles.role(role), &login)]).verbose();
    steward
        .executor
        .execute(target, batch, ExecContext::Elevated)
        .await?;
    info!(role = %role, login = %login.as_str(), target = %target, "Granted SQL role");
    Ok(())
}
