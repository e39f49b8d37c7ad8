use crate::admin::caller_is_sql_admin;
use crate::error::StewardError;
use crate::identity::ensure_identity_exists;
use crate::sql::{ExecContext, SqlBatch, Visibility};
use crate::steward::Steward;
use crate::target::Target;
use pgsteward_grants::{CLOUDSQL_SUPERUSER, Statement};
use tracing::{info, warn};

use super::inspect::{SchemaSetupStatus, SchemaSnapshot, inspect_schema};
use super::provision::Provisioner;
use super::roles::check_role_is_granted;

/// Brings a schema to the managed role layout, deciding between greenfield
/// setup, ownership transfer and brownfield repair from `snapshot`.
///
/// Returns the resulting status, which is always `GreenField` or `BrownField`.
pub async fn setup_sql_permissions(
    steward: &Steward,
    target: &Target,
    snapshot: &SchemaSnapshot,
    visibility: Visibility,
) -> Result<SchemaSetupStatus, StewardError> {
    require_sql_admin(steward, target).await?;
    ensure_required_identities(steward, target).await?;
    provision_from_snapshot(steward, target, snapshot, visibility).await
}

/// Full setup from scratch: creates the required logins, then inspects the
/// schema as the caller and provisions it. The caller cannot log in to read
/// the catalog until its login exists, so inspection comes second.
pub async fn setup_schema(
    steward: &Steward,
    target: &Target,
    visibility: Visibility,
) -> Result<SchemaSetupStatus, StewardError> {
    require_sql_admin(steward, target).await?;
    ensure_required_identities(steward, target).await?;
    let snapshot = inspect_schema(steward.executor.as_ref(), target).await?;
    info!(target = %target, status = %snapshot.setup_status, "Current schema status");
    provision_from_snapshot(steward, target, &snapshot, visibility).await
}

async fn require_sql_admin(steward: &Steward, target: &Target) -> Result<(), StewardError> {
    if caller_is_sql_admin(steward.admin.as_ref(), &target.project_id).await {
        Ok(())
    } else {
        Err(StewardError::PermissionDenied {
            action: format!("set up SQL permissions on {target}"),
        })
    }
}

async fn provision_from_snapshot(
    steward: &Steward,
    target: &Target,
    snapshot: &SchemaSnapshot,
    visibility: Visibility,
) -> Result<SchemaSetupStatus, StewardError> {
    let provisioner = Provisioner::new(
        target,
        &steward.elevated_login,
        &steward.caller(),
        &steward.service_agent(),
    )?;

    if snapshot.setup_status == SchemaSetupStatus::GreenField {
        info!(target = %target, "Schema already set up; repairing grants");
        let plan = greenfield_plan(steward, target, &provisioner).await?;
        run_plan(steward, target, plan, visibility).await?;
        return Ok(SchemaSetupStatus::GreenField);
    }

    if !snapshot.has_tables() {
        info!(target = %target, "Schema has no tables; running greenfield setup");
        let plan = greenfield_plan(steward, target, &provisioner).await?;
        run_plan(steward, target, plan, visibility).await?;
        return Ok(SchemaSetupStatus::GreenField);
    }

    if !steward.flags.interactive() || steward.flags.force {
        return Err(StewardError::InteractiveSetupRequired {
            schema: target.schema.clone(),
        });
    }

    let owners = snapshot.foreign_owners(provisioner.roles());
    let message = format!(
        "Schema {} on {} already has {} table(s) owned by: {}. Transfer ownership to the managed roles? Ownership changes can break tools that create or alter these tables.",
        target.schema,
        target.instance_id,
        snapshot.tables.len(),
        if owners.is_empty() {
            "cloudsqlsuperuser".to_string()
        } else {
            owners.join(", ")
        },
    );
    if steward.prompter.confirm(&message, false).await? {
        let revoke_legacy = legacy_superuser_granted(steward, target, &provisioner).await?;
        let plan = provisioner.transfer_ownership_to_greenfield(snapshot, revoke_legacy)?;
        run_plan(steward, target, plan, visibility).await?;
        info!(target = %target, "Transferred schema ownership to managed roles");
        warn!(
            "Set schemaValidation to COMPATIBLE on this datasource if other tools still own tables in it"
        );
        Ok(SchemaSetupStatus::GreenField)
    } else {
        let plan = provisioner.brownfield_repair(snapshot)?;
        run_plan(steward, target, plan, visibility).await?;
        info!(target = %target, "Granted managed roles access without changing ownership");
        Ok(SchemaSetupStatus::BrownField)
    }
}

/// Inspects the schema and sets it up when the managed roles are missing.
/// Already-provisioned schemas, greenfield or brownfield, are left alone.
pub async fn setup_schema_if_necessary(
    steward: &Steward,
    target: &Target,
) -> Result<SchemaSetupStatus, StewardError> {
    ensure_required_identities(steward, target).await?;
    let snapshot = inspect_schema(steward.executor.as_ref(), target).await?;
    match snapshot.setup_status {
        SchemaSetupStatus::GreenField | SchemaSetupStatus::BrownField => {
            Ok(snapshot.setup_status)
        }
        SchemaSetupStatus::NotSetup | SchemaSetupStatus::NotFound => {
            setup_sql_permissions(steward, target, &snapshot, Visibility::Silent).await
        }
    }
}

/// The caller and the data service agent must have database logins before
/// any grant can name them.
async fn ensure_required_identities(
    steward: &Steward,
    target: &Target,
) -> Result<(), StewardError> {
    for identity in [steward.caller(), steward.service_agent()] {
        ensure_identity_exists(
            steward.admin.as_ref(),
            target,
            &identity,
            steward.identity_backoff,
        )
        .await?;
    }
    Ok(())
}

async fn greenfield_plan(
    steward: &Steward,
    target: &Target,
    provisioner: &Provisioner,
) -> Result<Vec<Statement>, StewardError> {
    let revoke_legacy = legacy_superuser_granted(steward, target, provisioner).await?;
    Ok(provisioner.greenfield_setup(revoke_legacy))
}

async fn legacy_superuser_granted(
    steward: &Steward,
    target: &Target,
    provisioner: &Provisioner,
) -> Result<bool, StewardError> {
    check_role_is_granted(
        steward.executor.as_ref(),
        target,
        CLOUDSQL_SUPERUSER,
        provisioner.roles().owner().as_str(),
    )
    .await
}

async fn run_plan(
    steward: &Steward,
    target: &Target,
    plan: Vec<Statement>,
    visibility: Visibility,
) -> Result<(), StewardError> {
    let batch = SqlBatch::new(plan)
        .with_visibility(visibility)
        .transactional();
    steward
        .executor
        .execute(target, batch, ExecContext::Elevated)
        .await?;
    Ok(())
}
