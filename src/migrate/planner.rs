use super::display::{
    diffs_to_string, display_invalid_connectors, display_no_diff, display_schema_changes,
    display_start,
};
use super::policy::{
    ConnectorOutcome, MigrationContext, MigrationDecision, PolicyOutcome, ValidationPass,
    decide_invalid_connectors, decide_migration, suggested_command,
};
use super::rejection::SchemaRejection;
use super::service::UpsertOutcome;
use crate::admin::caller_is_sql_admin;
use crate::error::StewardError;
use crate::setup::{
    SchemaSetupStatus, check_role_is_granted, grant_role_to_user, inspect_schema,
    setup_schema_if_necessary,
};
use crate::sql::{ExecContext, SqlBatch};
use crate::steward::Steward;
use crate::target::Target;
use futures::future::try_join_all;
use pgsteward_grants::privileges::set_role;
use pgsteward_grants::{ManagedRole, Statement};
use pgsteward_schema::{
    Diff, IncompatibleSqlSchemaError, InstanceState, MIGRATE_COMPATIBLE, Schema, SchemaValidation,
};
use tracing::{debug, info, warn};

/// Diffs plus whether any of them is destructive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classification {
    pub diffs: Vec<Diff>,
    pub destructive: bool,
}

pub fn classify(err: &IncompatibleSqlSchemaError) -> Classification {
    Classification {
        diffs: err.diffs.clone(),
        destructive: err.is_destructive(),
    }
}

/// Statements only the elevated login may run.
pub fn requires_superuser(diff: &Diff) -> bool {
    let sql = diff.sql.trim_start();
    sql.starts_with("CREATE EXTENSION") || sql.starts_with("CREATE SCHEMA")
}

/// Asks the validation service, without writing anything, what it would take
/// to make the database match `schema`. Broken connectors are reported and
/// otherwise ignored.
pub async fn compute_diff(
    steward: &Steward,
    schema: &Schema,
) -> Result<Option<IncompatibleSqlSchemaError>, StewardError> {
    match steward.schemas.upsert_schema(schema, true).await? {
        UpsertOutcome::Accepted => Ok(None),
        UpsertOutcome::Rejected(rejection) => {
            if !rejection.invalid_connectors.is_empty() {
                display_invalid_connectors(&rejection.invalid_connectors);
            }
            Ok(rejection.incompatible)
        }
    }
}

/// Shows the SQL needed to migrate the database, without applying it.
///
/// With no validation mode configured, STRICT and COMPATIBLE diffs are both
/// computed and shown when they differ. The STRICT diffs are returned.
pub async fn diff_schema(steward: &Steward, schema: &Schema) -> Result<Vec<Diff>, StewardError> {
    let configured = configured_validation(schema);
    let target = Target::from_schema(schema)?;
    let mut schema = schema.clone();

    let mode = configured.unwrap_or(SchemaValidation::Strict);
    let pass = ValidationPass::for_mode(mode);
    schema.set_validation(Some(mode));
    display_start(pass);
    let Some(incompatible) = compute_diff(steward, &schema).await? else {
        display_no_diff(&target, pass);
        return Ok(Vec::new());
    };
    if configured.is_some() {
        display_schema_changes(&incompatible, pass)?;
        return Ok(incompatible.diffs);
    }

    let strict = incompatible;
    schema.set_validation(Some(SchemaValidation::Compatible));
    display_start(ValidationPass::Compatible);
    match compute_diff(steward, &schema).await? {
        Some(compatible) if compatible.diffs != strict.diffs => {
            display_schema_changes(&compatible, ValidationPass::Compatible)?;
            display_schema_changes(&strict, ValidationPass::StrictAfterCompatible)?;
        }
        Some(_) => display_schema_changes(&strict, ValidationPass::Strict)?,
        None => {
            display_no_diff(&target, ValidationPass::Compatible);
            display_schema_changes(&strict, ValidationPass::StrictAfterCompatible)?;
        }
    }
    Ok(strict.diffs)
}

/// Validates (`validate_only`) or deploys `schema`, migrating the database on
/// the way as far as policy allows. Returns the diffs that were executed.
pub async fn migrate_schema(
    steward: &Steward,
    schema: &Schema,
    validate_only: bool,
) -> Result<Vec<Diff>, StewardError> {
    let configured = configured_validation(schema);
    let target = Target::from_schema(schema)?;
    let mut schema = schema.clone();

    let mode = configured.unwrap_or(SchemaValidation::Compatible);
    let pass = ValidationPass::for_mode(mode);
    schema.set_validation(Some(mode));
    display_start(pass);

    let instance = steward
        .admin
        .get_instance(&target.project_id, &target.instance_id)
        .await?;
    if instance.state == Some(InstanceState::PendingCreate) {
        // Store the schema unvalidated, then leave the migration to the
        // service once the instance is up.
        schema.set_validation(Some(SchemaValidation::None));
        schema.set_migration(None);
        if let UpsertOutcome::Rejected(rejection) =
            steward.schemas.upsert_schema(&schema, validate_only).await?
        {
            return Err(rejected_while_pending(&rejection));
        }
        schema.set_validation(None);
        schema.set_migration(Some(MIGRATE_COMPATIBLE));
        if let UpsertOutcome::Rejected(rejection) = steward
            .schemas
            .start_schema_upsert(&schema, validate_only)
            .await?
        {
            return Err(rejected_while_pending(&rejection));
        }
        warn!(
            "Cloud SQL instance {} is still being created; skipping schema migration",
            target.instance_id
        );
        return Ok(Vec::new());
    }

    setup_schema_if_necessary(steward, &target).await?;

    let mut executed = Vec::new();
    match steward.schemas.upsert_schema(&schema, validate_only).await? {
        UpsertOutcome::Accepted => display_no_diff(&target, pass),
        UpsertOutcome::Rejected(rejection) => {
            let decision = match &rejection.incompatible {
                Some(incompatible) => {
                    display_schema_changes(incompatible, pass)?;
                    resolve_decision(steward, &target, incompatible, validate_only, pass).await?
                }
                None => MigrationDecision::None,
            };
            let delete_connectors =
                resolve_invalid_connectors(steward, &schema, &rejection, validate_only).await?;
            if let Some(incompatible) = &rejection.incompatible {
                executed = apply_diffs(steward, &target, incompatible, decision).await?;
            }
            if delete_connectors {
                try_join_all(
                    rejection
                        .invalid_connectors
                        .iter()
                        .map(|name| steward.schemas.delete_connector(name)),
                )
                .await?;
            }
            if !validate_only
                && let UpsertOutcome::Rejected(again) =
                    steward.schemas.upsert_schema(&schema, false).await?
            {
                return Err(rejected_after_migration(&again));
            }
        }
    }

    if configured.is_none() {
        schema.set_validation(Some(SchemaValidation::Strict));
        if let UpsertOutcome::Rejected(rejection) =
            steward.schemas.upsert_schema(&schema, validate_only).await?
            && let Some(incompatible) = &rejection.incompatible
        {
            let pass = ValidationPass::StrictAfterCompatible;
            display_schema_changes(incompatible, pass)?;
            let decision =
                resolve_decision(steward, &target, incompatible, validate_only, pass).await?;
            executed.extend(apply_diffs(steward, &target, incompatible, decision).await?);
        }
    }

    Ok(executed)
}

fn configured_validation(schema: &Schema) -> Option<SchemaValidation> {
    schema.postgresql().and_then(|pg| pg.schema_validation)
}

fn rejected_while_pending(rejection: &SchemaRejection) -> StewardError {
    StewardError::InvalidSchema(format!(
        "schema rejected while the Cloud SQL instance is still being created ({} diff(s), {} invalid connector(s))",
        rejection.incompatible.as_ref().map_or(0, |i| i.diffs.len()),
        rejection.invalid_connectors.len()
    ))
}

fn rejected_after_migration(rejection: &SchemaRejection) -> StewardError {
    StewardError::InvalidSchema(format!(
        "schema is still incompatible after migration ({} diff(s), {} invalid connector(s))",
        rejection.incompatible.as_ref().map_or(0, |i| i.diffs.len()),
        rejection.invalid_connectors.len()
    ))
}

async fn resolve_decision(
    steward: &Steward,
    target: &Target,
    incompatible: &IncompatibleSqlSchemaError,
    validate_only: bool,
    pass: ValidationPass,
) -> Result<MigrationDecision, StewardError> {
    let ctx = MigrationContext {
        flags: steward.flags,
        validate_only,
        destructive: incompatible.is_destructive(),
        has_safe_diffs: incompatible.has_safe_diffs(),
        pass,
    };
    match decide_migration(&ctx)? {
        PolicyOutcome::Decided(decision) => Ok(decision),
        PolicyOutcome::Prompt { choices, default } => {
            let labels: Vec<String> = choices.iter().map(|c| c.label().to_string()).collect();
            let message = format!(
                "Do you want to execute these SQL statements against {}:{}?",
                target.instance_id, target.database_id
            );
            let picked = steward.prompter.select(&message, &labels, default).await?;
            let choice = choices.get(picked).copied().ok_or_else(|| {
                StewardError::Prompt(format!("choice {picked} is out of range"))
            })?;
            choice.into_decision()
        }
    }
}

async fn resolve_invalid_connectors(
    steward: &Steward,
    schema: &Schema,
    rejection: &SchemaRejection,
    validate_only: bool,
) -> Result<bool, StewardError> {
    let connectors = &rejection.invalid_connectors;
    if !connectors.is_empty() {
        display_invalid_connectors(connectors);
    }
    let reject = || StewardError::InvalidConnectors {
        connectors: connectors.join(", "),
        command: suggested_command(schema.service_name(), connectors),
    };
    match decide_invalid_connectors(connectors.len(), steward.flags, validate_only) {
        ConnectorOutcome::Keep => Ok(false),
        ConnectorOutcome::Delete => Ok(true),
        ConnectorOutcome::Reject => Err(reject()),
        ConnectorOutcome::Confirm => {
            let confirmed = steward
                .prompter
                .confirm(
                    "Would you like to delete and recreate these connectors? This will cause downtime.",
                    false,
                )
                .await?;
            if confirmed { Ok(true) } else { Err(reject()) }
        }
    }
}

/// Executes the diffs admitted by `decision`.
///
/// Superuser-only statements run elevated and need an admin caller; the rest
/// run as the caller under `SET ROLE` to the owner role. Only greenfield
/// schemas are touched.
pub async fn apply_diffs(
    steward: &Steward,
    target: &Target,
    incompatible: &IncompatibleSqlSchemaError,
    decision: MigrationDecision,
) -> Result<Vec<Diff>, StewardError> {
    let to_run: Vec<Diff> = incompatible
        .diffs
        .iter()
        .filter(|d| decision.admits(d))
        .cloned()
        .collect();
    if to_run.is_empty() {
        debug!(?decision, "No diffs selected for execution");
        return Ok(Vec::new());
    }
    let (superuser, owner): (Vec<&Diff>, Vec<&Diff>) =
        to_run.iter().partition(|d| requires_superuser(d));

    let is_admin = caller_is_sql_admin(steward.admin.as_ref(), &target.project_id).await;
    if !is_admin && !superuser.is_empty() {
        let owned: Vec<Diff> = superuser.iter().map(|d| (*d).clone()).collect();
        return Err(StewardError::AdminStatementsRequired {
            statements: diffs_to_string(&owned),
        });
    }

    let snapshot = inspect_schema(steward.executor.as_ref(), target).await?;
    if snapshot.setup_status != SchemaSetupStatus::GreenField {
        return Err(StewardError::BrownfieldProtected);
    }

    let roles = target.role_names()?;
    let caller = steward.caller();
    let has_owner = check_role_is_granted(
        steward.executor.as_ref(),
        target,
        roles.owner().as_str(),
        &caller.login_name,
    )
    .await?;
    if !has_owner {
        if !is_admin {
            return Err(StewardError::RoleNotGranted {
                role: roles.owner().as_str().to_string(),
                login: caller.login_name,
            });
        }
        info!("Granting the owner role to {}", steward.caller_account);
        grant_role_to_user(steward, target, ManagedRole::Owner, &steward.caller_account).await?;
    }

    if !superuser.is_empty() {
        info!("Executing admin SQL statements as the elevated login");
        let batch = SqlBatch::new(superuser.iter().map(|d| Statement::new(d.sql.clone()))).verbose();
        steward
            .executor
            .execute(target, batch, ExecContext::Elevated)
            .await?;
    }
    if !owner.is_empty() {
        let statements = std::iter::once(set_role(roles.owner()))
            .chain(owner.iter().map(|d| Statement::new(d.sql.clone())));
        let batch = SqlBatch::new(statements).verbose();
        steward
            .executor
            .execute(target, batch, ExecContext::Caller)
            .await?;
    }
    Ok(to_run)
}
