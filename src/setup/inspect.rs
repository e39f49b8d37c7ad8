use crate::error::StewardError;
use crate::sql::{SqlExecutor, query};
use crate::target::Target;
use chrono::{DateTime, Utc};
use pgsteward_grants::{CLOUDSQL_SUPERUSER, RoleNames, queries};
use serde::Serialize;
use std::collections::BTreeSet;
use std::fmt;
use tracing::debug;

/// How far a schema is from the managed three-role layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum SchemaSetupStatus {
    /// The schema does not exist.
    NotFound,
    /// The schema exists but the managed roles do not.
    NotSetup,
    /// The managed owner role owns the schema and every table in it.
    #[serde(rename = "greenfield")]
    GreenField,
    /// Managed roles exist, but something in the schema is owned by another role.
    #[serde(rename = "brownfield")]
    BrownField,
}

impl fmt::Display for SchemaSetupStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            SchemaSetupStatus::NotFound => "not-found",
            SchemaSetupStatus::NotSetup => "not-setup",
            SchemaSetupStatus::GreenField => "greenfield",
            SchemaSetupStatus::BrownField => "brownfield",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TableMetadata {
    pub name: String,
    pub owner: String,
}

/// Point-in-time view of a schema's ownership and setup status.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SchemaSnapshot {
    pub name: String,
    pub owner: Option<String>,
    pub tables: Vec<TableMetadata>,
    pub setup_status: SchemaSetupStatus,
    pub inspected_at: DateTime<Utc>,
}

impl SchemaSnapshot {
    /// Distinct table owners other than `cloudsqlsuperuser` and the managed
    /// owner role, sorted.
    pub fn foreign_owners(&self, roles: &RoleNames) -> Vec<String> {
        self.tables
            .iter()
            .map(|t| t.owner.as_str())
            .filter(|owner| *owner != CLOUDSQL_SUPERUSER && *owner != roles.owner().as_str())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .map(str::to_string)
            .collect()
    }

    pub fn has_tables(&self) -> bool {
        !self.tables.is_empty()
    }
}

/// Classifies a schema from its catalog facts.
///
/// `writer_exists` stands in for "managed roles exist": the writer role is the
/// one every setup path creates.
pub fn classify(
    schema_owner: Option<&str>,
    tables: &[TableMetadata],
    writer_exists: bool,
    roles: &RoleNames,
) -> SchemaSetupStatus {
    let Some(schema_owner) = schema_owner else {
        return SchemaSetupStatus::NotFound;
    };
    if !writer_exists {
        return SchemaSetupStatus::NotSetup;
    }
    let owner = roles.owner().as_str();
    if schema_owner == owner && tables.iter().all(|t| t.owner == owner) {
        SchemaSetupStatus::GreenField
    } else {
        SchemaSetupStatus::BrownField
    }
}

/// Reads ownership facts for `target.schema` as the caller. Never needs the
/// elevated login and never modifies anything.
pub async fn inspect_schema(
    executor: &dyn SqlExecutor,
    target: &Target,
) -> Result<SchemaSnapshot, StewardError> {
    let roles = target.role_names()?;

    let owner = query(executor, target, queries::schema_owner(&target.schema))
        .await?
        .first()
        .and_then(|row| row.text("owner").map(str::to_string));

    let tables: Vec<TableMetadata> = if owner.is_some() {
        query(executor, target, queries::schema_tables(&target.schema))
            .await?
            .iter()
            .filter_map(|row| {
                Some(TableMetadata {
                    name: row.text("table_name")?.to_string(),
                    owner: row.text("table_owner")?.to_string(),
                })
            })
            .collect()
    } else {
        Vec::new()
    };

    let writer_exists = if owner.is_some() {
        query(executor, target, queries::role_exists(roles.writer().as_str()))
            .await?
            .first()
            .and_then(|row| row.bool("role_exists"))
            .unwrap_or(false)
    } else {
        false
    };

    let setup_status = classify(owner.as_deref(), &tables, writer_exists, &roles);
    debug!(
        target = %target,
        status = %setup_status,
        tables = tables.len(),
        "Inspected schema"
    );
    Ok(SchemaSnapshot {
        name: target.schema.clone(),
        owner,
        tables,
        setup_status,
        inspected_at: Utc::now(),
    })
}
