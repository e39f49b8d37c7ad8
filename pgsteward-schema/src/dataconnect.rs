use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Schema resource id every data service uses for its single schema.
pub const SCHEMA_ID: &str = "main";

/// `schemaMigration` value asking the service to migrate the database itself,
/// applying compatible changes once the instance can take them.
pub const MIGRATE_COMPATIBLE: &str = "MIGRATE_COMPATIBLE";

/// Data service schema document, as accepted by the schema validation API.
///
/// Only the fields this tool reads or rewrites are modelled; everything else
/// round-trips through `extra`.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Schema {
    /// `projects/<p>/locations/<l>/services/<s>/schemas/main`
    pub name: String,

    #[serde(default)]
    pub source: SchemaSource,

    #[serde(default)]
    pub datasources: Vec<Datasource>,

    #[serde(flatten)]
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub extra: BTreeMap<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct SchemaSource {
    #[serde(default)]
    pub files: Vec<SourceFile>,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct SourceFile {
    pub path: String,
    pub content: String,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct Datasource {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub postgresql: Option<PostgresqlDatasource>,

    #[serde(flatten)]
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub extra: BTreeMap<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PostgresqlDatasource {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub database: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub cloud_sql: Option<CloudSqlInstanceRef>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub schema_validation: Option<SchemaValidation>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub schema_migration: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub ephemeral: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct CloudSqlInstanceRef {
    /// `projects/<p>/locations/<l>/instances/<id>`
    pub instance: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SchemaValidation {
    None,
    Strict,
    Compatible,
}

impl Schema {
    pub fn postgresql(&self) -> Option<&PostgresqlDatasource> {
        self.datasources.iter().find_map(|d| d.postgresql.as_ref())
    }

    pub fn postgresql_mut(&mut self) -> Option<&mut PostgresqlDatasource> {
        self.datasources.iter_mut().find_map(|d| d.postgresql.as_mut())
    }

    /// Overwrites the validation mode on the Postgres datasource, if any.
    pub fn set_validation(&mut self, mode: Option<SchemaValidation>) {
        if let Some(pg) = self.postgresql_mut() {
            pg.schema_validation = mode;
        }
    }

    /// Overwrites the migration mode on the Postgres datasource, if any.
    pub fn set_migration(&mut self, migration: Option<&str>) {
        if let Some(pg) = self.postgresql_mut() {
            pg.schema_migration = migration.map(str::to_string);
        }
    }

    /// Parent service resource name (the schema name without `/schemas/main`).
    pub fn service_name(&self) -> &str {
        self.name
            .strip_suffix(&format!("/schemas/{SCHEMA_ID}"))
            .unwrap_or(&self.name)
    }
}

/// One migration step proposed by the validation service.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Diff {
    #[serde(default)]
    pub description: String,

    #[serde(default)]
    pub destructive: bool,

    pub sql: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ViolationType {
    IncompatibleSchema,
    InaccessibleSchema,
    #[serde(other)]
    Unspecified,
}

/// Error detail the validation service attaches when the live database does not
/// match the requested schema. Expected control-flow data, not a failure.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IncompatibleSqlSchemaError {
    pub violation_type: ViolationType,

    #[serde(default)]
    pub diffs: Vec<Diff>,

    #[serde(default)]
    pub destructive: bool,
}

impl IncompatibleSqlSchemaError {
    pub fn is_destructive(&self) -> bool {
        self.destructive || self.diffs.iter().any(|d| d.destructive)
    }

    pub fn has_safe_diffs(&self) -> bool {
        self.diffs.iter().any(|d| !d.destructive)
    }
}
