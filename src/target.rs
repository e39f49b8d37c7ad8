use crate::error::StewardError;
use pgsteward_grants::{DEFAULT_SCHEMA, GrantError, Ident, RoleNames};
use pgsteward_schema::Schema;
use std::fmt;

/// One Postgres schema inside one database of one Cloud SQL instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    pub project_id: String,
    pub instance_id: String,
    pub database_id: String,
    pub schema: String,
}

impl Target {
    pub fn new(
        project_id: impl Into<String>,
        instance_id: impl Into<String>,
        database_id: impl Into<String>,
    ) -> Self {
        Self {
            project_id: project_id.into(),
            instance_id: instance_id.into(),
            database_id: database_id.into(),
            schema: DEFAULT_SCHEMA.to_string(),
        }
    }

    pub fn with_schema(mut self, schema: impl Into<String>) -> Self {
        self.schema = schema.into();
        self
    }

    pub fn role_names(&self) -> Result<RoleNames, GrantError> {
        RoleNames::new(&self.database_id, &self.schema)
    }

    pub fn database_ident(&self) -> Result<Ident, GrantError> {
        Ident::new(self.database_id.as_str())
    }

    pub fn schema_ident(&self) -> Result<Ident, GrantError> {
        Ident::new(self.schema.as_str())
    }

    /// Derives the target from a schema document's Postgres datasource.
    ///
    /// The instance reference has the form `projects/<p>/locations/<l>/instances/<id>`.
    pub fn from_schema(schema: &Schema) -> Result<Self, StewardError> {
        let pg = schema.postgresql().ok_or_else(|| {
            StewardError::InvalidSchema("schema has no postgresql datasource".to_string())
        })?;
        let database = pg
            .database
            .as_deref()
            .filter(|d| !d.is_empty())
            .ok_or_else(|| {
                StewardError::InvalidSchema(
                    "postgresql datasource must name a database".to_string(),
                )
            })?;
        let instance_name = pg
            .cloud_sql
            .as_ref()
            .map(|c| c.instance.as_str())
            .filter(|i| !i.is_empty())
            .ok_or_else(|| {
                StewardError::InvalidSchema(
                    "postgresql datasource must reference a Cloud SQL instance".to_string(),
                )
            })?;
        let instance_id = instance_name.rsplit('/').next().unwrap_or(instance_name);
        let project_id = project_segment(instance_name)
            .or_else(|| project_segment(&schema.name))
            .ok_or_else(|| {
                StewardError::InvalidSchema(format!(
                    "cannot determine project from {instance_name:?}"
                ))
            })?;
        Ok(Self::new(project_id, instance_id, database))
    }
}

fn project_segment(resource: &str) -> Option<&str> {
    let mut parts = resource.split('/');
    match (parts.next(), parts.next()) {
        (Some("projects"), Some(project)) if !project.is_empty() => Some(project),
        _ => None,
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}.{}", self.instance_id, self.database_id, self.schema)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn target_is_derived_from_datasource() {
        let schema: Schema = serde_json::from_value(json!({
            "name": "projects/p/locations/us-central1/services/svc/schemas/main",
            "datasources": [{ "postgresql": {
                "database": "orders",
                "cloudSql": { "instance": "projects/p/locations/us-central1/instances/inst" }
            }}]
        }))
        .unwrap();
        let target = Target::from_schema(&schema).unwrap();
        assert_eq!(target, Target::new("p", "inst", "orders"));
        assert_eq!(target.schema, "public");
        assert_eq!(target.to_string(), "inst:orders.public");
    }

    #[test]
    fn datasource_without_database_is_invalid() {
        let schema: Schema = serde_json::from_value(json!({
            "name": "projects/p/locations/l/services/svc/schemas/main",
            "datasources": [{ "postgresql": {
                "cloudSql": { "instance": "projects/p/locations/l/instances/inst" }
            }}]
        }))
        .unwrap();
        assert!(matches!(
            Target::from_schema(&schema),
            Err(StewardError::InvalidSchema(_))
        ));
    }
}
