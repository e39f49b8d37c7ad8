//! Schema inspection and role provisioning.

mod inspect;
mod orchestrator;
mod provision;
mod roles;

pub use inspect::{SchemaSetupStatus, SchemaSnapshot, TableMetadata, classify, inspect_schema};
pub use orchestrator::{setup_schema, setup_schema_if_necessary, setup_sql_permissions};
pub use provision::Provisioner;
pub use roles::{check_role_is_granted, grant_role_to_user};
