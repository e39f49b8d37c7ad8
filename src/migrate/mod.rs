//! Schema diffing against the validation service and policy-gated migration.

mod display;
mod planner;
mod policy;
mod rejection;
mod service;

pub use display::{diff_to_string, diffs_to_string};
pub use planner::{
    Classification, apply_diffs, classify, compute_diff, diff_schema, migrate_schema,
    requires_superuser,
};
pub use policy::{
    ConnectorOutcome, MigrationChoice, MigrationContext, MigrationDecision, PolicyOutcome,
    ValidationPass, decide_invalid_connectors, decide_migration, suggested_command,
};
pub use rejection::{SchemaRejection, graphql_errors};
pub use service::{DataConnectClient, SchemaService, UpsertOutcome};
