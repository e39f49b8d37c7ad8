use super::policy::ValidationPass;
use crate::error::StewardError;
use crate::target::Target;
use pgsteward_schema::{Diff, IncompatibleSqlSchemaError, ViolationType};
use tracing::{info, warn};

pub fn diff_to_string(diff: &Diff) -> String {
    let marker = if diff.destructive { "Destructive: " } else { "" };
    format!("/** {marker}{}*/\n{}", diff.description, diff.sql.trim())
}

pub fn diffs_to_string(diffs: &[Diff]) -> String {
    diffs
        .iter()
        .map(diff_to_string)
        .collect::<Vec<_>>()
        .join("\n\n")
}

pub(crate) fn display_start(pass: ValidationPass) {
    info!("Generating SQL schema migrations in {pass} mode...");
}

pub(crate) fn display_no_diff(target: &Target, pass: ValidationPass) {
    match pass {
        ValidationPass::Compatible => info!(
            "Database schema of {}:{} is compatible with the data service schema",
            target.instance_id, target.database_id
        ),
        ValidationPass::Strict | ValidationPass::StrictAfterCompatible => info!(
            "Database schema of {}:{} matches the data service schema exactly",
            target.instance_id, target.database_id
        ),
    }
}

pub(crate) fn display_schema_changes(
    err: &IncompatibleSqlSchemaError,
    pass: ValidationPass,
) -> Result<(), StewardError> {
    let rendered = diffs_to_string(&err.diffs);
    match err.violation_type {
        ViolationType::IncompatibleSchema => match pass {
            ValidationPass::Compatible => warn!(
                "PostgreSQL schema is incompatible with the data service schema.\nThese SQL statements will migrate it to be compatible:\n\n{rendered}\n"
            ),
            ValidationPass::StrictAfterCompatible => info!(
                "PostgreSQL schema contains unused SQL objects not part of the data service schema.\nThese SQL statements will migrate it to match exactly:\n\n{rendered}\n"
            ),
            ValidationPass::Strict => warn!(
                "PostgreSQL schema does not match the data service schema.\nThese SQL statements will migrate it to match exactly:\n\n{rendered}\n"
            ),
        },
        ViolationType::InaccessibleSchema => {
            warn!(
                "Cannot access the Cloud SQL database to validate the schema.\nHere is the complete expected SQL schema:\n{rendered}\n"
            );
            warn!("Some SQL resources may already exist.");
        }
        ViolationType::Unspecified => {
            return Err(StewardError::Unexpected(format!(
                "unknown schema violation type with {} diff(s)",
                err.diffs.len()
            )));
        }
    }
    Ok(())
}

pub(crate) fn display_invalid_connectors(connectors: &[String]) {
    let ids = connectors
        .iter()
        .map(|c| c.rsplit('/').next().unwrap_or(c))
        .collect::<Vec<_>>()
        .join(", ");
    warn!("The schema you are deploying is incompatible with these existing connectors: {ids}.");
    warn!("This is a breaking change and may break existing apps.");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn destructive_diffs_are_flagged_in_header() {
        let diffs = vec![
            Diff {
                description: "add table t".to_string(),
                destructive: false,
                sql: "CREATE TABLE t (a int)".to_string(),
            },
            Diff {
                description: "drop column b".to_string(),
                destructive: true,
                sql: "ALTER TABLE u DROP COLUMN b\n".to_string(),
            },
        ];
        assert_eq!(
            diffs_to_string(&diffs),
            "/** add table t*/\nCREATE TABLE t (a int)\n\n/** Destructive: drop column b*/\nALTER TABLE u DROP COLUMN b"
        );
    }
}
