use pgsteward_schema::{IncompatibleSqlSchemaError, RpcStatus};
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

const INCOMPATIBLE_SCHEMA_DETAIL: &str = "IncompatibleSqlSchemaError";
const PRECONDITION_FAILURE_DETAIL: &str = "PreconditionFailure";
const GRAPHQL_ERROR_DETAIL: &str = "GraphqlError";
const INCOMPATIBLE_CONNECTOR: &str = "INCOMPATIBLE_CONNECTOR";

/// Why the validation service refused a schema write. Either part may be
/// empty, but not both.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SchemaRejection {
    pub incompatible: Option<IncompatibleSqlSchemaError>,
    /// Full resource names of connectors that break under the new schema.
    pub invalid_connectors: Vec<String>,
}

impl SchemaRejection {
    /// Extracts the structured rejection from a 400 response body.
    /// Returns `None` when the status carries neither kind of detail.
    pub fn from_status(status: &RpcStatus) -> Option<Self> {
        let incompatible = status
            .details_of_type(INCOMPATIBLE_SCHEMA_DETAIL)
            .find_map(|detail| {
                serde_json::from_value::<IncompatibleSqlSchemaError>(detail.clone())
                    .inspect_err(|err| debug!(error = %err, "Unparseable incompatibility detail"))
                    .ok()
            });
        let invalid_connectors = invalid_connectors(status);
        if incompatible.is_none() && invalid_connectors.is_empty() {
            return None;
        }
        Some(Self {
            incompatible,
            invalid_connectors,
        })
    }
}

#[derive(Debug, Deserialize)]
struct PreconditionFailure {
    #[serde(default)]
    violations: Vec<PreconditionViolation>,
}

#[derive(Debug, Deserialize)]
struct PreconditionViolation {
    #[serde(rename = "type", default)]
    kind: String,
    #[serde(default)]
    subject: String,
}

fn invalid_connectors(status: &RpcStatus) -> Vec<String> {
    status
        .details_of_type(PRECONDITION_FAILURE_DETAIL)
        .filter_map(|detail| serde_json::from_value::<PreconditionFailure>(detail.clone()).ok())
        .flat_map(|failure| failure.violations)
        .filter(|v| v.kind == INCOMPATIBLE_CONNECTOR && !v.subject.is_empty())
        .map(|v| v.subject)
        .collect()
}

/// GraphQL compile errors in the schema sources, one per line.
pub fn graphql_errors(status: &RpcStatus) -> Option<String> {
    let lines: Vec<String> = status
        .details_of_type(GRAPHQL_ERROR_DETAIL)
        .filter_map(|detail| {
            let message = detail.get("message").and_then(Value::as_str)?;
            let path = detail
                .get("path")
                .and_then(Value::as_array)
                .map(|p| {
                    p.iter()
                        .map(|seg| match seg {
                            Value::String(s) => s.clone(),
                            other => other.to_string(),
                        })
                        .collect::<Vec<_>>()
                        .join(".")
                })
                .filter(|p| !p.is_empty());
            Some(match path {
                Some(path) => format!("{path}: {message}"),
                None => message.to_string(),
            })
        })
        .collect();
    (!lines.is_empty()).then(|| lines.join("\n"))
}
