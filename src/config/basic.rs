use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// Project and caller settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BasicConfig {
    /// Project that owns the Cloud SQL instances.
    /// TOML: `basic.project_id`. Required.
    #[serde(default)]
    pub project_id: String,

    /// Numeric project id, used to derive the data service agent account.
    /// TOML: `basic.project_number`. Required.
    #[serde(default)]
    #[serde(deserialize_with = "deserialize_string_lax")]
    pub project_number: String,

    /// Account of the person or service account running the tool. When unset,
    /// it is looked up from the access token.
    /// TOML: `basic.account`.
    #[serde(default)]
    pub account: Option<String>,

    /// Log level for tracing subscriber initialization (e.g., "error", "warn", "info", "debug", "trace").
    /// TOML: `basic.loglevel`. Default: `info`.
    #[serde(default)]
    pub loglevel: String,
}

impl Default for BasicConfig {
    fn default() -> Self {
        Self {
            project_id: String::new(),
            project_number: String::new(),
            account: None,
            loglevel: "info".to_string(),
        }
    }
}

fn deserialize_string_lax<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let v = Value::deserialize(deserializer)?;

    match v {
        Value::String(s) => Ok(s),
        Value::Number(n) => Ok(n.to_string()),
        _ => Err(serde::de::Error::custom(
            "expected a string or a number for basic.project_number",
        )),
    }
}
