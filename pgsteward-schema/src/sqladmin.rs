use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Instance {
    pub name: String,

    #[serde(default)]
    pub project: Option<String>,

    #[serde(default)]
    pub state: Option<InstanceState>,

    #[serde(default)]
    pub connection_name: Option<String>,

    #[serde(default)]
    pub database_version: Option<String>,

    #[serde(default)]
    pub ip_addresses: Vec<IpMapping>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InstanceState {
    Runnable,
    Suspended,
    PendingDelete,
    PendingCreate,
    Maintenance,
    Failed,
    #[serde(other)]
    Unspecified,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IpMapping {
    /// `PRIMARY`, `OUTGOING` or `PRIVATE`.
    #[serde(rename = "type")]
    pub kind: String,
    pub ip_address: String,
}

impl Instance {
    /// Public address clients connect to.
    pub fn primary_ip(&self) -> Option<&str> {
        self.ip_addresses
            .iter()
            .find(|ip| ip.kind == "PRIMARY")
            .map(|ip| ip.ip_address.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum UserType {
    BuiltIn,
    CloudIamUser,
    CloudIamServiceAccount,
}

#[derive(Clone, Default, Deserialize, Serialize)]
pub struct User {
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instance: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project: Option<String>,

    /// Cloud SQL omits the type for built-in users.
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub user_type: Option<UserType>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
}

impl std::fmt::Debug for User {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("User")
            .field("name", &self.name)
            .field("instance", &self.instance)
            .field("user_type", &self.user_type)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OperationStatus {
    Pending,
    Running,
    Done,
    #[serde(other)]
    Unspecified,
}

/// Long-running admin operation.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Operation {
    pub name: String,

    pub status: OperationStatus,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<OperationError>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct OperationError {
    #[serde(default)]
    pub errors: Vec<OperationErrorEntry>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct OperationErrorEntry {
    #[serde(default)]
    pub code: String,

    #[serde(default)]
    pub message: String,
}

impl OperationError {
    pub fn message(&self) -> String {
        self.errors
            .iter()
            .map(|e| format!("{}: {}", e.code, e.message))
            .collect::<Vec<_>>()
            .join("; ")
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TestIamPermissionsRequest {
    pub permissions: Vec<String>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct TestIamPermissionsResponse {
    #[serde(default)]
    pub permissions: Vec<String>,
}
