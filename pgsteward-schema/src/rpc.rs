use serde::{Deserialize, Serialize};
use serde_json::Value;

/// `google.rpc.Status` error envelope returned by Google REST APIs.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct RpcErrorBody {
    #[serde(default)]
    pub error: RpcStatus,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct RpcStatus {
    #[serde(default)]
    pub code: i32,

    #[serde(default)]
    pub message: String,

    #[serde(default)]
    pub status: String,

    #[serde(default)]
    pub details: Vec<Value>,
}

impl RpcStatus {
    /// Details whose `@type` contains `type_fragment`.
    pub fn details_of_type<'a>(&'a self, type_fragment: &'a str) -> impl Iterator<Item = &'a Value> {
        self.details.iter().filter(move |detail| {
            detail
                .get("@type")
                .and_then(Value::as_str)
                .is_some_and(|t| t.contains(type_fragment))
        })
    }
}

/// `google.longrunning.Operation` as returned by the data service API.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct LongRunningOperation {
    #[serde(default)]
    pub name: String,

    #[serde(default)]
    pub done: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<RpcStatus>,
}
