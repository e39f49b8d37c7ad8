use pgsteward_schema::RpcErrorBody;
use reqwest::StatusCode;
use tracing::debug;

use super::steward::StewardError;

const UPSTREAM_BODY_PREVIEW_CHARS: usize = 300;

/// Consumes a non-success response and turns it into [`StewardError::Upstream`],
/// preferring the `google.rpc.Status` message over the raw body.
pub(crate) async fn upstream_error(resp: reqwest::Response) -> StewardError {
    let status = resp.status();
    let bytes = resp.bytes().await.unwrap_or_default();
    let message = match serde_json::from_slice::<RpcErrorBody>(&bytes) {
        Ok(body) if !body.error.message.is_empty() => body.error.message,
        _ => String::from_utf8_lossy(&bytes)
            .chars()
            .take(UPSTREAM_BODY_PREVIEW_CHARS)
            .collect(),
    };
    debug!(%status, message = %message, "Upstream request failed");
    StewardError::Upstream { status, message }
}

pub(crate) fn is_already_exists(err: &StewardError) -> bool {
    match err {
        StewardError::Upstream { status, message } => {
            *status == StatusCode::CONFLICT || message.contains("already exists")
        }
        StewardError::OperationFailed { message, .. } => message.contains("already exists"),
        _ => false,
    }
}

/// Cloud SQL reports this when an IAM user is created before the built-in
/// `cloudsqliamuser` role has been provisioned on a fresh instance.
pub(crate) fn is_builtin_role_race(err: &StewardError) -> bool {
    match err {
        StewardError::Upstream { message, .. } | StewardError::OperationFailed { message, .. } => {
            message.contains("cloudsqliamuser")
        }
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_user_creation_failures() {
        let conflict = StewardError::Upstream {
            status: StatusCode::CONFLICT,
            message: "exists".to_string(),
        };
        assert!(is_already_exists(&conflict));

        let race = StewardError::OperationFailed {
            name: "op-1".to_string(),
            message: "role \"cloudsqliamuser\" does not exist".to_string(),
        };
        assert!(is_builtin_role_race(&race));
        assert!(!is_already_exists(&race));
    }
}
