use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Credential sources, tried in field order.
#[derive(Clone, Default, Deserialize, Serialize)]
pub struct AuthConfig {
    /// Pre-minted OAuth access token. Takes precedence over every other source.
    /// Env: `PGSTEWARD_AUTH__ACCESS_TOKEN`.
    #[serde(default)]
    pub access_token: Option<String>,

    /// `authorized_user` credentials JSON (client id, secret and refresh token).
    /// Falls back to `GOOGLE_APPLICATION_CREDENTIALS` when unset.
    #[serde(default)]
    pub credentials_file: Option<PathBuf>,
}

impl std::fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthConfig")
            .field("access_token", &self.access_token.as_ref().map(|_| "<redacted>"))
            .field("credentials_file", &self.credentials_file)
            .finish()
    }
}
