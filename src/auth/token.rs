use crate::error::StewardError;
use async_trait::async_trait;
use chrono::{DateTime, TimeDelta, Utc};
use oauth2::basic::BasicClient;
use oauth2::{ClientId, ClientSecret, EndpointNotSet, EndpointSet, RefreshToken, TokenResponse, TokenUrl};
use serde::Deserialize;
use std::path::Path;
use tokio::sync::Mutex;
use tracing::debug;
use url::Url;

/// Supplies OAuth access tokens for Google API calls and IAM database logins.
#[async_trait]
pub trait AccessTokenSource: Send + Sync {
    async fn access_token(&self) -> Result<String, StewardError>;
}

/// A token minted elsewhere, used as-is until it expires.
pub struct StaticToken(String);

impl StaticToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }
}

impl std::fmt::Debug for StaticToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("StaticToken(<redacted>)")
    }
}

#[async_trait]
impl AccessTokenSource for StaticToken {
    async fn access_token(&self) -> Result<String, StewardError> {
        Ok(self.0.clone())
    }
}

/// `authorized_user` credentials as written by `gcloud auth application-default login`.
#[derive(Clone, Deserialize)]
pub struct AuthorizedUserFile {
    pub client_id: String,
    pub client_secret: String,
    pub refresh_token: String,

    #[serde(rename = "type", default)]
    pub kind: Option<String>,
}

type TokenClient =
    BasicClient<EndpointNotSet, EndpointNotSet, EndpointNotSet, EndpointNotSet, EndpointSet>;

/// Refreshes tokens with a long-lived refresh token and caches them until
/// shortly before expiry.
pub struct RefreshingToken {
    client: TokenClient,
    refresh_token: RefreshToken,
    http: reqwest::Client,
    cached: Mutex<Option<CachedToken>>,
}

struct CachedToken {
    secret: String,
    expiry: DateTime<Utc>,
}

/// Tokens this close to expiry are refreshed early.
const EXPIRY_SKEW: TimeDelta = TimeDelta::minutes(5);
const DEFAULT_LIFETIME: TimeDelta = TimeDelta::hours(1);

impl RefreshingToken {
    pub fn new(
        creds: AuthorizedUserFile,
        token_uri: &Url,
        http: reqwest::Client,
    ) -> Result<Self, StewardError> {
        if let Some(kind) = creds.kind.as_deref()
            && kind != "authorized_user"
        {
            return Err(StewardError::Config(format!(
                "unsupported credentials type {kind:?}; expected authorized_user"
            )));
        }
        let client = BasicClient::new(ClientId::new(creds.client_id))
            .set_client_secret(ClientSecret::new(creds.client_secret))
            .set_token_uri(TokenUrl::new(token_uri.to_string())?);
        Ok(Self {
            client,
            refresh_token: RefreshToken::new(creds.refresh_token),
            http,
            cached: Mutex::new(None),
        })
    }

    pub fn from_file(
        path: &Path,
        token_uri: &Url,
        http: reqwest::Client,
    ) -> Result<Self, StewardError> {
        let raw = std::fs::read_to_string(path)?;
        let creds: AuthorizedUserFile = serde_json::from_str(&raw)?;
        Self::new(creds, token_uri, http)
    }
}

#[async_trait]
impl AccessTokenSource for RefreshingToken {
    async fn access_token(&self) -> Result<String, StewardError> {
        let mut cached = self.cached.lock().await;
        if let Some(token) = cached.as_ref()
            && Utc::now() + EXPIRY_SKEW < token.expiry
        {
            return Ok(token.secret.clone());
        }

        let response = self
            .client
            .exchange_refresh_token(&self.refresh_token)
            .request_async(&self.http)
            .await?;
        let lifetime = response
            .expires_in()
            .and_then(|d| TimeDelta::from_std(d).ok())
            .unwrap_or(DEFAULT_LIFETIME);
        let token = CachedToken {
            secret: response.access_token().secret().clone(),
            expiry: Utc::now() + lifetime,
        };
        debug!(expiry = %token.expiry, "Refreshed access token");
        let secret = token.secret.clone();
        *cached = Some(token);
        Ok(secret)
    }
}
