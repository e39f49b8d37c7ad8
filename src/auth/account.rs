use super::AccessTokenSource;
use crate::error::{StewardError, upstream_error};
use serde::Deserialize;
use tracing::debug;
use url::Url;

#[derive(Debug, Deserialize)]
struct TokenInfo {
    #[serde(default)]
    email: Option<String>,
}

/// Returns the configured account, or asks the tokeninfo endpoint which
/// account the current access token belongs to.
pub async fn resolve_caller_account(
    configured: Option<&str>,
    tokens: &dyn AccessTokenSource,
    http: &reqwest::Client,
    tokeninfo: &Url,
) -> Result<String, StewardError> {
    if let Some(account) = configured.map(str::trim).filter(|a| !a.is_empty()) {
        return Ok(account.to_string());
    }

    let token = tokens.access_token().await?;
    let resp = http
        .get(tokeninfo.clone())
        .query(&[("access_token", token.as_str())])
        .send()
        .await?;
    if !resp.status().is_success() {
        return Err(upstream_error(resp).await);
    }
    let info: TokenInfo = resp.json().await?;
    let account = info.email.ok_or_else(|| {
        StewardError::Config(
            "access token carries no email scope; set basic.account explicitly".to_string(),
        )
    })?;
    debug!(account = %account, "Resolved caller account from tokeninfo");
    Ok(account)
}
