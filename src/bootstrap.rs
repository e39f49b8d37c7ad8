use crate::admin::{CloudSqlAdminClient, SqlAdminApi};
use crate::auth::{AccessTokenSource, RefreshingToken, StaticToken, resolve_caller_account};
use crate::config::Config;
use crate::error::StewardError;
use crate::identity::map_identity;
use crate::migrate::{DataConnectClient, SchemaService};
use crate::prompt::{NoPrompt, Prompter, TerminalPrompter};
use crate::retry::LinearBackoff;
use crate::sql::{PgExecutor, SqlExecutor};
use crate::steward::{RunFlags, Steward};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

const USER_AGENT: &str = concat!("pgsteward/", env!("CARGO_PKG_VERSION"));
const CREDENTIALS_ENV: &str = "GOOGLE_APPLICATION_CREDENTIALS";

/// Wires the production clients together from configuration.
pub async fn build_steward(cfg: &Config, flags: RunFlags) -> Result<Steward, StewardError> {
    let http = reqwest::Client::builder().user_agent(USER_AGENT).build()?;
    let tokens = token_source(cfg, http.clone())?;
    let caller_account = resolve_caller_account(
        cfg.basic.account.as_deref(),
        tokens.as_ref(),
        &http,
        &cfg.endpoints.tokeninfo,
    )
    .await?;
    info!(account = %caller_account, project = %cfg.basic.project_id, "Resolved caller");

    let admin: Arc<dyn SqlAdminApi> = Arc::new(CloudSqlAdminClient::new(
        http.clone(),
        tokens.clone(),
        &cfg.endpoints,
        &cfg.retry,
    ));
    let executor: Arc<dyn SqlExecutor> = Arc::new(PgExecutor::new(
        admin.clone(),
        tokens.clone(),
        map_identity(&caller_account),
        cfg.database.clone(),
    ));
    let schemas: Arc<dyn SchemaService> = Arc::new(DataConnectClient::new(
        http,
        tokens,
        &cfg.endpoints,
        &cfg.retry,
    ));
    let prompter: Arc<dyn Prompter> = if flags.interactive() {
        Arc::new(TerminalPrompter)
    } else {
        Arc::new(NoPrompt)
    };

    Ok(Steward {
        caller_account,
        project_number: cfg.basic.project_number.clone(),
        service_agent_domain: cfg.endpoints.service_agent_domain.clone(),
        elevated_login: cfg.database.elevated_login.clone(),
        flags,
        identity_backoff: LinearBackoff::from_config(&cfg.retry),
        admin,
        executor,
        schemas,
        prompter,
    })
}

fn token_source(
    cfg: &Config,
    http: reqwest::Client,
) -> Result<Arc<dyn AccessTokenSource>, StewardError> {
    if let Some(token) = cfg.auth.access_token.as_deref().filter(|t| !t.is_empty()) {
        return Ok(Arc::new(StaticToken::new(token)));
    }
    let path = cfg
        .auth
        .credentials_file
        .clone()
        .or_else(|| std::env::var_os(CREDENTIALS_ENV).map(PathBuf::from))
        .ok_or(StewardError::NoCredentials)?;
    Ok(Arc::new(RefreshingToken::from_file(
        &path,
        &cfg.endpoints.token_uri,
        http,
    )?))
}
