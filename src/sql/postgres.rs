use super::row::decode_pg_row;
use super::{ExecContext, ResultSet, SqlBatch, SqlExecutor, Visibility};
use crate::admin::SqlAdminApi;
use crate::auth::AccessTokenSource;
use crate::config::DatabaseConfig;
use crate::error::{StewardError, is_already_exists};
use crate::identity::DatabaseIdentity;
use crate::target::Target;
use crate::utils::password::{ELEVATED_PASSWORD_LEN, generate_password};
use async_trait::async_trait;
use pgsteward_grants::{Ident, Statement, privileges::set_role};
use pgsteward_schema::{User, UserType};
use sqlx::postgres::{PgConnectOptions, PgConnection, PgSslMode};
use sqlx::{Connection, Postgres, Transaction};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

const APPLICATION_NAME: &str = "pgsteward";

/// Executes batches over a direct TLS connection to the instance's primary IP,
/// or to `database.host` when set (e.g. a local Cloud SQL Auth Proxy).
///
/// Caller sessions authenticate with the caller's OAuth access token (IAM
/// database authentication). Elevated sessions use the built-in login with a
/// fresh random password for every batch; the password is never kept.
pub struct PgExecutor {
    admin: Arc<dyn SqlAdminApi>,
    tokens: Arc<dyn AccessTokenSource>,
    caller: DatabaseIdentity,
    database: DatabaseConfig,
    hosts: Mutex<HashMap<String, String>>,
}

struct Login {
    name: String,
    password: String,
}

impl PgExecutor {
    pub fn new(
        admin: Arc<dyn SqlAdminApi>,
        tokens: Arc<dyn AccessTokenSource>,
        caller: DatabaseIdentity,
        database: DatabaseConfig,
    ) -> Self {
        Self {
            admin,
            tokens,
            caller,
            database,
            hosts: Mutex::new(HashMap::new()),
        }
    }

    async fn host(&self, target: &Target) -> Result<String, StewardError> {
        if let Some(host) = &self.database.host {
            return Ok(host.clone());
        }
        let key = format!("{}/{}", target.project_id, target.instance_id);
        let mut hosts = self.hosts.lock().await;
        if let Some(host) = hosts.get(&key) {
            return Ok(host.clone());
        }
        let instance = self
            .admin
            .get_instance(&target.project_id, &target.instance_id)
            .await?;
        let host = instance
            .primary_ip()
            .ok_or_else(|| StewardError::NoPrimaryIp {
                instance: target.instance_id.clone(),
            })?
            .to_string();
        hosts.insert(key, host.clone());
        Ok(host)
    }

    /// Creates the elevated built-in login, or resets its password when it
    /// already exists.
    async fn elevated_login(&self, target: &Target) -> Result<Login, StewardError> {
        let name = self.database.elevated_login.clone();
        let password = generate_password(ELEVATED_PASSWORD_LEN);
        let user = User {
            name: name.clone(),
            instance: Some(target.instance_id.clone()),
            project: Some(target.project_id.clone()),
            user_type: Some(UserType::BuiltIn),
            password: Some(password.clone()),
        };
        match self
            .admin
            .create_user(&target.project_id, &target.instance_id, &user)
            .await
        {
            Ok(()) => {}
            Err(err) if is_already_exists(&err) => {
                self.admin
                    .update_user(&target.project_id, &target.instance_id, &user)
                    .await?;
            }
            Err(err) => return Err(err),
        }
        Ok(Login { name, password })
    }

    async fn connect(&self, target: &Target, login: &Login) -> Result<PgConnection, StewardError> {
        let host = self.host(target).await?;
        let ssl_mode = if self.database.require_tls {
            PgSslMode::Require
        } else {
            PgSslMode::Prefer
        };
        let options = PgConnectOptions::new()
            .host(&host)
            .port(self.database.port)
            .username(&login.name)
            .password(&login.password)
            .database(&target.database_id)
            .ssl_mode(ssl_mode)
            .application_name(APPLICATION_NAME);
        let conn = PgConnection::connect_with(&options).await?;
        debug!(login = %login.name, target = %target, "Connected to Postgres");
        Ok(conn)
    }
}

#[async_trait]
impl SqlExecutor for PgExecutor {
    async fn execute(
        &self,
        target: &Target,
        batch: SqlBatch,
        context: ExecContext,
    ) -> Result<Vec<ResultSet>, StewardError> {
        let (login, batch) = match context {
            ExecContext::Caller => {
                let login = Login {
                    name: self.caller.login_name.clone(),
                    password: self.tokens.access_token().await?,
                };
                (login, batch)
            }
            ExecContext::Elevated => {
                let login = self.elevated_login(target).await?;
                let elevated = Ident::new(login.name.as_str())?;
                let mut statements = Vec::with_capacity(batch.statements.len() + 1);
                statements.push(set_role(&elevated));
                statements.extend(batch.statements);
                (login, SqlBatch { statements, ..batch })
            }
        };

        log_at(batch.visibility, format_args!("Logged in as {}", login.name));
        let mut conn = self.connect(target, &login).await?;
        let result = run_batch(&mut conn, &batch).await;
        if let Err(err) = conn.close().await {
            warn!(error = %err, "Failed to close Postgres connection cleanly");
        }
        // The elevated prefix is internal; callers get one result per statement they sent.
        result.map(|mut results| {
            if context == ExecContext::Elevated && !results.is_empty() {
                results.remove(0);
            }
            results
        })
    }
}

async fn run_batch(
    conn: &mut PgConnection,
    batch: &SqlBatch,
) -> Result<Vec<ResultSet>, StewardError> {
    let mut results = Vec::with_capacity(batch.statements.len());
    if !batch.transactional {
        for stmt in &batch.statements {
            log_at(batch.visibility, format_args!("Executing: '{stmt}'"));
            results.push(run_statement(conn, stmt).await?);
        }
        return Ok(results);
    }

    let mut tx: Transaction<'_, Postgres> = conn.begin().await?;
    for stmt in &batch.statements {
        log_at(batch.visibility, format_args!("Executing: '{stmt}'"));
        match run_statement(&mut *tx, stmt).await {
            Ok(rs) => results.push(rs),
            Err(err) => {
                warn!("Rolling back transaction after failed statement");
                return Err(after_rollback(err, tx.rollback().await));
            }
        }
    }
    tx.commit().await?;
    Ok(results)
}

async fn run_statement(
    conn: &mut PgConnection,
    stmt: &Statement,
) -> Result<ResultSet, StewardError> {
    let rows = if stmt.is_parameterized() {
        let mut query = sqlx::query(stmt.sql());
        for value in stmt.binds() {
            query = query.bind(value.as_str());
        }
        sqlx::Executor::fetch_all(&mut *conn, query).await
    } else {
        sqlx::Executor::fetch_all(&mut *conn, sqlx::raw_sql(stmt.sql())).await
    }
    .map_err(|source| StewardError::EngineExecution {
        statement: stmt.sql().to_string(),
        source,
    })?;
    Ok(ResultSet {
        rows: rows.iter().map(decode_pg_row).collect(),
    })
}

/// The statement error wins over a failed rollback, which is only logged.
fn after_rollback(err: StewardError, rollback: Result<(), sqlx::Error>) -> StewardError {
    if let Err(rollback_err) = rollback {
        warn!(error = %rollback_err, "Transaction rollback failed");
    }
    err
}

fn log_at(visibility: Visibility, message: std::fmt::Arguments<'_>) {
    match visibility {
        Visibility::Silent => debug!("{message}"),
        Visibility::Verbose => info!("{message}"),
    }
}
