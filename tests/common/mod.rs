#![allow(dead_code)]

use async_trait::async_trait;
use pgsteward::admin::SqlAdminApi;
use pgsteward::migrate::{SchemaService, UpsertOutcome};
use pgsteward::prompt::Prompter;
use pgsteward::retry::LinearBackoff;
use pgsteward::sql::{ExecContext, ResultSet, SqlBatch, SqlExecutor, SqlRow};
use pgsteward::{RunFlags, Steward, StewardError, Target};
use pgsteward_grants::Statement;
use pgsteward_schema::{Instance, InstanceState, Schema, SchemaValidation, User};
use serde_json::json;
use std::collections::{HashSet, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub const CALLER: &str = "alice@example.com";
pub const PROJECT: &str = "p";
pub const PROJECT_NUMBER: &str = "123";
pub const INSTANCE: &str = "inst";
pub const DATABASE: &str = "orders";
pub const OWNER_ROLE: &str = "firebaseowner_orders_public";
pub const WRITER_ROLE: &str = "firebasewriter_orders_public";
pub const SERVICE_AGENT_LOGIN: &str =
    "service-123@gcp-sa-firebasedataconnect.iam";

pub fn target() -> Target {
    Target::new(PROJECT, INSTANCE, DATABASE)
}

/// Catalog state the fake executor answers inspection queries from.
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    pub schema_owner: Option<String>,
    pub tables: Vec<(String, String)>,
    pub roles: HashSet<String>,
    /// `(granted, grantee)` memberships.
    pub memberships: HashSet<(String, String)>,
}

impl Catalog {
    /// A public schema owned by `owner` with the given `(table, owner)` pairs.
    pub fn schema(owner: &str, tables: &[(&str, &str)]) -> Self {
        Self {
            schema_owner: Some(owner.to_string()),
            tables: tables
                .iter()
                .map(|(t, o)| (t.to_string(), o.to_string()))
                .collect(),
            ..Default::default()
        }
    }

    /// Fully provisioned: owner role owns the schema and every table.
    pub fn greenfield(tables: &[&str]) -> Self {
        let pairs: Vec<(&str, &str)> = tables.iter().map(|t| (*t, OWNER_ROLE)).collect();
        Self::schema(OWNER_ROLE, &pairs).with_role(WRITER_ROLE)
    }

    pub fn with_role(mut self, role: &str) -> Self {
        self.roles.insert(role.to_string());
        self
    }

    pub fn with_membership(mut self, granted: &str, grantee: &str) -> Self {
        self.memberships
            .insert((granted.to_string(), grantee.to_string()));
        self
    }
}

/// Executor that answers catalog queries from a [`Catalog`] and records every
/// other batch.
#[derive(Default)]
pub struct RecordingExecutor {
    pub catalog: Mutex<Catalog>,
    pub batches: Mutex<Vec<(ExecContext, SqlBatch)>>,
    pub fail_on: Mutex<Option<String>>,
    /// When set, caller-context batches fail unless the caller's login is in
    /// this set, the way IAM authentication fails for a missing user.
    pub logins: Mutex<Option<Arc<Mutex<HashSet<String>>>>>,
}

impl RecordingExecutor {
    pub fn new(catalog: Catalog) -> Self {
        Self {
            catalog: Mutex::new(catalog),
            ..Default::default()
        }
    }

    pub fn batches(&self) -> Vec<(ExecContext, SqlBatch)> {
        self.batches.lock().unwrap().clone()
    }

    /// Every recorded statement's SQL, in execution order.
    pub fn sqls(&self) -> Vec<String> {
        self.batches()
            .iter()
            .flat_map(|(_, b)| b.statements.iter().map(|s| s.sql().to_string()))
            .collect()
    }

    fn answer(&self, stmt: &Statement) -> Option<ResultSet> {
        if !stmt.is_parameterized() {
            return None;
        }
        let catalog = self.catalog.lock().unwrap();
        let binds = stmt.binds();
        let sql = stmt.sql();
        let rows = if sql.contains("pg_namespace") {
            catalog
                .schema_owner
                .iter()
                .map(|o| SqlRow::new().with("owner", o.as_str()))
                .collect()
        } else if sql.contains("pg_tables") {
            catalog
                .tables
                .iter()
                .map(|(t, o)| {
                    SqlRow::new()
                        .with("table_name", t.as_str())
                        .with("table_owner", o.as_str())
                })
                .collect()
        } else if sql.contains("AS role_exists") {
            vec![SqlRow::new().with("role_exists", catalog.roles.contains(&binds[0]))]
        } else if sql.contains("AS granted") {
            let pair = (binds[0].clone(), binds[1].clone());
            vec![SqlRow::new().with("granted", catalog.memberships.contains(&pair))]
        } else {
            return None;
        };
        Some(ResultSet { rows })
    }
}

#[async_trait]
impl SqlExecutor for RecordingExecutor {
    async fn execute(
        &self,
        _target: &Target,
        batch: SqlBatch,
        context: ExecContext,
    ) -> Result<Vec<ResultSet>, StewardError> {
        if context == ExecContext::Caller
            && let Some(logins) = self.logins.lock().unwrap().as_ref()
            && !logins.lock().unwrap().contains(CALLER)
        {
            return Err(StewardError::Unexpected(format!(
                "password authentication failed for user \"{CALLER}\""
            )));
        }
        if let [stmt] = batch.statements.as_slice()
            && let Some(rs) = self.answer(stmt)
        {
            return Ok(vec![rs]);
        }
        if let Some(needle) = self.fail_on.lock().unwrap().as_deref()
            && batch.statements.iter().any(|s| s.sql().contains(needle))
        {
            return Err(StewardError::Unexpected(format!("statement failed: {needle}")));
        }
        let results = vec![ResultSet::default(); batch.statements.len()];
        self.batches.lock().unwrap().push((context, batch));
        Ok(results)
    }
}

/// Cloud SQL admin API double.
pub struct FakeAdmin {
    pub instance_state: InstanceState,
    pub permissions: Vec<String>,
    pub users: Arc<Mutex<HashSet<String>>>,
    pub created: Mutex<Vec<User>>,
    pub create_failures: Mutex<VecDeque<StewardError>>,
}

impl FakeAdmin {
    /// Admin caller on a runnable instance with no database users.
    pub fn admin() -> Self {
        Self {
            instance_state: InstanceState::Runnable,
            permissions: pgsteward::admin::SQL_ADMIN_PERMISSIONS
                .iter()
                .map(|p| p.to_string())
                .collect(),
            users: Arc::new(Mutex::new(HashSet::new())),
            created: Mutex::new(Vec::new()),
            create_failures: Mutex::new(VecDeque::new()),
        }
    }

    pub fn non_admin() -> Self {
        Self {
            permissions: Vec::new(),
            ..Self::admin()
        }
    }

    pub fn with_users(self, users: &[&str]) -> Self {
        self.users
            .lock()
            .unwrap()
            .extend(users.iter().map(|u| u.to_string()));
        self
    }

    pub fn created_names(&self) -> Vec<String> {
        self.created
            .lock()
            .unwrap()
            .iter()
            .map(|u| u.name.clone())
            .collect()
    }
}

#[async_trait]
impl SqlAdminApi for FakeAdmin {
    async fn get_instance(&self, _project: &str, instance: &str) -> Result<Instance, StewardError> {
        Ok(Instance {
            name: instance.to_string(),
            state: Some(self.instance_state),
            ..Default::default()
        })
    }

    async fn get_user(
        &self,
        _project: &str,
        _instance: &str,
        name: &str,
    ) -> Result<Option<User>, StewardError> {
        Ok(self.users.lock().unwrap().contains(name).then(|| User {
            name: name.to_string(),
            ..Default::default()
        }))
    }

    async fn create_user(&self, _project: &str, _instance: &str, user: &User) -> Result<(), StewardError> {
        if let Some(err) = self.create_failures.lock().unwrap().pop_front() {
            return Err(err);
        }
        self.users.lock().unwrap().insert(user.name.clone());
        self.created.lock().unwrap().push(user.clone());
        Ok(())
    }

    async fn update_user(&self, _project: &str, _instance: &str, _user: &User) -> Result<(), StewardError> {
        Ok(())
    }

    async fn test_iam_permissions(
        &self,
        _project: &str,
        permissions: &[String],
    ) -> Result<Vec<String>, StewardError> {
        Ok(permissions
            .iter()
            .filter(|p| self.permissions.contains(p))
            .cloned()
            .collect())
    }
}

/// Schema service that replays scripted upsert outcomes; once the script runs
/// out every upsert is accepted.
#[derive(Default)]
pub struct FakeSchemaService {
    pub outcomes: Mutex<VecDeque<UpsertOutcome>>,
    /// `(validation mode, validate_only)` per upsert.
    pub upserts: Mutex<Vec<(Option<SchemaValidation>, bool)>>,
    /// `schemaMigration` per upsert, and whether the write was awaited.
    pub migrations: Mutex<Vec<(Option<String>, bool)>>,
    pub deleted: Mutex<Vec<String>>,
}

impl FakeSchemaService {
    pub fn scripted(outcomes: impl IntoIterator<Item = UpsertOutcome>) -> Self {
        Self {
            outcomes: Mutex::new(outcomes.into_iter().collect()),
            ..Default::default()
        }
    }

    pub fn upserts(&self) -> Vec<(Option<SchemaValidation>, bool)> {
        self.upserts.lock().unwrap().clone()
    }

    pub fn migrations(&self) -> Vec<(Option<String>, bool)> {
        self.migrations.lock().unwrap().clone()
    }

    fn record(&self, schema: &Schema, validate_only: bool, awaited: bool) -> UpsertOutcome {
        let pg = schema.postgresql();
        let mode = pg.and_then(|pg| pg.schema_validation);
        let migration = pg.and_then(|pg| pg.schema_migration.clone());
        self.upserts.lock().unwrap().push((mode, validate_only));
        self.migrations.lock().unwrap().push((migration, awaited));
        self.outcomes
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(UpsertOutcome::Accepted)
    }
}

#[async_trait]
impl SchemaService for FakeSchemaService {
    async fn upsert_schema(&self, schema: &Schema, validate_only: bool) -> Result<UpsertOutcome, StewardError> {
        Ok(self.record(schema, validate_only, true))
    }

    async fn start_schema_upsert(&self, schema: &Schema, validate_only: bool) -> Result<UpsertOutcome, StewardError> {
        Ok(self.record(schema, validate_only, false))
    }

    async fn delete_connector(&self, name: &str) -> Result<(), StewardError> {
        self.deleted.lock().unwrap().push(name.to_string());
        Ok(())
    }
}

/// Prompter with canned answers. Running out of answers is a test failure.
#[derive(Default)]
pub struct ScriptedPrompter {
    pub confirms: Mutex<VecDeque<bool>>,
    pub selects: Mutex<VecDeque<usize>>,
    pub asked: Mutex<Vec<String>>,
}

impl ScriptedPrompter {
    pub fn confirming(answers: &[bool]) -> Self {
        Self {
            confirms: Mutex::new(answers.iter().copied().collect()),
            ..Default::default()
        }
    }

    pub fn selecting(answers: &[usize]) -> Self {
        Self {
            selects: Mutex::new(answers.iter().copied().collect()),
            ..Default::default()
        }
    }

    pub fn asked(&self) -> Vec<String> {
        self.asked.lock().unwrap().clone()
    }
}

#[async_trait]
impl Prompter for ScriptedPrompter {
    async fn confirm(&self, message: &str, _default: bool) -> Result<bool, StewardError> {
        self.asked.lock().unwrap().push(message.to_string());
        self.confirms
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| StewardError::Prompt(format!("unexpected confirm: {message}")))
    }

    async fn select(&self, message: &str, options: &[String], _default: usize) -> Result<usize, StewardError> {
        self.asked
            .lock()
            .unwrap()
            .push(format!("{message} {options:?}"));
        self.selects
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| StewardError::Prompt(format!("unexpected select: {message}")))
    }
}

pub struct Harness {
    pub admin: Arc<FakeAdmin>,
    pub executor: Arc<RecordingExecutor>,
    pub schemas: Arc<FakeSchemaService>,
    pub prompter: Arc<ScriptedPrompter>,
}

impl Harness {
    pub fn new(admin: FakeAdmin, catalog: Catalog) -> Self {
        Self {
            admin: Arc::new(admin),
            executor: Arc::new(RecordingExecutor::new(catalog)),
            schemas: Arc::new(FakeSchemaService::default()),
            prompter: Arc::new(ScriptedPrompter::default()),
        }
    }

    pub fn with_schemas(mut self, schemas: FakeSchemaService) -> Self {
        self.schemas = Arc::new(schemas);
        self
    }

    pub fn with_prompter(mut self, prompter: ScriptedPrompter) -> Self {
        self.prompter = Arc::new(prompter);
        self
    }

    /// Caller-context SQL only works once the admin fake has the caller's login.
    pub fn requiring_caller_login(self) -> Self {
        *self.executor.logins.lock().unwrap() = Some(self.admin.users.clone());
        self
    }

    pub fn steward(&self, flags: RunFlags) -> Steward {
        Steward {
            caller_account: CALLER.to_string(),
            project_number: PROJECT_NUMBER.to_string(),
            service_agent_domain: "gcp-sa-firebasedataconnect.iam.gserviceaccount.com".to_string(),
            elevated_login: "firebasesuperuser".to_string(),
            flags,
            identity_backoff: LinearBackoff::new(Duration::from_millis(1), 3),
            admin: self.admin.clone(),
            executor: self.executor.clone(),
            schemas: self.schemas.clone(),
            prompter: self.prompter.clone(),
        }
    }
}

pub fn interactive() -> RunFlags {
    RunFlags::default()
}

pub fn non_interactive() -> RunFlags {
    RunFlags {
        non_interactive: true,
        force: false,
    }
}

/// Schema document targeting `inst`/`orders`, optionally with a validation mode.
pub fn schema_doc(validation: Option<&str>) -> Schema {
    let mut pg = json!({
        "database": DATABASE,
        "cloudSql": { "instance": format!("projects/{PROJECT}/locations/us-central1/instances/{INSTANCE}") }
    });
    if let Some(mode) = validation {
        pg["schemaValidation"] = json!(mode);
    }
    serde_json::from_value(json!({
        "name": format!("projects/{PROJECT}/locations/us-central1/services/svc/schemas/main"),
        "source": { "files": [] },
        "datasources": [{ "postgresql": pg }]
    }))
    .expect("valid schema document")
}
