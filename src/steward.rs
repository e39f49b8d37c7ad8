use crate::admin::SqlAdminApi;
use crate::identity::{DatabaseIdentity, map_identity, service_agent_account};
use crate::migrate::SchemaService;
use crate::prompt::Prompter;
use crate::retry::LinearBackoff;
use crate::sql::SqlExecutor;
use std::sync::Arc;

/// Flags supplied by the invoking CLI layer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunFlags {
    pub non_interactive: bool,
    pub force: bool,
}

impl RunFlags {
    pub fn interactive(&self) -> bool {
        !self.non_interactive
    }
}

/// Everything one operation needs: who is calling, how to reach the control
/// plane and the database, and how to ask the user. Built once per invocation
/// and passed explicitly; nothing here is process-global.
pub struct Steward {
    pub caller_account: String,
    pub project_number: String,
    pub service_agent_domain: String,
    pub elevated_login: String,
    pub flags: RunFlags,
    pub identity_backoff: LinearBackoff,
    pub admin: Arc<dyn SqlAdminApi>,
    pub executor: Arc<dyn SqlExecutor>,
    pub schemas: Arc<dyn SchemaService>,
    pub prompter: Arc<dyn Prompter>,
}

impl Steward {
    pub fn caller(&self) -> DatabaseIdentity {
        map_identity(&self.caller_account)
    }

    pub fn service_agent_account(&self) -> String {
        service_agent_account(&self.project_number, &self.service_agent_domain)
    }

    pub fn service_agent(&self) -> DatabaseIdentity {
        map_identity(&self.service_agent_account())
    }
}
