use crate::error::StewardError;
use crate::identity::DatabaseIdentity;
use crate::target::Target;
use pgsteward_grants::privileges::{grant_role, revoke_role};
use pgsteward_grants::{CLOUDSQL_SUPERUSER, Grants, Ident, ManagedRole, RoleNames, Statement};

use super::inspect::SchemaSnapshot;

/// Builds the statement plans for every provisioning path of one target.
///
/// All plans run in the elevated context and are safe to re-run.
#[derive(Debug, Clone)]
pub struct Provisioner {
    database: Ident,
    schema: Ident,
    roles: RoleNames,
    elevated: Ident,
    caller: Ident,
    service_agent: Ident,
}

impl Provisioner {
    pub fn new(
        target: &Target,
        elevated_login: &str,
        caller: &DatabaseIdentity,
        service_agent: &DatabaseIdentity,
    ) -> Result<Self, StewardError> {
        Ok(Self {
            database: target.database_ident()?,
            schema: target.schema_ident()?,
            roles: target.role_names()?,
            elevated: Ident::new(elevated_login)?,
            caller: caller.login()?,
            service_agent: service_agent.login()?,
        })
    }

    pub fn roles(&self) -> &RoleNames {
        &self.roles
    }

    fn grants(&self) -> Grants<'_> {
        Grants::new(&self.database, &self.schema, &self.roles, &self.elevated)
    }

    /// Managed roles, schema ownership, tiered grants and default privileges.
    ///
    /// `revoke_legacy_superuser` drops the `cloudsqlsuperuser` membership older
    /// setups granted directly to the owner role.
    pub fn greenfield_setup(&self, revoke_legacy_superuser: bool) -> Vec<Statement> {
        let grants = self.grants();
        let mut stmts = Vec::new();
        if revoke_legacy_superuser {
            stmts.push(revoke_role(&superuser_ident(), self.roles.owner()));
        }
        stmts.push(grants.create_schema_if_missing());
        for role in ManagedRole::ALL {
            stmts.extend(grants.role_permissions(role));
        }
        stmts.push(grant_role(self.roles.owner(), &self.caller));
        stmts.push(grant_role(self.roles.writer(), &self.service_agent));
        stmts.extend(grants.default_privileges(self.roles.owner()));
        stmts
    }

    /// Grants access without touching ownership: the writer role goes to the
    /// caller, the service agent and every foreign table owner, and each
    /// foreign owner gets default-privilege entries for what it creates later.
    pub fn brownfield_repair(&self, snapshot: &SchemaSnapshot) -> Result<Vec<Statement>, StewardError> {
        let grants = self.grants();
        let owners = self.foreign_owner_idents(snapshot)?;

        let mut stmts = self.borrow_owner_roles(&owners);
        stmts.extend(grants.role_permissions(ManagedRole::Writer));
        stmts.extend(grants.role_permissions(ManagedRole::Reader));
        stmts.push(grant_role(self.roles.writer(), &self.caller));
        stmts.push(grant_role(self.roles.writer(), &self.service_agent));
        for owner in &owners {
            stmts.push(grant_role(self.roles.writer(), owner));
        }
        for owner in &owners {
            stmts.extend(grants.default_privileges(owner));
        }
        stmts.extend(self.return_owner_roles(&owners));
        Ok(stmts)
    }

    /// Moves every table to the managed owner role, after handing foreign
    /// owners the writer role so they keep data access.
    pub fn transfer_ownership_to_greenfield(
        &self,
        snapshot: &SchemaSnapshot,
        revoke_legacy_superuser: bool,
    ) -> Result<Vec<Statement>, StewardError> {
        let grants = self.grants();
        let owners = self.foreign_owner_idents(snapshot)?;

        let mut stmts = self.borrow_owner_roles(&owners);
        stmts.extend(self.greenfield_setup(revoke_legacy_superuser));
        for owner in &owners {
            stmts.push(grant_role(self.roles.writer(), owner));
        }
        for table in &snapshot.tables {
            if table.owner != self.roles.owner().as_str() {
                let name = Ident::new(table.name.as_str())?;
                stmts.push(grants.alter_table_owner(&name, self.roles.owner()));
            }
        }
        stmts.extend(self.return_owner_roles(&owners));
        Ok(stmts)
    }

    fn foreign_owner_idents(&self, snapshot: &SchemaSnapshot) -> Result<Vec<Ident>, StewardError> {
        snapshot
            .foreign_owners(&self.roles)
            .into_iter()
            .map(|owner| Ident::new(owner).map_err(StewardError::from))
            .collect()
    }

    /// Temporarily makes the elevated login a member of each foreign owner so
    /// it can act as that owner. The elevated login itself is skipped.
    fn borrow_owner_roles(&self, owners: &[Ident]) -> Vec<Statement> {
        owners
            .iter()
            .filter(|owner| **owner != self.elevated)
            .map(|owner| grant_role(owner, &self.elevated))
            .collect()
    }

    fn return_owner_roles(&self, owners: &[Ident]) -> Vec<Statement> {
        owners
            .iter()
            .filter(|owner| **owner != self.elevated)
            .map(|owner| revoke_role(owner, &self.elevated))
            .collect()
    }
}

fn superuser_ident() -> Ident {
    Ident::from_static(CLOUDSQL_SUPERUSER)
}
