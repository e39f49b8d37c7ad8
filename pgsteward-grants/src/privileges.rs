use crate::ident::Ident;
use crate::roles::{ManagedRole, RoleNames};
use crate::statement::Statement;

/// Statement builder bound to one database schema, its managed roles and the
/// elevated login that administers them.
#[derive(Debug, Clone, Copy)]
pub struct Grants<'a> {
    database: &'a Ident,
    schema: &'a Ident,
    roles: &'a RoleNames,
    elevated: &'a Ident,
}

impl<'a> Grants<'a> {
    pub fn new(
        database: &'a Ident,
        schema: &'a Ident,
        roles: &'a RoleNames,
        elevated: &'a Ident,
    ) -> Self {
        Self {
            database,
            schema,
            roles,
            elevated,
        }
    }

    pub fn roles(&self) -> &'a RoleNames {
        self.roles
    }

    pub fn schema(&self) -> &'a Ident {
        self.schema
    }

    pub fn elevated(&self) -> &'a Ident {
        self.elevated
    }

    pub fn create_schema_if_missing(&self) -> Statement {
        Statement::new(format!("CREATE SCHEMA IF NOT EXISTS {}", self.schema))
    }

    /// Creates the role, wires it to the elevated login and grants the
    /// privileges of its tier on everything currently in the schema. The owner
    /// tier additionally takes ownership of the schema itself.
    pub fn role_permissions(&self, role: ManagedRole) -> Vec<Statement> {
        let name = self.roles.role(role);
        let schema = self.schema;
        let mut stmts = vec![
            create_role_if_missing(name, self.elevated),
            grant_role(name, self.elevated),
            Statement::new(format!(
                "GRANT CONNECT ON DATABASE {} TO {name}",
                self.database
            )),
        ];
        match role {
            ManagedRole::Owner => {
                stmts.push(Statement::new(format!(
                    "ALTER SCHEMA {schema} OWNER TO {name}"
                )));
                stmts.push(Statement::new(format!(
                    "GRANT ALL PRIVILEGES ON SCHEMA {schema} TO {name}"
                )));
            }
            ManagedRole::Writer | ManagedRole::Reader => {
                stmts.push(Statement::new(format!(
                    "GRANT USAGE ON SCHEMA {schema} TO {name}"
                )));
            }
        }
        stmts.push(Statement::new(format!(
            "GRANT {} ON ALL TABLES IN SCHEMA {schema} TO {name}",
            table_privileges(role)
        )));
        stmts.push(Statement::new(format!(
            "GRANT {} ON ALL SEQUENCES IN SCHEMA {schema} TO {name}",
            sequence_privileges(role)
        )));
        stmts.push(Statement::new(format!(
            "GRANT {} ON ALL FUNCTIONS IN SCHEMA {schema} TO {name}",
            function_privileges(role)
        )));
        stmts
    }

    /// Default privileges so writer and reader can use objects that `creator`
    /// creates later. Only the creating role may alter its own defaults, hence
    /// the `SET ROLE` around the block; the session returns to the elevated
    /// login afterwards.
    pub fn default_privileges(&self, creator: &Ident) -> Vec<Statement> {
        let schema = self.schema;
        let mut stmts = vec![set_role(creator)];
        for role in [ManagedRole::Writer, ManagedRole::Reader] {
            let grantee = self.roles.role(role);
            stmts.push(Statement::new(format!(
                "ALTER DEFAULT PRIVILEGES IN SCHEMA {schema} GRANT {} ON TABLES TO {grantee}",
                table_privileges(role)
            )));
            stmts.push(Statement::new(format!(
                "ALTER DEFAULT PRIVILEGES IN SCHEMA {schema} GRANT {} ON SEQUENCES TO {grantee}",
                sequence_privileges(role)
            )));
            stmts.push(Statement::new(format!(
                "ALTER DEFAULT PRIVILEGES IN SCHEMA {schema} GRANT {} ON FUNCTIONS TO {grantee}",
                function_privileges(role)
            )));
        }
        stmts.push(set_role(self.elevated));
        stmts
    }

    pub fn alter_table_owner(&self, table: &Ident, owner: &Ident) -> Statement {
        Statement::new(format!(
            "ALTER TABLE {}.{table} OWNER TO {owner}",
            self.schema
        ))
    }
}

pub fn create_role_if_missing(role: &Ident, admin: &Ident) -> Statement {
    Statement::new(format!(
        "DO $$ BEGIN IF NOT EXISTS (SELECT FROM pg_catalog.pg_roles WHERE rolname = {}) THEN CREATE ROLE {role} WITH ADMIN {admin}; END IF; END $$;",
        role.literal()
    ))
}

pub fn grant_role(role: &Ident, grantee: &Ident) -> Statement {
    Statement::new(format!("GRANT {role} TO {grantee}"))
}

pub fn revoke_role(role: &Ident, grantee: &Ident) -> Statement {
    Statement::new(format!("REVOKE {role} FROM {grantee}"))
}

pub fn set_role(role: &Ident) -> Statement {
    Statement::new(format!("SET ROLE {role}"))
}

fn table_privileges(role: ManagedRole) -> &'static str {
    match role {
        ManagedRole::Owner => "ALL PRIVILEGES",
        ManagedRole::Writer => "SELECT, INSERT, UPDATE, DELETE, TRUNCATE",
        ManagedRole::Reader => "SELECT",
    }
}

fn sequence_privileges(role: ManagedRole) -> &'static str {
    match role {
        ManagedRole::Owner => "ALL PRIVILEGES",
        ManagedRole::Writer | ManagedRole::Reader => "USAGE, SELECT",
    }
}

fn function_privileges(role: ManagedRole) -> &'static str {
    match role {
        ManagedRole::Owner => "ALL PRIVILEGES",
        ManagedRole::Writer | ManagedRole::Reader => "EXECUTE",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Fixture {
        database: Ident,
        schema: Ident,
        roles: RoleNames,
        elevated: Ident,
    }

    fn fixture() -> Fixture {
        Fixture {
            database: Ident::new("orders").unwrap(),
            schema: Ident::new("public").unwrap(),
            roles: RoleNames::new("orders", "public").unwrap(),
            elevated: Ident::new("firebasesuperuser").unwrap(),
        }
    }

    fn sqls(stmts: &[Statement]) -> Vec<&str> {
        stmts.iter().map(Statement::sql).collect()
    }

    #[test]
    fn owner_tier_takes_schema_ownership() {
        let f = fixture();
        let grants = Grants::new(&f.database, &f.schema, &f.roles, &f.elevated);
        let stmts = grants.role_permissions(ManagedRole::Owner);
        let sqls = sqls(&stmts);

        assert!(sqls[0].contains("CREATE ROLE \"firebaseowner_orders_public\" WITH ADMIN \"firebasesuperuser\""));
        assert!(sqls[0].contains("rolname = 'firebaseowner_orders_public'"));
        assert!(sqls.contains(&"GRANT \"firebaseowner_orders_public\" TO \"firebasesuperuser\""));
        assert!(sqls.contains(&"ALTER SCHEMA \"public\" OWNER TO \"firebaseowner_orders_public\""));
        assert!(sqls.contains(
            &"GRANT ALL PRIVILEGES ON ALL TABLES IN SCHEMA \"public\" TO \"firebaseowner_orders_public\""
        ));
    }

    #[test]
    fn writer_and_reader_never_own_the_schema() {
        let f = fixture();
        let grants = Grants::new(&f.database, &f.schema, &f.roles, &f.elevated);
        for role in [ManagedRole::Writer, ManagedRole::Reader] {
            let stmts = grants.role_permissions(role);
            assert!(stmts.iter().all(|s| !s.sql().contains("OWNER TO")));
        }

        let writer = grants.role_permissions(ManagedRole::Writer);
        assert!(sqls(&writer).contains(
            &"GRANT SELECT, INSERT, UPDATE, DELETE, TRUNCATE ON ALL TABLES IN SCHEMA \"public\" TO \"firebasewriter_orders_public\""
        ));
        let reader = grants.role_permissions(ManagedRole::Reader);
        assert!(sqls(&reader).contains(
            &"GRANT SELECT ON ALL TABLES IN SCHEMA \"public\" TO \"firebasereader_orders_public\""
        ));
        assert!(sqls(&reader).contains(
            &"GRANT USAGE, SELECT ON ALL SEQUENCES IN SCHEMA \"public\" TO \"firebasereader_orders_public\""
        ));
    }

    #[test]
    fn default_privileges_run_as_the_creating_role() {
        let f = fixture();
        let grants = Grants::new(&f.database, &f.schema, &f.roles, &f.elevated);
        let stmts = grants.default_privileges(f.roles.owner());
        let sqls = sqls(&stmts);

        assert_eq!(sqls.first(), Some(&"SET ROLE \"firebaseowner_orders_public\""));
        assert_eq!(sqls.last(), Some(&"SET ROLE \"firebasesuperuser\""));
        assert_eq!(sqls.len(), 8);
        assert!(sqls.iter().skip(1).take(6).all(|s| s.starts_with("ALTER DEFAULT PRIVILEGES IN SCHEMA \"public\"")));
    }

    #[test]
    fn alter_table_owner_quotes_both_parts() {
        let f = fixture();
        let grants = Grants::new(&f.database, &f.schema, &f.roles, &f.elevated);
        let table = Ident::new("Order Items").unwrap();
        assert_eq!(
            grants.alter_table_owner(&table, f.roles.owner()).sql(),
            "ALTER TABLE \"public\".\"Order Items\" OWNER TO \"firebaseowner_orders_public\""
        );
    }
}
