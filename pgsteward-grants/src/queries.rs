//! Read-only catalog queries. Values are always bound, never interpolated.
//!
//! Column aliases are part of the contract with the callers that decode the
//! rows: `owner`, `table_name`, `table_owner`, `role_exists`, `granted`.

use crate::statement::Statement;

pub fn schema_owner(schema: &str) -> Statement {
    Statement::new("SELECT pg_get_userbyid(nspowner)::text AS owner FROM pg_namespace WHERE nspname = $1")
        .bind(schema)
}

/// Base tables of a schema with their owners, ordered by name.
pub fn schema_tables(schema: &str) -> Statement {
    Statement::new(
        "SELECT tablename::text AS table_name, tableowner::text AS table_owner FROM pg_tables WHERE schemaname = $1 ORDER BY tablename",
    )
    .bind(schema)
}

pub fn role_exists(role: &str) -> Statement {
    Statement::new("SELECT EXISTS (SELECT 1 FROM pg_roles WHERE rolname = $1) AS role_exists")
        .bind(role)
}

/// Whether `granted` is a direct member grant of `grantee`.
pub fn role_is_granted(granted: &str, grantee: &str) -> Statement {
    Statement::new(
        "SELECT EXISTS (SELECT 1 FROM pg_auth_members m JOIN pg_roles grantee ON grantee.oid = m.member JOIN pg_roles granted ON granted.oid = m.roleid WHERE granted.rolname = $1 AND grantee.rolname = $2) AS granted",
    )
    .bind(granted)
    .bind(grantee)
}
