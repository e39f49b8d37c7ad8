//! Pure SQL statement builders for managed Postgres roles.
//!
//! Nothing in this crate performs I/O. Every role, schema, table and database
//! name goes through [`Ident`] exactly once, so quoting happens in one place.

pub mod ident;
pub mod privileges;
pub mod queries;
pub mod roles;
pub mod statement;

pub use ident::{GrantError, Ident};
pub use privileges::Grants;
pub use roles::{CLOUDSQL_SUPERUSER, DEFAULT_SCHEMA, ELEVATED_LOGIN, ManagedRole, RoleNames};
pub use statement::Statement;
