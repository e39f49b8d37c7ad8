use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::ident::{GrantError, Ident};

/// Built-in login the elevated execution context signs in as.
pub const ELEVATED_LOGIN: &str = "firebasesuperuser";

/// Cloud SQL's built-in superuser-equivalent role. Older setups granted it to
/// the owner role directly; provisioning revokes that grant when found.
pub const CLOUDSQL_SUPERUSER: &str = "cloudsqlsuperuser";

pub const DEFAULT_SCHEMA: &str = "public";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ManagedRole {
    Owner,
    Writer,
    Reader,
}

impl ManagedRole {
    pub const ALL: [ManagedRole; 3] = [ManagedRole::Owner, ManagedRole::Writer, ManagedRole::Reader];

    fn prefix(self) -> &'static str {
        match self {
            ManagedRole::Owner => "firebaseowner",
            ManagedRole::Writer => "firebasewriter",
            ManagedRole::Reader => "firebasereader",
        }
    }
}

impl fmt::Display for ManagedRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ManagedRole::Owner => "owner",
            ManagedRole::Writer => "writer",
            ManagedRole::Reader => "reader",
        };
        f.write_str(name)
    }
}

impl FromStr for ManagedRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "owner" => Ok(ManagedRole::Owner),
            "writer" => Ok(ManagedRole::Writer),
            "reader" => Ok(ManagedRole::Reader),
            other => Err(format!(
                "unknown role {other:?}; expected one of owner, writer, reader"
            )),
        }
    }
}

/// Deterministic names of the three managed roles for one database schema,
/// e.g. `firebaseowner_<database>_<schema>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoleNames {
    owner: Ident,
    writer: Ident,
    reader: Ident,
}

impl RoleNames {
    pub fn new(database: &str, schema: &str) -> Result<Self, GrantError> {
        let name = |role: ManagedRole| Ident::new(format!("{}_{database}_{schema}", role.prefix()));
        Ok(Self {
            owner: name(ManagedRole::Owner)?,
            writer: name(ManagedRole::Writer)?,
            reader: name(ManagedRole::Reader)?,
        })
    }

    pub fn role(&self, role: ManagedRole) -> &Ident {
        match role {
            ManagedRole::Owner => &self.owner,
            ManagedRole::Writer => &self.writer,
            ManagedRole::Reader => &self.reader,
        }
    }

    pub fn owner(&self) -> &Ident {
        &self.owner
    }

    pub fn writer(&self) -> &Ident {
        &self.writer
    }

    pub fn reader(&self) -> &Ident {
        &self.reader
    }

    /// True when `name` is one of the three managed roles.
    pub fn is_managed(&self, name: &str) -> bool {
        ManagedRole::ALL
            .iter()
            .any(|role| self.role(*role).as_str() == name)
    }
}
