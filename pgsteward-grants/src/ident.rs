use std::fmt;

use thiserror::Error as ThisError;

/// Postgres truncates identifiers longer than `NAMEDATALEN - 1` bytes.
const MAX_IDENT_BYTES: usize = 63;

#[derive(Debug, Clone, PartialEq, Eq, ThisError)]
pub enum GrantError {
    #[error("SQL identifier must not be empty")]
    Empty,

    #[error("SQL identifier {name:?} is longer than {MAX_IDENT_BYTES} bytes")]
    TooLong { name: String },

    #[error("SQL identifier {name:?} contains control characters")]
    ControlCharacter { name: String },

    #[error("SQL identifier {name:?} contains a dollar-quote delimiter")]
    DollarQuote { name: String },
}

/// A validated SQL identifier: role, schema, table or database name.
///
/// Rendering through [`Ident::quoted`] (or `Display`) always produces a
/// double-quoted identifier with embedded quotes doubled, and
/// [`Ident::literal`] a single-quoted string literal. `$$` is rejected because
/// several statements embed identifiers inside `DO $$ ... $$` blocks.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Ident(String);

impl Ident {
    pub fn new(name: impl Into<String>) -> Result<Self, GrantError> {
        let name = name.into();
        if name.is_empty() {
            return Err(GrantError::Empty);
        }
        if name.len() > MAX_IDENT_BYTES {
            return Err(GrantError::TooLong { name });
        }
        if name.chars().any(char::is_control) {
            return Err(GrantError::ControlCharacter { name });
        }
        if name.contains("$$") {
            return Err(GrantError::DollarQuote { name });
        }
        Ok(Self(name))
    }

    /// Wraps a built-in role name known at compile time. Skips validation.
    pub fn from_static(name: &'static str) -> Self {
        Self(name.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn quoted(&self) -> String {
        format!("\"{}\"", self.0.replace('"', "\"\""))
    }

    pub fn literal(&self) -> String {
        format!("'{}'", self.0.replace('\'', "''"))
    }
}

impl fmt::Display for Ident {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.quoted())
    }
}

impl AsRef<str> for Ident {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl TryFrom<&str> for Ident {
    type Error = GrantError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl TryFrom<String> for Ident {
    type Error = GrantError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}
