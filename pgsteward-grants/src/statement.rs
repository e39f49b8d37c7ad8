use std::fmt;

/// One SQL statement plus its positional text parameters (`$1`, `$2`, ...).
///
/// Statements without parameters are sent through the simple query protocol so
/// `DO` blocks and DDL work unchanged; parameterized ones use the extended
/// protocol.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Statement {
    sql: String,
    binds: Vec<String>,
}

impl Statement {
    pub fn new(sql: impl Into<String>) -> Self {
        Self {
            sql: sql.into(),
            binds: Vec::new(),
        }
    }

    pub fn bind(mut self, value: impl Into<String>) -> Self {
        self.binds.push(value.into());
        self
    }

    pub fn sql(&self) -> &str {
        &self.sql
    }

    pub fn binds(&self) -> &[String] {
        &self.binds
    }

    pub fn is_parameterized(&self) -> bool {
        !self.binds.is_empty()
    }
}

impl fmt::Display for Statement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.sql)?;
        if !self.binds.is_empty() {
            write!(f, " -- binds: {:?}", self.binds)?;
        }
        Ok(())
    }
}

impl From<String> for Statement {
    fn from(sql: String) -> Self {
        Self::new(sql)
    }
}

impl From<&str> for Statement {
    fn from(sql: &str) -> Self {
        Self::new(sql)
    }
}
