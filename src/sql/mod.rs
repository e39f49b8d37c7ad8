//! Batched SQL execution against a target database, either as the caller's IAM
//! login or as the elevated built-in login.

mod postgres;
mod row;

pub use postgres::PgExecutor;
pub use row::{SqlRow, SqlValue};

use crate::error::StewardError;
use crate::target::Target;
use async_trait::async_trait;
use pgsteward_grants::Statement;

/// Whose session a batch runs in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecContext {
    /// The caller's own IAM login.
    Caller,
    /// The built-in elevated login; the session starts with `SET ROLE` to it.
    Elevated,
}

/// Log level for the statements of a batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Visibility {
    #[default]
    Silent,
    Verbose,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SqlBatch {
    pub statements: Vec<Statement>,
    pub visibility: Visibility,
    /// Run inside one transaction; any failure rolls back the whole batch.
    pub transactional: bool,
}

impl SqlBatch {
    pub fn new(statements: impl IntoIterator<Item = Statement>) -> Self {
        Self {
            statements: statements.into_iter().collect(),
            visibility: Visibility::Silent,
            transactional: false,
        }
    }

    pub fn with_visibility(mut self, visibility: Visibility) -> Self {
        self.visibility = visibility;
        self
    }

    pub fn verbose(self) -> Self {
        self.with_visibility(Visibility::Verbose)
    }

    pub fn transactional(mut self) -> Self {
        self.transactional = true;
        self
    }

    pub fn is_empty(&self) -> bool {
        self.statements.is_empty()
    }
}

/// Rows returned by one statement.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResultSet {
    pub rows: Vec<SqlRow>,
}

impl ResultSet {
    pub fn first(&self) -> Option<&SqlRow> {
        self.rows.first()
    }
}

#[async_trait]
pub trait SqlExecutor: Send + Sync {
    /// Runs the statements in order and returns one [`ResultSet`] per
    /// statement. The first failing statement aborts the batch.
    async fn execute(
        &self,
        target: &Target,
        batch: SqlBatch,
        context: ExecContext,
    ) -> Result<Vec<ResultSet>, StewardError>;
}

/// Runs a single statement as the caller and returns its rows.
pub async fn query(
    executor: &dyn SqlExecutor,
    target: &Target,
    statement: Statement,
) -> Result<Vec<SqlRow>, StewardError> {
    let mut results = executor
        .execute(target, SqlBatch::new([statement]), ExecContext::Caller)
        .await?;
    Ok(results.pop().map(|rs| rs.rows).unwrap_or_default())
}
