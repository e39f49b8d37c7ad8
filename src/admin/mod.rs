//! Cloud SQL control plane: instances, database users and IAM permission checks.

pub(crate) mod client;
mod permissions;

pub use client::CloudSqlAdminClient;
pub use permissions::{SQL_ADMIN_PERMISSIONS, caller_is_sql_admin};

use crate::error::StewardError;
use async_trait::async_trait;
use pgsteward_schema::{Instance, User};

#[async_trait]
pub trait SqlAdminApi: Send + Sync {
    async fn get_instance(&self, project: &str, instance: &str) -> Result<Instance, StewardError>;

    /// `None` when the user does not exist.
    async fn get_user(
        &self,
        project: &str,
        instance: &str,
        name: &str,
    ) -> Result<Option<User>, StewardError>;

    /// Creates a database user and waits for the operation to finish.
    async fn create_user(&self, project: &str, instance: &str, user: &User)
    -> Result<(), StewardError>;

    /// Updates an existing user, e.g. to rotate a built-in password.
    async fn update_user(&self, project: &str, instance: &str, user: &User)
    -> Result<(), StewardError>;

    /// The subset of `permissions` the caller holds on `project`.
    async fn test_iam_permissions(
        &self,
        project: &str,
        permissions: &[String],
    ) -> Result<Vec<String>, StewardError>;
}
