use super::SqlAdminApi;
use tracing::{debug, warn};

/// Permissions that together mean the caller can administer Cloud SQL users.
pub const SQL_ADMIN_PERMISSIONS: [&str; 4] = [
    "cloudsql.instances.connect",
    "cloudsql.instances.get",
    "cloudsql.users.create",
    "cloudsql.users.update",
];

/// Whether the caller holds every permission in [`SQL_ADMIN_PERMISSIONS`].
///
/// A failed permission check counts as "not an admin".
pub async fn caller_is_sql_admin(admin: &dyn SqlAdminApi, project: &str) -> bool {
    let wanted: Vec<String> = SQL_ADMIN_PERMISSIONS.iter().map(|p| p.to_string()).collect();
    match admin.test_iam_permissions(project, &wanted).await {
        Ok(granted) => {
            let missing: Vec<&String> = wanted.iter().filter(|p| !granted.contains(p)).collect();
            debug!(?missing, "Checked Cloud SQL admin permissions");
            missing.is_empty()
        }
        Err(err) => {
            warn!(error = %err, "Failed to test IAM permissions; assuming non-admin");
            false
        }
    }
}
