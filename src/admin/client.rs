use super::SqlAdminApi;
use crate::auth::AccessTokenSource;
use crate::config::{EndpointsConfig, RetryConfig};
use crate::error::{IsRetryable, StewardError, upstream_error};
use crate::retry::operation_poll;
use async_trait::async_trait;
use backon::{ConstantBuilder, ExponentialBuilder, Retryable};
use pgsteward_schema::{
    Instance, Operation, OperationStatus, TestIamPermissionsRequest, TestIamPermissionsResponse,
    User,
};
use reqwest::{Method, StatusCode};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};
use url::Url;

/// REST client for the Cloud SQL Admin and Resource Manager APIs.
pub struct CloudSqlAdminClient {
    http: reqwest::Client,
    tokens: Arc<dyn AccessTokenSource>,
    sqladmin: Url,
    resource_manager: Url,
    retry_policy: ExponentialBuilder,
    poll_policy: ConstantBuilder,
}

impl CloudSqlAdminClient {
    pub fn new(
        http: reqwest::Client,
        tokens: Arc<dyn AccessTokenSource>,
        endpoints: &EndpointsConfig,
        retry: &RetryConfig,
    ) -> Self {
        let retry_policy = ExponentialBuilder::default()
            .with_min_delay(Duration::from_millis(200))
            .with_max_delay(Duration::from_secs(2))
            .with_max_times(3)
            .with_jitter();
        Self {
            http,
            tokens,
            sqladmin: endpoints.sqladmin.clone(),
            resource_manager: endpoints.resource_manager.clone(),
            retry_policy,
            poll_policy: operation_poll(retry),
        }
    }

    fn sqladmin_url(&self, segments: &[&str]) -> Result<Url, StewardError> {
        append_segments(&self.sqladmin, segments)
    }

    /// Sends one request, retrying on transport errors and 429/5xx.
    async fn send<B: Serialize + Sync>(
        &self,
        method: Method,
        url: Url,
        body: Option<&B>,
    ) -> Result<reqwest::Response, StewardError> {
        let op = || {
            let method = method.clone();
            let url = url.clone();
            async move {
                let token = self.tokens.access_token().await?;
                let mut req = self.http.request(method, url).bearer_auth(token);
                if let Some(body) = body {
                    req = req.json(body);
                }
                let resp = req.send().await?;
                let status = resp.status();
                if status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
                    return Err(upstream_error(resp).await);
                }
                Ok(resp)
            }
        };

        op.retry(&self.retry_policy)
            .when(|e: &StewardError| e.is_retryable())
            .notify(|err, dur: Duration| {
                warn!("Cloud SQL admin call retrying after error {}, sleeping {:?}", err, dur);
            })
            .await
    }

    async fn send_json<B, T>(&self, method: Method, url: Url, body: Option<&B>) -> Result<T, StewardError>
    where
        B: Serialize + Sync,
        T: serde::de::DeserializeOwned,
    {
        let resp = self.send(method, url, body).await?;
        if !resp.status().is_success() {
            return Err(upstream_error(resp).await);
        }
        Ok(resp.json::<T>().await?)
    }

    async fn get_operation(&self, project: &str, name: &str) -> Result<Operation, StewardError> {
        let url = self.sqladmin_url(&["projects", project, "operations", name])?;
        self.send_json::<(), Operation>(Method::GET, url, None).await
    }

    /// Polls until the operation is done and surfaces its error, if any.
    async fn wait_for_operation(&self, project: &str, op: Operation) -> Result<(), StewardError> {
        let name = op.name.clone();
        let finished = if op.status == OperationStatus::Done {
            op
        } else {
            let poll = || async {
                let op = self.get_operation(project, &name).await?;
                if op.status == OperationStatus::Done {
                    Ok(op)
                } else {
                    Err(StewardError::OperationPending { name: name.clone() })
                }
            };
            poll.retry(&self.poll_policy)
                .when(|e: &StewardError| matches!(e, StewardError::OperationPending { .. }))
                .await?
        };

        match finished.error {
            Some(err) if !err.errors.is_empty() => Err(StewardError::OperationFailed {
                name,
                message: err.message(),
            }),
            _ => {
                debug!(operation = %name, "Cloud SQL operation finished");
                Ok(())
            }
        }
    }
}

#[async_trait]
impl SqlAdminApi for CloudSqlAdminClient {
    async fn get_instance(&self, project: &str, instance: &str) -> Result<Instance, StewardError> {
        let url = self.sqladmin_url(&["projects", project, "instances", instance])?;
        self.send_json::<(), Instance>(Method::GET, url, None).await
    }

    async fn get_user(
        &self,
        project: &str,
        instance: &str,
        name: &str,
    ) -> Result<Option<User>, StewardError> {
        let url = self.sqladmin_url(&["projects", project, "instances", instance, "users", name])?;
        let resp = self.send::<()>(Method::GET, url, None).await?;
        match resp.status() {
            StatusCode::NOT_FOUND => Ok(None),
            status if status.is_success() => Ok(Some(resp.json::<User>().await?)),
            _ => Err(upstream_error(resp).await),
        }
    }

    async fn create_user(
        &self,
        project: &str,
        instance: &str,
        user: &User,
    ) -> Result<(), StewardError> {
        let url = self.sqladmin_url(&["projects", project, "instances", instance, "users"])?;
        let op: Operation = self.send_json(Method::POST, url, Some(user)).await?;
        self.wait_for_operation(project, op).await?;
        info!(user = %user.name, instance, "Created database user");
        Ok(())
    }

    async fn update_user(
        &self,
        project: &str,
        instance: &str,
        user: &User,
    ) -> Result<(), StewardError> {
        let mut url = self.sqladmin_url(&["projects", project, "instances", instance, "users"])?;
        url.query_pairs_mut().append_pair("name", &user.name);
        let op: Operation = self.send_json(Method::PUT, url, Some(user)).await?;
        self.wait_for_operation(project, op).await?;
        debug!(user = %user.name, instance, "Updated database user");
        Ok(())
    }

    async fn test_iam_permissions(
        &self,
        project: &str,
        permissions: &[String],
    ) -> Result<Vec<String>, StewardError> {
        let url = append_segments(
            &self.resource_manager,
            &["projects", &format!("{project}:testIamPermissions")],
        )?;
        let body = TestIamPermissionsRequest {
            permissions: permissions.to_vec(),
        };
        let resp: TestIamPermissionsResponse =
            self.send_json(Method::POST, url, Some(&body)).await?;
        Ok(resp.permissions)
    }
}

/// Appends percent-encoded path segments to a base URL ending in `/`.
pub(crate) fn append_segments(base: &Url, segments: &[&str]) -> Result<Url, StewardError> {
    let mut url = base.clone();
    url.path_segments_mut()
        .map_err(|_| StewardError::Config(format!("{base} cannot be used as an API base")))?
        .pop_if_empty()
        .extend(segments);
    Ok(url)
}

/// Appends a `/`-separated resource name such as `projects/p/locations/l/...`.
pub(crate) fn append_resource(base: &Url, resource: &str) -> Result<Url, StewardError> {
    let segments: Vec<&str> = resource.split('/').filter(|s| !s.is_empty()).collect();
    append_segments(base, &segments)
}
