use super::rejection::{SchemaRejection, graphql_errors};
use crate::admin::client::append_resource;
use crate::auth::AccessTokenSource;
use crate::config::{EndpointsConfig, RetryConfig};
use crate::error::{StewardError, upstream_error};
use crate::retry::operation_poll;
use crate::utils::logging::debug_json;
use async_trait::async_trait;
use backon::{ConstantBuilder, Retryable};
use pgsteward_schema::{LongRunningOperation, RpcErrorBody, Schema};
use reqwest::{Method, StatusCode};
use std::sync::Arc;
use tracing::{debug, info};
use url::Url;

#[derive(Debug)]
pub enum UpsertOutcome {
    Accepted,
    Rejected(SchemaRejection),
}

/// The external schema validation service.
#[async_trait]
pub trait SchemaService: Send + Sync {
    /// Writes (or with `validate_only`, only validates) a schema document.
    /// Incompatibilities come back as [`UpsertOutcome::Rejected`], not as errors.
    async fn upsert_schema(
        &self,
        schema: &Schema,
        validate_only: bool,
    ) -> Result<UpsertOutcome, StewardError>;

    /// Like [`SchemaService::upsert_schema`], but returns as soon as the
    /// service accepts the write instead of waiting for its operation.
    async fn start_schema_upsert(
        &self,
        schema: &Schema,
        validate_only: bool,
    ) -> Result<UpsertOutcome, StewardError>;

    /// Deletes a connector by full resource name, even if it has dependants.
    async fn delete_connector(&self, name: &str) -> Result<(), StewardError>;
}

/// REST client for the data service API.
pub struct DataConnectClient {
    http: reqwest::Client,
    tokens: Arc<dyn AccessTokenSource>,
    base: Url,
    poll_policy: ConstantBuilder,
}

impl DataConnectClient {
    pub fn new(
        http: reqwest::Client,
        tokens: Arc<dyn AccessTokenSource>,
        endpoints: &EndpointsConfig,
        retry: &RetryConfig,
    ) -> Self {
        Self {
            http,
            tokens,
            base: endpoints.dataconnect.clone(),
            poll_policy: operation_poll(retry),
        }
    }

    async fn request(&self, method: Method, url: Url) -> Result<reqwest::RequestBuilder, StewardError> {
        let token = self.tokens.access_token().await?;
        Ok(self.http.request(method, url).bearer_auth(token))
    }

    /// Sends the schema PATCH. `Ok(Err(_))` is a rejection the caller can act on.
    async fn patch_schema(
        &self,
        schema: &Schema,
        validate_only: bool,
    ) -> Result<Result<reqwest::Response, SchemaRejection>, StewardError> {
        let mut url = append_resource(&self.base, &schema.name)?;
        url.query_pairs_mut()
            .append_pair("allow_missing", "true")
            .append_pair("validate_only", if validate_only { "true" } else { "false" });
        debug_json("Schema upsert request", schema);

        let resp = self
            .request(Method::PATCH, url)
            .await?
            .json(schema)
            .send()
            .await?;
        let status = resp.status();
        if status == StatusCode::BAD_REQUEST {
            let body: RpcErrorBody = resp.json().await?;
            debug_json("Schema upsert rejection", &body);
            if let Some(rejection) = SchemaRejection::from_status(&body.error) {
                return Ok(Err(rejection));
            }
            return Err(match graphql_errors(&body.error) {
                Some(errors) => {
                    StewardError::InvalidSchema(format!("errors in schema sources:\n{errors}"))
                }
                None => StewardError::Upstream {
                    status,
                    message: body.error.message,
                },
            });
        }
        if !status.is_success() {
            return Err(upstream_error(resp).await);
        }
        Ok(Ok(resp))
    }

    async fn wait_for_operation(&self, op: LongRunningOperation) -> Result<(), StewardError> {
        let name = op.name.clone();
        let finished = if op.done {
            op
        } else {
            let url = append_resource(&self.base, &name)?;
            let poll = || async {
                let resp = self.request(Method::GET, url.clone()).await?.send().await?;
                if !resp.status().is_success() {
                    return Err(upstream_error(resp).await);
                }
                let op: LongRunningOperation = resp.json().await?;
                if op.done {
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
            Some(status) => Err(StewardError::OperationFailed {
                name,
                message: status.message,
            }),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl SchemaService for DataConnectClient {
    async fn upsert_schema(
        &self,
        schema: &Schema,
        validate_only: bool,
    ) -> Result<UpsertOutcome, StewardError> {
        let resp = match self.patch_schema(schema, validate_only).await? {
            Ok(resp) => resp,
            Err(rejection) => return Ok(UpsertOutcome::Rejected(rejection)),
        };
        if validate_only {
            debug!(schema = %schema.name, "Schema validated");
            return Ok(UpsertOutcome::Accepted);
        }
        let op: LongRunningOperation = resp.json().await?;
        self.wait_for_operation(op).await?;
        info!(schema = %schema.name, "Schema updated");
        Ok(UpsertOutcome::Accepted)
    }

    async fn start_schema_upsert(
        &self,
        schema: &Schema,
        validate_only: bool,
    ) -> Result<UpsertOutcome, StewardError> {
        match self.patch_schema(schema, validate_only).await? {
            Ok(resp) => {
                if !validate_only {
                    let op: LongRunningOperation = resp.json().await?;
                    info!(schema = %schema.name, operation = %op.name, "Schema update started");
                }
                Ok(UpsertOutcome::Accepted)
            }
            Err(rejection) => Ok(UpsertOutcome::Rejected(rejection)),
        }
    }

    async fn delete_connector(&self, name: &str) -> Result<(), StewardError> {
        let mut url = append_resource(&self.base, name)?;
        url.query_pairs_mut().append_pair("force", "true");
        let resp = self.request(Method::DELETE, url).await?.send().await?;
        if !resp.status().is_success() {
            return Err(upstream_error(resp).await);
        }
        let op: LongRunningOperation = resp.json().await?;
        self.wait_for_operation(op).await?;
        info!(connector = %name, "Deleted connector");
        Ok(())
    }
}
