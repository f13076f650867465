//! Compute Engine implementation of the compute API over REST.

mod auth;
mod error;
mod types;

use std::sync::Arc;
use std::time::Duration;

use reqwest::{RequestBuilder, StatusCode, Url};
use serde::de::DeserializeOwned;
use tracing::debug;
use uuid::Uuid;

use crate::compute::{
    ComputeApi, ComputeFuture, Instance, InstanceRef, LifecycleAction, Operation, OperationRef,
    ZoneScope,
};
use crate::credentials::Credentials;
use types::{ErrorEnvelope, InstanceList, InstanceResource, OperationResource};

pub use auth::{COMPUTE_SCOPE, TokenSource};
pub use error::GceError;

/// Public Compute Engine v1 endpoint.
pub const DEFAULT_API_BASE: &str = "https://compute.googleapis.com/compute/v1";
/// Default per-request timeout.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

const LIST_PAGE_SIZE: &str = "500";

/// Client that talks to the Compute Engine REST API.
#[derive(Clone, Debug)]
pub struct GceClient {
    http: reqwest::Client,
    api_base: Url,
    tokens: Arc<TokenSource>,
}

impl GceClient {
    /// Builds a client for `credentials` against `api_base`.
    ///
    /// # Errors
    ///
    /// Returns [`GceError::Endpoint`] when `api_base` is not a valid base URL
    /// and [`GceError::Transport`] when the HTTP client cannot be built.
    pub fn new(
        credentials: Credentials,
        api_base: &str,
        request_timeout: Duration,
    ) -> Result<Self, GceError> {
        let http = reqwest::Client::builder().timeout(request_timeout).build()?;
        let tokens = TokenSource::new(credentials, http.clone());
        Self::with_token_source(http, api_base, tokens)
    }

    /// Builds a client with an explicit HTTP client and token source.
    ///
    /// # Errors
    ///
    /// Returns [`GceError::Endpoint`] when `api_base` is not a valid base URL.
    pub fn with_token_source(
        http: reqwest::Client,
        api_base: &str,
        tokens: TokenSource,
    ) -> Result<Self, GceError> {
        let api_base = Url::parse(api_base).map_err(|err| GceError::Endpoint {
            message: format!("{api_base}: {err}"),
        })?;
        if api_base.cannot_be_a_base() {
            return Err(GceError::Endpoint {
                message: format!("{api_base} cannot be used as a base URL"),
            });
        }
        Ok(Self {
            http,
            api_base,
            tokens: Arc::new(tokens),
        })
    }

    fn endpoint(&self, scope: &ZoneScope, tail: &[&str]) -> Result<Url, GceError> {
        let mut url = self.api_base.clone();
        url.path_segments_mut()
            .map_err(|()| GceError::Endpoint {
                message: format!("{} cannot be used as a base URL", self.api_base),
            })?
            .pop_if_empty()
            .extend(["projects", scope.project_id.as_str(), "zones", scope.zone.as_str()])
            .extend(tail);
        Ok(url)
    }

    fn instances_url(&self, scope: &ZoneScope) -> Result<Url, GceError> {
        self.endpoint(scope, &["instances"])
    }

    fn instance_url(&self, target: &InstanceRef) -> Result<Url, GceError> {
        self.endpoint(&target.scope, &["instances", target.instance.as_str()])
    }

    fn action_url(&self, target: &InstanceRef, action: LifecycleAction) -> Result<Url, GceError> {
        self.endpoint(
            &target.scope,
            &["instances", target.instance.as_str(), action.as_str()],
        )
    }

    fn operation_url(&self, operation: &OperationRef) -> Result<Url, GceError> {
        self.endpoint(&operation.scope, &["operations", operation.name.as_str()])
    }

    async fn send_json<T>(&self, request: RequestBuilder, resource: &str) -> Result<T, GceError>
    where
        T: DeserializeOwned,
    {
        let token = self.tokens.access_token().await?;
        let response = request.bearer_auth(token).send().await?;
        let status = response.status();
        let body = response.bytes().await?;
        debug!(%status, resource, "compute API response");

        if status.is_success() {
            return serde_json::from_slice(&body).map_err(|err| GceError::Decode {
                message: err.to_string(),
            });
        }
        Err(api_error(status, &body, resource))
    }

    async fn list_all(&self, scope: &ZoneScope) -> Result<Vec<Instance>, GceError> {
        let url = self.instances_url(scope)?;
        let mut instances = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let mut request = self
                .http
                .get(url.clone())
                .query(&[("maxResults", LIST_PAGE_SIZE)]);
            if let Some(token) = page_token.as_deref() {
                request = request.query(&[("pageToken", token)]);
            }

            let page: InstanceList = self.send_json(request, url.path()).await?;
            instances.extend(page.items.into_iter().map(Instance::from));

            match page.next_page_token.filter(|token| !token.is_empty()) {
                Some(next) if page_token.as_deref() == Some(next.as_str()) => {
                    return Err(GceError::Decode {
                        message: format!("instance list repeated page token {next}"),
                    });
                }
                Some(next) => page_token = Some(next),
                None => return Ok(instances),
            }
        }
    }
}

/// Maps an error response onto [`GceError`], decoding Google's error
/// envelope when present.
fn api_error(status: StatusCode, body: &[u8], resource: &str) -> GceError {
    if status == StatusCode::NOT_FOUND {
        return GceError::NotFound {
            resource: resource.to_owned(),
        };
    }

    match serde_json::from_slice::<ErrorEnvelope>(body) {
        Ok(envelope) => GceError::Api {
            status: status.as_u16(),
            reason: envelope
                .error
                .errors
                .into_iter()
                .find_map(|detail| detail.reason),
            message: envelope.error.message,
        },
        Err(_) => GceError::Api {
            status: status.as_u16(),
            reason: None,
            message: String::from_utf8_lossy(body).into_owned(),
        },
    }
}

impl ComputeApi for GceClient {
    type Error = GceError;

    fn list_instances<'a>(
        &'a self,
        scope: &'a ZoneScope,
    ) -> ComputeFuture<'a, Vec<Instance>, Self::Error> {
        Box::pin(async move { self.list_all(scope).await })
    }

    fn get_instance<'a>(
        &'a self,
        target: &'a InstanceRef,
    ) -> ComputeFuture<'a, Instance, Self::Error> {
        Box::pin(async move {
            let url = self.instance_url(target)?;
            let resource = url.path().to_owned();
            let instance: InstanceResource =
                self.send_json(self.http.get(url), &resource).await?;
            Ok(instance.into())
        })
    }

    fn request_transition<'a>(
        &'a self,
        target: &'a InstanceRef,
        action: LifecycleAction,
    ) -> ComputeFuture<'a, Operation, Self::Error> {
        Box::pin(async move {
            let url = self.action_url(target, action)?;
            let resource = url.path().to_owned();
            let request_id = Uuid::new_v4().to_string();
            debug!(instance = %target, %action, %request_id, "requesting transition");
            let request = self
                .http
                .post(url)
                .query(&[("requestId", request_id.as_str())])
                .header(reqwest::header::CONTENT_LENGTH, "0");
            let operation: OperationResource = self.send_json(request, &resource).await?;
            Ok(operation.into())
        })
    }

    fn get_zone_operation<'a>(
        &'a self,
        operation: &'a OperationRef,
    ) -> ComputeFuture<'a, Operation, Self::Error> {
        Box::pin(async move {
            let url = self.operation_url(operation)?;
            let resource = url.path().to_owned();
            let snapshot: OperationResource =
                self.send_json(self.http.get(url), &resource).await?;
            Ok(snapshot.into())
        })
    }
}

#[cfg(test)]
mod tests;
