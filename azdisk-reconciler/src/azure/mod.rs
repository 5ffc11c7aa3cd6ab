//! Azure Resource Manager REST provider.
//!
//! Talks to the management endpoint with a caller-supplied bearer token.
//! Long-running operations are followed through the `Azure-AsyncOperation`
//! or `Location` header until they reach `Succeeded`, `Failed` or
//! `Canceled`; the final resource is then fetched again.

pub mod wire;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, RETRY_AFTER};
use reqwest::{Method, Response, StatusCode};
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, info, instrument};

use crate::error::{ProviderError, ProviderResult};
use crate::traits::ComputeProvider;
use crate::types::*;

/// Default management endpoint.
pub const DEFAULT_ENDPOINT: &str = "https://management.azure.com";
/// Compute API version (disks and virtual machines).
pub const DEFAULT_COMPUTE_API_VERSION: &str = "2019-07-01";
/// Resources API version (resource groups).
pub const DEFAULT_RESOURCES_API_VERSION: &str = "2019-10-01";

/// Connection settings for [`AzureProvider`].
#[derive(Debug, Clone)]
pub struct AzureConfig {
    pub subscription_id: String,
    /// Bearer token for the management endpoint
    pub access_token: String,
    pub endpoint: String,
    pub compute_api_version: String,
    pub resources_api_version: String,
    /// Delay between polls when the provider sends no `Retry-After`
    pub poll_interval: Duration,
}

impl AzureConfig {
    /// Settings with default endpoint, API versions and poll interval.
    pub fn new(subscription_id: impl Into<String>, access_token: impl Into<String>) -> Self {
        Self {
            subscription_id: subscription_id.into(),
            access_token: access_token.into(),
            endpoint: DEFAULT_ENDPOINT.to_string(),
            compute_api_version: DEFAULT_COMPUTE_API_VERSION.to_string(),
            resources_api_version: DEFAULT_RESOURCES_API_VERSION.to_string(),
            poll_interval: Duration::from_secs(5),
        }
    }
}

/// Azure Resource Manager provider.
pub struct AzureProvider {
    config: AzureConfig,
    http: reqwest::Client,
}

impl AzureProvider {
    /// Create a provider for the configured subscription.
    pub fn new(config: AzureConfig) -> Self {
        info!(
            endpoint = %config.endpoint,
            subscription_id = %config.subscription_id,
            "Creating Azure compute provider"
        );
        Self {
            config,
            http: reqwest::Client::new(),
        }
    }

    fn group_url(&self, resource_group: &str) -> String {
        format!(
            "{}/subscriptions/{}/resourcegroups/{}?api-version={}",
            self.config.endpoint.trim_end_matches('/'),
            self.config.subscription_id,
            resource_group,
            self.config.resources_api_version
        )
    }

    fn compute_url(&self, resource_group: &str, resource_type: &str, name: &str) -> String {
        format!(
            "{}/subscriptions/{}/resourceGroups/{}/providers/Microsoft.Compute/{}/{}?api-version={}",
            self.config.endpoint.trim_end_matches('/'),
            self.config.subscription_id,
            resource_group,
            resource_type,
            name,
            self.config.compute_api_version
        )
    }

    /// Send a request and turn non-success statuses into errors.
    async fn send(&self, method: Method, url: &str, body: Option<&Value>) -> ProviderResult<Response> {
        debug!(method = %method, url = %url, "Sending ARM request");

        let mut request = self
            .http
            .request(method, url)
            .bearer_auth(&self.config.access_token);
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request.send().await.map_err(|e| ProviderError::Request {
            status: 0,
            message: e.to_string(),
        })?;

        if response.status().is_success() {
            Ok(response)
        } else {
            Err(error_from_response(url, response).await)
        }
    }

    async fn get_json(&self, url: &str) -> ProviderResult<Value> {
        let response = self.send(Method::GET, url, None).await?;
        read_body(response).await
    }

    /// Issue a mutating request and describe the resulting operation.
    async fn begin(
        &self,
        method: Method,
        url: &str,
        body: Option<&Value>,
        target: OperationTarget,
    ) -> ProviderResult<OperationHandle> {
        let response = self.send(method, url, body).await?;
        let headers = response.headers();

        let status_url = if response.status() == StatusCode::NO_CONTENT {
            None
        } else {
            header(headers, "azure-asyncoperation").or_else(|| header(headers, "location"))
        };
        let id = header(headers, "x-ms-request-id")
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

        debug!(operation_id = %id, status_url = ?status_url, "Operation started");
        Ok(OperationHandle {
            id,
            target,
            status_url,
        })
    }

    /// Poll `url` until the operation is terminal.
    async fn poll(&self, url: &str) -> ProviderResult<()> {
        loop {
            let response = self.send(Method::GET, url, None).await?;
            let delay = retry_after(response.headers()).unwrap_or(self.config.poll_interval);

            if response.status() == StatusCode::ACCEPTED {
                debug!(delay_secs = delay.as_secs(), "Operation still running");
                tokio::time::sleep(delay).await;
                continue;
            }

            let body = read_body(response).await?;
            match body.get("status").and_then(Value::as_str) {
                None => return Ok(()),
                Some(status) if status.eq_ignore_ascii_case("Succeeded") => return Ok(()),
                Some(status)
                    if status.eq_ignore_ascii_case("Failed")
                        || status.eq_ignore_ascii_case("Canceled") =>
                {
                    let message = body
                        .pointer("/error/message")
                        .and_then(Value::as_str)
                        .unwrap_or("no error details");
                    return Err(ProviderError::OperationFailed(format!("{}: {}", status, message)));
                }
                Some(status) => {
                    debug!(status = %status, delay_secs = delay.as_secs(), "Operation still running");
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }
}

fn header(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .map(str::to_string)
}

fn retry_after(headers: &HeaderMap) -> Option<Duration> {
    headers
        .get(RETRY_AFTER)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.trim().parse::<u64>().ok())
        .map(Duration::from_secs)
}

async fn read_body(response: Response) -> ProviderResult<Value> {
    let text = response
        .text()
        .await
        .map_err(|e| ProviderError::InvalidResponse(e.to_string()))?;
    if text.trim().is_empty() {
        return Ok(Value::Null);
    }
    serde_json::from_str(&text).map_err(|e| ProviderError::InvalidResponse(e.to_string()))
}

async fn error_from_response(url: &str, response: Response) -> ProviderError {
    let status = response.status();
    if status == StatusCode::NOT_FOUND {
        return ProviderError::NotFound(url.split('?').next().unwrap_or(url).to_string());
    }

    let body = read_body(response).await.unwrap_or(Value::Null);
    let code = body.pointer("/error/code").and_then(Value::as_str);
    let message = body
        .pointer("/error/message")
        .and_then(Value::as_str)
        .unwrap_or_else(|| status.canonical_reason().unwrap_or("unknown error"));

    ProviderError::Request {
        status: status.as_u16(),
        message: match code {
            Some(code) => format!("{}: {}", code, message),
            None => message.to_string(),
        },
    }
}

#[async_trait]
impl ComputeProvider for AzureProvider {
    #[instrument(skip(self), fields(resource_group = %resource_group))]
    async fn get_resource_group(&self, resource_group: &str) -> ProviderResult<ResourceGroup> {
        let document = self.get_json(&self.group_url(resource_group)).await?;
        wire::resource_group_from_document(document)
    }

    #[instrument(skip(self), fields(resource_group = %resource_group, disk = %name))]
    async fn get_disk(&self, resource_group: &str, name: &str) -> ProviderResult<Disk> {
        let document = self
            .get_json(&self.compute_url(resource_group, "disks", name))
            .await?;
        wire::disk_from_document(document)
    }

    #[instrument(skip(self, parameters), fields(resource_group = %resource_group, disk = %name))]
    async fn begin_create_or_update_disk(
        &self,
        resource_group: &str,
        name: &str,
        parameters: &DiskParameters,
    ) -> ProviderResult<OperationHandle> {
        let body = wire::disk_document(parameters)?;
        self.begin(
            Method::PUT,
            &self.compute_url(resource_group, "disks", name),
            Some(&body),
            OperationTarget::Disk {
                resource_group: resource_group.to_string(),
                name: name.to_string(),
            },
        )
        .await
    }

    #[instrument(skip(self), fields(resource_group = %resource_group, disk = %name))]
    async fn begin_delete_disk(
        &self,
        resource_group: &str,
        name: &str,
    ) -> ProviderResult<OperationHandle> {
        self.begin(
            Method::DELETE,
            &self.compute_url(resource_group, "disks", name),
            None,
            OperationTarget::DiskDeletion {
                resource_group: resource_group.to_string(),
                name: name.to_string(),
            },
        )
        .await
    }

    #[instrument(skip(self), fields(resource_group = %resource_group, vm = %name))]
    async fn get_virtual_machine(
        &self,
        resource_group: &str,
        name: &str,
    ) -> ProviderResult<VirtualMachine> {
        let url = format!(
            "{}&$expand=instanceView",
            self.compute_url(resource_group, "virtualMachines", name)
        );
        let document = self.get_json(&url).await?;
        wire::vm_from_document(document)
    }

    #[instrument(skip(self, vm), fields(resource_group = %resource_group, vm = %name))]
    async fn begin_create_or_update_virtual_machine(
        &self,
        resource_group: &str,
        name: &str,
        vm: &VirtualMachine,
    ) -> ProviderResult<OperationHandle> {
        let body = wire::vm_document(vm);
        self.begin(
            Method::PUT,
            &self.compute_url(resource_group, "virtualMachines", name),
            Some(&body),
            OperationTarget::VirtualMachine {
                resource_group: resource_group.to_string(),
                name: name.to_string(),
            },
        )
        .await
    }

    #[instrument(skip(self, operation), fields(operation_id = %operation.id))]
    async fn wait_for_completion(&self, operation: OperationHandle) -> ProviderResult<OperationOutput> {
        if let Some(url) = &operation.status_url {
            self.poll(url).await?;
        }

        match operation.target {
            OperationTarget::Disk { resource_group, name } => {
                self.get_disk(&resource_group, &name).await.map(OperationOutput::Disk)
            }
            OperationTarget::VirtualMachine { resource_group, name } => self
                .get_virtual_machine(&resource_group, &name)
                .await
                .map(OperationOutput::VirtualMachine),
            OperationTarget::DiskDeletion { .. } => Ok(OperationOutput::Deleted),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::HeaderValue;

    #[test]
    fn test_urls() {
        let provider = AzureProvider::new(AzureConfig::new("sub-1", "token"));

        assert_eq!(
            provider.compute_url("rg1", "disks", "d1"),
            "https://management.azure.com/subscriptions/sub-1/resourceGroups/rg1/providers/Microsoft.Compute/disks/d1?api-version=2019-07-01"
        );
        assert_eq!(
            provider.group_url("rg1"),
            "https://management.azure.com/subscriptions/sub-1/resourcegroups/rg1?api-version=2019-10-01"
        );
    }

    #[test]
    fn test_retry_after() {
        let mut headers = HeaderMap::new();
        assert_eq!(retry_after(&headers), None);

        headers.insert(RETRY_AFTER, HeaderValue::from_static("17"));
        assert_eq!(retry_after(&headers), Some(Duration::from_secs(17)));
    }
}
