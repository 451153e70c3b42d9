use reqwest::header::{ACCEPT, AUTHORIZATION};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::error::ApiError;

/// CloudAPI version the provider speaks
const ACCEPT_VERSION: &str = "~8";

/// Triton CloudAPI client
#[derive(Clone)]
pub struct Client {
    inner: Arc<ClientInner>,
}

struct ClientInner {
    http_client: reqwest::Client,
    base_url: String,
    account: String,
    auth_header: String,
    retry_config: RetryConfig,
}

#[derive(Clone)]
pub struct RetryConfig {
    pub max_retries: u32,
    pub initial_backoff_ms: u64,
    pub max_backoff_ms: u64,
    pub timeout_seconds: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_backoff_ms: 100,
            max_backoff_ms: 10000,
            timeout_seconds: 30,
        }
    }
}

/// Error body CloudAPI returns for non-2xx responses
#[derive(Debug, Deserialize)]
struct CloudApiErrorBody {
    #[serde(default)]
    code: String,
    #[serde(default)]
    message: String,
}

impl Client {
    /// Create a new API client with default configuration
    pub fn new(
        endpoint: &str,
        account: &str,
        key_id: &str,
        insecure: bool,
    ) -> Result<Self, ApiError> {
        Self::with_config(endpoint, account, key_id, insecure, RetryConfig::default())
    }

    /// Create a new API client with custom retry configuration
    pub fn with_config(
        endpoint: &str,
        account: &str,
        key_id: &str,
        insecure: bool,
        retry_config: RetryConfig,
    ) -> Result<Self, ApiError> {
        let key_path = format!("/{}/keys/{}", account, key_id);
        Self::build(endpoint, account, key_path, insecure, retry_config)
    }

    /// Create a client authenticating as an RBAC sub-user of the account.
    /// The key identity carries the sub-user login; request paths stay
    /// scoped under the owning account.
    pub fn with_subuser(
        endpoint: &str,
        account: &str,
        user: &str,
        key_id: &str,
        insecure: bool,
    ) -> Result<Self, ApiError> {
        let key_path = format!("/{}/users/{}/keys/{}", account, user, key_id);
        Self::build(endpoint, account, key_path, insecure, RetryConfig::default())
    }

    fn build(
        endpoint: &str,
        account: &str,
        key_path: String,
        insecure: bool,
        retry_config: RetryConfig,
    ) -> Result<Self, ApiError> {
        let http_client = reqwest::Client::builder()
            .use_rustls_tls()
            .danger_accept_invalid_certs(insecure)
            .timeout(std::time::Duration::from_secs(retry_config.timeout_seconds))
            .build()?;

        let base_url = endpoint.trim_end_matches('/').to_string();
        // Identity-bearing header in http-signature form; the transport
        // carries the key identity, it does not sign requests
        let auth_header = format!(
            "Signature keyId=\"{}\",algorithm=\"rsa-sha256\"",
            key_path
        );

        Ok(Self {
            inner: Arc::new(ClientInner {
                http_client,
                base_url,
                account: account.to_string(),
                auth_header,
                retry_config,
            }),
        })
    }

    /// The account login all request paths are scoped under
    pub fn account(&self) -> &str {
        &self.inner.account
    }

    /// The CloudAPI endpoint this client talks to
    pub fn endpoint(&self) -> &str {
        &self.inner.base_url
    }

    /// Execute a GET request with retry logic
    pub async fn get<T: for<'de> Deserialize<'de>>(&self, path: &str) -> Result<T, ApiError> {
        self.execute_with_retry(
            || async {
                let url = format!("{}{}", self.inner.base_url, path);

                tracing::debug!("GET request to: {}", url);

                self.inner
                    .http_client
                    .get(&url)
                    .header(AUTHORIZATION, &self.inner.auth_header)
                    .header(ACCEPT, "application/json")
                    .header("Accept-Version", ACCEPT_VERSION)
                    .send()
                    .await
            },
            path,
        )
        .await
    }

    /// Execute a GET request with query parameters
    pub async fn get_query<T: for<'de> Deserialize<'de>>(
        &self,
        path: &str,
        params: &[(&str, String)],
    ) -> Result<T, ApiError> {
        self.execute_with_retry(
            || async {
                let url = format!("{}{}", self.inner.base_url, path);

                tracing::debug!("GET request to: {} with {} params", url, params.len());

                self.inner
                    .http_client
                    .get(&url)
                    .query(params)
                    .header(AUTHORIZATION, &self.inner.auth_header)
                    .header(ACCEPT, "application/json")
                    .header("Accept-Version", ACCEPT_VERSION)
                    .send()
                    .await
            },
            path,
        )
        .await
    }

    /// Execute a POST request with retry logic
    pub async fn post<T: for<'de> Deserialize<'de>, B: Serialize>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, ApiError> {
        self.execute_with_retry(
            || async {
                let url = format!("{}{}", self.inner.base_url, path);

                tracing::debug!("POST request to: {}", url);

                self.inner
                    .http_client
                    .post(&url)
                    .header(AUTHORIZATION, &self.inner.auth_header)
                    .header(ACCEPT, "application/json")
                    .header("Accept-Version", ACCEPT_VERSION)
                    .json(body)
                    .send()
                    .await
            },
            path,
        )
        .await
    }

    /// Execute a bodyless POST; machine actions are query-string only and
    /// answer 202 with no content
    pub async fn post_action(&self, path: &str) -> Result<(), ApiError> {
        let _: serde_json::Value = self
            .execute_with_retry(
                || async {
                    let url = format!("{}{}", self.inner.base_url, path);

                    tracing::debug!("POST action to: {}", url);

                    self.inner
                        .http_client
                        .post(&url)
                        .header(AUTHORIZATION, &self.inner.auth_header)
                        .header(ACCEPT, "application/json")
                        .header("Accept-Version", ACCEPT_VERSION)
                        .send()
                        .await
                },
                path,
            )
            .await?;
        Ok(())
    }

    /// Execute a PUT request with retry logic
    pub async fn put<T: for<'de> Deserialize<'de>, B: Serialize>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, ApiError> {
        self.execute_with_retry(
            || async {
                let url = format!("{}{}", self.inner.base_url, path);

                tracing::debug!("PUT request to: {}", url);

                self.inner
                    .http_client
                    .put(&url)
                    .header(AUTHORIZATION, &self.inner.auth_header)
                    .header(ACCEPT, "application/json")
                    .header("Accept-Version", ACCEPT_VERSION)
                    .json(body)
                    .send()
                    .await
            },
            path,
        )
        .await
    }

    /// Execute a DELETE request with retry logic
    pub async fn delete(&self, path: &str) -> Result<(), ApiError> {
        let _: serde_json::Value = self
            .execute_with_retry(
                || async {
                    let url = format!("{}{}", self.inner.base_url, path);

                    tracing::debug!("DELETE request to: {}", url);

                    self.inner
                        .http_client
                        .delete(&url)
                        .header(AUTHORIZATION, &self.inner.auth_header)
                        .header(ACCEPT, "application/json")
                        .header("Accept-Version", ACCEPT_VERSION)
                        .send()
                        .await
                },
                path,
            )
            .await?;
        Ok(())
    }

    /// Account and key operations
    pub fn account_api(&self) -> crate::api::account::AccountApi<'_> {
        crate::api::account::AccountApi::new(self)
    }

    /// Instance, image, package and datacenter operations
    pub fn compute(&self) -> crate::api::compute::ComputeApi<'_> {
        crate::api::compute::ComputeApi::new(self)
    }

    /// Network, fabric and firewall operations
    pub fn network(&self) -> crate::api::network::NetworkApi<'_> {
        crate::api::network::NetworkApi::new(self)
    }

    /// Volume operations
    pub fn volumes(&self) -> crate::api::volumes::VolumesApi<'_> {
        crate::api::volumes::VolumesApi::new(self)
    }

    /// Service group and instance template operations
    pub fn services(&self) -> crate::api::services::ServicesApi<'_> {
        crate::api::services::ServicesApi::new(self)
    }

    /// Execute request with retry logic
    async fn execute_with_retry<F, Fut, T>(&self, request_fn: F, path: &str) -> Result<T, ApiError>
    where
        F: Fn() -> Fut,
        Fut: std::future::Future<Output = Result<reqwest::Response, reqwest::Error>>,
        T: for<'de> Deserialize<'de>,
    {
        let mut attempt = 0;
        let mut last_error = None;

        while attempt <= self.inner.retry_config.max_retries {
            if attempt > 0 {
                let backoff = std::cmp::min(
                    self.inner.retry_config.initial_backoff_ms * (2_u64.pow(attempt - 1)),
                    self.inner.retry_config.max_backoff_ms,
                );
                tracing::debug!(
                    "Retrying request to {} after {}ms (attempt {})",
                    path,
                    backoff,
                    attempt
                );
                tokio::time::sleep(tokio::time::Duration::from_millis(backoff)).await;
            }

            match request_fn().await {
                Ok(response) => {
                    let status = response.status();

                    if status.is_success() {
                        return self.parse_success_response(response).await;
                    }

                    if status == reqwest::StatusCode::UNAUTHORIZED {
                        return Err(ApiError::Auth);
                    }

                    if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
                        last_error = Some(ApiError::RateLimited);
                    } else if status.is_server_error() {
                        last_error = Some(ApiError::ServiceUnavailable);
                    } else {
                        return self.handle_error_response(response).await;
                    }
                }
                Err(e) => {
                    let err = if e.is_timeout() {
                        ApiError::Timeout(self.inner.retry_config.timeout_seconds)
                    } else {
                        ApiError::Request(e)
                    };
                    if !err.is_retryable() {
                        return Err(err);
                    }
                    last_error = Some(err);
                }
            }

            attempt += 1;
        }

        Err(last_error.unwrap_or(ApiError::ServiceUnavailable))
    }

    /// Parse successful response; DELETE and machine actions answer with
    /// an empty body
    async fn parse_success_response<T: for<'de> Deserialize<'de>>(
        &self,
        response: reqwest::Response,
    ) -> Result<T, ApiError> {
        let text = response.text().await?;
        tracing::debug!("API response body: {}", text);

        let effective = if text.trim().is_empty() { "null" } else { &text };
        match serde_json::from_str::<T>(effective) {
            Ok(data) => Ok(data),
            Err(e) => {
                tracing::error!("Failed to deserialize response: {}, body: {}", e, text);
                Err(ApiError::Parse(format!("Failed to parse response: {}", e)))
            }
        }
    }

    /// Handle error response
    async fn handle_error_response<T>(&self, response: reqwest::Response) -> Result<T, ApiError> {
        let status = response.status().as_u16();
        let text = response
            .text()
            .await
            .unwrap_or_else(|_| "Unknown error".to_string());

        let (code, message) = match serde_json::from_str::<CloudApiErrorBody>(&text) {
            Ok(body) => (body.code, body.message),
            Err(_) => (String::new(), text),
        };

        Err(ApiError::Api {
            status,
            code,
            message,
        })
    }
}
