//! Strongbox server API client
//!
//! Provides a typed HTTP client for the server's signed JSON endpoints.
//! Each call signs its request with the account key, throttles through an
//! optional [`ApiRateLimiter`], and retries transport failures with
//! exponential backoff.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use strongbox_api::ApiClient;
//! use strongbox_core::domain::{Account, Username};
//! use strongbox_core::ports::IServerApi;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let account = Account::generate(Username::new("alice")?, "http://localhost:8000");
//! let client = ApiClient::new(account.api_url());
//! let usage = client.get_usage(&account).await?;
//! println!("{} files, cap {}", usage.usages.len(), usage.cap);
//! # Ok(())
//! # }
//! ```

use std::{sync::Arc, time::Duration};

use reqwest::{Client, StatusCode};
use strongbox_core::config::{RateLimitingConfig, ServerConfig};
use strongbox_core::domain::{
    Account, Chunk, ChunkHash, DocumentHash, DocumentManifest, FileId, ServerMeta, SignedMeta,
    Username,
};
use strongbox_core::ports::{
    DocumentUpload, FileDiff, IServerApi, ServerError, ServerUsage, UpdatesResponse,
};
use strongbox_crypto::PublicKeys;
use tracing::{debug, info, warn};

use crate::rate_limit::{parse_retry_after, ApiRateLimiter};
use crate::request::*;
use crate::ApiError;

/// Per-request timeout when none is configured
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Wait after a 429 that carries no Retry-After header
const DEFAULT_RETRY_AFTER: Duration = Duration::from_secs(5);

/// How many 429 responses a single call tolerates
const MAX_THROTTLE_RETRIES: u32 = 3;

// ============================================================================
// RetryPolicy
// ============================================================================

/// Backoff applied when the server cannot be reached
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first attempt
    pub max_retries: u32,
    /// Delay before the first retry; doubles each time
    pub base_delay: Duration,
}

impl RetryPolicy {
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            base_delay: Duration::ZERO,
        }
    }

    pub fn from_config(config: &ServerConfig) -> Self {
        Self {
            max_retries: config.max_retries,
            base_delay: Duration::from_millis(config.retry_base_delay_ms),
        }
    }

    /// Delay before retry number `attempt` (zero based)
    pub fn delay_for(&self, attempt: u32) -> Duration {
        self.base_delay
            .saturating_mul(2u32.saturating_pow(attempt.min(16)))
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&ServerConfig::default())
    }
}

// ============================================================================
// ApiClient
// ============================================================================

/// HTTP client for the Strongbox server
#[derive(Debug, Clone)]
pub struct ApiClient {
    client: Client,
    base_url: String,
    client_version: String,
    rate_limiter: Option<Arc<ApiRateLimiter>>,
    retry: RetryPolicy,
}

impl ApiClient {
    /// Creates a client for `api_url` with default timeout and retry policy
    pub fn new(api_url: impl Into<String>) -> Self {
        Self::build(api_url.into(), DEFAULT_TIMEOUT, RetryPolicy::default())
    }

    /// Creates a client from the server and rate limiting config sections
    pub fn from_config(server: &ServerConfig, rate_limiting: &RateLimitingConfig) -> Self {
        Self::build(
            server.api_url.clone(),
            Duration::from_secs(server.request_timeout_secs),
            RetryPolicy::from_config(server),
        )
        .with_rate_limiter(Arc::new(ApiRateLimiter::from_config(rate_limiting)))
    }

    fn build(api_url: String, timeout: Duration, retry: RetryPolicy) -> Self {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_else(|e| {
                warn!(error = %e, "Falling back to default HTTP client");
                Client::new()
            });

        Self {
            client,
            base_url: api_url.trim_end_matches('/').to_string(),
            client_version: CLIENT_VERSION.to_string(),
            rate_limiter: None,
            retry,
        }
    }

    pub fn with_rate_limiter(mut self, limiter: Arc<ApiRateLimiter>) -> Self {
        self.rate_limiter = Some(limiter);
        self
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Overrides the version reported to the server
    pub fn with_client_version(mut self, version: impl Into<String>) -> Self {
        self.client_version = version.into();
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn rate_limiter(&self) -> Option<&Arc<ApiRateLimiter>> {
        self.rate_limiter.as_ref()
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        self.retry
    }

    /// Sends one signed request, without transport retries
    ///
    /// A 429 response is retried after the server's `Retry-After` delay, up
    /// to a small fixed number of times.
    pub async fn send<T: Request>(&self, account: &Account, request: &T) -> Result<T::Response, ApiError> {
        let url = format!("{}{}", self.base_url, T::ROUTE);

        for attempt in 0..=MAX_THROTTLE_RETRIES {
            if let Some(ref limiter) = self.rate_limiter {
                limiter.acquire().await;
            }

            let wrapper = RequestWrapper {
                signed_request: SignedRequest::sign(account, request)
                    .map_err(|e| ApiError::InvalidResponse(e.to_string()))?,
                client_version: self.client_version.clone(),
            };

            let response = self
                .client
                .post(&url)
                .json(&wrapper)
                .send()
                .await
                .map_err(ApiError::Network)?;
            let status = response.status();

            if status == StatusCode::TOO_MANY_REQUESTS && attempt < MAX_THROTTLE_RETRIES {
                let retry_after = response
                    .headers()
                    .get(reqwest::header::RETRY_AFTER)
                    .and_then(|v| v.to_str().ok())
                    .map(|v| parse_retry_after(v, DEFAULT_RETRY_AFTER))
                    .unwrap_or(DEFAULT_RETRY_AFTER);
                info!(
                    route = T::ROUTE,
                    attempt,
                    retry_after_ms = retry_after.as_millis() as u64,
                    "Received 429, backing off"
                );
                tokio::time::sleep(retry_after).await;
                continue;
            }

            let body = response.bytes().await.map_err(ApiError::Network)?;

            if status.is_success() {
                let body: &[u8] = if body.is_empty() { b"null" } else { &body };
                return serde_json::from_slice(body)
                    .map_err(|e| ApiError::InvalidResponse(format!("{}: {}", T::ROUTE, e)));
            }

            return Err(match serde_json::from_slice::<ErrorWrapper>(&body) {
                Ok(error) => ApiError::Rejected { status, error },
                Err(_) => ApiError::UnexpectedStatus {
                    status,
                    body: String::from_utf8_lossy(&body).into_owned(),
                },
            });
        }

        Err(ApiError::UnexpectedStatus {
            status: StatusCode::TOO_MANY_REQUESTS,
            body: format!("throttled {} times", MAX_THROTTLE_RETRIES + 1),
        })
    }

    /// Sends a request, retrying while the server is unreachable
    pub async fn request<T: Request>(
        &self,
        account: &Account,
        request: T,
    ) -> Result<T::Response, ServerError> {
        let mut attempt = 0;
        loop {
            match self.send(account, &request).await {
                Ok(response) => {
                    if attempt > 0 {
                        info!(route = T::ROUTE, attempt, "Request succeeded after retry");
                    }
                    return Ok(response);
                }
                Err(err) => {
                    let err = ServerError::from(err);
                    if !err.is_unreachable() || attempt >= self.retry.max_retries {
                        debug!(route = T::ROUTE, error = %err, "Request failed");
                        return Err(err);
                    }
                    let delay = self.retry.delay_for(attempt);
                    warn!(
                        route = T::ROUTE,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        "Server unreachable, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }
}

// ============================================================================
// IServerApi implementation
// ============================================================================

#[async_trait::async_trait]
impl IServerApi for ApiClient {
    async fn new_account(
        &self,
        account: &Account,
        root: SignedMeta,
    ) -> Result<ServerMeta, ServerError> {
        let request = NewAccountRequest {
            username: account.username().clone(),
            public_key: account.public_keys(),
            root_folder: root,
        };
        Ok(self.request(account, request).await?.root)
    }

    async fn get_public_key(
        &self,
        account: &Account,
        username: &Username,
    ) -> Result<PublicKeys, ServerError> {
        let request = GetPublicKeyRequest {
            username: username.clone(),
        };
        Ok(self.request(account, request).await?.key)
    }

    async fn get_updates(
        &self,
        account: &Account,
        since: u64,
    ) -> Result<UpdatesResponse, ServerError> {
        let request = GetUpdatesRequest {
            since_metadata_version: since,
        };
        self.request(account, request).await
    }

    async fn get_file_ids(&self, account: &Account) -> Result<Vec<FileId>, ServerError> {
        Ok(self.request(account, GetFileIdsRequest {}).await?.ids)
    }

    async fn get_document(
        &self,
        account: &Account,
        id: FileId,
        hash: &DocumentHash,
    ) -> Result<DocumentManifest, ServerError> {
        let request = GetDocumentRequest {
            id,
            hash: hash.clone(),
        };
        Ok(self.request(account, request).await?.manifest)
    }

    async fn missing_chunks(
        &self,
        account: &Account,
        hashes: Vec<ChunkHash>,
    ) -> Result<Vec<ChunkHash>, ServerError> {
        if hashes.is_empty() {
            return Ok(Vec::new());
        }
        Ok(self
            .request(account, MissingChunksRequest { hashes })
            .await?
            .missing)
    }

    async fn put_chunks(&self, account: &Account, chunks: Vec<Chunk>) -> Result<(), ServerError> {
        if chunks.is_empty() {
            return Ok(());
        }
        self.request(account, PutChunksRequest { chunks }).await
    }

    async fn get_chunks(
        &self,
        account: &Account,
        hashes: Vec<ChunkHash>,
    ) -> Result<Vec<Chunk>, ServerError> {
        if hashes.is_empty() {
            return Ok(Vec::new());
        }
        Ok(self
            .request(account, GetChunksRequest { hashes })
            .await?
            .chunks)
    }

    async fn upsert(
        &self,
        account: &Account,
        updates: Vec<FileDiff>,
        documents: Vec<DocumentUpload>,
    ) -> Result<Vec<ServerMeta>, ServerError> {
        let request = UpsertRequest { updates, documents };
        Ok(self.request(account, request).await?.files)
    }

    async fn get_usage(&self, account: &Account) -> Result<ServerUsage, ServerError> {
        self.request(account, GetUsageRequest {}).await
    }

    async fn delete_account(&self, account: &Account) -> Result<(), ServerError> {
        self.request(account, DeleteAccountRequest {}).await
    }
}
