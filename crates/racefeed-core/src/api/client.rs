//! HTTP implementation of the `Fetcher` trait.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use tracing::{debug, warn};

use super::error::AttemptFailure;
use super::{FetchError, Fetcher};
use crate::config::{
    FeedConfig, DEFAULT_MAX_ATTEMPTS, DEFAULT_REQUEST_TIMEOUT_SECS, DEFAULT_RETRY_DELAY_MS,
};
use crate::utils::redact_credential;

/// Body the provider sends instead of data when the licence does not cover a feed.
pub const PERMISSION_DENIED_BODY: &str = "Permission Denied";

/// GET client with a fixed retry budget.
/// Clone is cheap - reqwest::Client uses Arc internally for connection pooling.
#[derive(Clone, Debug)]
pub struct HttpFetcher {
    client: Client,
    max_attempts: u32,
    retry_delay: Duration,
}

impl HttpFetcher {
    /// Create a fetcher with the default timeout and retry budget.
    pub fn new() -> Result<Self, FetchError> {
        Self::with_settings(
            Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
            DEFAULT_MAX_ATTEMPTS,
            Duration::from_millis(DEFAULT_RETRY_DELAY_MS),
        )
    }

    pub fn from_config(config: &FeedConfig) -> Result<Self, FetchError> {
        Self::with_settings(config.request_timeout, config.max_attempts, config.retry_delay)
    }

    pub fn with_settings(
        timeout: Duration,
        max_attempts: u32,
        retry_delay: Duration,
    ) -> Result<Self, FetchError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            max_attempts: max_attempts.max(1),
            retry_delay,
        })
    }

    async fn attempt(&self, url: &str) -> Result<String, AttemptFailure> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| AttemptFailure::Retryable(e.without_url().to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| AttemptFailure::Retryable(e.without_url().to_string()))?;

        if body == PERMISSION_DENIED_BODY {
            return Err(AttemptFailure::Denied);
        }
        if !status.is_success() {
            return Err(AttemptFailure::from_status(status, &body));
        }
        Ok(body)
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn get_text(&self, url: &str) -> Result<String, FetchError> {
        let redacted = redact_credential(url);
        let mut attempt = 0;

        loop {
            attempt += 1;
            match self.attempt(url).await {
                Ok(body) => {
                    debug!(url = %redacted, bytes = body.len(), "Fetched");
                    return Ok(body);
                }
                Err(AttemptFailure::Denied) => return Err(FetchError::PermissionDenied),
                Err(AttemptFailure::Retryable(reason)) => {
                    if attempt >= self.max_attempts {
                        return Err(FetchError::Exhausted {
                            attempts: attempt,
                            reason,
                        });
                    }
                    warn!(url = %redacted, attempt, error = %reason, "Request failed, retrying");
                    tokio::time::sleep(self.retry_delay).await;
                }
            }
        }
    }
}
