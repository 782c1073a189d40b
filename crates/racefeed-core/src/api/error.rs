use thiserror::Error;

use crate::utils::truncate;

#[derive(Error, Debug)]
pub enum FetchError {
    #[error("Permission denied by the remote service")]
    PermissionDenied,

    #[error("Request failed after {attempts} attempts: {reason}")]
    Exhausted { attempts: u32, reason: String },

    #[error("Failed to build HTTP client: {0}")]
    Client(#[from] reqwest::Error),
}

/// Maximum length for error response bodies in error messages
const MAX_ERROR_BODY_LENGTH: usize = 500;

/// What a single attempt's failure means for the retry loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum AttemptFailure {
    /// Stop retrying and report `PermissionDenied`.
    Denied,
    /// Try again if attempts remain.
    Retryable(String),
}

impl AttemptFailure {
    pub(crate) fn from_status(status: reqwest::StatusCode, body: &str) -> Self {
        let truncated = truncate(body, MAX_ERROR_BODY_LENGTH);
        match status.as_u16() {
            401 | 403 => AttemptFailure::Denied,
            429 => AttemptFailure::Retryable("rate limited".to_string()),
            500..=599 => AttemptFailure::Retryable(format!("server error {}: {}", status, truncated)),
            _ => AttemptFailure::Retryable(format!("status {}: {}", status, truncated)),
        }
    }
}
