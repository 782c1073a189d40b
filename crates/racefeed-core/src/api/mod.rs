//! Remote fetcher for the provider's post-race feeds.
//!
//! The resolver talks to the network only through the `Fetcher` trait, so
//! tests can substitute a scripted fake. `HttpFetcher` is the real thing:
//! a reqwest GET with a timeout and a fixed retry budget.

pub mod client;
pub mod error;

use async_trait::async_trait;

pub use client::{HttpFetcher, PERMISSION_DENIED_BODY};
pub use error::FetchError;

#[async_trait]
pub trait Fetcher: Send + Sync {
    /// GET `url` and return the response body.
    ///
    /// Transport failures are retried internally; `Err` means the retry
    /// budget is spent or the provider denied access.
    async fn get_text(&self, url: &str) -> Result<String, FetchError>;
}
