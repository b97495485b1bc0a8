//! Network boundary of the cache.
//!
//! A [`Fetcher`] performs exactly one request per call and classifies the outcome.
//! Retries are the caller's decision.

mod error;
mod http;

use async_trait::async_trait;
use reqwest::Method;
use serde_json::Value;

pub use error::FetchError;
pub use http::{FetcherOptions, HttpFetcher};

/// One authenticated request against the archive API.
#[derive(Debug, Clone, PartialEq)]
pub struct FetchRequest {
    pub method: Method,
    /// Path plus optional query, relative to the API base URL.
    pub target: String,
    pub token: Option<String>,
    pub body: Option<Value>,
}

impl FetchRequest {
    pub fn get(target: impl Into<String>, token: Option<String>) -> Self {
        Self {
            method: Method::GET,
            target: target.into(),
            token,
            body: None,
        }
    }
}

#[async_trait]
pub trait Fetcher: Send + Sync {
    /// Issue the request and return the decoded JSON payload.
    ///
    /// An empty 2xx body decodes to `{}`.
    async fn request(&self, request: FetchRequest) -> Result<Value, FetchError>;
}
