//! Sequential fetch-with-fallback over an ordered gateway list.
//!
//! Candidates are tried one at a time. Each attempt has its own timeout;
//! the first success wins and no further requests are issued. Per-gateway
//! failures go to the log at `warn`; the caller only sees a single
//! [`GatewayError::ContentUnavailable`].

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use url::Url;

use crate::error::{FetchError, GatewayError};

/// Body and content type returned by one gateway.
#[derive(Debug, Clone)]
pub struct GatewayResponse {
    pub bytes: Bytes,
    pub content_type: Option<String>,
}

/// The winning attempt of a fallback resolution.
#[derive(Debug, Clone)]
pub struct Fetched {
    pub bytes: Bytes,
    pub content_type: Option<String>,
    /// Position of the winning URL in the candidate list.
    pub source_index: usize,
    pub url: Url,
}

/// One HTTP GET against one gateway.
#[async_trait]
pub trait GatewayFetcher: Send + Sync {
    async fn fetch(&self, url: &Url, timeout: Duration) -> Result<GatewayResponse, FetchError>;
}

/// [`GatewayFetcher`] over `reqwest`.
#[derive(Debug, Clone)]
pub struct HttpGatewayFetcher {
    http: reqwest::Client,
}

impl HttpGatewayFetcher {
    pub fn new(http: reqwest::Client) -> Self {
        Self { http }
    }
}

impl Default for HttpGatewayFetcher {
    fn default() -> Self {
        Self::new(reqwest::Client::new())
    }
}

#[async_trait]
impl GatewayFetcher for HttpGatewayFetcher {
    async fn fetch(&self, url: &Url, timeout: Duration) -> Result<GatewayResponse, FetchError> {
        let attempt = async {
            let resp = self
                .http
                .get(url.clone())
                .send()
                .await
                .map_err(|e| transport(e, timeout))?;
            let status = resp.status();
            if !status.is_success() {
                return Err(FetchError::Status(status.as_u16()));
            }
            let content_type = resp
                .headers()
                .get(reqwest::header::CONTENT_TYPE)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string);
            let bytes = resp.bytes().await.map_err(|e| transport(e, timeout))?;
            Ok(GatewayResponse {
                bytes,
                content_type,
            })
        };

        // The timeout covers the body read, not just the response headers.
        match tokio::time::timeout(timeout, attempt).await {
            Ok(result) => result,
            Err(_) => Err(FetchError::Timeout(timeout)),
        }
    }
}

fn transport(e: reqwest::Error, timeout: Duration) -> FetchError {
    if e.is_timeout() {
        FetchError::Timeout(timeout)
    } else {
        FetchError::Transport(e.to_string())
    }
}

/// Try `urls` in order and return the first success.
pub async fn fetch_with_fallback(
    fetcher: &dyn GatewayFetcher,
    urls: &[Url],
    timeout: Duration,
) -> Result<Fetched, GatewayError> {
    if urls.is_empty() {
        return Err(GatewayError::NoCandidates);
    }

    for (index, url) in urls.iter().enumerate() {
        match fetcher.fetch(url, timeout).await {
            Ok(resp) => {
                tracing::debug!(gateway = %url, index, bytes = resp.bytes.len(), "gateway fetch succeeded");
                return Ok(Fetched {
                    bytes: resp.bytes,
                    content_type: resp.content_type,
                    source_index: index,
                    url: url.clone(),
                });
            }
            Err(e) => {
                tracing::warn!(
                    gateway = %url,
                    index,
                    candidates = urls.len(),
                    error = %e,
                    "gateway fetch failed, trying next"
                );
            }
        }
    }

    tracing::error!(candidates = urls.len(), "all gateways failed");
    Err(GatewayError::ContentUnavailable {
        attempts: urls.len(),
    })
}
