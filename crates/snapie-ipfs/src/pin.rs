//! Adding and pinning content through the IPFS HTTP API.
//!
//! `POST {api}/api/v0/add?pin=true` with a multipart `file` part. The node
//! answers with one JSON object per added entry; for a single file the last
//! object carries the root `Hash`.

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use serde::Deserialize;
use url::Url;

use snapie_core::ContentId;

use crate::config::PinConfig;
use crate::error::PinError;
use crate::retry::AddRetry;

const ADD_ENDPOINT: &str = "api/v0/add";

/// Content-addressed storage that uploads are pinned to.
#[async_trait]
pub trait ContentStore: Send + Sync {
    /// Store and pin `bytes`, returning the content identifier.
    async fn pin(&self, bytes: Bytes, filename: Option<&str>) -> Result<ContentId, PinError>;
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct AddResponse {
    hash: String,
    #[serde(default)]
    name: Option<String>,
}

/// [`ContentStore`] backed by a Kubo node's RPC API.
#[derive(Debug, Clone)]
pub struct IpfsPinClient {
    http: reqwest::Client,
    api_url: Url,
    retry: AddRetry,
}

impl IpfsPinClient {
    pub fn new(config: &PinConfig) -> Result<Self, PinError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| PinError::Http {
                endpoint: "client_init".into(),
                source: e,
            })?;
        Ok(Self {
            http,
            api_url: config.api_url.clone(),
            retry: AddRetry::default(),
        })
    }

    pub fn with_retry(mut self, retry: AddRetry) -> Self {
        self.retry = retry;
        self
    }

    fn add_url(&self) -> Result<Url, PinError> {
        let mut url = self.api_url.clone();
        url.path_segments_mut()
            .map_err(|()| PinError::Url(self.api_url.to_string()))?
            .pop_if_empty()
            .extend(ADD_ENDPOINT.split('/'));
        url.query_pairs_mut().append_pair("pin", "true");
        Ok(url)
    }
}

#[async_trait]
impl ContentStore for IpfsPinClient {
    async fn pin(&self, bytes: Bytes, filename: Option<&str>) -> Result<ContentId, PinError> {
        let url = self.add_url()?;
        let filename = filename.unwrap_or("audio").to_string();
        let size = bytes.len();

        let resp = self.retry.run(|| {
            let part = reqwest::multipart::Part::bytes(bytes.to_vec()).file_name(filename.clone());
            let form = reqwest::multipart::Form::new().part("file", part);
            self.http.post(url.clone()).multipart(form).send()
        })
        .await
        .map_err(|e| PinError::Http {
            endpoint: ADD_ENDPOINT.into(),
            source: e,
        })?;

        let status = resp.status();
        let body = resp.text().await.map_err(|e| PinError::Http {
            endpoint: ADD_ENDPOINT.into(),
            source: e,
        })?;
        if !status.is_success() {
            return Err(PinError::Api {
                endpoint: ADD_ENDPOINT.into(),
                status: status.as_u16(),
                body,
            });
        }

        let added = parse_add_response(&body)?;
        let cid = ContentId::from_content_store(added.hash).map_err(|e| PinError::Response {
            endpoint: ADD_ENDPOINT.into(),
            detail: e.to_string(),
        })?;
        tracing::info!(cid = %cid, size, name = ?added.name, "content pinned");
        Ok(cid)
    }
}

fn parse_add_response(body: &str) -> Result<AddResponse, PinError> {
    let last = body
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .last()
        .ok_or_else(|| PinError::Response {
            endpoint: ADD_ENDPOINT.into(),
            detail: "empty body".into(),
        })?;
    serde_json::from_str(last).map_err(|e| PinError::Response {
        endpoint: ADD_ENDPOINT.into(),
        detail: e.to_string(),
    })
}
