//! Backend client.
//!
//! # Responsibilities
//! - Represent a single backend server by its base address
//! - Issue find/render/info requests over the shared pooled transport
//! - Classify failures into `BackendError` values
//! - Own the backend's concurrency limiter

use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use url::Url;

use crate::backend::limiter::{ConcurrencyLimiter, LimiterPermit};
use crate::zipper::error::{BackendError, ZipperError, ZipperResult};
use crate::zipper::types::{FetchResponse, GlobMatch, GlobResponse, MultiFetchResponse, ServerInfo};

const FIND_PATH: &str = "metrics/find/";
const RENDER_PATH: &str = "render/";
const INFO_PATH: &str = "info/";

/// Parse a configured backend address into a base URL.
///
/// A bare `host:port` gets an `http://` scheme. The returned URL path always
/// ends with `/` so endpoint paths join under it.
pub fn parse_address(address: &str) -> Result<Url, String> {
    let with_scheme = if address.contains("://") {
        address.to_string()
    } else {
        format!("http://{}", address)
    };
    let mut url = Url::parse(&with_scheme).map_err(|e| e.to_string())?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(format!("unsupported scheme '{}'", url.scheme()));
    }
    if url.host_str().is_none() {
        return Err("missing host".to_string());
    }
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    Ok(url)
}

/// A single backend server.
#[derive(Debug)]
pub struct Backend {
    /// Identity used in replies, caches and info results.
    address: String,
    base_url: Url,
    client: reqwest::Client,
    limiter: ConcurrencyLimiter,
}

impl Backend {
    /// Create a backend sharing `client` as its transport.
    pub fn new(address: &str, client: reqwest::Client, concurrency_limit: usize) -> ZipperResult<Self> {
        let base_url = parse_address(address).map_err(|reason| ZipperError::InvalidBackend {
            address: address.to_string(),
            reason,
        })?;
        Ok(Self {
            address: base_url.as_str().trim_end_matches('/').to_string(),
            base_url,
            client,
            limiter: ConcurrencyLimiter::new(concurrency_limit),
        })
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    pub fn limiter(&self) -> &ConcurrencyLimiter {
        &self.limiter
    }

    /// Wait for a slot in this backend's permit pool.
    pub async fn acquire(&self) -> LimiterPermit {
        self.limiter.acquire().await
    }

    /// Resolve a glob query.
    pub async fn find(&self, query: &str) -> Result<Vec<GlobMatch>, BackendError> {
        let reply: GlobResponse = self
            .get_json(FIND_PATH, &[("query", query.to_string())])
            .await?;
        Ok(reply.matches)
    }

    /// Fetch series for a target over `[from, until]`.
    pub async fn render(&self, target: &str, from: i32, until: i32) -> Result<Vec<FetchResponse>, BackendError> {
        let reply: MultiFetchResponse = self
            .get_json(
                RENDER_PATH,
                &[
                    ("target", target.to_string()),
                    ("from", from.to_string()),
                    ("until", until.to_string()),
                ],
            )
            .await?;
        Ok(reply.metrics)
    }

    /// Fetch this backend's metadata for a metric.
    pub async fn info(&self, target: &str) -> Result<ServerInfo, BackendError> {
        self.get_json(INFO_PATH, &[("target", target.to_string())]).await
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        params: &[(&str, String)],
    ) -> Result<T, BackendError> {
        let url = self
            .base_url
            .join(path)
            .map_err(|e| BackendError::Transport(e.to_string()))?;

        let response = self
            .client
            .get(url)
            .query(params)
            .query(&[("format", "json")])
            .send()
            .await?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Err(BackendError::NotFound);
        }
        if !status.is_success() {
            return Err(BackendError::Status(status.as_u16()));
        }

        let body = response.bytes().await?;
        serde_json::from_slice(&body).map_err(|e| BackendError::Malformed(e.to_string()))
    }
}
