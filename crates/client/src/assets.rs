//! Quote endpoint client.
//!
//! One GET per fetch; the body must be an object whose `data` member holds
//! the asset list. Transport, status and decode failures surface as
//! [`ClientError`] and are normalized to `FetchError` at the cache boundary.

use std::time::{Duration, Instant};

use pricewatch_core::{AppConfig, Asset, AssetsResponse, CacheKey};
use reqwest::{StatusCode, Url, header};

use crate::error::ClientError;
use crate::url::canonicalize;

/// Anything that can produce the current asset list.
#[async_trait::async_trait]
pub trait AssetSource: Send + Sync {
    /// Fetch the asset list once.
    async fn fetch_assets(&self) -> Result<Vec<Asset>, ClientError>;

    /// Cache key identifying this source's request.
    fn cache_key(&self) -> CacheKey;
}

/// Configuration for the asset client.
#[derive(Debug, Clone)]
pub struct AssetClientConfig {
    /// Quote endpoint (default: CoinCap top 5)
    pub endpoint: String,
    /// User agent string (default: "pricewatch/0.1")
    pub user_agent: String,
    /// Request timeout (default: 20s)
    pub timeout: Duration,
}

impl Default for AssetClientConfig {
    fn default() -> Self {
        Self::from(&AppConfig::default())
    }
}

impl From<&AppConfig> for AssetClientConfig {
    fn from(config: &AppConfig) -> Self {
        Self { endpoint: config.endpoint.clone(), user_agent: config.user_agent.clone(), timeout: config.timeout() }
    }
}

/// HTTP client for the quote endpoint.
#[derive(Debug, Clone)]
pub struct AssetClient {
    http: reqwest::Client,
    endpoint: Url,
    config: AssetClientConfig,
}

impl AssetClient {
    /// Create a client for the configured endpoint.
    pub fn new(config: AssetClientConfig) -> Result<Self, ClientError> {
        let endpoint = canonicalize(&config.endpoint)?;
        let http = reqwest::Client::builder()
            .user_agent(&config.user_agent)
            .timeout(config.timeout)
            .use_rustls_tls()
            .gzip(true)
            .brotli(true)
            .deflate(true)
            .build()?;

        Ok(Self { http, endpoint, config })
    }

    /// Canonical endpoint URL.
    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    pub fn config(&self) -> &AssetClientConfig {
        &self.config
    }
}

#[async_trait::async_trait]
impl AssetSource for AssetClient {
    async fn fetch_assets(&self) -> Result<Vec<Asset>, ClientError> {
        let start = Instant::now();
        tracing::info!(url = %self.endpoint, "fetching quotes");

        let response = self
            .http
            .get(self.endpoint.clone())
            .header(header::ACCEPT, "application/json")
            .send()
            .await
            .inspect_err(|e| tracing::warn!(error = %e, "quote request failed"))?;

        check_status(response.status())?;
        let bytes = response.bytes().await?;
        let assets = parse_body(&bytes)?;

        tracing::info!(
            count = assets.len(),
            bytes = bytes.len(),
            fetch_ms = start.elapsed().as_millis() as u64,
            "quotes fetched"
        );
        Ok(assets)
    }

    fn cache_key(&self) -> CacheKey {
        CacheKey::from_request("GET", self.endpoint.as_str())
    }
}

pub(crate) fn check_status(status: StatusCode) -> Result<(), ClientError> {
    if status.is_success() {
        return Ok(());
    }
    tracing::warn!(status = status.as_u16(), "quote endpoint returned an error status");
    Err(ClientError::HttpError { status: status.as_u16() })
}

pub(crate) fn parse_body(bytes: &[u8]) -> Result<Vec<Asset>, ClientError> {
    let response: AssetsResponse = serde_json::from_slice(bytes).map_err(|e| ClientError::Parse(e.to_string()))?;
    Ok(response.data)
}
