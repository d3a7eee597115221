//! Network access for the interception layer.
//!
//! ### Transport
//! - Forwards method, headers and body untouched
//! - Max redirects: 5
//! - Max body bytes: 5MB (configurable)
//! - Transport timeout slightly above the strategy budget, so an abandoned
//!   fetch cannot hold its connection indefinitely
//!
//! Every status code is returned as a response; deciding what is cacheable
//! is left to the strategies.

use std::collections::BTreeMap;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::{Client, Method, header};

use offgrid_core::{AppConfig, Error, Request, Response, ResponseSource};

use crate::timeout::with_timeout;

#[cfg(test)]
pub(crate) mod scripted;

/// Extra transport time granted beyond the strategy budget.
const TRANSPORT_GRACE: Duration = Duration::from_secs(2);

/// The network as seen by the engine.
#[async_trait]
pub trait Fetcher: Send + Sync {
    /// Send a request and return whatever the network answered.
    async fn fetch(&self, request: &Request) -> Result<Response, Error>;
}

/// Fetch under a budget. An expired budget becomes `Error::FetchTimeout`.
pub async fn fetch_within(fetcher: &dyn Fetcher, request: &Request, budget: Duration) -> Result<Response, Error> {
    match with_timeout(fetcher.fetch(request), budget).await {
        Ok(result) => result,
        Err(timed_out) => Err(Error::FetchTimeout(format!("{} {}: {timed_out}", request.method, request.url))),
    }
}

/// Configuration for the HTTP fetcher.
#[derive(Debug, Clone)]
pub struct FetchConfig {
    /// User agent string (default: "offgrid/0.1")
    pub user_agent: String,

    /// Maximum response body size in bytes (default: 5MB)
    pub max_bytes: usize,

    /// Transport-level timeout (default: 10s)
    pub timeout: Duration,

    /// Maximum number of redirects to follow (default: 5)
    pub max_redirects: usize,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            user_agent: "offgrid/0.1".to_string(),
            max_bytes: 5 * 1024 * 1024,
            timeout: Duration::from_millis(10_000),
            max_redirects: 5,
        }
    }
}

impl From<&AppConfig> for FetchConfig {
    fn from(config: &AppConfig) -> Self {
        Self {
            user_agent: config.user_agent.clone(),
            max_bytes: config.max_bytes,
            timeout: config.timeout() + TRANSPORT_GRACE,
            ..Default::default()
        }
    }
}

/// HTTP fetcher backed by reqwest.
pub struct HttpFetcher {
    http: Client,
    config: FetchConfig,
}

impl HttpFetcher {
    /// Create a new fetcher with the given configuration.
    pub fn new(config: FetchConfig) -> Result<Self, Error> {
        let http = Client::builder()
            .user_agent(&config.user_agent)
            .timeout(config.timeout)
            .redirect(reqwest::redirect::Policy::limited(config.max_redirects))
            .use_rustls_tls()
            .gzip(true)
            .brotli(true)
            .deflate(true)
            .build()
            .map_err(|e| Error::Network(format!("failed to build HTTP client: {e}")))?;

        Ok(Self { http, config })
    }

    /// Get reference to the configuration.
    pub fn config(&self) -> &FetchConfig {
        &self.config
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, request: &Request) -> Result<Response, Error> {
        let start = Instant::now();
        let method = Method::from_bytes(request.method.as_bytes())
            .map_err(|_| Error::InvalidInput(format!("unsupported method: {}", request.method)))?;

        let mut builder = self.http.request(method, request.url.as_str());
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(body) = &request.body {
            builder = builder.body(body.clone());
        }

        let response = builder.send().await.map_err(|e| {
            if e.is_timeout() {
                Error::FetchTimeout(format!("{}: {e}", request.url))
            } else {
                Error::Network(format!("{}: {e}", request.url))
            }
        })?;

        if let Some(len) = response.content_length()
            && len as usize > self.config.max_bytes
        {
            return Err(Error::FetchTooLarge(format!("{} bytes exceeds {}", len, self.config.max_bytes)));
        }

        let status = response.status().as_u16();
        let headers = flatten_headers(response.headers());

        let bytes = response
            .bytes()
            .await
            .map_err(|e| Error::Network(format!("failed to read response: {e}")))?;

        if bytes.len() > self.config.max_bytes {
            return Err(Error::FetchTooLarge(format!("{} bytes exceeds {}", bytes.len(), self.config.max_bytes)));
        }

        tracing::debug!(
            "fetched {} {} -> {} in {}ms ({} bytes)",
            request.method,
            request.url,
            status,
            start.elapsed().as_millis(),
            bytes.len()
        );

        Ok(Response { status, headers, body: bytes, source: ResponseSource::Network })
    }
}

/// Collapse a header map into lower-case names, joining repeated values.
fn flatten_headers(headers: &header::HeaderMap) -> BTreeMap<String, String> {
    let mut flat: BTreeMap<String, String> = BTreeMap::new();
    for (name, value) in headers {
        let Ok(value) = value.to_str() else { continue };
        flat.entry(name.as_str().to_string())
            .and_modify(|existing| {
                existing.push_str(", ");
                existing.push_str(value);
            })
            .or_insert_with(|| value.to_string());
    }
    flat
}
