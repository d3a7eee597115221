//! Strategy execution.
//!
//! Each strategy turns a classified request into a response using the
//! Durable Store and the network. Execution never fails: transport errors
//! fall back to the store, the Offline Fallback Document, or a synthetic
//! non-2xx response.
//!
//! ### Ordering
//! - CACHE_FIRST / NETWORK_FIRST: the store write happens before the response is returned.
//! - STALE_WHILE_REVALIDATE: the background write is unordered with the response.
//!
//! ### Timeouts
//! Every wait on the network is raced against one fixed budget; see
//! [`crate::timeout::with_timeout`]. PASSTHROUGH keeps the transport default.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;

use offgrid_core::{Error, Request, Response, ResponseSource, Store, Strategy};

use crate::fetch::{Fetcher, fetch_within};

/// Status of the Offline Fallback Document when served in place of a resource.
pub const OFFLINE_STATUS: u16 = 503;
/// Budget expired and nothing was cached.
pub const TIMEOUT_STATUS: u16 = 504;
/// Network failed and nothing was cached.
pub const NETWORK_FAILURE_STATUS: u16 = 502;

/// Executes strategies against one store generation.
#[derive(Clone)]
pub struct StrategyExecutor {
    fetcher: Arc<dyn Fetcher>,
    store: Arc<dyn Store>,
    generation: String,
    budget: Duration,
    offline_key: String,
}

impl StrategyExecutor {
    pub fn new(
        fetcher: Arc<dyn Fetcher>, store: Arc<dyn Store>, generation: impl Into<String>, budget: Duration,
        offline_key: impl Into<String>,
    ) -> Self {
        Self { fetcher, store, generation: generation.into(), budget, offline_key: offline_key.into() }
    }

    pub async fn execute(&self, strategy: Strategy, request: &Request) -> Response {
        match strategy {
            Strategy::CacheFirst => self.cache_first(request).await,
            Strategy::NetworkFirst => self.network_first(request).await,
            Strategy::StaleWhileRevalidate => self.stale_while_revalidate(request).await,
            Strategy::Passthrough => self.passthrough(request).await,
        }
    }

    /// Serve from the store; only go to the network on a miss.
    pub async fn cache_first(&self, request: &Request) -> Response {
        let key = request.cache_key();
        if let Some(hit) = self.lookup(&key).await {
            tracing::debug!("cache hit for {key}");
            return hit;
        }

        tracing::debug!("cache miss for {key}");
        match fetch_within(self.fetcher.as_ref(), request, self.budget).await {
            Ok(response) => {
                self.remember(request, &response).await;
                response
            }
            Err(err) => {
                tracing::warn!(error = %err, "cache-first fetch failed for {key}; serving offline document");
                self.offline_document(request).await
            }
        }
    }

    /// Prefer a fresh network response; fall back to the stored copy.
    pub async fn network_first(&self, request: &Request) -> Response {
        let key = request.cache_key();
        match fetch_within(self.fetcher.as_ref(), request, self.budget).await {
            Ok(response) => {
                self.remember(request, &response).await;
                response
            }
            Err(err) => {
                tracing::warn!(error = %err, "network-first fetch failed for {key}");
                match self.lookup(&key).await {
                    Some(stale) => stale,
                    None => failure_response(request, &err),
                }
            }
        }
    }

    /// Serve the stored copy at once and refresh it in the background.
    ///
    /// With nothing stored, the network fetch is awaited instead.
    pub async fn stale_while_revalidate(&self, request: &Request) -> Response {
        let key = request.cache_key();
        if let Some(stale) = self.lookup(&key).await {
            tracing::debug!("serving stale {key}, revalidating");
            let _revalidation = self.revalidate(request.clone());
            return stale;
        }

        match fetch_within(self.fetcher.as_ref(), request, self.budget).await {
            Ok(response) => {
                self.remember(request, &response).await;
                response
            }
            Err(err) => {
                tracing::warn!(error = %err, "fetch failed for {key} with nothing stored");
                failure_response(request, &err)
            }
        }
    }

    /// Forward to the network without touching the store.
    pub async fn passthrough(&self, request: &Request) -> Response {
        match self.fetcher.fetch(request).await {
            Ok(response) => response,
            Err(err) => {
                tracing::debug!(error = %err, "passthrough failed for {} {}", request.method, request.url);
                failure_response(request, &err)
            }
        }
    }

    /// Spawn a detached refresh of the stored entry. Never awaited by the response path.
    fn revalidate(&self, request: Request) -> JoinHandle<()> {
        let this = self.clone();
        tokio::spawn(async move {
            match fetch_within(this.fetcher.as_ref(), &request, this.budget).await {
                Ok(response) => this.remember(&request, &response).await,
                Err(err) => tracing::debug!(error = %err, "background revalidation of {} failed", request.url),
            }
        })
    }

    /// Store lookup; read failures count as a miss.
    async fn lookup(&self, key: &str) -> Option<Response> {
        match self.store.get(&self.generation, key).await {
            Ok(entry) => entry.map(|e| Response::from_entry(e, ResponseSource::Cache)),
            Err(err) => {
                tracing::warn!(error = %err, "store read failed for {key}; treating as miss");
                None
            }
        }
    }

    /// Write a successful response; write failures are logged and swallowed.
    async fn remember(&self, request: &Request, response: &Response) {
        if !response.is_success() {
            tracing::debug!("not caching {} response for {}", response.status, request.url);
            return;
        }
        if let Err(err) = self.store.put(&self.generation, &response.to_entry(request)).await {
            tracing::warn!(error = %err, "store write failed for {}", request.cache_key());
        }
    }

    async fn offline_document(&self, request: &Request) -> Response {
        match self.store.get(&self.generation, &self.offline_key).await {
            Ok(Some(entry)) => {
                let mut response = Response::from_entry(entry, ResponseSource::Offline);
                response.status = OFFLINE_STATUS;
                response
            }
            Ok(None) => Response::synthetic(
                OFFLINE_STATUS,
                format!("offline: {} is not cached and no fallback document is stored", request.url),
            ),
            Err(err) => {
                tracing::warn!(error = %err, "store read failed for offline document");
                Response::synthetic(OFFLINE_STATUS, format!("offline: {} is not cached", request.url))
            }
        }
    }
}

/// Synthetic response for a request that could not be served at all.
fn failure_response(request: &Request, err: &Error) -> Response {
    let status = match err {
        Error::FetchTimeout(_) => TIMEOUT_STATUS,
        _ => NETWORK_FAILURE_STATUS,
    };
    Response::synthetic(status, format!("network unavailable and no cached copy of {}: {err}", request.url))
}
