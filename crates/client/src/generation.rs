//! Store generation lifecycle.
//!
//! ### Install
//! - Open the current generation
//! - Store the Offline Fallback Document (fetched, or built in when unreachable)
//! - Pre-populate the static asset manifest under the install budget;
//!   unreachable assets are skipped with a warning
//!
//! ### Activate
//! - Delete every generation other than the current one (best effort)
//! - Claim clients: from here on intercepted requests are classified

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::RwLock;
use url::Url;

use offgrid_core::request::{cache_key, resolve};
use offgrid_core::{AppConfig, CacheEntry, Error, Request, Store};

use crate::fetch::{Fetcher, fetch_within};
use crate::timeout::with_timeout;

/// Served when neither the store nor the network can answer.
pub const BUILTIN_OFFLINE_DOCUMENT: &str = r#"<!DOCTYPE html>
<html lang="en">
<head><meta charset="utf-8"><meta name="viewport" content="width=device-width, initial-scale=1"><title>Offline</title></head>
<body><main><h1>You are offline</h1><p>This page is not available offline. It will load again once the connection is back.</p></main></body>
</html>
"#;

/// Engine lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Lifecycle {
    Parsed,
    Installing,
    Installed,
    Activating,
    /// Controlling clients.
    Activated,
}

/// Where the stored Offline Fallback Document came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OfflineSource {
    Network,
    Builtin,
    /// Could not be written at all.
    Missing,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedAsset {
    pub path: String,
    pub reason: String,
}

/// Outcome of an install.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InstallReport {
    pub generation: String,
    pub offline_document: OfflineSource,
    pub cached: Vec<String>,
    pub skipped: Vec<SkippedAsset>,
    /// The install budget expired before every asset was attempted.
    pub timed_out: bool,
}

/// Outcome of an activation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ActivateReport {
    pub current: String,
    pub deleted: Vec<String>,
    pub failed: Vec<SkippedAsset>,
}

/// Owns the current generation tag and the lifecycle state.
pub struct GenerationManager {
    store: Arc<dyn Store>,
    fetcher: Arc<dyn Fetcher>,
    config: Arc<AppConfig>,
    origin: Url,
    state: RwLock<Lifecycle>,
}

impl GenerationManager {
    pub fn new(store: Arc<dyn Store>, fetcher: Arc<dyn Fetcher>, config: Arc<AppConfig>, origin: Url) -> Self {
        Self { store, fetcher, config, origin, state: RwLock::new(Lifecycle::Parsed) }
    }

    pub fn current(&self) -> &str {
        &self.config.generation
    }

    /// Store key of the Offline Fallback Document.
    pub fn offline_key(&self) -> Result<String, Error> {
        let url = resolve(&self.origin, &self.config.offline_path).map_err(|e| Error::InvalidUrl(e.to_string()))?;
        Ok(cache_key("GET", &url))
    }

    pub async fn state(&self) -> Lifecycle {
        *self.state.read().await
    }

    /// Whether clients have been claimed.
    pub async fn is_controlling(&self) -> bool {
        self.state().await == Lifecycle::Activated
    }

    async fn set_state(&self, next: Lifecycle) {
        let mut state = self.state.write().await;
        tracing::info!(from = ?*state, to = ?next, generation = %self.config.generation, "lifecycle transition");
        *state = next;
    }

    /// Populate the current generation. Never fails outright.
    pub async fn install(&self) -> InstallReport {
        self.set_state(Lifecycle::Installing).await;

        let generation = self.config.generation.clone();
        if let Err(err) = self.store.open(&generation).await {
            tracing::warn!(error = %err, "failed to open generation {generation}");
        }

        let mut report = InstallReport {
            generation,
            offline_document: self.store_offline_document().await,
            cached: Vec::new(),
            skipped: Vec::new(),
            timed_out: false,
        };

        let budget = self.config.install_timeout();
        if with_timeout(self.cache_assets(&mut report), budget).await.is_err() {
            report.timed_out = true;
            let attempted: Vec<String> = report
                .cached
                .iter()
                .chain(report.skipped.iter().map(|s| &s.path))
                .cloned()
                .collect();
            for path in &self.config.static_assets {
                if !attempted.contains(path) {
                    report.skipped.push(SkippedAsset { path: path.clone(), reason: "install budget elapsed".into() });
                }
            }
            tracing::warn!(budget_ms = budget.as_millis() as u64, "install budget elapsed; continuing with partial cache");
        }

        if !report.skipped.is_empty() {
            tracing::warn!(skipped = report.skipped.len(), cached = report.cached.len(), "install skipped assets");
        }

        self.set_state(Lifecycle::Installed).await;
        report
    }

    async fn store_offline_document(&self) -> OfflineSource {
        let url = match resolve(&self.origin, &self.config.offline_path) {
            Ok(url) => url,
            Err(err) => {
                tracing::warn!(error = %err, "invalid offline path");
                return OfflineSource::Missing;
            }
        };
        let request = Request::get(url);

        let (entry, source) = match fetch_within(self.fetcher.as_ref(), &request, self.config.timeout()).await {
            Ok(response) if response.is_success() => (response.to_entry(&request), OfflineSource::Network),
            outcome => {
                let reason = match outcome {
                    Ok(response) => format!("status {}", response.status),
                    Err(err) => err.to_string(),
                };
                tracing::warn!(reason = %reason, "offline document unreachable; storing built-in copy");
                (builtin_offline_entry(&request), OfflineSource::Builtin)
            }
        };

        match self.store.put(&self.config.generation, &entry).await {
            Ok(()) => source,
            Err(err) => {
                tracing::warn!(error = %err, "failed to store offline document");
                OfflineSource::Missing
            }
        }
    }

    async fn cache_assets(&self, report: &mut InstallReport) {
        for path in &self.config.static_assets {
            match self.cache_asset(path).await {
                Ok(()) => report.cached.push(path.clone()),
                Err(err) => {
                    tracing::warn!(error = %err, "skipping asset {path}");
                    report.skipped.push(SkippedAsset { path: path.clone(), reason: err.to_string() });
                }
            }
        }
    }

    async fn cache_asset(&self, path: &str) -> Result<(), Error> {
        let url = resolve(&self.origin, path).map_err(|e| Error::InvalidUrl(e.to_string()))?;
        let request = Request::get(url);
        let response = fetch_within(self.fetcher.as_ref(), &request, self.config.timeout()).await?;
        if !response.is_success() {
            return Err(Error::Network(format!("status {}", response.status)));
        }
        self.store.put(&self.config.generation, &response.to_entry(&request)).await
    }

    /// Delete stale generations and claim clients. Always completes.
    pub async fn activate(&self) -> ActivateReport {
        self.set_state(Lifecycle::Activating).await;

        let current = self.config.generation.clone();
        let mut report = ActivateReport { current: current.clone(), deleted: Vec::new(), failed: Vec::new() };

        let tags = match self.store.generations().await {
            Ok(tags) => tags,
            Err(err) => {
                tracing::warn!(error = %err, "failed to enumerate generations");
                Vec::new()
            }
        };

        for tag in tags.into_iter().filter(|t| *t != current) {
            match self.store.delete_generation(&tag).await {
                Ok(_) => {
                    tracing::info!("deleted old generation {tag}");
                    report.deleted.push(tag);
                }
                Err(err) => {
                    tracing::warn!(error = %err, "failed to delete generation {tag}");
                    report.failed.push(SkippedAsset { path: tag, reason: err.to_string() });
                }
            }
        }

        if let Err(err) = self.store.open(&current).await {
            tracing::warn!(error = %err, "failed to open generation {current}");
        }

        self.set_state(Lifecycle::Activated).await;
        report
    }
}

fn builtin_offline_entry(request: &Request) -> CacheEntry {
    CacheEntry {
        key: request.cache_key(),
        method: request.method.clone(),
        url: request.url.to_string(),
        status: 200,
        headers: BTreeMap::from([("content-type".to_string(), "text/html; charset=utf-8".to_string())]),
        body: BUILTIN_OFFLINE_DOCUMENT.as_bytes().to_vec(),
        stored_at: chrono::Utc::now().to_rfc3339(),
    }
}
