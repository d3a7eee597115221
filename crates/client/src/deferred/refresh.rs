//! Periodic refresh of one designated resource.
//!
//! The refreshed body must be JSON; anything else leaves the stored copy
//! untouched until the next scheduled wake-up.

use bytes::Bytes;
use serde::Serialize;

use offgrid_core::{Error, Request, Response, ResponseSource};

use super::Coordinator;
use crate::fetch::fetch_within;

/// Outcome of a periodic refresh.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum RefreshOutcome {
    Refreshed { url: String },
    /// Left the stored copy untouched until the next wake-up.
    Skipped { url: String, reason: String },
}

impl Coordinator {
    /// Re-fetch the refresh resource and overwrite its entry.
    ///
    /// `None` when `tag` is not the periodic-sync tag. Failures are logged and
    /// reported as skipped; there is no retry before the next wake-up.
    pub async fn periodic_refresh(&self, tag: &str) -> Option<RefreshOutcome> {
        if tag != self.config.periodic_sync_tag {
            tracing::debug!("ignoring periodic sync tag {tag}");
            return None;
        }

        let outcome = match self.refresh().await {
            Ok(url) => {
                tracing::info!("refreshed {url}");
                RefreshOutcome::Refreshed { url }
            }
            Err(err) => {
                let url = self.app_url(&self.config.refresh_path).map(|u| u.to_string()).unwrap_or_default();
                tracing::warn!(error = %err, "periodic refresh of {url} failed");
                RefreshOutcome::Skipped { url, reason: err.to_string() }
            }
        };
        Some(outcome)
    }

    async fn refresh(&self) -> Result<String, Error> {
        let request = Request::get(self.app_url(&self.config.refresh_path)?);
        let response = fetch_within(self.fetcher.as_ref(), &request, self.config.timeout()).await?;
        if !response.is_success() {
            return Err(Error::Network(format!("status {}", response.status)));
        }

        let data: serde_json::Value = serde_json::from_slice(&response.body)
            .map_err(|e| Error::InvalidInput(format!("refresh body is not JSON: {e}")))?;
        let body = serde_json::to_vec(&data).map_err(|e| Error::InvalidInput(e.to_string()))?;

        let stored = Response::new(response.status, Bytes::from(body), ResponseSource::Network)
            .with_header("content-type", "application/json");
        self.store.put(self.generation(), &stored.to_entry(&request)).await?;
        Ok(request.url.to_string())
    }
}
