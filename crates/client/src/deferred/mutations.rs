//! Offline mutation queue.
//!
//! A queued mutation is a store entry under the mutation-queue prefix that
//! records the request to resend. Its `status` is 0: it holds a request, not
//! a response. Keys embed a zero-padded microsecond timestamp so key order
//! matches enqueue order.

use serde::Serialize;

use offgrid_core::request::canonicalize;
use offgrid_core::{CacheEntry, Error, Request};

use super::Coordinator;
use crate::fetch::fetch_within;

/// Outcome of one replay pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReplayReport {
    /// Keys delivered and removed.
    pub sent: Vec<String>,
    /// Keys left in place for the next sync.
    pub retained: Vec<String>,
}

impl Coordinator {
    /// Queue a request for later delivery. Returns its store key.
    pub async fn enqueue_mutation(&self, request: &Request) -> Result<String, Error> {
        let key = format!(
            "{}{:020}-{}",
            self.config.mutation_queue_prefix,
            chrono::Utc::now().timestamp_micros().max(0),
            uuid::Uuid::new_v4()
        );
        let entry = CacheEntry {
            key: key.clone(),
            method: request.method.clone(),
            url: request.url.to_string(),
            status: 0,
            headers: request.headers.clone(),
            body: request.body.clone().unwrap_or_default(),
            stored_at: chrono::Utc::now().to_rfc3339(),
        };
        self.store.put(self.generation(), &entry).await?;
        tracing::debug!("queued {} {} as {key}", request.method, request.url);
        Ok(key)
    }

    /// Keys of queued mutations in discovery order.
    pub async fn queued_mutations(&self) -> Result<Vec<String>, Error> {
        self.store.keys(self.generation(), &self.config.mutation_queue_prefix).await
    }

    /// Resend every queued mutation. `None` when `tag` is not the sync tag.
    pub async fn replay_mutations(&self, tag: &str) -> Option<ReplayReport> {
        if tag != self.config.sync_tag {
            tracing::debug!("ignoring sync tag {tag}");
            return None;
        }

        let mut report = ReplayReport::default();
        let keys = match self.queued_mutations().await {
            Ok(keys) => keys,
            Err(err) => {
                tracing::warn!(error = %err, "failed to scan mutation queue");
                return Some(report);
            }
        };

        for key in keys {
            // Another pass may already have delivered it.
            let entry = match self.store.get(self.generation(), &key).await {
                Ok(Some(entry)) => entry,
                Ok(None) => continue,
                Err(err) => {
                    tracing::warn!(error = %err, "failed to read queued mutation {key}");
                    report.retained.push(key);
                    continue;
                }
            };

            if self.deliver(&entry).await {
                if let Err(err) = self.store.delete(self.generation(), &key).await {
                    tracing::warn!(error = %err, "delivered {key} but could not dequeue it");
                }
                report.sent.push(key);
            } else {
                report.retained.push(key);
            }
        }

        tracing::info!(sent = report.sent.len(), retained = report.retained.len(), "mutation replay finished");
        Some(report)
    }

    async fn deliver(&self, entry: &CacheEntry) -> bool {
        let url = match canonicalize(&entry.url) {
            Ok(url) => url,
            Err(err) => {
                tracing::warn!(error = %err, "queued mutation {} has an invalid url", entry.key);
                return false;
            }
        };

        let mut request = Request::new(&entry.method, url);
        request.headers = entry.headers.clone();
        if !entry.body.is_empty() {
            request.body = Some(entry.body.clone());
        }

        match fetch_within(self.fetcher.as_ref(), &request, self.config.timeout()).await {
            Ok(response) if response.is_success() => true,
            Ok(response) => {
                tracing::warn!(status = response.status, "replay of {} rejected", entry.key);
                false
            }
            Err(err) => {
                tracing::warn!(error = %err, "replay of {} failed", entry.key);
                false
            }
        }
    }
}
