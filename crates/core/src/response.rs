//! Response snapshots returned by the engine.

use std::borrow::Cow;
use std::collections::BTreeMap;

use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::cache::CacheEntry;
use crate::request::Request;

/// Where a response came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseSource {
    Network,
    Cache,
    /// The Offline Fallback Document.
    Offline,
    /// Built by the engine (failure report, redirect).
    Synthetic,
}

/// A response snapshot: status, header set and body bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    pub status: u16,
    /// Header set; names are stored lower-case.
    pub headers: BTreeMap<String, String>,
    pub body: Bytes,
    pub source: ResponseSource,
}

impl Response {
    pub fn new(status: u16, body: impl Into<Bytes>, source: ResponseSource) -> Self {
        Self { status, headers: BTreeMap::new(), body: body.into(), source }
    }

    /// A descriptive `text/plain` response built by the engine itself.
    pub fn synthetic(status: u16, message: impl Into<String>) -> Self {
        let message: String = message.into();
        Self::new(status, message, ResponseSource::Synthetic).with_header("content-type", "text/plain; charset=utf-8")
    }

    pub fn redirect(status: u16, location: &str) -> Self {
        Self::new(status, Bytes::new(), ResponseSource::Synthetic).with_header("location", location)
    }

    pub fn with_header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers.insert(name.to_ascii_lowercase(), value.into());
        self
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(&name.to_ascii_lowercase()).map(String::as_str)
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn text(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.body)
    }

    /// Rebuild a response from a stored entry.
    pub fn from_entry(entry: CacheEntry, source: ResponseSource) -> Self {
        Self { status: entry.status, headers: entry.headers, body: Bytes::from(entry.body), source }
    }

    /// Snapshot this response for storage under the request's identity.
    pub fn to_entry(&self, request: &Request) -> CacheEntry {
        CacheEntry {
            key: request.cache_key(),
            method: request.method.clone(),
            url: request.url.to_string(),
            status: self.status,
            headers: self.headers.clone(),
            body: self.body.to_vec(),
            stored_at: chrono::Utc::now().to_rfc3339(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use url::Url;

    #[test]
    fn test_synthetic_is_plain_text() {
        let resp = Response::synthetic(504, "no network");
        assert_eq!(resp.status, 504);
        assert_eq!(resp.source, ResponseSource::Synthetic);
        assert_eq!(resp.header("Content-Type"), Some("text/plain; charset=utf-8"));
        assert_eq!(resp.text(), "no network");
        assert!(!resp.is_success());
    }

    #[test]
    fn test_redirect_location() {
        let resp = Response::redirect(303, "/routines/new?shared=true");
        assert_eq!(resp.header("location"), Some("/routines/new?shared=true"));
        assert!(resp.body.is_empty());
    }

    #[test]
    fn test_entry_conversion_keeps_snapshot() {
        let req = Request::get(Url::parse("https://example.com/data.json").unwrap());
        let resp = Response::new(200, r#"{"v":1}"#, ResponseSource::Network).with_header("ETag", "\"abc\"");

        let entry = resp.to_entry(&req);
        assert_eq!(entry.key, "GET https://example.com/data.json");
        assert_eq!(entry.headers.get("etag").map(String::as_str), Some("\"abc\""));

        let back = Response::from_entry(entry, ResponseSource::Cache);
        assert_eq!(back.status, 200);
        assert_eq!(back.text(), r#"{"v":1}"#);
        assert_eq!(back.source, ResponseSource::Cache);
    }
}
