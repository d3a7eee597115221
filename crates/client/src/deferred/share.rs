//! Share-target ingestion.
//!
//! A share delivery is a form POST carrying `title`, `text` and `url`, either
//! url-encoded or `multipart/form-data` (text fields only; file parts are
//! ignored). The decoded fields land in one well-known store slot, the Shared Payload,
//! which the foreground application reads and clears after the redirect.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use offgrid_core::{CacheEntry, Error, Request, Response};

use super::Coordinator;

const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";
const MULTIPART_CONTENT_TYPE: &str = "multipart/form-data";

/// Status of the redirect issued after a share delivery.
pub const SHARE_REDIRECT_STATUS: u16 = 303;

/// Fields handed over by another application. Missing fields are `None`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SharedPayload {
    pub title: Option<String>,
    pub text: Option<String>,
    pub url: Option<String>,
    /// Milliseconds since the Unix epoch.
    pub timestamp: i64,
}

impl SharedPayload {
    fn empty() -> Self {
        Self { title: None, text: None, url: None, timestamp: chrono::Utc::now().timestamp_millis() }
    }

    /// Keep the first value seen for a known field.
    fn set(&mut self, name: &str, value: String) {
        let slot = match name {
            "title" => &mut self.title,
            "text" => &mut self.text,
            "url" => &mut self.url,
            _ => return,
        };
        if slot.is_none() {
            *slot = Some(value);
        }
    }

    /// Decode a url-encoded body. The first occurrence of a field wins.
    pub fn from_form(body: &[u8]) -> Self {
        let mut payload = Self::empty();
        for (name, value) in url::form_urlencoded::parse(body) {
            payload.set(&name, value.into_owned());
        }
        payload
    }

    /// Decode the text fields of a `multipart/form-data` body.
    ///
    /// Parts carrying a `filename` are skipped. Parsing stops at the closing
    /// delimiter; a body without one is read to the end.
    pub fn from_multipart(body: &[u8], boundary: &str) -> Self {
        let mut payload = Self::empty();
        let text = String::from_utf8_lossy(body);
        let delimiter = format!("--{boundary}");

        for part in text.split(delimiter.as_str()).skip(1) {
            if part.starts_with("--") {
                break;
            }
            let part = part.strip_prefix("\r\n").unwrap_or(part);
            let Some((headers, value)) = part.split_once("\r\n\r\n") else { continue };
            let Some(name) = disposition_name(headers) else { continue };
            payload.set(&name, value.strip_suffix("\r\n").unwrap_or(value).to_string());
        }
        payload
    }
}

/// Field name from a part's `Content-Disposition`, unless the part is a file.
fn disposition_name(headers: &str) -> Option<String> {
    let disposition = headers
        .split("\r\n")
        .find(|line| line.to_ascii_lowercase().starts_with("content-disposition:"))?;

    let mut name = None;
    for param in disposition.split(';').skip(1) {
        let Some((key, value)) = param.trim().split_once('=') else { continue };
        match key.trim().to_ascii_lowercase().as_str() {
            "filename" => return None,
            "name" => name = Some(value.trim().trim_matches('"').to_string()),
            _ => {}
        }
    }
    name
}

/// The `boundary` parameter of a multipart content type.
fn multipart_boundary(content_type: &str) -> Option<&str> {
    content_type.split(';').skip(1).find_map(|param| {
        let (key, value) = param.trim().split_once('=')?;
        key.trim()
            .eq_ignore_ascii_case("boundary")
            .then(|| value.trim().trim_matches('"'))
            .filter(|b| !b.is_empty())
    })
}

impl Coordinator {
    fn shared_payload_key(&self) -> Result<String, Error> {
        Ok(Request::get(self.app_url(&self.config.shared_payload_path)?).cache_key())
    }

    /// Whether `request` is a share-target delivery.
    pub fn is_share_delivery(&self, request: &Request) -> bool {
        request.method == "POST" && request.url.path() == self.config.share_path
    }

    /// Store the shared fields and redirect to the shared-content route.
    ///
    /// The store write is the only side effect. A failed write is logged and
    /// the redirect is still issued.
    pub async fn ingest_share(&self, request: &Request) -> Response {
        let content_type = request.header("content-type").unwrap_or(FORM_CONTENT_TYPE);
        let body = request.body.as_deref().unwrap_or_default();
        let media_type = content_type.to_ascii_lowercase();

        let payload = if media_type.starts_with(FORM_CONTENT_TYPE) {
            SharedPayload::from_form(body)
        } else if media_type.starts_with(MULTIPART_CONTENT_TYPE) {
            let Some(boundary) = multipart_boundary(content_type) else {
                tracing::warn!("rejecting multipart share delivery without a boundary");
                return Response::synthetic(400, "multipart share delivery is missing its boundary");
            };
            SharedPayload::from_multipart(body, boundary)
        } else {
            tracing::warn!("rejecting share delivery with content-type {content_type}");
            return Response::synthetic(
                415,
                format!("share deliveries must be {FORM_CONTENT_TYPE} or {MULTIPART_CONTENT_TYPE}"),
            );
        };

        if let Err(err) = self.write_shared_payload(&payload).await {
            tracing::warn!(error = %err, "failed to store shared payload");
        }

        let location = match self.app_url(&self.config.share_redirect) {
            Ok(url) => url.to_string(),
            Err(_) => self.config.share_redirect.clone(),
        };
        Response::redirect(SHARE_REDIRECT_STATUS, &location)
    }

    async fn write_shared_payload(&self, payload: &SharedPayload) -> Result<(), Error> {
        let key = self.shared_payload_key()?;
        let url = self.app_url(&self.config.shared_payload_path)?;
        let entry = CacheEntry {
            key,
            method: "GET".into(),
            url: url.to_string(),
            status: 200,
            headers: BTreeMap::from([("content-type".to_string(), "application/json".to_string())]),
            body: serde_json::to_vec(payload)?,
            stored_at: chrono::Utc::now().to_rfc3339(),
        };
        self.store.put(self.generation(), &entry).await
    }

    /// The pending Shared Payload, if any.
    pub async fn read_shared_payload(&self) -> Result<Option<SharedPayload>, Error> {
        let key = self.shared_payload_key()?;
        match self.store.get(self.generation(), &key).await? {
            Some(entry) => Ok(Some(serde_json::from_slice(&entry.body)?)),
            None => Ok(None),
        }
    }

    /// Remove the Shared Payload once the application has consumed it.
    pub async fn clear_shared_payload(&self) -> Result<bool, Error> {
        let key = self.shared_payload_key()?;
        self.store.delete(self.generation(), &key).await
    }
}

#[cfg(test)]
mod tests {
    use super::super::fixture::{harness, url};
    use super::*;
    use url::Url;

    fn share(body: &str) -> Request {
        Request::new("POST", Url::parse(&url("/share")).unwrap())
            .with_header("content-type", FORM_CONTENT_TYPE)
            .with_body(body.as_bytes().to_vec())
    }

    #[test]
    fn test_from_form_missing_fields_are_none() {
        let payload = SharedPayload::from_form(b"text=only+text&extra=1");
        assert_eq!(payload.title, None);
        assert_eq!(payload.text.as_deref(), Some("only text"));
        assert_eq!(payload.url, None);
    }

    #[test]
    fn test_from_form_decodes_percent_escapes() {
        let payload = SharedPayload::from_form(b"title=Caf%C3%A9&url=https%3A%2F%2Fx.org%2Fa%3Fb%3D1");
        assert_eq!(payload.title.as_deref(), Some("Café"));
        assert_eq!(payload.url.as_deref(), Some("https://x.org/a?b=1"));
    }

    #[tokio::test]
    async fn test_share_stores_payload_and_redirects() {
        let h = harness().await;
        let before = chrono::Utc::now().timestamp_millis();

        let response = h.coordinator.ingest_share(&share("title=Hello&text=World&url=http://x")).await;

        assert_eq!(response.status, 303);
        assert_eq!(response.header("location"), Some(url("/routines/new?shared=true").as_str()));

        let payload = h.coordinator.read_shared_payload().await.unwrap().unwrap();
        assert_eq!(payload.title.as_deref(), Some("Hello"));
        assert_eq!(payload.text.as_deref(), Some("World"));
        assert_eq!(payload.url.as_deref(), Some("http://x"));
        assert!(payload.timestamp >= before);
        assert_eq!(h.fetcher.calls(), 0);
    }

    #[tokio::test]
    async fn test_missing_fields_stored_as_null() {
        let h = harness().await;
        h.coordinator.ingest_share(&share("title=Only")).await;

        let key = format!("GET {}", url("/shared-data"));
        let entry = offgrid_core::Store::get(h.store.as_ref(), "v1", &key).await.unwrap().unwrap();
        let json: serde_json::Value = serde_json::from_slice(&entry.body).unwrap();
        assert_eq!(json["title"], "Only");
        assert!(json["text"].is_null());
        assert!(json["url"].is_null());
    }

    #[tokio::test]
    async fn test_second_share_overwrites_slot() {
        let h = harness().await;
        h.coordinator.ingest_share(&share("title=First")).await;
        h.coordinator.ingest_share(&share("title=Second")).await;

        let payload = h.coordinator.read_shared_payload().await.unwrap().unwrap();
        assert_eq!(payload.title.as_deref(), Some("Second"));
    }

    #[tokio::test]
    async fn test_clear_shared_payload() {
        let h = harness().await;
        h.coordinator.ingest_share(&share("title=Hello")).await;

        assert!(h.coordinator.clear_shared_payload().await.unwrap());
        assert!(h.coordinator.read_shared_payload().await.unwrap().is_none());
        assert!(!h.coordinator.clear_shared_payload().await.unwrap());
    }

    #[tokio::test]
    async fn test_store_failure_still_redirects() {
        let h = harness().await;
        h.store.fail_writes(true);

        let response = h.coordinator.ingest_share(&share("title=Hello")).await;

        assert_eq!(response.status, 303);
        h.store.fail_writes(false);
        assert!(h.coordinator.read_shared_payload().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_non_form_body_is_rejected() {
        let h = harness().await;
        let request = Request::new("POST", Url::parse(&url("/share")).unwrap())
            .with_header("content-type", "application/json")
            .with_body(b"{}".to_vec());

        let response = h.coordinator.ingest_share(&request).await;

        assert_eq!(response.status, 415);
        assert!(h.coordinator.read_shared_payload().await.unwrap().is_none());
    }

    const BOUNDARY: &str = "----ShareBoundary7MA4YWxk";

    fn multipart_body(parts: &[(&str, &str)]) -> String {
        let mut body = String::new();
        for (disposition, value) in parts {
            body.push_str(&format!("--{BOUNDARY}\r\nContent-Disposition: form-data; {disposition}\r\n\r\n{value}\r\n"));
        }
        body.push_str(&format!("--{BOUNDARY}--\r\n"));
        body
    }

    #[test]
    fn test_from_multipart_reads_text_fields() {
        let body = multipart_body(&[
            ("name=\"title\"", "Hello"),
            ("name=\"text\"", "two\r\nlines"),
            ("name=\"attachment\"; filename=\"a.txt\"", "ignored"),
            ("name=\"url\"", "http://x"),
        ]);

        let payload = SharedPayload::from_multipart(body.as_bytes(), BOUNDARY);

        assert_eq!(payload.title.as_deref(), Some("Hello"));
        assert_eq!(payload.text.as_deref(), Some("two\r\nlines"));
        assert_eq!(payload.url.as_deref(), Some("http://x"));
    }

    #[test]
    fn test_from_multipart_skips_file_named_like_a_field() {
        let body = multipart_body(&[("name=\"text\"; filename=\"notes.txt\"", "file body")]);
        let payload = SharedPayload::from_multipart(body.as_bytes(), BOUNDARY);
        assert_eq!(payload.text, None);
    }

    #[test]
    fn test_multipart_boundary_param() {
        assert_eq!(multipart_boundary("multipart/form-data; boundary=abc"), Some("abc"));
        assert_eq!(multipart_boundary("multipart/form-data; charset=utf-8; Boundary=\"q d\""), Some("q d"));
        assert_eq!(multipart_boundary("multipart/form-data"), None);
    }

    #[tokio::test]
    async fn test_multipart_share_stores_payload_and_redirects() {
        let h = harness().await;
        let body = multipart_body(&[("name=\"title\"", "Hello"), ("name=\"url\"", "http://x")]);
        let request = Request::new("POST", Url::parse(&url("/share")).unwrap())
            .with_header("content-type", format!("multipart/form-data; boundary={BOUNDARY}"))
            .with_body(body.into_bytes());

        let response = h.coordinator.ingest_share(&request).await;

        assert_eq!(response.status, 303);
        let payload = h.coordinator.read_shared_payload().await.unwrap().unwrap();
        assert_eq!(payload.title.as_deref(), Some("Hello"));
        assert_eq!(payload.text, None);
        assert_eq!(payload.url.as_deref(), Some("http://x"));
    }

    #[tokio::test]
    async fn test_multipart_without_boundary_is_rejected() {
        let h = harness().await;
        let request = Request::new("POST", Url::parse(&url("/share")).unwrap())
            .with_header("content-type", "multipart/form-data")
            .with_body(b"title=Hello".to_vec());

        let response = h.coordinator.ingest_share(&request).await;

        assert_eq!(response.status, 400);
        assert!(h.coordinator.read_shared_payload().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_is_share_delivery() {
        let h = harness().await;
        assert!(h.coordinator.is_share_delivery(&share("")));
        assert!(!h.coordinator.is_share_delivery(&Request::get(Url::parse(&url("/share")).unwrap())));
        assert!(!h.coordinator.is_share_delivery(&Request::new("POST", Url::parse(&url("/other")).unwrap())));
    }
}
