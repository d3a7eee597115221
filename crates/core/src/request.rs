//! Request descriptors and canonical request identity.
//!
//! ### URL Canonicalization
//! - Trim whitespace, resolve relative paths against the application origin
//! - Lowercase host, remove fragments
//! - Preserve query string verbatim
//!
//! The canonical identity of a request (`"<METHOD> <url>"`) is the key its
//! response snapshot is stored under.

use std::collections::BTreeMap;

use url::Url;

/// Error type for URL canonicalization failures.
#[derive(Debug, Clone, thiserror::Error)]
pub enum UrlError {
    #[error("empty URL")]
    Empty,

    #[error("unsupported scheme: {0}")]
    UnsupportedScheme(String),

    #[error("invalid URL: {0}")]
    InvalidUrl(String),
}

/// Canonicalize an absolute URL string.
///
/// Normalization steps:
/// 1. Trim leading/trailing whitespace
/// 2. Lowercase the host
/// 3. Remove fragment (#...)
/// 4. Keep query string intact (do not reorder)
pub fn canonicalize(input: &str) -> Result<Url, UrlError> {
    let trimmed = input.trim();

    if trimmed.is_empty() {
        return Err(UrlError::Empty);
    }

    let parsed = Url::parse(trimmed).map_err(|e| UrlError::InvalidUrl(e.to_string()))?;
    normalize(parsed)
}

/// Resolve `input` against `origin` and canonicalize the result.
///
/// Absolute URLs are taken as-is (they may be cross-origin); anything else is
/// treated as a reference relative to the origin. A URL inside the query of a
/// relative path does not make it absolute.
pub fn resolve(origin: &Url, input: &str) -> Result<Url, UrlError> {
    let trimmed = input.trim();

    if trimmed.is_empty() {
        return Err(UrlError::Empty);
    }

    let joined = origin.join(trimmed).map_err(|e| UrlError::InvalidUrl(e.to_string()))?;
    normalize(joined)
}

fn normalize(mut parsed: Url) -> Result<Url, UrlError> {
    match parsed.scheme() {
        "http" | "https" => {}
        scheme => return Err(UrlError::UnsupportedScheme(scheme.to_string())),
    }

    if let Some(host) = parsed.host_str() {
        let lowered = host.to_lowercase();
        parsed
            .set_host(Some(&lowered))
            .map_err(|e| UrlError::InvalidUrl(e.to_string()))?;
    }

    parsed.set_fragment(None);

    Ok(parsed)
}

/// Store key for a request identity.
pub fn cache_key(method: &str, url: &Url) -> String {
    format!("{} {}", method.to_ascii_uppercase(), url)
}

/// An outbound request as seen by the interception layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    /// Upper-case HTTP method.
    pub method: String,
    /// Absolute, canonical URL.
    pub url: Url,
    /// Header set; names are stored lower-case.
    pub headers: BTreeMap<String, String>,
    /// Optional request body.
    pub body: Option<Vec<u8>>,
}

impl Request {
    pub fn new(method: &str, url: Url) -> Self {
        let mut url = url;
        url.set_fragment(None);
        Self { method: method.trim().to_ascii_uppercase(), url, headers: BTreeMap::new(), body: None }
    }

    pub fn get(url: Url) -> Self {
        Self::new("GET", url)
    }

    pub fn with_header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers.insert(name.to_ascii_lowercase(), value.into());
        self
    }

    pub fn with_body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = Some(body.into());
        self
    }

    /// Case-insensitive header lookup.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(&name.to_ascii_lowercase()).map(String::as_str)
    }

    pub fn is_get(&self) -> bool {
        self.method == "GET"
    }

    /// Whether the request asks for partial content.
    pub fn has_range(&self) -> bool {
        self.headers.contains_key("range")
    }

    /// Canonical request identity used as the store key.
    pub fn cache_key(&self) -> String {
        cache_key(&self.method, &self.url)
    }

    pub fn is_same_origin(&self, origin: &Url) -> bool {
        self.url.origin() == origin.origin()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn origin() -> Url {
        Url::parse("https://app.example.com").unwrap()
    }

    #[test]
    fn test_canonicalize_lowercase_host() {
        let url = canonicalize("https://EXAMPLE.COM/Path").unwrap();
        assert_eq!(url.host_str(), Some("example.com"));
        assert_eq!(url.path(), "/Path");
    }

    #[test]
    fn test_canonicalize_remove_fragment() {
        let url = canonicalize("https://example.com/a#section").unwrap();
        assert_eq!(url.fragment(), None);
        assert_eq!(url.as_str(), "https://example.com/a");
    }

    #[test]
    fn test_canonicalize_preserve_query() {
        let url = canonicalize("https://example.com?b=2&a=1").unwrap();
        assert_eq!(url.query(), Some("b=2&a=1"));
    }

    #[test]
    fn test_canonicalize_unsupported_scheme() {
        let result = canonicalize("file:///etc/passwd");
        assert!(matches!(result, Err(UrlError::UnsupportedScheme(_))));
    }

    #[test]
    fn test_canonicalize_empty() {
        assert!(matches!(canonicalize("   "), Err(UrlError::Empty)));
    }

    #[test]
    fn test_resolve_relative_path() {
        let url = resolve(&origin(), "/api/routines?day=1").unwrap();
        assert_eq!(url.as_str(), "https://app.example.com/api/routines?day=1");
    }

    #[test]
    fn test_resolve_relative_path_with_url_in_query() {
        let url = resolve(&origin(), "/api/search?q=https://example.org/x").unwrap();
        assert_eq!(url.host_str(), Some("app.example.com"));
        assert_eq!(url.path(), "/api/search");
        assert_eq!(url.query(), Some("q=https://example.org/x"));
    }

    #[test]
    fn test_resolve_rejects_foreign_scheme() {
        assert!(matches!(resolve(&origin(), "ftp://files.example.com/a"), Err(UrlError::UnsupportedScheme(_))));
    }

    #[test]
    fn test_resolve_absolute_keeps_foreign_origin() {
        let url = resolve(&origin(), "https://cdn.example.net/font.ttf").unwrap();
        assert_eq!(url.host_str(), Some("cdn.example.net"));
    }

    #[test]
    fn test_cache_key_includes_method_and_query() {
        let req = Request::get(resolve(&origin(), "/data.json?v=3").unwrap());
        assert_eq!(req.cache_key(), "GET https://app.example.com/data.json?v=3");

        let post = Request::new("post", req.url.clone());
        assert_eq!(post.cache_key(), "POST https://app.example.com/data.json?v=3");
    }

    #[test]
    fn test_headers_case_insensitive() {
        let req = Request::get(origin()).with_header("Range", "bytes=0-10");
        assert_eq!(req.header("RANGE"), Some("bytes=0-10"));
        assert!(req.has_range());
    }

    #[test]
    fn test_same_origin() {
        let req = Request::get(resolve(&origin(), "/x").unwrap());
        assert!(req.is_same_origin(&origin()));

        let foreign = Request::get(Url::parse("http://app.example.com/x").unwrap());
        assert!(!foreign.is_same_origin(&origin()));
    }
}
