//! fetch tool implementation.
//!
//! Delivers an intercepted request to the engine and reports the response
//! together with the route that produced it.

use std::collections::BTreeMap;

use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use offgrid_client::{Engine, Outcome, Route, Signal};
use offgrid_core::request::resolve;
use offgrid_core::{Error, Request, ResponseSource};

use super::{json_result, unexpected};

/// Input parameters for the fetch tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct FetchParams {
    /// Absolute URL, or a path resolved against the configured origin.
    pub url: String,

    /// HTTP method (default: GET).
    #[serde(default = "default_method")]
    pub method: String,

    /// Request headers.
    #[serde(default)]
    pub headers: BTreeMap<String, String>,

    /// Optional request body, sent as UTF-8.
    #[serde(default)]
    pub body: Option<String>,
}

fn default_method() -> String {
    "GET".into()
}

/// Output structure for the fetch tool.
#[derive(Debug, Clone, Serialize)]
pub struct FetchOutput {
    pub url: String,
    /// `route` is `uncontrolled`, `share_target` or `strategy`; the last adds `strategy`.
    #[serde(flatten)]
    pub route: Route,
    pub status: u16,
    pub headers: BTreeMap<String, String>,
    /// Body decoded as UTF-8 (lossy).
    pub body: String,
    pub source: ResponseSource,
}

pub async fn fetch_impl(engine: &Engine, params: FetchParams) -> Result<CallToolResult, McpError> {
    if params.url.trim().is_empty() {
        return Err(Error::InvalidInput("url cannot be empty".into()).into());
    }
    if params.method.trim().is_empty() || !params.method.chars().all(|c| c.is_ascii_alphabetic()) {
        return Err(Error::InvalidInput(format!("unsupported method: {}", params.method)).into());
    }

    let url = resolve(engine.classifier().origin(), &params.url).map_err(|e| Error::InvalidUrl(e.to_string()))?;
    let mut request = Request::new(&params.method, url);
    for (name, value) in params.headers {
        request = request.with_header(&name, value);
    }
    if let Some(body) = params.body {
        request = request.with_body(body.into_bytes());
    }

    let url = request.url.to_string();
    let served = match engine.dispatch(Signal::Fetch(request)).await? {
        Outcome::Served(served) => served,
        other => return Err(unexpected(other)),
    };
    let response = served.response;

    let output = FetchOutput {
        url,
        route: served.route,
        status: response.status,
        body: response.text().into_owned(),
        headers: response.headers,
        source: response.source,
    };
    json_result(&output)
}
