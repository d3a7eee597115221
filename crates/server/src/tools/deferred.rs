//! Deferred-work tools: sync, periodic_sync, push, notification_click,
//! plus the mutation queue and shared payload the application side uses.

use std::collections::BTreeMap;

use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use offgrid_client::{Engine, Outcome, RefreshOutcome, ReplayReport, SharedPayload, Signal};
use offgrid_core::request::resolve;
use offgrid_core::{Error, Request};

use super::{json_result, unexpected};

/// Parameters shared by the sync and periodic_sync tools.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct TagParams {
    /// Task tag carried by the wake-up signal.
    pub tag: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct PushParams {
    /// Message text; omitted or empty uses the default body.
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct NotificationClickParams {
    /// Tag of the clicked notification.
    pub tag: String,
    /// Identifier of the clicked action button.
    pub action: String,
}

/// A state-changing request recorded while offline.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct EnqueueMutationParams {
    /// Absolute URL, or a path resolved against the configured origin.
    pub url: String,

    /// HTTP method (default: POST).
    #[serde(default = "default_mutation_method")]
    pub method: String,

    #[serde(default)]
    pub headers: BTreeMap<String, String>,

    /// Request body, sent as UTF-8.
    #[serde(default)]
    pub body: Option<String>,
}

fn default_mutation_method() -> String {
    "POST".into()
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct SharedPayloadParams {
    /// Remove the payload after reading it.
    #[serde(default)]
    pub clear: bool,
}

/// Output from the sync tool.
#[derive(Debug, Clone, Serialize)]
pub struct SyncOutput {
    pub tag: String,
    /// False when the tag is not the configured sync tag.
    pub handled: bool,
    pub report: Option<ReplayReport>,
}

/// Output from the periodic_sync tool.
#[derive(Debug, Clone, Serialize)]
pub struct PeriodicSyncOutput {
    pub tag: String,
    pub handled: bool,
    pub refresh: Option<RefreshOutcome>,
}

/// Output from the notification_click tool.
#[derive(Debug, Clone, Serialize)]
pub struct NotificationClickOutput {
    pub closed: String,
    pub opened: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct EnqueueMutationOutput {
    /// Store key of the queued entry.
    pub key: String,
    /// Entries now waiting for the next sync.
    pub queued: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct SharedPayloadOutput {
    pub payload: Option<SharedPayload>,
    pub cleared: bool,
}

pub async fn sync_impl(engine: &Engine, params: TagParams) -> Result<CallToolResult, McpError> {
    match engine.dispatch(Signal::Sync(params.tag.clone())).await? {
        Outcome::Replayed(report) => json_result(&SyncOutput { tag: params.tag, handled: report.is_some(), report }),
        other => Err(unexpected(other)),
    }
}

pub async fn periodic_sync_impl(engine: &Engine, params: TagParams) -> Result<CallToolResult, McpError> {
    match engine.dispatch(Signal::PeriodicSync(params.tag.clone())).await? {
        Outcome::Refreshed(refresh) => {
            json_result(&PeriodicSyncOutput { tag: params.tag, handled: refresh.is_some(), refresh })
        }
        other => Err(unexpected(other)),
    }
}

pub async fn push_impl(engine: &Engine, params: PushParams) -> Result<CallToolResult, McpError> {
    match engine.dispatch(Signal::Push(params.message.map(String::into_bytes))).await? {
        Outcome::Notified(notification) => json_result(&notification),
        other => Err(unexpected(other)),
    }
}

pub async fn notification_click_impl(
    engine: &Engine, params: NotificationClickParams,
) -> Result<CallToolResult, McpError> {
    let signal = Signal::NotificationClick { tag: params.tag.clone(), action: params.action };
    match engine.dispatch(signal).await? {
        Outcome::Clicked(opened) => {
            json_result(&NotificationClickOutput { closed: params.tag, opened: opened.map(String::from) })
        }
        other => Err(unexpected(other)),
    }
}

pub async fn enqueue_mutation_impl(
    engine: &Engine, params: EnqueueMutationParams,
) -> Result<CallToolResult, McpError> {
    if params.method.trim().is_empty() || !params.method.chars().all(|c| c.is_ascii_alphabetic()) {
        return Err(Error::InvalidInput(format!("unsupported method: {}", params.method)).into());
    }
    if params.method.eq_ignore_ascii_case("GET") || params.method.eq_ignore_ascii_case("HEAD") {
        return Err(Error::InvalidInput(format!("{} requests are not mutations", params.method)).into());
    }

    let url = resolve(engine.classifier().origin(), &params.url).map_err(|e| Error::InvalidUrl(e.to_string()))?;
    let mut request = Request::new(&params.method, url);
    for (name, value) in params.headers {
        request = request.with_header(&name, value);
    }
    if let Some(body) = params.body {
        request = request.with_body(body.into_bytes());
    }

    let coordinator = engine.coordinator();
    let key = coordinator.enqueue_mutation(&request).await?;
    let queued = coordinator.queued_mutations().await?.len();
    json_result(&EnqueueMutationOutput { key, queued })
}

pub async fn shared_payload_impl(engine: &Engine, params: SharedPayloadParams) -> Result<CallToolResult, McpError> {
    let coordinator = engine.coordinator();
    let payload = coordinator.read_shared_payload().await?;
    let cleared = if params.clear { coordinator.clear_shared_payload().await? } else { false };
    json_result(&SharedPayloadOutput { payload, cleared })
}
