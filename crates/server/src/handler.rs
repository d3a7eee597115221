//! MCP server handler implementation.
//!
//! This module defines the main server handler that routes tool calls to
//! the engine. Signal tools go through the engine's dispatcher; the mutation
//! queue and shared payload tools serve the application side.
use std::sync::Arc;

use offgrid_client::Engine;
use rmcp::{
    ErrorData as McpError, ServerHandler,
    handler::server::{
        tool::{ToolCallContext, ToolRouter},
        wrapper::Parameters,
    },
    model::{
        CallToolRequestParam, CallToolResult, Implementation, ListToolsResult, PaginatedRequestParam, ProtocolVersion,
        ServerCapabilities, ServerInfo,
    },
    service::{RequestContext, RoleServer},
    tool, tool_router,
};

use crate::tools::deferred::{
    EnqueueMutationParams, NotificationClickParams, PushParams, SharedPayloadParams, TagParams, enqueue_mutation_impl,
    notification_click_impl, periodic_sync_impl, push_impl, shared_payload_impl, sync_impl,
};
use crate::tools::fetch::{FetchParams, fetch_impl};
use crate::tools::lifecycle::{activate_impl, generations_impl, install_impl};

/// The main MCP server handler for offgrid.
#[derive(Clone)]
pub struct OffgridServer {
    engine: Arc<Engine>,
    tool_router: ToolRouter<Self>,
}

/// Tool router implementation using the #[tool_router] macro.
#[tool_router]
impl OffgridServer {
    pub fn new(engine: Arc<Engine>) -> Self {
        Self { engine, tool_router: Self::tool_router() }
    }

    #[tool(
        description = "Install the current generation: store the offline document and pre-cache the static asset manifest. Activates immediately when skip_waiting is set."
    )]
    async fn install(&self) -> Result<CallToolResult, McpError> {
        install_impl(&self.engine).await
    }

    #[tool(description = "Activate the current generation: delete every other generation and start intercepting requests.")]
    async fn activate(&self) -> Result<CallToolResult, McpError> {
        activate_impl(&self.engine).await
    }

    /// Deliver an intercepted request.
    ///
    /// Returns status, headers, body text, response source and the route taken.
    #[tool(
        description = "Intercept a request. Returns status, headers, body, source (network/cache/offline/synthetic) and route (uncontrolled/share_target/strategy, with the strategy name)."
    )]
    async fn fetch(&self, params: Parameters<FetchParams>) -> Result<CallToolResult, McpError> {
        fetch_impl(&self.engine, params.0).await
    }

    #[tool(description = "Background sync signal. With the configured tag, replays the offline mutation queue.")]
    async fn sync(&self, params: Parameters<TagParams>) -> Result<CallToolResult, McpError> {
        sync_impl(&self.engine, params.0).await
    }

    #[tool(description = "Periodic sync signal. With the configured tag, refreshes the designated resource.")]
    async fn periodic_sync(&self, params: Parameters<TagParams>) -> Result<CallToolResult, McpError> {
        periodic_sync_impl(&self.engine, params.0).await
    }

    #[tool(description = "Push message signal. Renders a notification from the message text.")]
    async fn push(&self, params: Parameters<PushParams>) -> Result<CallToolResult, McpError> {
        push_impl(&self.engine, params.0).await
    }

    #[tool(description = "Notification click signal. Closes the notification and opens the action's target, if any.")]
    async fn notification_click(&self, params: Parameters<NotificationClickParams>) -> Result<CallToolResult, McpError> {
        notification_click_impl(&self.engine, params.0).await
    }

    #[tool(
        description = "Record a state-changing request made while offline. It is resent by the next sync with the configured tag."
    )]
    async fn enqueue_mutation(&self, params: Parameters<EnqueueMutationParams>) -> Result<CallToolResult, McpError> {
        enqueue_mutation_impl(&self.engine, params.0).await
    }

    #[tool(description = "Read the payload left by the last share delivery. Set clear to remove it after reading.")]
    async fn shared_payload(&self, params: Parameters<SharedPayloadParams>) -> Result<CallToolResult, McpError> {
        shared_payload_impl(&self.engine, params.0).await
    }

    #[tool(description = "List store generations, the current generation and the lifecycle state.")]
    async fn generations(&self) -> Result<CallToolResult, McpError> {
        generations_impl(&self.engine).await
    }
}

impl ServerHandler for OffgridServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            server_info: Implementation {
                name: "offgrid".into(),
                version: env!("CARGO_PKG_VERSION").into(),
                ..Default::default()
            },
            protocol_version: ProtocolVersion::LATEST,
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            ..Default::default()
        }
    }

    async fn list_tools(
        &self, _request: Option<PaginatedRequestParam>, _context: RequestContext<RoleServer>,
    ) -> Result<ListToolsResult, rmcp::model::ErrorData> {
        Ok(ListToolsResult { meta: None, tools: self.tool_router.list_all(), next_cursor: None })
    }

    async fn call_tool(
        &self, request: CallToolRequestParam, context: RequestContext<RoleServer>,
    ) -> Result<CallToolResult, rmcp::model::ErrorData> {
        self.tool_router
            .call(ToolCallContext::new(self, request, context))
            .await
    }
}
