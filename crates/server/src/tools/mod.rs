//! MCP tool implementations.
//!
//! Each tool delivers one lifecycle signal to the engine and answers once
//! the engine's handler has finished.

pub mod deferred;
pub mod fetch;
pub mod lifecycle;

use rmcp::{
    ErrorData as McpError,
    model::{CallToolResult, Content},
};
use serde::Serialize;

use offgrid_client::Outcome;
use offgrid_core::Error;

/// Error for an outcome that does not answer the signal that was sent.
pub(crate) fn unexpected(outcome: Outcome) -> McpError {
    McpError::internal_error(format!("signal answered with unexpected outcome: {outcome:?}"), None)
}

/// Wrap a serializable output as pretty JSON text content.
pub(crate) fn json_result<T: Serialize>(output: &T) -> Result<CallToolResult, McpError> {
    let json = serde_json::to_string_pretty(output)
        .map_err(|e| Error::InvalidInput(format!("Failed to serialize output: {e}")))?;
    Ok(CallToolResult::success(vec![Content::text(json)]))
}
