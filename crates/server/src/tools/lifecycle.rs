//! install, activate and generations tools.

use rmcp::{ErrorData as McpError, model::CallToolResult};
use serde::Serialize;

use offgrid_client::{Engine, InstallOutcome, Lifecycle, Outcome, Signal};

use super::{json_result, unexpected};

/// Output from the generations tool.
#[derive(Debug, Clone, Serialize)]
pub struct GenerationsOutput {
    /// Generation the engine serves from.
    pub current: String,
    /// Every generation present in the store.
    pub generations: Vec<String>,
    pub lifecycle: Lifecycle,
}

pub async fn install_impl(engine: &Engine) -> Result<CallToolResult, McpError> {
    match engine.dispatch(Signal::Install).await? {
        Outcome::Installed { install, activation } => json_result(&InstallOutcome { install, activation }),
        other => Err(unexpected(other)),
    }
}

pub async fn activate_impl(engine: &Engine) -> Result<CallToolResult, McpError> {
    match engine.dispatch(Signal::Activate).await? {
        Outcome::Activated(report) => json_result(&report),
        other => Err(unexpected(other)),
    }
}

pub async fn generations_impl(engine: &Engine) -> Result<CallToolResult, McpError> {
    let output = GenerationsOutput {
        current: engine.config().generation.clone(),
        generations: engine.generations().await?,
        lifecycle: engine.lifecycle().await,
    };
    json_result(&output)
}
