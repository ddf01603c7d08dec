//! MCP tool surface for the command gateway.
//!
//! Two tools are exposed:
//!
//! - `run_command`: validate a command against the policy and run it on the
//!   configured host
//! - `list_allowed_commands`: describe the active policy

use std::sync::Arc;

use poem_mcpserver::{Tools, content::Text};

use super::dispatcher::GatewayDispatcher;
use super::types::ToolResponse;

/// MCP tool implementation backed by a shared [`GatewayDispatcher`].
///
/// Cheap to clone; every MCP session gets its own handle onto the same
/// policy, connection settings and session limiter.
#[derive(Clone)]
pub struct McpSshManager {
    dispatcher: Arc<GatewayDispatcher>,
}

impl McpSshManager {
    pub fn new(dispatcher: Arc<GatewayDispatcher>) -> Self {
        Self { dispatcher }
    }
}

#[Tools]
impl McpSshManager {
    /// Execute a read-only command on the remote server.
    ///
    /// The command must start with an allowed prefix (see
    /// `list_allowed_commands`) and must not contain shell operators such as
    /// pipes, redirects or command chaining. Each call opens a fresh SSH
    /// session that is closed once the command finishes.
    async fn run_command(
        &self,
        /// The command to execute (e.g., 'docker logs my-app')
        command: String,
    ) -> Result<Text<String>, String> {
        into_tool_result(self.dispatcher.run_command(&command).await)
    }

    /// List the command prefixes that may be executed and the patterns that
    /// are always blocked.
    async fn list_allowed_commands(&self) -> Text<String> {
        Text(self.dispatcher.list_allowed_commands().joined_text())
    }
}

/// Map the dispatcher envelope onto the MCP tool result.
fn into_tool_result(response: ToolResponse) -> Result<Text<String>, String> {
    if response.is_error {
        Err(response.joined_text())
    } else {
        Ok(Text(response.joined_text()))
    }
}
