#![deny(warnings)]
#![deny(clippy::unwrap_used)]

use std::sync::Arc;

use dotenv::dotenv;
use poem_mcpserver::McpServer;
use ssh_manager::mcp::{GatewayDispatcher, McpSshManager};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv().ok();

    // stdout carries the protocol; logs go to stderr
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("info".parse()?),
        )
        .init();

    let dispatcher = Arc::new(GatewayDispatcher::from_env()?);
    poem_mcpserver::stdio::stdio(McpServer::new().tools(McpSshManager::new(dispatcher))).await?;
    Ok(())
}
