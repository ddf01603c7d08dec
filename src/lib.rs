//! SSH command gateway for the Model Context Protocol.
//!
//! Exposes a fixed set of read-only commands on one configured host to MCP
//! clients, over streamable HTTP (`ssh-manager`) or stdio (`ssh-manager-stdio`).

pub mod mcp;
