//! Read-only SSH command gateway exposed as MCP tools.
//!
//! This module is organized into the following submodules:
//!
//! - `policy`: Allow-list and deny-pattern evaluation of command strings
//! - `transport`: Session lifecycle and output collection over a pluggable transport
//! - `client`: russh-backed transport implementation
//! - `auth`: Key and password authentication strategies
//! - `dispatcher`: Tool routing, policy gate and response building
//! - `commands`: MCP tool implementations
//! - `config`: Startup configuration from environment variables
//! - `error`: Per-invocation error taxonomy
//! - `message`: Response text builders
//! - `types`: Response envelope and execution result types

pub(crate) mod auth;
pub(crate) mod client;
pub mod commands;
pub mod config;
pub mod dispatcher;
pub mod error;
pub(crate) mod message;
pub mod policy;
pub(crate) mod session;
pub mod transport;
pub mod types;

pub use commands::McpSshManager;
pub use dispatcher::GatewayDispatcher;
