//! russh client handler used by every gateway session.
//!
//! - `SshClientHandler`: accepts all host keys (similar to
//!   `StrictHostKeyChecking=no` in OpenSSH). The remote host is fixed by
//!   process configuration, never by tool arguments.
//!
//! Unlike a pooled client, the `client::Handle<SshClientHandler>` is owned by
//! exactly one [`crate::mcp::client::SshRemoteSession`] and dropped with it.

use russh::{client, keys};
use tracing::debug;

/// Client handler for russh that accepts all host keys.
///
/// # Security Note
///
/// Host key pinning against a known_hosts file is not implemented; the
/// gateway trusts the network path to the configured host.
pub struct SshClientHandler;

impl client::Handler for SshClientHandler {
    type Error = russh::Error;

    async fn check_server_key(
        &mut self,
        _server_public_key: &keys::PublicKey,
    ) -> Result<bool, Self::Error> {
        debug!("Accepting server host key");
        Ok(true)
    }
}
