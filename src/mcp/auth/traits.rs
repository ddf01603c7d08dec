//! The seam between connection setup and credential handling.

use async_trait::async_trait;
use russh::client;

use crate::mcp::session::SshClientHandler;

/// One way of proving identity to the remote host.
///
/// Exactly one strategy runs per connection; see
/// [`select_strategy`](super::select_strategy).
#[async_trait]
pub trait AuthStrategy: Send + Sync {
    /// `Ok(false)` means the server rejected the credentials. `Err` means the
    /// attempt itself failed (unreadable key, protocol error).
    async fn authenticate(
        &self,
        handle: &mut client::Handle<SshClientHandler>,
        username: &str,
    ) -> Result<bool, String>;

    /// Strategy name for logs.
    fn name(&self) -> &'static str;
}
