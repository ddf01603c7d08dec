//! russh-backed [`Transport`] implementation.
//!
//! ## Connection Lifecycle
//!
//! 1. **Strategy selection**: pick key or password auth from the configuration.
//!    Without either, fail before opening a socket.
//! 2. **Client configuration**: keepalive and compression settings; no
//!    inactivity timeout, so quiet long-running commands are not cut off.
//! 3. **Connection establishment**: TCP connect and key exchange, bounded by
//!    the configured connect timeout.
//! 4. **Authentication**: a rejected or failed attempt disconnects the
//!    half-open connection before the error is returned.
//! 5. **Command execution**: one session channel, one `exec` request. Channel
//!    messages are surfaced as [`OutputEvent`]s; `ExtendedData` with `ext == 1`
//!    is stderr.
//!
//! No step is retried.

use std::sync::Arc;

use async_trait::async_trait;
use russh::{Channel, ChannelMsg, Disconnect, Sig, client};
use tracing::{debug, info, warn};

use crate::mcp::auth::select_strategy;
use crate::mcp::config::{ConnectionConfig, KEEPALIVE_INTERVAL, KEEPALIVE_MAX};
use crate::mcp::error::GatewayError;
use crate::mcp::session::SshClientHandler;
use crate::mcp::transport::{OutputEvent, RemoteSession, Transport};

/// Build russh client configuration.
///
/// Creates an `Arc<client::Config>` with:
/// - No inactivity timeout (the gateway models no command timeout)
/// - Keepalive every [`KEEPALIVE_INTERVAL`], giving up after [`KEEPALIVE_MAX`] misses
/// - Compression preference based on `compress` (ZLIB if enabled, NONE if disabled)
pub(crate) fn build_client_config(compress: bool) -> Arc<client::Config> {
    let compression = if compress {
        (&[russh::compression::ZLIB, russh::compression::NONE][..]).into()
    } else {
        (&[russh::compression::NONE][..]).into()
    };

    let preferred = russh::Preferred {
        compression,
        ..Default::default()
    };

    Arc::new(client::Config {
        inactivity_timeout: None,
        keepalive_interval: Some(KEEPALIVE_INTERVAL),
        keepalive_max: KEEPALIVE_MAX,
        preferred,
        ..Default::default()
    })
}

/// Human-readable name of a termination signal.
fn signal_label(sig: &Sig) -> String {
    match sig {
        Sig::Custom(name) => name.clone(),
        other => format!("{:?}", other),
    }
}

/// Opens real SSH connections.
#[derive(Debug, Default, Clone, Copy)]
pub struct SshTransport;

#[async_trait]
impl Transport for SshTransport {
    async fn connect(
        &self,
        config: &ConnectionConfig,
    ) -> Result<Box<dyn RemoteSession>, GatewayError> {
        // Never open a socket without credentials
        let strategy = select_strategy(config)?;

        let address = config.address();
        info!(
            "Connecting to {}@{} using {} authentication",
            config.username,
            address,
            strategy.name()
        );

        let client_config = build_client_config(config.compression);
        let connect_future = client::connect(
            client_config,
            (config.host.as_str(), config.port),
            SshClientHandler,
        );

        let mut handle = tokio::time::timeout(config.connect_timeout, connect_future)
            .await
            .map_err(|_| {
                GatewayError::Connection(format!(
                    "Connection to {} timed out after {:?}",
                    address, config.connect_timeout
                ))
            })?
            .map_err(|e| GatewayError::Connection(format!("Failed to connect to {}: {}", address, e)))?;

        let failure = match strategy.authenticate(&mut handle, &config.username).await {
            Ok(true) => None,
            Ok(false) => Some(format!(
                "Authentication failed: {} credentials rejected for user '{}'",
                strategy.name(),
                config.username
            )),
            Err(e) => Some(e),
        };

        if let Some(message) = failure {
            warn!("SSH authentication to {} failed: {}", address, message);
            if let Err(e) = handle
                .disconnect(Disconnect::ByApplication, "authentication failed", "en")
                .await
            {
                debug!("Error while disconnecting unauthenticated connection: {}", e);
            }
            return Err(GatewayError::Connection(message));
        }

        debug!("Authenticated to {} as {}", address, config.username);
        Ok(Box::new(SshRemoteSession::new(handle)))
    }
}

/// One authenticated SSH connection with at most one exec channel.
pub struct SshRemoteSession {
    handle: client::Handle<SshClientHandler>,
    channel: Option<Channel<client::Msg>>,
    exit_code: Option<u32>,
    signal: Option<String>,
    finished: bool,
}

impl SshRemoteSession {
    fn new(handle: client::Handle<SshClientHandler>) -> Self {
        Self {
            handle,
            channel: None,
            exit_code: None,
            signal: None,
            finished: false,
        }
    }
}

#[async_trait]
impl RemoteSession for SshRemoteSession {
    async fn exec(&mut self, command: &str) -> Result<(), GatewayError> {
        let channel = self
            .handle
            .channel_open_session()
            .await
            .map_err(|e| GatewayError::Execution(format!("Failed to open channel: {}", e)))?;

        channel
            .exec(true, command)
            .await
            .map_err(|e| GatewayError::Execution(format!("Failed to execute command: {}", e)))?;

        self.channel = Some(channel);
        Ok(())
    }

    async fn next_event(&mut self) -> Option<Result<OutputEvent, GatewayError>> {
        if self.finished {
            return None;
        }
        let channel = self.channel.as_mut()?;

        loop {
            match channel.wait().await {
                Some(ChannelMsg::Data { data }) => {
                    return Some(Ok(OutputEvent::Stdout(data.to_vec())));
                }
                Some(ChannelMsg::ExtendedData { data, ext }) => {
                    // ext == 1 is stderr in SSH protocol
                    if ext == 1 {
                        return Some(Ok(OutputEvent::Stderr(data.to_vec())));
                    }
                }
                Some(ChannelMsg::ExitStatus { exit_status }) => {
                    self.exit_code = Some(exit_status);
                }
                Some(ChannelMsg::ExitSignal { signal_name, .. }) => {
                    self.signal = Some(signal_label(&signal_name));
                }
                Some(ChannelMsg::Eof) => {
                    // Exit status may still follow EOF
                    if self.exit_code.is_some() {
                        break;
                    }
                }
                Some(ChannelMsg::Close) | None => break,
                Some(_) => {}
            }
        }

        self.finished = true;
        Some(Ok(OutputEvent::Closed {
            exit_code: self.exit_code,
            signal: self.signal.take(),
        }))
    }

    async fn close(&mut self) -> Result<(), GatewayError> {
        if let Some(channel) = self.channel.take() {
            let _ = channel.close().await;
        }
        self.handle
            .disconnect(Disconnect::ByApplication, "command finished", "en")
            .await
            .map_err(|e| GatewayError::Execution(format!("Failed to disconnect: {}", e)))
    }
}
