//! One-shot remote execution sessions.
//!
//! A [`TransportSession`] is one authenticated connection that runs exactly
//! one command and is then closed. The lifecycle is encoded in ownership:
//!
//! 1. [`TransportSession::connect`] authenticates through a [`Transport`].
//! 2. [`TransportSession::execute`] consumes the session, starts the command,
//!    drains its output and closes the connection before returning, on the
//!    success path and on every failure path.
//!
//! A consumed session cannot run a second command or be closed twice. A
//! session dropped before `execute` finishes (the caller went away) is closed
//! from a background task instead.
//!
//! Remote output is pulled as tagged [`OutputEvent`]s until the `Closed`
//! event. stdout and stderr are accumulated into separate bounded buffers.

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::mcp::config::ConnectionConfig;
use crate::mcp::error::GatewayError;
use crate::mcp::types::ExecutionResult;

/// One unit of output from a running remote command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutputEvent {
    Stdout(Vec<u8>),
    Stderr(Vec<u8>),
    /// The channel closed. No further events follow.
    Closed {
        exit_code: Option<u32>,
        signal: Option<String>,
    },
}

/// An authenticated connection able to run one command.
#[async_trait]
pub trait RemoteSession: Send {
    /// Start `command` on the remote host.
    async fn exec(&mut self, command: &str) -> Result<(), GatewayError>;

    /// Next output event. `None` means the channel vanished without a close
    /// event; implementations should prefer returning `Closed`.
    async fn next_event(&mut self) -> Option<Result<OutputEvent, GatewayError>>;

    /// Tear down the connection.
    async fn close(&mut self) -> Result<(), GatewayError>;
}

/// Factory for authenticated sessions.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Open and authenticate a connection. Any failure is a
    /// [`GatewayError::Connection`]; no partially open connection survives it.
    async fn connect(
        &self,
        config: &ConnectionConfig,
    ) -> Result<Box<dyn RemoteSession>, GatewayError>;
}

/// Accumulates stdout and stderr independently, dropping bytes past the cap.
#[derive(Debug)]
pub struct OutputCollector {
    limit: usize,
    stdout: Vec<u8>,
    stderr: Vec<u8>,
    stdout_truncated: bool,
    stderr_truncated: bool,
}

impl OutputCollector {
    /// Create a collector keeping at most `limit` bytes per stream.
    pub fn new(limit: usize) -> Self {
        Self {
            limit,
            stdout: Vec::with_capacity(limit.min(4096)),
            stderr: Vec::with_capacity(limit.min(1024)),
            stdout_truncated: false,
            stderr_truncated: false,
        }
    }

    pub fn push_stdout(&mut self, data: &[u8]) {
        self.stdout_truncated |= append_bounded(&mut self.stdout, data, self.limit);
    }

    pub fn push_stderr(&mut self, data: &[u8]) {
        self.stderr_truncated |= append_bounded(&mut self.stderr, data, self.limit);
    }

    /// Finish with the exit status carried by the close event.
    pub fn finish(self, exit_code: Option<u32>, signal: Option<String>) -> ExecutionResult {
        ExecutionResult {
            stdout: self.stdout,
            stderr: self.stderr,
            exit_code: exit_code.map(i64::from).unwrap_or(-1),
            signal,
            stdout_truncated: self.stdout_truncated,
            stderr_truncated: self.stderr_truncated,
        }
    }
}

/// Append as much of `data` as fits. Returns true if anything was dropped.
fn append_bounded(buf: &mut Vec<u8>, data: &[u8], limit: usize) -> bool {
    let room = limit.saturating_sub(buf.len());
    if data.len() <= room {
        buf.extend_from_slice(data);
        false
    } else {
        buf.extend_from_slice(&data[..room]);
        true
    }
}

/// Drain `session` until its close event.
async fn drain(
    session: &mut dyn RemoteSession,
    mut collector: OutputCollector,
) -> Result<ExecutionResult, GatewayError> {
    loop {
        match session.next_event().await {
            Some(Ok(OutputEvent::Stdout(data))) => collector.push_stdout(&data),
            Some(Ok(OutputEvent::Stderr(data))) => collector.push_stderr(&data),
            Some(Ok(OutputEvent::Closed { exit_code, signal })) => {
                return Ok(collector.finish(exit_code, signal));
            }
            Some(Err(e)) => return Err(e),
            None => {
                debug!("Channel ended without a close event");
                return Ok(collector.finish(None, None));
            }
        }
    }
}

/// A connected, not yet used, remote session.
pub struct TransportSession {
    /// `None` once closed.
    inner: Option<Box<dyn RemoteSession>>,
    output_limit: usize,
}

impl TransportSession {
    /// Authenticate a new session. Nothing needs closing if this fails.
    pub async fn connect(
        transport: &dyn Transport,
        config: &ConnectionConfig,
        output_limit: usize,
    ) -> Result<Self, GatewayError> {
        let inner = transport.connect(config).await?;
        Ok(Self {
            inner: Some(inner),
            output_limit,
        })
    }

    /// Run `command`, collect its output and close the session.
    pub async fn execute(mut self, command: &str) -> Result<ExecutionResult, GatewayError> {
        let outcome = match self.inner.as_mut() {
            Some(inner) => match inner.exec(command).await {
                Ok(()) => drain(inner.as_mut(), OutputCollector::new(self.output_limit)).await,
                Err(e) => Err(e),
            },
            None => Err(GatewayError::Execution("session already closed".to_string())),
        };

        if let Some(mut inner) = self.inner.take()
            && let Err(e) = inner.close().await
        {
            warn!("Error while closing SSH session: {}", e);
        }

        outcome
    }
}

impl Drop for TransportSession {
    fn drop(&mut self) {
        let Some(mut inner) = self.inner.take() else {
            return;
        };
        match tokio::runtime::Handle::try_current() {
            Ok(runtime) => {
                debug!("Session abandoned before completion, closing in background");
                runtime.spawn(async move {
                    if let Err(e) = inner.close().await {
                        warn!("Error while closing abandoned SSH session: {}", e);
                    }
                });
            }
            Err(_) => warn!("Session dropped outside a runtime; connection torn down on drop"),
        }
    }
}
