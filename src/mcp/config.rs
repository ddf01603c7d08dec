//! Process-wide configuration for the SSH gateway.
//!
//! Everything here is resolved exactly once at startup and shared read-only
//! afterwards. Identity fields (host, port, username) fail loudly when missing
//! or malformed; tuning knobs fall back to their defaults.
//!
//! # Environment Variables
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | `SSH_HOST` | required | Remote host |
//! | `SSH_PORT` | 22 | Remote port |
//! | `SSH_USERNAME` | required | Login user |
//! | `SSH_KEY_PATH` | unset | Private key file, read at connect time |
//! | `SSH_PASSWORD` | unset | Fallback password |
//! | `SSH_CONNECT_TIMEOUT` | 30s | Connect and handshake timeout in seconds |
//! | `SSH_COMPRESSION` | true | Offer zlib compression |
//! | `SSH_MAX_OUTPUT_BYTES` | 1 MiB | Per-stream output capture cap |
//! | `SSH_MAX_CONCURRENT_SESSIONS` | 8 | Upper bound on simultaneously open sessions |

use std::env;
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;
use tracing::warn;

/// Default SSH port
pub(crate) const DEFAULT_SSH_PORT: u16 = 22;

/// Default SSH connection timeout in seconds
pub(crate) const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 30;

/// Default per-stream output cap in bytes (1 MiB)
pub(crate) const DEFAULT_MAX_OUTPUT_BYTES: usize = 1024 * 1024;

/// Default bound on concurrently open sessions
pub(crate) const DEFAULT_MAX_CONCURRENT_SESSIONS: usize = 8;

/// Keepalive interval for open sessions
pub(crate) const KEEPALIVE_INTERVAL: Duration = Duration::from_secs(30);

/// Missed keepalives before the connection is considered dead
pub(crate) const KEEPALIVE_MAX: usize = 3;

pub(crate) const HOST_ENV_VAR: &str = "SSH_HOST";
pub(crate) const PORT_ENV_VAR: &str = "SSH_PORT";
pub(crate) const USERNAME_ENV_VAR: &str = "SSH_USERNAME";
pub(crate) const KEY_PATH_ENV_VAR: &str = "SSH_KEY_PATH";
pub(crate) const PASSWORD_ENV_VAR: &str = "SSH_PASSWORD";
pub(crate) const CONNECT_TIMEOUT_ENV_VAR: &str = "SSH_CONNECT_TIMEOUT";
pub(crate) const COMPRESSION_ENV_VAR: &str = "SSH_COMPRESSION";
pub(crate) const MAX_OUTPUT_BYTES_ENV_VAR: &str = "SSH_MAX_OUTPUT_BYTES";
pub(crate) const MAX_CONCURRENT_SESSIONS_ENV_VAR: &str = "SSH_MAX_CONCURRENT_SESSIONS";

/// Startup configuration failure. The process refuses to start on any of these.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("required environment variable {0} is not set")]
    MissingVar(&'static str),

    #[error("invalid value '{value}' for {var}: {reason}")]
    InvalidValue {
        var: &'static str,
        value: String,
        reason: String,
    },

    #[error("failed to load policy file {path}: {message}")]
    PolicyFile { path: String, message: String },

    #[error("policy table '{table}' contains an empty entry at position {index}")]
    EmptyPolicyEntry { table: &'static str, index: usize },
}

/// Connection parameters for the single configured remote host.
///
/// Never derived from tool arguments. Shared behind an `Arc` by every session.
#[derive(Clone)]
pub struct ConnectionConfig {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub key_path: Option<PathBuf>,
    pub password: Option<String>,
    pub connect_timeout: Duration,
    pub compression: bool,
}

impl fmt::Debug for ConnectionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("key_path", &self.key_path)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("connect_timeout", &self.connect_timeout)
            .field("compression", &self.compression)
            .finish()
    }
}

impl ConnectionConfig {
    /// Load from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let host = required(&lookup, HOST_ENV_VAR)?;
        let username = required(&lookup, USERNAME_ENV_VAR)?;

        let port = match non_empty(&lookup, PORT_ENV_VAR) {
            Some(raw) => raw
                .trim()
                .parse::<u16>()
                .map_err(|e| ConfigError::InvalidValue {
                    var: PORT_ENV_VAR,
                    value: raw.clone(),
                    reason: e.to_string(),
                })?,
            None => DEFAULT_SSH_PORT,
        };

        Ok(Self {
            host,
            port,
            username,
            key_path: non_empty(&lookup, KEY_PATH_ENV_VAR).map(PathBuf::from),
            password: non_empty(&lookup, PASSWORD_ENV_VAR),
            connect_timeout: resolve_connect_timeout(&lookup),
            compression: resolve_compression(&lookup),
        })
    }

    /// `host:port` form used in log lines.
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Resource bounds applied by the dispatcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GatewaySettings {
    /// Per-stream capture cap; bytes beyond it are dropped and flagged.
    pub max_output_bytes: usize,
    /// Maximum number of sessions open at the same time.
    pub max_concurrent_sessions: usize,
}

impl Default for GatewaySettings {
    fn default() -> Self {
        Self {
            max_output_bytes: DEFAULT_MAX_OUTPUT_BYTES,
            max_concurrent_sessions: DEFAULT_MAX_CONCURRENT_SESSIONS,
        }
    }
}

impl GatewaySettings {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        Self {
            max_output_bytes: resolve_max_output_bytes(&lookup),
            max_concurrent_sessions: resolve_max_concurrent_sessions(&lookup),
        }
    }
}

fn required<F>(lookup: &F, var: &'static str) -> Result<String, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    non_empty(lookup, var).ok_or(ConfigError::MissingVar(var))
}

/// Empty strings count as unset.
fn non_empty<F>(lookup: &F, var: &str) -> Option<String>
where
    F: Fn(&str) -> Option<String>,
{
    lookup(var).filter(|v| !v.trim().is_empty())
}

/// Parse a tuning knob, falling back to `default` when unset or unparsable.
fn parse_or_default<F, T>(lookup: &F, var: &str, default: T) -> T
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr + Copy,
{
    match non_empty(lookup, var) {
        Some(raw) => match raw.trim().parse::<T>() {
            Ok(value) => value,
            Err(_) => {
                warn!("Ignoring invalid value '{}' for {}", raw, var);
                default
            }
        },
        None => default,
    }
}

/// Resolve the connection timeout with priority: env var -> default
pub(crate) fn resolve_connect_timeout<F>(lookup: &F) -> Duration
where
    F: Fn(&str) -> Option<String>,
{
    Duration::from_secs(parse_or_default(
        lookup,
        CONNECT_TIMEOUT_ENV_VAR,
        DEFAULT_CONNECT_TIMEOUT_SECS,
    ))
}

/// Resolve the compression setting with priority: env var -> default (true)
pub(crate) fn resolve_compression<F>(lookup: &F) -> bool
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(COMPRESSION_ENV_VAR) {
        Some(raw) => raw.eq_ignore_ascii_case("true") || raw == "1",
        None => true,
    }
}

/// Resolve the per-stream output cap with priority: env var -> default
pub(crate) fn resolve_max_output_bytes<F>(lookup: &F) -> usize
where
    F: Fn(&str) -> Option<String>,
{
    parse_or_default(lookup, MAX_OUTPUT_BYTES_ENV_VAR, DEFAULT_MAX_OUTPUT_BYTES)
}

/// Resolve the open-session bound with priority: env var -> default. Zero is
/// rejected since it would block every command forever.
pub(crate) fn resolve_max_concurrent_sessions<F>(lookup: &F) -> usize
where
    F: Fn(&str) -> Option<String>,
{
    match parse_or_default(
        lookup,
        MAX_CONCURRENT_SESSIONS_ENV_VAR,
        DEFAULT_MAX_CONCURRENT_SESSIONS,
    ) {
        0 => {
            warn!(
                "{} must be at least 1, using default {}",
                MAX_CONCURRENT_SESSIONS_ENV_VAR, DEFAULT_MAX_CONCURRENT_SESSIONS
            );
            DEFAULT_MAX_CONCURRENT_SESSIONS
        }
        n => n,
    }
}
