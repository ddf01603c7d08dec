//! Error taxonomy for the command gateway.
//!
//! Every per-invocation failure is represented by a [`GatewayError`] variant and
//! converted into an error response at the dispatcher boundary. Nothing here is
//! fatal to the process; startup failures live in [`crate::mcp::config::ConfigError`].
//!
//! # Categories
//!
//! 1. **Policy violations**: the command missed the allow-list or tripped a
//!    deny pattern. No network activity has happened.
//! 2. **Connection errors**: missing credentials, unreachable host, rejected
//!    credentials, handshake failure. Never retried.
//! 3. **Execution errors**: the connection was established but the channel
//!    could not be opened or the command could not be started.
//!
//! A remote command that exits nonzero or dies from a signal is *not* an error;
//! it is reported as data inside a successful response.

use thiserror::Error;

/// Failure of a single tool invocation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GatewayError {
    /// Rejected by the policy engine.
    #[error("Security Block: {0}")]
    PolicyViolation(String),

    /// Could not establish an authenticated connection.
    #[error("SSH Connection Failed: {0}")]
    Connection(String),

    /// Connected, but the remote channel failed before the command finished.
    #[error("SSH Execution Failed: {0}")]
    Execution(String),

    /// The invocation named a tool this server does not expose.
    #[error("Unknown tool: {0}")]
    UnknownTool(String),

    /// The invocation arguments did not match the tool's contract.
    #[error("Invalid arguments: {0}")]
    InvalidArguments(String),
}

impl GatewayError {
    /// Whether the failure happened before any network activity.
    pub fn is_pre_network(&self) -> bool {
        matches!(
            self,
            GatewayError::PolicyViolation(_)
                | GatewayError::UnknownTool(_)
                | GatewayError::InvalidArguments(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    mod display {
        use super::*;

        #[test]
        fn test_policy_violation_has_security_block_prefix() {
            let err = GatewayError::PolicyViolation("empty command".to_string());
            assert_eq!(err.to_string(), "Security Block: empty command");
        }

        #[test]
        fn test_connection_error_message() {
            let err = GatewayError::Connection("Connection refused".to_string());
            assert_eq!(err.to_string(), "SSH Connection Failed: Connection refused");
        }

        #[test]
        fn test_execution_error_message() {
            let err = GatewayError::Execution("Failed to open channel".to_string());
            assert!(err.to_string().starts_with("SSH Execution Failed"));
        }

        #[test]
        fn test_unknown_tool_names_the_tool() {
            let err = GatewayError::UnknownTool("rm_everything".to_string());
            assert_eq!(err.to_string(), "Unknown tool: rm_everything");
        }
    }

    mod classification {
        use super::*;

        #[test]
        fn test_policy_and_argument_errors_are_pre_network() {
            assert!(GatewayError::PolicyViolation(String::new()).is_pre_network());
            assert!(GatewayError::UnknownTool(String::new()).is_pre_network());
            assert!(GatewayError::InvalidArguments(String::new()).is_pre_network());
        }

        #[test]
        fn test_transport_errors_are_not_pre_network() {
            assert!(!GatewayError::Connection(String::new()).is_pre_network());
            assert!(!GatewayError::Execution(String::new()).is_pre_network());
        }
    }
}
