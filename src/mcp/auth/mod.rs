//! Authentication strategies for gateway sessions.
//!
//! Exactly one strategy is selected per connection, with strict precedence:
//!
//! 1. [`KeyAuth`] when a private key path is configured
//! 2. [`PasswordAuth`] when a password is configured
//! 3. Otherwise the connection is refused before any network I/O
//!
//! A configured key that fails is never followed by a password attempt.

mod key;
mod password;
mod traits;

pub use key::KeyAuth;
pub use password::PasswordAuth;
pub use traits::AuthStrategy;

use crate::mcp::config::ConnectionConfig;
use crate::mcp::error::GatewayError;

/// Pick the single authentication strategy for `config`.
pub fn select_strategy(config: &ConnectionConfig) -> Result<Box<dyn AuthStrategy>, GatewayError> {
    if let Some(key_path) = &config.key_path {
        return Ok(Box::new(KeyAuth::new(key_path.clone())));
    }
    if let Some(password) = &config.password {
        return Ok(Box::new(PasswordAuth::new(password.clone())));
    }
    Err(GatewayError::Connection(
        "no authentication material configured (set SSH_KEY_PATH or SSH_PASSWORD)".to_string(),
    ))
}
