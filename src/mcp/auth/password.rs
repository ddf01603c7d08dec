//! Password-based SSH authentication.

use std::fmt;

use async_trait::async_trait;
use russh::client;

use crate::mcp::session::SshClientHandler;

use super::traits::AuthStrategy;

/// Password authentication, selected only when no key is configured.
pub struct PasswordAuth {
    password: String,
}

impl PasswordAuth {
    pub fn new(password: impl Into<String>) -> Self {
        Self {
            password: password.into(),
        }
    }
}

impl fmt::Debug for PasswordAuth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PasswordAuth")
            .field("password", &"<redacted>")
            .finish()
    }
}

#[async_trait]
impl AuthStrategy for PasswordAuth {
    async fn authenticate(
        &self,
        handle: &mut client::Handle<SshClientHandler>,
        username: &str,
    ) -> Result<bool, String> {
        handle
            .authenticate_password(username, self.password.as_str())
            .await
            .map(|outcome| outcome.success())
            .map_err(|e| format!("Password authentication error: {}", e))
    }

    fn name(&self) -> &'static str {
        "password"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_name() {
        assert_eq!(PasswordAuth::new("hunter2").name(), "password");
    }

    #[test]
    fn test_debug_never_shows_password() {
        let rendered = format!("{:?}", PasswordAuth::new("hunter2"));
        assert!(!rendered.contains("hunter2"));
        assert!(rendered.contains("<redacted>"));
    }
}
