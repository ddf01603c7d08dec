//! Private key file SSH authentication.

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use russh::{client, keys};
use tracing::debug;

use crate::mcp::session::SshClientHandler;

use super::traits::AuthStrategy;

/// Authenticates with the private key at `key_path`.
///
/// The file is read on every connect so a rotated key is picked up without a
/// restart. Passphrase-protected keys are rejected at load time.
#[derive(Debug)]
pub struct KeyAuth {
    key_path: PathBuf,
}

impl KeyAuth {
    pub fn new(key_path: impl Into<PathBuf>) -> Self {
        Self {
            key_path: key_path.into(),
        }
    }

    fn load_key(&self) -> Result<keys::PrivateKey, String> {
        keys::load_secret_key(&self.key_path, None).map_err(|e| {
            format!(
                "Cannot use private key {}: {}",
                self.key_path.display(),
                e
            )
        })
    }
}

#[async_trait]
impl AuthStrategy for KeyAuth {
    async fn authenticate(
        &self,
        handle: &mut client::Handle<SshClientHandler>,
        username: &str,
    ) -> Result<bool, String> {
        // Load before asking the server anything; a bad key never falls back
        let key = Arc::new(self.load_key()?);

        // Only meaningful for RSA keys; None lets russh pick for the others
        let rsa_hash = match handle.best_supported_rsa_hash().await {
            Ok(negotiated) => negotiated.flatten(),
            Err(e) => {
                debug!("RSA hash negotiation unavailable: {}", e);
                None
            }
        };

        let outcome = handle
            .authenticate_publickey(username, keys::PrivateKeyWithHashAlg::new(key, rsa_hash))
            .await
            .map_err(|e| format!("Public key authentication error: {}", e))?;

        Ok(outcome.success())
    }

    fn name(&self) -> &'static str {
        "key"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_name() {
        assert_eq!(KeyAuth::new("/keys/id_ed25519").name(), "key");
    }

    #[test]
    fn test_missing_key_file_names_the_path() {
        let auth = KeyAuth::new("/nonexistent/gateway/id_ed25519");
        let err = auth.load_key().err().unwrap();
        assert!(err.contains("/nonexistent/gateway/id_ed25519"));
    }

    #[test]
    fn test_garbage_key_file_is_rejected() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "this is not a private key").unwrap();

        let auth = KeyAuth::new(file.path());
        assert!(auth.load_key().is_err());
    }
}
