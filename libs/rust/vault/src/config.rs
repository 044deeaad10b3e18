//! Vault client configuration.

use secrecy::SecretString;
use std::time::Duration;

/// Vault client configuration.
#[derive(Debug, Clone)]
pub struct VaultConfig {
    /// Vault server address, e.g. `https://127.0.0.1:8200`
    pub addr: String,
    /// Initial client token; may be a response-wrapping token
    pub token: SecretString,
    /// Skip TLS verification of the Vault endpoint
    pub skip_verify: bool,
    /// Request timeout
    pub timeout: Duration,
}

impl Default for VaultConfig {
    fn default() -> Self {
        Self {
            addr: "https://127.0.0.1:8200".to_string(),
            token: SecretString::from(String::new()),
            skip_verify: false,
            timeout: Duration::from_secs(30),
        }
    }
}

impl VaultConfig {
    /// Create a new configuration.
    #[must_use]
    pub fn new(addr: impl Into<String>, token: SecretString) -> Self {
        Self {
            addr: addr.into(),
            token,
            ..Default::default()
        }
    }

    /// Set request timeout.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Enable or disable skipping TLS verification.
    #[must_use]
    pub const fn with_skip_verify(mut self, skip_verify: bool) -> Self {
        self.skip_verify = skip_verify;
        self
    }
}
