//! Secret backend abstraction.
//!
//! The gateway only ever talks to Vault through this trait, so request
//! handling and credential renewal can be exercised against test doubles.

use crate::error::VaultResult;
use crate::secrets::{SecretData, TokenCreateRequest, TokenLookup, TokenRenewal};
use async_trait::async_trait;
use secrecy::SecretString;

/// Operations the gateway needs from the secret-management backend.
///
/// Implementations are shared between every request task and the renewal
/// loop, so they must tolerate concurrent calls.
#[async_trait]
pub trait SecretBackend: Send + Sync {
    /// Read the secret stored at `path`.
    async fn read_secret(&self, path: &str) -> VaultResult<SecretData>;

    /// Create a token scoped to `role`, returning the new client token.
    async fn issue_token_with_role(
        &self,
        request: &TokenCreateRequest,
        role: &str,
    ) -> VaultResult<SecretString>;

    /// Look up the backend client's own token.
    async fn lookup_self(&self) -> VaultResult<TokenLookup>;

    /// Renew the backend client's own token by `increment_secs`.
    async fn renew_self(&self, increment_secs: u64) -> VaultResult<TokenRenewal>;

    /// Exchange a response-wrapping token for the token it wraps.
    ///
    /// A token the backend does not recognise as wrapped is returned
    /// unchanged; only a failure to reach the backend is an error.
    async fn unwrap_token(&self, token: &SecretString) -> VaultResult<SecretString>;
}
