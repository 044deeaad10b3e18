//! Client identity resolution.
//!
//! The gateway never caches identities; every request resolves the client
//! afresh through an [`IdentityResolver`].

pub mod chef;

use async_trait::async_trait;

use crate::error::IdentityError;

pub use chef::{ChefClient, ChefConfig};

/// A registered client and its public key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientIdentity {
    /// Client name
    pub name: String,
    /// Registered public key, PEM text exactly as stored
    pub public_key_pem: String,
}

/// Resolves a client name to its registered key material.
///
/// Shared by every request task.
#[async_trait]
pub trait IdentityResolver: Send + Sync {
    /// Look up `name`.
    ///
    /// # Errors
    ///
    /// [`IdentityError::NotFound`] if no such client is registered, or
    /// another variant if the directory could not answer.
    async fn get_client(&self, name: &str) -> Result<ClientIdentity, IdentityError>;
}

/// Whether `name` is safe to use as a single URL path segment.
#[must_use]
pub fn is_valid_name(name: &str) -> bool {
    !name.is_empty()
        && name != "."
        && name != ".."
        && name
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || matches!(b, b'_' | b'.' | b'-'))
}
