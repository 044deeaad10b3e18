//! HashiCorp Vault client for the keygate token gateway.
//!
//! Exposes the [`SecretBackend`] operations the gateway needs (secret reads,
//! role-scoped token creation, self lookup/renewal, response unwrapping) with
//! typed response schemas validated at the boundary.

pub mod client;
pub mod config;
pub mod error;
pub mod provider;
pub mod secrets;

pub use client::VaultClient;
pub use config::VaultConfig;
pub use error::{VaultError, VaultResult};
pub use provider::SecretBackend;
pub use secrets::{
    SecretData, ServerCertificate, SigningKey, TokenCreateRequest, TokenLookup, TokenRenewal,
};
