//! Vault error types using thiserror 2.0.
//!
//! Provides Vault-specific errors with retryability classification.

use thiserror::Error;

/// Vault-specific errors.
#[derive(Error, Debug)]
pub enum VaultError {
    /// Vault server unavailable (transport failure or 5xx)
    #[error("Vault unavailable: {0}")]
    Unavailable(String),

    /// Secret not found
    #[error("Secret not found at path: {0}")]
    SecretNotFound(String),

    /// Permission denied
    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    /// Rate limited
    #[error("Rate limited")]
    RateLimited,

    /// Vault rejected the request (any other non-2xx status)
    #[error("Vault rejected request with status {status}: {message}")]
    Rejected {
        /// HTTP status code
        status: u16,
        /// Joined `errors` list from the response body
        message: String,
    },

    /// Response body did not match the expected schema
    #[error("Unexpected Vault response format: {0}")]
    ResponseFormat(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// HTTP client error
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Result type for Vault operations.
pub type VaultResult<T> = Result<T, VaultError>;

impl VaultError {
    /// Whether Vault looked at the request and refused it, as opposed to
    /// never answering.
    #[must_use]
    pub const fn is_rejection(&self) -> bool {
        matches!(
            self,
            Self::Rejected { .. } | Self::PermissionDenied(_) | Self::SecretNotFound(_)
        )
    }

    /// Create an unavailable error.
    #[must_use]
    pub fn unavailable(msg: impl Into<String>) -> Self {
        Self::Unavailable(msg.into())
    }

    /// Create a secret not found error.
    #[must_use]
    pub fn not_found(path: impl Into<String>) -> Self {
        Self::SecretNotFound(path.into())
    }

    /// Create a response format error.
    #[must_use]
    pub fn format(msg: impl Into<String>) -> Self {
        Self::ResponseFormat(msg.into())
    }
}
