//! Error handling module with type-safe, non-exhaustive error types
//!
//! This module provides:
//! - One error enum per pipeline stage (signature, identity, issuance, renewal, startup)
//! - A stable [`ErrorCode`] for every failure, used as a structured log field
//! - Client-facing rendering that never carries backend or verification detail

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use keygate_vault_client::VaultError;
use thiserror::Error;

use crate::config::ConfigError;
use crate::tls::TlsError;

/// Body of every authentication failure.
pub const UNAUTHORIZED_BODY: &str = "Unauthorized";
/// Body returned when the token request is not valid JSON.
pub const MALFORMED_BODY: &str = "Failed to decode request body";
/// Body returned when the backend refuses to issue a token.
pub const ISSUANCE_FAILED_BODY: &str = "Failed to create token from role";

/// Which step of signature verification failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailureKind {
    /// The registered key could not be parsed
    KeyFormat,
    /// The supplied signature was not valid base64
    Base64Decode,
    /// The signature did not match the key
    SignatureInvalid,
}

/// Signature verification errors.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SignatureError {
    /// No PEM block, not a SubjectPublicKeyInfo, not RSA, or too short
    #[error("Public key format error: {reason}")]
    KeyFormat {
        /// What was wrong with the key
        reason: String,
    },

    /// Signature is not standard padded base64
    #[error("Signature is not valid base64: {reason}")]
    Base64Decode {
        /// Decoder message
        reason: String,
    },

    /// Cryptographic mismatch
    #[error("Signature does not match public key")]
    SignatureInvalid,
}

impl SignatureError {
    pub(crate) fn key_format(reason: impl Into<String>) -> Self {
        Self::KeyFormat {
            reason: reason.into(),
        }
    }

    /// The failure kind, without detail.
    #[must_use]
    pub const fn kind(&self) -> FailureKind {
        match self {
            Self::KeyFormat { .. } => FailureKind::KeyFormat,
            Self::Base64Decode { .. } => FailureKind::Base64Decode,
            Self::SignatureInvalid => FailureKind::SignatureInvalid,
        }
    }
}

/// Identity directory errors.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum IdentityError {
    /// No client registered under this name
    #[error("Client not found: {0}")]
    NotFound(String),

    /// Directory could not be reached or answered 5xx
    #[error("Identity directory unavailable: {0}")]
    Unavailable(String),

    /// Directory refused the request
    #[error("Identity directory rejected request with status {status}")]
    Rejected {
        /// HTTP status code
        status: u16,
    },

    /// Response body did not match the client schema
    #[error("Unexpected identity directory response: {0}")]
    ResponseFormat(String),

    /// The gateway's own signing key is unusable
    #[error("Request signing failed: {0}")]
    Signing(String),

    /// Invalid directory configuration
    #[error("Invalid identity directory configuration: {0}")]
    InvalidConfig(String),
}

/// Token issuance errors.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum IssuanceError {
    /// Role is not a single safe path segment
    #[error("Invalid role name: {0:?}")]
    InvalidRole(String),

    /// Secret backend failed or refused
    #[error("Secret backend failed to issue token: {0}")]
    Backend(#[from] VaultError),
}

/// Errors on the request path.
///
/// Rendered to the client as a status code and a fixed message only.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum GatewayError {
    /// Identity or signature header absent or not text
    #[error("Missing or unreadable header {0}")]
    MissingHeader(&'static str),

    /// Client lookup failed
    #[error(transparent)]
    Identity(#[from] IdentityError),

    /// Signature check failed
    #[error(transparent)]
    Signature(#[from] SignatureError),

    /// Request body was not a token-creation request
    #[error("Malformed request body: {0}")]
    MalformedBody(#[from] serde_json::Error),

    /// Token could not be issued
    #[error(transparent)]
    Issuance(#[from] IssuanceError),
}

/// Credential renewal errors.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum RenewalError {
    /// Initial lookup-self failed; the loop cannot start
    #[error("Failed to look up gateway token: {0}")]
    Lookup(#[source] VaultError),

    /// One renew-self cycle failed
    #[error("Failed to renew gateway token: {0}")]
    Attempt(#[source] VaultError),
}

/// Errors that stop the process before it serves.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum StartupError {
    /// Configuration could not be loaded
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// A backend client could not be constructed or reached
    #[error("Secret backend error: {0}")]
    Backend(#[from] VaultError),

    /// Identity directory client could not be constructed
    #[error(transparent)]
    Identity(#[from] IdentityError),

    /// Listener certificate or TLS policy is unusable
    #[error(transparent)]
    Tls(#[from] TlsError),

    /// Renewal loop could not start
    #[error(transparent)]
    Renewal(#[from] RenewalError),
}

/// Stable error codes for structured logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    MissingCredentials,
    IdentityNotFound,
    IdentityUnavailable,
    KeyFormat,
    SignatureEncoding,
    SignatureInvalid,
    MalformedBody,
    InvalidRole,
    IssuanceFailed,
    BackendResponseFormat,
    RenewalLookup,
    RenewalAttempt,
    Config,
    Certificate,
    BackendUnavailable,
}

impl ErrorCode {
    /// Get the string representation of the error code
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::MissingCredentials => "AUTH_MISSING_CREDENTIALS",
            Self::IdentityNotFound => "AUTH_IDENTITY_NOT_FOUND",
            Self::IdentityUnavailable => "AUTH_IDENTITY_UNAVAILABLE",
            Self::KeyFormat => "AUTH_KEY_FORMAT",
            Self::SignatureEncoding => "AUTH_SIGNATURE_ENCODING",
            Self::SignatureInvalid => "AUTH_SIGNATURE_INVALID",
            Self::MalformedBody => "ISSUE_BODY_MALFORMED",
            Self::InvalidRole => "ISSUE_ROLE_INVALID",
            Self::IssuanceFailed => "ISSUE_FAILED",
            Self::BackendResponseFormat => "BACKEND_RESPONSE_FORMAT",
            Self::RenewalLookup => "RENEWAL_LOOKUP_FAILED",
            Self::RenewalAttempt => "RENEWAL_ATTEMPT_FAILED",
            Self::Config => "CONFIG_INVALID",
            Self::Certificate => "CERTIFICATE_INVALID",
            Self::BackendUnavailable => "BACKEND_UNAVAILABLE",
        }
    }

    /// HTTP status for request-path codes.
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        match self {
            Self::MissingCredentials
            | Self::IdentityNotFound
            | Self::IdentityUnavailable
            | Self::KeyFormat
            | Self::SignatureEncoding
            | Self::SignatureInvalid => StatusCode::UNAUTHORIZED,
            Self::MalformedBody | Self::InvalidRole | Self::IssuanceFailed => {
                StatusCode::BAD_REQUEST
            }
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<FailureKind> for ErrorCode {
    fn from(kind: FailureKind) -> Self {
        match kind {
            FailureKind::KeyFormat => Self::KeyFormat,
            FailureKind::Base64Decode => Self::SignatureEncoding,
            FailureKind::SignatureInvalid => Self::SignatureInvalid,
        }
    }
}

impl IdentityError {
    /// Get the error code for this error
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::NotFound(_) => ErrorCode::IdentityNotFound,
            Self::ResponseFormat(_) => ErrorCode::BackendResponseFormat,
            Self::Unavailable(_)
            | Self::Rejected { .. }
            | Self::Signing(_)
            | Self::InvalidConfig(_) => ErrorCode::IdentityUnavailable,
        }
    }
}

impl IssuanceError {
    /// Get the error code for this error
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::InvalidRole(_) => ErrorCode::InvalidRole,
            Self::Backend(VaultError::ResponseFormat(_)) => ErrorCode::BackendResponseFormat,
            Self::Backend(_) => ErrorCode::IssuanceFailed,
        }
    }
}

impl GatewayError {
    /// Get the error code for this error
    #[must_use]
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::MissingHeader(_) => ErrorCode::MissingCredentials,
            Self::Identity(e) => e.code(),
            Self::Signature(e) => e.kind().into(),
            Self::MalformedBody(_) => ErrorCode::MalformedBody,
            Self::Issuance(e) => e.code(),
        }
    }

    /// Status code shown to the client.
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        match self {
            Self::MissingHeader(_) | Self::Identity(_) | Self::Signature(_) => {
                StatusCode::UNAUTHORIZED
            }
            Self::MalformedBody(_) | Self::Issuance(_) => StatusCode::BAD_REQUEST,
        }
    }

    /// Fixed message shown to the client.
    #[must_use]
    pub const fn public_message(&self) -> &'static str {
        match self {
            Self::MissingHeader(_) | Self::Identity(_) | Self::Signature(_) => UNAUTHORIZED_BODY,
            Self::MalformedBody(_) => MALFORMED_BODY,
            Self::Issuance(_) => ISSUANCE_FAILED_BODY,
        }
    }
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        (self.status(), self.public_message()).into_response()
    }
}

impl RenewalError {
    /// Get the error code for this error
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::Lookup(VaultError::ResponseFormat(_))
            | Self::Attempt(VaultError::ResponseFormat(_)) => ErrorCode::BackendResponseFormat,
            Self::Lookup(_) => ErrorCode::RenewalLookup,
            Self::Attempt(_) => ErrorCode::RenewalAttempt,
        }
    }
}

impl StartupError {
    /// Get the error code for this error
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::Config(_) => ErrorCode::Config,
            Self::Backend(VaultError::ResponseFormat(_)) => ErrorCode::BackendResponseFormat,
            Self::Backend(_) => ErrorCode::BackendUnavailable,
            Self::Identity(e) => e.code(),
            Self::Tls(_) => ErrorCode::Certificate,
            Self::Renewal(e) => e.code(),
        }
    }
}
