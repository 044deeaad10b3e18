//! keygate - TLS gateway issuing scoped Vault tokens to Chef clients.
//!
//! A client names itself in `X-Vault-Client` and signs its own registered
//! public key in `X-Vault-Signature`. The gateway resolves the key from the
//! Chef server, verifies the signature, and issues a role-scoped Vault token.
//! Its own Vault token is kept alive by a background renewal loop.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod app;
pub mod config;
pub mod error;
pub mod gate;
pub mod identity;
pub mod issuer;
pub mod renewal;
pub mod shutdown;
pub mod signature;
pub mod startup;
pub mod tls;

pub use app::{AppContext, router};
pub use config::{Config, ConfigError};
pub use error::{
    ErrorCode, FailureKind, GatewayError, IdentityError, IssuanceError, RenewalError,
    SignatureError, StartupError,
};
pub use gate::{AuthGate, AuthenticatedClient, auth_middleware};
pub use identity::{ChefClient, ChefConfig, ClientIdentity, IdentityResolver};
pub use issuer::TokenIssuer;
pub use renewal::{Lease, RenewalLoop};
pub use signature::{SignatureVerifier, VerificationOutcome};
pub use startup::{Gateway, bootstrap};
pub use tls::{TlsError, TlsPolicy};
