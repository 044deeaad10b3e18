//! Request authentication gate.
//!
//! Every gated request names its client in `X-Vault-Client` and carries a
//! signature over that client's registered public key in
//! `X-Vault-Signature`. All failures look the same to the caller.

use std::sync::Arc;

use axum::extract::{Request, State};
use axum::http::HeaderMap;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::GatewayError;
use crate::identity::IdentityResolver;
use crate::signature::SignatureVerifier;

/// Header naming the client.
pub const CLIENT_HEADER: &str = "x-vault-client";
/// Header carrying the base64 signature.
pub const SIGNATURE_HEADER: &str = "x-vault-signature";

/// Identity attached to a request that passed the gate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthenticatedClient {
    /// Client name
    pub name: String,
    /// Correlation id of the request
    pub correlation_id: Uuid,
}

/// Allow/deny decision for one request.
#[derive(Clone)]
pub struct AuthGate {
    resolver: Arc<dyn IdentityResolver>,
    verifier: SignatureVerifier,
}

impl AuthGate {
    /// Creates a gate over `resolver`.
    #[must_use]
    pub fn new(resolver: Arc<dyn IdentityResolver>, verifier: SignatureVerifier) -> Self {
        Self { resolver, verifier }
    }

    /// Resolve the client named in `headers` and verify its signature.
    ///
    /// Missing headers are rejected before the resolver is called. One
    /// attempt only.
    ///
    /// # Errors
    ///
    /// [`GatewayError::MissingHeader`], [`GatewayError::Identity`] or
    /// [`GatewayError::Signature`].
    pub async fn authenticate(&self, headers: &HeaderMap) -> Result<String, GatewayError> {
        let client = header_str(headers, CLIENT_HEADER)?;
        let signature = header_str(headers, SIGNATURE_HEADER)?;

        let identity = self.resolver.get_client(client).await?;
        self.verifier
            .verify_signature(signature, &identity.public_key_pem)?;
        Ok(identity.name)
    }
}

fn header_str<'a>(headers: &'a HeaderMap, name: &'static str) -> Result<&'a str, GatewayError> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty())
        .ok_or(GatewayError::MissingHeader(name))
}

/// Axum middleware running [`AuthGate::authenticate`] before the wrapped
/// handler. On success the request reaches the handler unchanged apart from
/// an [`AuthenticatedClient`] extension.
pub async fn auth_middleware(
    State(gate): State<AuthGate>,
    mut request: Request,
    next: Next,
) -> Response {
    let correlation_id = Uuid::new_v4();
    let client = request
        .headers()
        .get(CLIENT_HEADER)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("")
        .to_string();

    match gate.authenticate(request.headers()).await {
        Ok(name) => {
            info!(%correlation_id, client = %name, "Authenticated client");
            request.extensions_mut().insert(AuthenticatedClient {
                name,
                correlation_id,
            });
            next.run(request).await
        }
        Err(e) => {
            warn!(
                %correlation_id,
                client = %client,
                code = e.code().as_str(),
                error = %e,
                "Rejected request"
            );
            e.into_response()
        }
    }
}
