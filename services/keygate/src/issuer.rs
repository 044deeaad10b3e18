//! Role-scoped token issuance.

use std::sync::Arc;

use axum::Extension;
use axum::body::Bytes;
use axum::extract::{Path, State};
use keygate_vault_client::{SecretBackend, TokenCreateRequest};
use secrecy::{ExposeSecret, SecretString};
use tracing::{info, warn};

use crate::app::AppContext;
use crate::error::{GatewayError, IssuanceError};
use crate::gate::AuthenticatedClient;
use crate::identity::is_valid_name;

/// Issues tokens from the secret backend.
///
/// The token is returned exactly as the backend produced it.
#[derive(Clone)]
pub struct TokenIssuer {
    backend: Arc<dyn SecretBackend>,
}

impl TokenIssuer {
    /// Creates an issuer over `backend`.
    #[must_use]
    pub fn new(backend: Arc<dyn SecretBackend>) -> Self {
        Self { backend }
    }

    /// Issue a token for `role`, passing `request` through unchanged.
    ///
    /// # Errors
    ///
    /// [`IssuanceError::InvalidRole`] if `role` is not a single safe path
    /// segment (the backend is not called), or [`IssuanceError::Backend`].
    pub async fn issue(
        &self,
        request: &TokenCreateRequest,
        role: &str,
    ) -> Result<SecretString, IssuanceError> {
        if !is_valid_name(role) {
            return Err(IssuanceError::InvalidRole(role.to_string()));
        }
        Ok(self.backend.issue_token_with_role(request, role).await?)
    }
}

/// `POST /token/issue/{role}`: body is a token-creation request, response
/// is the issued token as plain text.
///
/// # Errors
///
/// [`GatewayError::MalformedBody`] or [`GatewayError::Issuance`], both 400.
pub async fn issue_token(
    State(ctx): State<AppContext>,
    Path(role): Path<String>,
    client: Option<Extension<AuthenticatedClient>>,
    body: Bytes,
) -> Result<String, GatewayError> {
    let (client, correlation_id) = client.map_or_else(
        || (String::new(), None),
        |Extension(c)| (c.name, Some(c.correlation_id)),
    );

    let request: TokenCreateRequest = serde_json::from_slice(&body).map_err(|e| {
        warn!(?correlation_id, %client, %role, error = %e, "Failed to decode token request");
        GatewayError::MalformedBody(e)
    })?;

    match ctx.issuer.issue(&request, &role).await {
        Ok(token) => {
            info!(?correlation_id, %client, %role, "Issued token");
            Ok(token.expose_secret().to_string())
        }
        Err(e) => {
            warn!(
                ?correlation_id,
                %client,
                %role,
                code = e.code().as_str(),
                error = %e,
                "Failed to issue token"
            );
            Err(e.into())
        }
    }
}
