//! Application context and HTTP router.

use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::middleware::from_fn_with_state;
use axum::routing::post;
use keygate_vault_client::SecretBackend;
use tower::ServiceBuilder;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use crate::gate::{AuthGate, auth_middleware};
use crate::identity::IdentityResolver;
use crate::issuer::{TokenIssuer, issue_token};
use crate::signature::SignatureVerifier;

/// Collaborators shared by every request, built once at startup.
#[derive(Clone)]
pub struct AppContext {
    /// Authentication gate
    pub gate: AuthGate,
    /// Token issuer
    pub issuer: TokenIssuer,
}

impl AppContext {
    /// Wire the gate and issuer from their collaborators.
    #[must_use]
    pub fn new(
        resolver: Arc<dyn IdentityResolver>,
        backend: Arc<dyn SecretBackend>,
        verifier: SignatureVerifier,
    ) -> Self {
        Self {
            gate: AuthGate::new(resolver, verifier),
            issuer: TokenIssuer::new(backend),
        }
    }
}

/// The gateway router.
///
/// Only `POST /token/issue/{role}` is gated; unknown paths and wrong methods
/// are answered without authentication.
pub fn router(ctx: AppContext, request_timeout: Duration) -> Router {
    let gated = post(issue_token).route_layer(from_fn_with_state(ctx.gate.clone(), auth_middleware));

    Router::new()
        .route("/token/issue/:role", gated)
        .with_state(ctx)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(TimeoutLayer::new(request_timeout))
                .layer(CatchPanicLayer::new()),
        )
}
