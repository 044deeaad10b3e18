//! Startup orchestration.
//!
//! Builds every collaborator in order and reports the first failure as a
//! [`StartupError`]. Nothing here exits the process; `main` decides.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum_server::Handle;
use axum_server::tls_openssl::OpenSSLConfig;
use keygate_vault_client::{SecretBackend, ServerCertificate, SigningKey, VaultClient};
use openssl::ssl::SslAcceptor;
use secrecy::ExposeSecret;
use tracing::{info, warn};

use crate::app::{AppContext, router};
use crate::config::Config;
use crate::error::StartupError;
use crate::identity::{ChefClient, ChefConfig};
use crate::renewal::RenewalLoop;
use crate::shutdown::{ShutdownCoordinator, run_with_graceful_shutdown};
use crate::signature::SignatureVerifier;
use crate::tls::{TlsPolicy, parse_key_pair};

/// A fully built gateway, not yet listening.
pub struct Gateway {
    /// Request-path collaborators
    pub context: AppContext,
    /// Listener TLS acceptor
    pub tls: SslAcceptor,
    /// Renewal loop to spawn, if the token expires and renewal is enabled
    pub renewal: Option<RenewalLoop>,
}

/// Build the gateway from `config`.
///
/// Order: unwrap the Vault token, read the Chef key, build the Chef client,
/// read and parse the listener certificate, then look up the token for
/// renewal.
///
/// # Errors
///
/// Any failure in that sequence.
pub async fn bootstrap(config: &Config) -> Result<Gateway, StartupError> {
    let vault = VaultClient::new(config.vault_config())?;

    match vault.unwrap_token(&config.vault_token).await {
        Ok(token) => vault.set_token(token).await,
        Err(e) => warn!(error = %e, "Could not unwrap Vault token, using it as is"),
    }

    let chef_key: SigningKey = vault
        .read_secret(&config.secret_chef_pem_path)
        .await?
        .decode()?;
    let chef = ChefClient::new(
        ChefConfig::new(
            config.chef_server.clone(),
            &config.chef_client_name,
            chef_key.key,
        )
        .with_tls_verification(config.chef_verify_tls)
        .with_timeout(config.backend_timeout()),
    )?;
    info!(server = %config.chef_server, client = chef.client_name(), "Chef client ready");

    let certificate: ServerCertificate = vault
        .read_secret(&config.secret_cert_path)
        .await?
        .decode()?;
    let pair = parse_key_pair(&certificate.cert, certificate.key.expose_secret())?;
    let tls = TlsPolicy::default().acceptor(&pair)?;
    info!(path = %config.secret_cert_path, "Loaded listener certificate");

    let backend: Arc<dyn SecretBackend> = Arc::new(vault);

    let renewal = if config.renew_token {
        RenewalLoop::start(Arc::clone(&backend)).await?
    } else {
        info!("Skipping Vault token renewal");
        None
    };

    Ok(Gateway {
        context: AppContext::new(Arc::new(chef), backend, SignatureVerifier::new()),
        tls,
        renewal,
    })
}

impl Gateway {
    /// Serve on `addr` until a shutdown signal, with renewal running in the
    /// background.
    ///
    /// # Errors
    ///
    /// Returns an error if the listener fails.
    pub async fn serve(
        self,
        addr: SocketAddr,
        request_timeout: Duration,
        shutdown_timeout: Duration,
    ) -> std::io::Result<()> {
        let mut coordinator = ShutdownCoordinator::new();
        if let Some(renewal) = self.renewal {
            let token = coordinator.token();
            coordinator.spawn("token-renewal", renewal.run(token));
        }

        let app = router(self.context, request_timeout);
        let handle = Handle::new();
        let server = axum_server::bind_openssl(addr, OpenSSLConfig::from_acceptor(Arc::new(self.tls)))
            .handle(handle.clone())
            .serve(app.into_make_service());

        info!(%addr, "Listening");
        run_with_graceful_shutdown(server, handle, coordinator, shutdown_timeout).await
    }
}
