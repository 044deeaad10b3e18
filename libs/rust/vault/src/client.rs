//! Vault HTTP client.

use crate::{
    config::VaultConfig,
    error::{VaultError, VaultResult},
    provider::SecretBackend,
    secrets::{
        AuthResponse, ErrorBody, LookupSelfResponse, ReadResponse, SecretData,
        TokenCreateRequest, TokenLookup, TokenRenewal,
    },
};
use async_trait::async_trait;
use reqwest::{Client, Method};
use rust_common::{HttpConfig, build_http_client};
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{debug, info, instrument, warn};
use url::Url;

const TOKEN_HEADER: &str = "X-Vault-Token";

/// Vault client authenticated with a single token.
///
/// The token is read by every request and replaced only at startup, after
/// a wrapped token has been exchanged.
pub struct VaultClient {
    base: Url,
    http: Client,
    token: RwLock<SecretString>,
}

impl VaultClient {
    /// Create a new Vault client.
    ///
    /// # Errors
    ///
    /// Returns an error if the address is not a URL or the HTTP client
    /// cannot be built.
    pub fn new(config: VaultConfig) -> VaultResult<Self> {
        let base = Url::parse(&config.addr)
            .map_err(|e| VaultError::InvalidConfig(format!("address {}: {e}", config.addr)))?;

        if config.skip_verify {
            warn!(addr = %base, "TLS verification disabled for Vault");
        }

        let http_config = HttpConfig::default()
            .with_timeout(config.timeout)
            .with_tls_verification(!config.skip_verify);
        let http = build_http_client(&http_config)?;

        Ok(Self {
            base,
            http,
            token: RwLock::new(config.token),
        })
    }

    /// Replace the token used for every subsequent request.
    pub async fn set_token(&self, token: SecretString) {
        *self.token.write().await = token;
    }

    fn url(&self, path: &str) -> String {
        format!(
            "{}/v1/{}",
            self.base.as_str().trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }

    async fn request<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        body: Option<serde_json::Value>,
    ) -> VaultResult<T> {
        let token = self.token.read().await.clone();
        self.send(method, path, body, &token).await
    }

    async fn send<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        body: Option<serde_json::Value>,
        token: &SecretString,
    ) -> VaultResult<T> {
        let mut request = self
            .http
            .request(method, self.url(path))
            .header(TOKEN_HEADER, token.expose_secret());

        if let Some(b) = body {
            request = request.json(&b);
        }

        let response = request
            .send()
            .await
            .map_err(|e| VaultError::unavailable(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(status_error(status.as_u16(), path, &text));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| VaultError::unavailable(e.to_string()))?;
        serde_json::from_slice(&bytes).map_err(|e| VaultError::format(format!("{path}: {e}")))
    }
}

fn status_error(status: u16, path: &str, body: &str) -> VaultError {
    let message = serde_json::from_str::<ErrorBody>(body)
        .map_or_else(|_| body.trim().to_string(), |b| b.errors.join("; "));

    match status {
        404 => VaultError::not_found(path),
        403 => VaultError::PermissionDenied(path.to_string()),
        429 => VaultError::RateLimited,
        s if s >= 500 => VaultError::unavailable(format!("Status {s}: {message}")),
        s => VaultError::Rejected { status: s, message },
    }
}

#[async_trait]
impl SecretBackend for VaultClient {
    #[instrument(skip(self))]
    async fn read_secret(&self, path: &str) -> VaultResult<SecretData> {
        debug!(path, "Reading secret");

        let response: ReadResponse = self.request(Method::GET, path, None).await?;
        let data = response
            .data
            .ok_or_else(|| VaultError::format(format!("secret at {path} has no data")))?;

        Ok(SecretData {
            path: path.to_string(),
            data,
            lease_duration: Duration::from_secs(response.lease_duration),
            renewable: response.renewable,
        })
    }

    #[instrument(skip(self, request))]
    async fn issue_token_with_role(
        &self,
        request: &TokenCreateRequest,
        role: &str,
    ) -> VaultResult<SecretString> {
        let body = serde_json::to_value(request)?;
        let response: AuthResponse = self
            .request(Method::POST, &format!("auth/token/create/{role}"), Some(body))
            .await?;

        let auth = response
            .auth
            .ok_or_else(|| VaultError::format("token create response has no auth"))?;
        debug!(role, lease_secs = auth.lease_duration, "Issued role token");
        Ok(auth.client_token)
    }

    #[instrument(skip(self))]
    async fn lookup_self(&self) -> VaultResult<TokenLookup> {
        let response: LookupSelfResponse = self
            .request(Method::GET, "auth/token/lookup-self", None)
            .await?;
        response.into_lookup()
    }

    #[instrument(skip(self))]
    async fn renew_self(&self, increment_secs: u64) -> VaultResult<TokenRenewal> {
        let body = serde_json::json!({ "increment": increment_secs });
        let response: AuthResponse = self
            .request(Method::POST, "auth/token/renew-self", Some(body))
            .await?;

        let auth = response
            .auth
            .ok_or_else(|| VaultError::format("renew-self response has no auth"))?;
        Ok(TokenRenewal {
            lease_duration: Duration::from_secs(auth.lease_duration),
            renewable: auth.renewable,
        })
    }

    #[instrument(skip(self, token))]
    async fn unwrap_token(&self, token: &SecretString) -> VaultResult<SecretString> {
        let result: VaultResult<AuthResponse> = self
            .send(Method::PUT, "sys/wrapping/unwrap", None, token)
            .await;

        match result {
            Ok(AuthResponse { auth: Some(auth) }) => {
                info!("Unwrapped Vault token");
                Ok(auth.client_token)
            }
            Ok(AuthResponse { auth: None }) => {
                debug!("Wrapped response carries no token, using token as is");
                Ok(token.clone())
            }
            Err(e) if e.is_rejection() => {
                debug!(error = %e, "Token is not a wrapping token, using it as is");
                Ok(token.clone())
            }
            Err(e) => Err(e),
        }
    }
}
