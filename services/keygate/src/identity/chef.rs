//! Chef server client.
//!
//! Fetches client records (`GET clients/{name}`) and signs every request
//! with the gateway's own client key using Chef authentication protocol 1.3.

use std::time::Duration;

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use chrono::{DateTime, Utc};
use reqwest::header::{ACCEPT, HeaderMap, HeaderName, HeaderValue};
use reqwest::{Client, Method, StatusCode};
use ring::rand::SystemRandom;
use ring::signature::{RSA_PKCS1_SHA256, RsaKeyPair};
use rust_common::{HttpConfig, build_http_client};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use sha2::{Digest, Sha256};
use tracing::{debug, instrument, warn};
use url::Url;

use super::{ClientIdentity, IdentityResolver, is_valid_name};
use crate::error::IdentityError;

/// Chef server API version requested.
pub const SERVER_API_VERSION: &str = "0";
/// Chef client version announced.
pub const CHEF_VERSION: &str = "14.0.0";
/// Authentication protocol version.
pub const SIGN_VERSION: &str = "version=1.3";

const AUTHORIZATION_CHUNK: usize = 60;

/// Chef client configuration.
#[derive(Debug, Clone)]
pub struct ChefConfig {
    /// Server base URL, usually `https://host/organizations/<org>/`
    pub base_url: Url,
    /// Name the gateway signs as
    pub client_name: String,
    /// PEM private key (PKCS#1 or PKCS#8)
    pub key: SecretString,
    /// Verify the server certificate
    pub verify_tls: bool,
    /// Request timeout
    pub timeout: Duration,
}

impl ChefConfig {
    /// Create a new configuration.
    #[must_use]
    pub fn new(base_url: Url, client_name: impl Into<String>, key: SecretString) -> Self {
        Self {
            base_url,
            client_name: client_name.into(),
            key,
            verify_tls: true,
            timeout: Duration::from_secs(30),
        }
    }

    /// Enable or disable certificate verification.
    #[must_use]
    pub const fn with_tls_verification(mut self, verify: bool) -> Self {
        self.verify_tls = verify;
        self
    }

    /// Set request timeout.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

#[derive(Debug, Deserialize)]
struct ApiClient {
    #[serde(default)]
    public_key: Option<String>,
}

/// Signs requests as one Chef client.
struct RequestSigner {
    user_id: String,
    key: RsaKeyPair,
    rng: SystemRandom,
}

impl RequestSigner {
    fn from_pem(user_id: String, pem_text: &str) -> Result<Self, IdentityError> {
        let block = pem::parse(pem_text)
            .map_err(|e| IdentityError::Signing(format!("client key is not PEM: {e}")))?;

        let key = match block.tag() {
            "RSA PRIVATE KEY" => RsaKeyPair::from_der(block.contents()),
            "PRIVATE KEY" => RsaKeyPair::from_pkcs8(block.contents()),
            other => {
                return Err(IdentityError::Signing(format!(
                    "unsupported client key type {other}"
                )));
            }
        }
        .map_err(|e| IdentityError::Signing(format!("client key rejected: {e}")))?;

        Ok(Self {
            user_id,
            key,
            rng: SystemRandom::new(),
        })
    }

    fn sign(&self, message: &[u8]) -> Result<String, IdentityError> {
        let mut signature = vec![0; self.key.public().modulus_len()];
        self.key
            .sign(&RSA_PKCS1_SHA256, &self.rng, message, &mut signature)
            .map_err(|_| IdentityError::Signing("RSA signing failed".to_string()))?;
        Ok(STANDARD.encode(signature))
    }

    fn headers(
        &self,
        method: &Method,
        path: &str,
        body: &[u8],
        timestamp: DateTime<Utc>,
    ) -> Result<HeaderMap, IdentityError> {
        let timestamp = format_timestamp(timestamp);
        let content_hash = content_hash(body);
        let canonical = canonical_request(
            method.as_str(),
            &canonical_path(path),
            &content_hash,
            &timestamp,
            &self.user_id,
        );
        let signature = self.sign(canonical.as_bytes())?;

        let mut headers = HeaderMap::new();
        insert(&mut headers, "x-ops-sign", SIGN_VERSION)?;
        insert(&mut headers, "x-ops-userid", &self.user_id)?;
        insert(&mut headers, "x-ops-timestamp", &timestamp)?;
        insert(&mut headers, "x-ops-content-hash", &content_hash)?;
        insert(&mut headers, "x-ops-server-api-version", SERVER_API_VERSION)?;
        insert(&mut headers, "x-chef-version", CHEF_VERSION)?;
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

        for (index, chunk) in authorization_chunks(&signature).enumerate() {
            insert(
                &mut headers,
                &format!("x-ops-authorization-{}", index + 1),
                chunk,
            )?;
        }
        Ok(headers)
    }
}

fn insert(headers: &mut HeaderMap, name: &str, value: &str) -> Result<(), IdentityError> {
    let name = HeaderName::from_bytes(name.as_bytes())
        .map_err(|e| IdentityError::Signing(format!("header name {name}: {e}")))?;
    let value = HeaderValue::from_str(value)
        .map_err(|e| IdentityError::Signing(format!("header {name}: {e}")))?;
    headers.insert(name, value);
    Ok(())
}

/// Chef server client.
pub struct ChefClient {
    base_url: Url,
    signer: RequestSigner,
    http: Client,
}

impl ChefClient {
    /// Creates a client that signs as `config.client_name`.
    ///
    /// # Errors
    ///
    /// Returns an error if the key cannot be used for signing or the HTTP
    /// client cannot be built.
    pub fn new(config: ChefConfig) -> Result<Self, IdentityError> {
        let mut base_url = config.base_url;
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }

        if !config.verify_tls {
            warn!(server = %base_url, "TLS verification disabled for Chef server");
        }

        let signer = RequestSigner::from_pem(config.client_name, config.key.expose_secret())?;
        let http = build_http_client(
            &HttpConfig::default()
                .with_timeout(config.timeout)
                .with_tls_verification(config.verify_tls),
        )
        .map_err(|e| IdentityError::InvalidConfig(e.to_string()))?;

        Ok(Self {
            base_url,
            signer,
            http,
        })
    }

    /// Name the client signs as.
    #[must_use]
    pub fn client_name(&self) -> &str {
        &self.signer.user_id
    }

    async fn get(&self, relative: &str) -> Result<Option<Vec<u8>>, IdentityError> {
        let url = self
            .base_url
            .join(relative)
            .map_err(|e| IdentityError::InvalidConfig(format!("{relative}: {e}")))?;
        let headers = self
            .signer
            .headers(&Method::GET, url.path(), b"", Utc::now())?;

        let response = self
            .http
            .get(url)
            .headers(headers)
            .send()
            .await
            .map_err(|e| IdentityError::Unavailable(e.to_string()))?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if status.is_server_error() {
            return Err(IdentityError::Unavailable(format!("status {status}")));
        }
        if !status.is_success() {
            return Err(IdentityError::Rejected {
                status: status.as_u16(),
            });
        }

        response
            .bytes()
            .await
            .map(|body| Some(body.to_vec()))
            .map_err(|e| IdentityError::Unavailable(e.to_string()))
    }
}

#[async_trait]
impl IdentityResolver for ChefClient {
    #[instrument(skip(self))]
    async fn get_client(&self, name: &str) -> Result<ClientIdentity, IdentityError> {
        if !is_valid_name(name) {
            return Err(IdentityError::NotFound(name.to_string()));
        }

        let body = self
            .get(&format!("clients/{name}"))
            .await?
            .ok_or_else(|| IdentityError::NotFound(name.to_string()))?;

        let record: ApiClient = serde_json::from_slice(&body)
            .map_err(|e| IdentityError::ResponseFormat(format!("client {name}: {e}")))?;
        let public_key_pem = record
            .public_key
            .ok_or_else(|| IdentityError::ResponseFormat(format!("client {name} has no public_key")))?;

        debug!(client = name, "Resolved Chef client");
        Ok(ClientIdentity {
            name: name.to_string(),
            public_key_pem,
        })
    }
}

/// `YYYY-MM-DDTHH:MM:SSZ` in UTC.
#[must_use]
pub fn format_timestamp(at: DateTime<Utc>) -> String {
    at.format("%Y-%m-%dT%H:%M:%SZ").to_string()
}

/// Base64 SHA-256 of the request body.
#[must_use]
pub fn content_hash(body: &[u8]) -> String {
    STANDARD.encode(Sha256::digest(body))
}

/// Path with repeated slashes collapsed and any trailing slash removed.
#[must_use]
pub fn canonical_path(path: &str) -> String {
    let mut canonical = String::with_capacity(path.len());
    for c in path.chars() {
        if c == '/' && canonical.ends_with('/') {
            continue;
        }
        canonical.push(c);
    }
    if canonical.len() > 1 && canonical.ends_with('/') {
        canonical.pop();
    }
    canonical
}

/// The string a protocol 1.3 request signature covers.
#[must_use]
pub fn canonical_request(
    method: &str,
    path: &str,
    content_hash: &str,
    timestamp: &str,
    user_id: &str,
) -> String {
    format!(
        "Method:{method}\nPath:{path}\nX-Ops-Content-Hash:{content_hash}\nX-Ops-Sign:{SIGN_VERSION}\nX-Ops-Timestamp:{timestamp}\nX-Ops-UserId:{user_id}\nX-Ops-Server-API-Version:{SERVER_API_VERSION}"
    )
}

fn authorization_chunks(signature: &str) -> impl Iterator<Item = &str> {
    signature
        .as_bytes()
        .chunks(AUTHORIZATION_CHUNK)
        .filter_map(|chunk| std::str::from_utf8(chunk).ok())
}
