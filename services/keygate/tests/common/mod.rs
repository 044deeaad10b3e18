//! Shared fixtures and test doubles.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use keygate::{AppContext, ClientIdentity, IdentityError, IdentityResolver, SignatureVerifier};
use keygate_vault_client::{
    SecretBackend, SecretData, TokenCreateRequest, TokenLookup, TokenRenewal, VaultError,
    VaultResult,
};
use mockall::mock;
use secrecy::SecretString;
use tokio::sync::Mutex;

pub const ALICE_PUBLIC: &str = include_str!("../fixtures/alice_public.pem");
pub const ALICE_PRIVATE: &str = include_str!("../fixtures/alice_private.pem");
pub const ALICE_SIGNATURE: &str = include_str!("../fixtures/alice_signature.b64");
pub const MALLORY_PUBLIC: &str = include_str!("../fixtures/mallory_public.pem");
pub const MALLORY_SIGNATURE: &str = include_str!("../fixtures/mallory_signature_over_alice.b64");
pub const SERVER_CERT: &str = include_str!("../fixtures/server_cert.pem");
pub const SERVER_KEY: &str = include_str!("../fixtures/server_key.pem");

pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

mock! {
    pub Resolver {}

    #[async_trait]
    impl IdentityResolver for Resolver {
        async fn get_client(&self, name: &str) -> Result<ClientIdentity, IdentityError>;
    }
}

mock! {
    pub Backend {}

    #[async_trait]
    impl SecretBackend for Backend {
        async fn read_secret(&self, path: &str) -> VaultResult<SecretData>;
        async fn issue_token_with_role(
            &self,
            request: &TokenCreateRequest,
            role: &str,
        ) -> VaultResult<SecretString>;
        async fn lookup_self(&self) -> VaultResult<TokenLookup>;
        async fn renew_self(&self, increment_secs: u64) -> VaultResult<TokenRenewal>;
        async fn unwrap_token(&self, token: &SecretString) -> VaultResult<SecretString>;
    }
}

/// Resolver over a fixed set of clients.
#[derive(Default)]
pub struct StaticResolver {
    clients: HashMap<String, String>,
    pub calls: AtomicUsize,
}

impl StaticResolver {
    pub fn with_client(mut self, name: &str, public_key_pem: &str) -> Self {
        self.clients.insert(name.to_string(), public_key_pem.to_string());
        self
    }

    pub fn alice() -> Self {
        Self::default().with_client("alice", ALICE_PUBLIC)
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl IdentityResolver for StaticResolver {
    async fn get_client(&self, name: &str) -> Result<ClientIdentity, IdentityError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.clients
            .get(name)
            .map(|pem| ClientIdentity {
                name: name.to_string(),
                public_key_pem: pem.clone(),
            })
            .ok_or_else(|| IdentityError::NotFound(name.to_string()))
    }
}

/// Backend recording renewals, failing the renew calls listed in `fail_on`.
pub struct RecordingBackend {
    pub creation_ttl: Option<u64>,
    pub fail_lookup: bool,
    pub fail_on: Vec<usize>,
    pub renewals: Mutex<Vec<(u64, tokio::time::Instant)>>,
}

impl RecordingBackend {
    pub fn with_ttl(creation_ttl: u64) -> Self {
        Self {
            creation_ttl: Some(creation_ttl),
            fail_lookup: false,
            fail_on: Vec::new(),
            renewals: Mutex::new(Vec::new()),
        }
    }

    pub fn failing_on(mut self, calls: &[usize]) -> Self {
        self.fail_on = calls.to_vec();
        self
    }

    pub async fn increments(&self) -> Vec<u64> {
        self.renewals.lock().await.iter().map(|(i, _)| *i).collect()
    }
}

#[async_trait]
impl SecretBackend for RecordingBackend {
    async fn read_secret(&self, path: &str) -> VaultResult<SecretData> {
        Err(VaultError::not_found(path))
    }

    async fn issue_token_with_role(
        &self,
        _request: &TokenCreateRequest,
        _role: &str,
    ) -> VaultResult<SecretString> {
        Err(VaultError::unavailable("not used"))
    }

    async fn lookup_self(&self) -> VaultResult<TokenLookup> {
        if self.fail_lookup {
            return Err(VaultError::PermissionDenied("auth/token/lookup-self".to_string()));
        }
        let creation_ttl = self
            .creation_ttl
            .ok_or_else(|| VaultError::format("lookup-self response has no creation_ttl"))?;
        Ok(TokenLookup {
            creation_ttl,
            ttl: creation_ttl,
            renewable: true,
            display_name: "token-keygate".to_string(),
            policies: vec!["keygate".to_string()],
        })
    }

    async fn renew_self(&self, increment_secs: u64) -> VaultResult<TokenRenewal> {
        let mut renewals = self.renewals.lock().await;
        let call = renewals.len();
        renewals.push((increment_secs, tokio::time::Instant::now()));
        if self.fail_on.contains(&call) {
            return Err(VaultError::unavailable("connection refused"));
        }
        Ok(TokenRenewal {
            lease_duration: Duration::from_secs(increment_secs),
            renewable: true,
        })
    }

    async fn unwrap_token(&self, token: &SecretString) -> VaultResult<SecretString> {
        Ok(token.clone())
    }
}

pub fn context(
    resolver: Arc<dyn IdentityResolver>,
    backend: Arc<dyn SecretBackend>,
) -> AppContext {
    AppContext::new(resolver, backend, SignatureVerifier::new())
}

pub fn alice_signature() -> &'static str {
    ALICE_SIGNATURE.trim()
}
