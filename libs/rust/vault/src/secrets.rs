//! Typed request and response schemas for the Vault HTTP API.
//!
//! Every response body is decoded into one of these types at the boundary;
//! a body that does not fit is a [`VaultError::ResponseFormat`].

use crate::error::{VaultError, VaultResult};
use secrecy::SecretString;
use serde::{Deserialize, Deserializer, Serialize, de::DeserializeOwned};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

fn secret_string<'de, D>(deserializer: D) -> Result<SecretString, D::Error>
where
    D: Deserializer<'de>,
{
    String::deserialize(deserializer).map(SecretString::from)
}

/// Body of a token-creation request (`auth/token/create/:role`).
///
/// Passed through to Vault as received; absent fields are not serialized.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenCreateRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub policies: Option<Vec<String>>,
    #[serde(default, rename = "meta", skip_serializing_if = "Option::is_none")]
    pub metadata: Option<BTreeMap<String, String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ttl: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lease: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub explicit_max_ttl: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub period: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub no_parent: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub no_default_policy: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub num_uses: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub renewable: Option<bool>,
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub token_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entity_alias: Option<String>,
}

/// Data read from a secret path.
///
/// `Debug` lists the field names only.
#[derive(Clone)]
pub struct SecretData {
    /// Path the secret was read from
    pub path: String,
    /// Raw key/value payload
    pub data: Map<String, Value>,
    /// Lease duration reported by Vault
    pub lease_duration: Duration,
    /// Whether the lease is renewable
    pub renewable: bool,
}

impl fmt::Debug for SecretData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SecretData")
            .field("path", &self.path)
            .field("keys", &self.data.keys().collect::<Vec<_>>())
            .field("lease_duration", &self.lease_duration)
            .field("renewable", &self.renewable)
            .finish()
    }
}

impl SecretData {
    /// The payload, with a KV v2 `{data, metadata}` envelope removed.
    #[must_use]
    pub fn payload(&self) -> &Map<String, Value> {
        match (self.data.get("data"), self.data.get("metadata")) {
            (Some(Value::Object(inner)), Some(Value::Object(_))) => inner,
            _ => &self.data,
        }
    }

    /// Decode the payload into a typed secret.
    ///
    /// # Errors
    ///
    /// Returns [`VaultError::ResponseFormat`] if the payload does not fit `T`.
    pub fn decode<T: DeserializeOwned>(&self) -> VaultResult<T> {
        T::deserialize(Value::Object(self.payload().clone()))
            .map_err(|e| VaultError::format(format!("secret at {}: {e}", self.path)))
    }
}

/// TLS certificate and key stored for the listener.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerCertificate {
    /// PEM certificate chain
    pub cert: String,
    /// PEM private key
    #[serde(deserialize_with = "secret_string")]
    pub key: SecretString,
}

/// Private key used to sign requests to the identity directory.
#[derive(Debug, Clone, Deserialize)]
pub struct SigningKey {
    /// PEM private key
    #[serde(deserialize_with = "secret_string")]
    pub key: SecretString,
}

/// Result of `auth/token/lookup-self`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenLookup {
    /// TTL the token was created with, in seconds (0 = never expires)
    pub creation_ttl: u64,
    /// Remaining TTL in seconds
    pub ttl: u64,
    /// Whether the token can be renewed
    pub renewable: bool,
    /// Display name of the token
    pub display_name: String,
    /// Policies attached to the token
    pub policies: Vec<String>,
}

/// Result of `auth/token/renew-self`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TokenRenewal {
    /// New lease duration granted
    pub lease_duration: Duration,
    /// Whether the token can be renewed again
    pub renewable: bool,
}

/// Generic read response.
#[derive(Debug, Deserialize)]
pub(crate) struct ReadResponse {
    pub data: Option<Map<String, Value>>,
    #[serde(default)]
    pub lease_duration: u64,
    #[serde(default)]
    pub renewable: bool,
}

/// Response carrying an `auth` block.
#[derive(Debug, Deserialize)]
pub(crate) struct AuthResponse {
    pub auth: Option<AuthData>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct AuthData {
    #[serde(deserialize_with = "secret_string")]
    pub client_token: SecretString,
    #[serde(default)]
    pub lease_duration: u64,
    #[serde(default)]
    pub renewable: bool,
}

/// Response to `auth/token/lookup-self`.
#[derive(Debug, Deserialize)]
pub(crate) struct LookupSelfResponse {
    pub data: Option<LookupSelfData>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct LookupSelfData {
    pub creation_ttl: Option<u64>,
    #[serde(default)]
    pub ttl: u64,
    #[serde(default)]
    pub renewable: bool,
    #[serde(default)]
    pub display_name: String,
    #[serde(default)]
    pub policies: Vec<String>,
}

impl LookupSelfResponse {
    pub(crate) fn into_lookup(self) -> VaultResult<TokenLookup> {
        let data = self
            .data
            .ok_or_else(|| VaultError::format("lookup-self response has no data"))?;
        let creation_ttl = data
            .creation_ttl
            .ok_or_else(|| VaultError::format("lookup-self response has no creation_ttl"))?;
        Ok(TokenLookup {
            creation_ttl,
            ttl: data.ttl,
            renewable: data.renewable,
            display_name: data.display_name,
            policies: data.policies,
        })
    }
}

/// Error body returned by Vault on non-2xx responses.
#[derive(Debug, Default, Deserialize)]
pub(crate) struct ErrorBody {
    #[serde(default)]
    pub errors: Vec<String>,
}
