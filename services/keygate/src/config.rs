//! Type-Safe Configuration with Validation
//!
//! Reads the gateway's settings from the environment (optionally seeded
//! from a `.env` file). Parsing goes through a lookup function so the same
//! rules apply to the process environment and to a map in tests.

use keygate_vault_client::VaultConfig;
use rust_common::TracingConfig;
use secrecy::SecretString;
use std::env;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::Duration;
use thiserror::Error;
use url::Url;

/// Configuration errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Invalid URL format
    #[error("Invalid URL for {field}: {reason}")]
    InvalidUrl { field: String, reason: String },

    /// Listen address is neither `host:port` nor `:port`
    #[error("Invalid listen address {value:?}: {reason}")]
    InvalidListenAddr { value: String, reason: String },

    /// Timeout of zero
    #[error("Invalid timeout {0}: must be greater than 0")]
    InvalidTimeout(String),

    /// Missing required field
    #[error("Missing required configuration: {0}")]
    MissingRequired(String),

    /// Environment variable parse error
    #[error("Failed to parse environment variable {name}: {reason}")]
    ParseError { name: String, reason: String },
}

/// Gateway configuration with validation.
#[derive(Debug, Clone)]
pub struct Config {
    /// Chef server base URL, e.g. `https://chef.example.com/organizations/acme/`
    pub chef_server: Url,
    /// Name the gateway signs Chef requests as
    pub chef_client_name: String,
    /// Verify the Chef server certificate
    pub chef_verify_tls: bool,
    /// Vault address
    pub vault_addr: Url,
    /// Vault token, possibly response-wrapped
    pub vault_token: SecretString,
    /// Skip Vault certificate verification
    pub vault_skip_verify: bool,
    /// Secret holding the listener `cert` and `key`
    pub secret_cert_path: String,
    /// Secret holding the Chef client `key`
    pub secret_chef_pem_path: String,
    /// Keep the Vault token alive in the background
    pub renew_token: bool,
    /// Listener address
    pub listen_addr: SocketAddr,
    /// Per-request timeout in seconds
    pub request_timeout_secs: u64,
    /// Outbound call timeout in seconds
    pub backend_timeout_secs: u64,
    /// Graceful shutdown timeout in seconds
    pub shutdown_timeout_secs: u64,
    /// Log filter when `RUST_LOG` is unset
    pub log_level: String,
    /// Emit JSON logs
    pub log_json: bool,
}

impl Config {
    /// Loads configuration from environment variables with validation.
    ///
    /// # Errors
    ///
    /// Returns an error if a required variable is missing or any value is invalid.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Loads configuration through `lookup`. Empty values count as unset.
    ///
    /// # Errors
    ///
    /// Returns an error if a required variable is missing or any value is invalid.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).filter(|v| !v.is_empty());

        let config = Self {
            chef_server: parse_url_env(&get, "CHEF_SERVER")?,
            chef_client_name: required(&get, "CHEF_CLIENT_NAME")?,
            chef_verify_tls: parse_bool_env(&get, "CHEF_VERIFY_TLS", true)?,
            vault_addr: parse_url_env(&get, "VAULT_ADDR")?,
            vault_token: SecretString::from(required(&get, "VAULT_TOKEN")?),
            vault_skip_verify: parse_bool_env(&get, "VAULT_SKIP_VERIFY", false)?,
            secret_cert_path: required(&get, "SECRET_CERT_PATH")?,
            secret_chef_pem_path: required(&get, "SECRET_CHEF_PEM_PATH")?,
            renew_token: parse_bool_env(&get, "RENEW_TOKEN", true)?,
            listen_addr: parse_listen_addr(&required(&get, "LISTEN_ADDR")?)?,
            request_timeout_secs: parse_env(&get, "REQUEST_TIMEOUT", 10)?,
            backend_timeout_secs: parse_env(&get, "BACKEND_TIMEOUT", 30)?,
            shutdown_timeout_secs: parse_env(&get, "SHUTDOWN_TIMEOUT", 30)?,
            log_level: get("LOG_LEVEL").unwrap_or_else(|| "info".to_string()),
            log_json: parse_bool_env(&get, "LOG_JSON", false)?,
        };

        config.validate()?;
        Ok(config)
    }

    /// Validates the configuration.
    fn validate(&self) -> Result<(), ConfigError> {
        for (name, value) in [
            ("REQUEST_TIMEOUT", self.request_timeout_secs),
            ("BACKEND_TIMEOUT", self.backend_timeout_secs),
            ("SHUTDOWN_TIMEOUT", self.shutdown_timeout_secs),
        ] {
            if value == 0 {
                return Err(ConfigError::InvalidTimeout(name.to_string()));
            }
        }
        if self.chef_client_name.trim().is_empty() {
            return Err(ConfigError::MissingRequired("CHEF_CLIENT_NAME".to_string()));
        }
        Ok(())
    }

    /// Per-request timeout.
    #[must_use]
    pub const fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Outbound call timeout.
    #[must_use]
    pub const fn backend_timeout(&self) -> Duration {
        Duration::from_secs(self.backend_timeout_secs)
    }

    /// Graceful shutdown bound.
    #[must_use]
    pub const fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.shutdown_timeout_secs)
    }

    /// Creates a `VaultConfig` from this config.
    #[must_use]
    pub fn vault_config(&self) -> VaultConfig {
        VaultConfig::new(self.vault_addr.as_str(), self.vault_token.clone())
            .with_timeout(self.backend_timeout())
            .with_skip_verify(self.vault_skip_verify)
    }

    /// Creates a `TracingConfig` from this config.
    #[must_use]
    pub fn tracing_config(&self) -> TracingConfig {
        TracingConfig::default()
            .with_service_name("keygate")
            .with_log_level(&self.log_level)
            .with_json_output(self.log_json)
    }
}

/// Fetch a required variable.
fn required<F>(get: &F, name: &str) -> Result<String, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    get(name).ok_or_else(|| ConfigError::MissingRequired(name.to_string()))
}

/// Parse an environment variable with a default value.
fn parse_env<F, T>(get: &F, name: &str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match get(name) {
        Some(val) => val.trim().parse().map_err(|e: T::Err| ConfigError::ParseError {
            name: name.to_string(),
            reason: e.to_string(),
        }),
        None => Ok(default),
    }
}

/// Parse a boolean environment variable with a default value.
fn parse_bool_env<F>(get: &F, name: &str, default: bool) -> Result<bool, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    match get(name) {
        Some(val) => parse_bool(&val).ok_or_else(|| ConfigError::ParseError {
            name: name.to_string(),
            reason: format!("{val:?} is not a boolean"),
        }),
        None => Ok(default),
    }
}

/// Parse a required URL environment variable.
fn parse_url_env<F>(get: &F, name: &str) -> Result<Url, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let url_str = required(get, name)?;
    Url::parse(&url_str).map_err(|e| ConfigError::InvalidUrl {
        field: name.to_string(),
        reason: e.to_string(),
    })
}

/// Accepts the same spellings as Go's `strconv.ParseBool`.
fn parse_bool(value: &str) -> Option<bool> {
    match value {
        "1" | "t" | "T" | "TRUE" | "true" | "True" => Some(true),
        "0" | "f" | "F" | "FALSE" | "false" | "False" => Some(false),
        _ => None,
    }
}

/// `host:port`, or `:port` for every interface.
fn parse_listen_addr(value: &str) -> Result<SocketAddr, ConfigError> {
    let invalid = |reason: String| ConfigError::InvalidListenAddr {
        value: value.to_string(),
        reason,
    };

    let (host, port) = value
        .rsplit_once(':')
        .ok_or_else(|| invalid("missing port".to_string()))?;
    let port: u16 = port.parse().map_err(|e| invalid(format!("port: {e}")))?;

    let ip = match host.trim_start_matches('[').trim_end_matches(']') {
        "" => IpAddr::V4(Ipv4Addr::UNSPECIFIED),
        "localhost" => IpAddr::V4(Ipv4Addr::LOCALHOST),
        other => other
            .parse()
            .map_err(|e| invalid(format!("host: {e}")))?,
    };
    Ok(SocketAddr::new(ip, port))
}
