//! Listener TLS policy and acceptor.
//!
//! The policy is data and is applied to OpenSSL as listed: TLS 1.2 minimum,
//! five TLS 1.2 suites and three curves in server preference order. TLS 1.3
//! keeps OpenSSL's default suites.

use openssl::error::ErrorStack;
use openssl::pkey::{PKey, Private};
use openssl::ssl::{
    AlpnError, SslAcceptor, SslAcceptorBuilder, SslMethod, SslOptions, SslVersion,
    select_next_proto,
};
use openssl::x509::X509;
use thiserror::Error;
use tracing::debug;

/// TLS configuration errors.
#[derive(Error, Debug)]
pub enum TlsError {
    /// Certificate PEM unusable
    #[error("Invalid certificate: {0}")]
    Certificate(String),

    /// Private key PEM unusable
    #[error("Invalid private key: {0}")]
    PrivateKey(String),

    /// OpenSSL rejected the configuration
    #[error("TLS configuration rejected: {0}")]
    OpenSsl(#[from] ErrorStack),
}

/// Lowest protocol version accepted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TlsVersion {
    /// TLS 1.2
    Tls12,
    /// TLS 1.3
    Tls13,
}

impl TlsVersion {
    const fn ssl_version(self) -> SslVersion {
        match self {
            Self::Tls12 => SslVersion::TLS1_2,
            Self::Tls13 => SslVersion::TLS1_3,
        }
    }
}

/// Elliptic curves, in preference order when listed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Curve {
    /// secp521r1
    P521,
    /// secp384r1
    P384,
    /// secp256r1
    P256,
}

impl Curve {
    /// Curve name, as OpenSSL spells it in a groups list.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::P521 => "P-521",
            Self::P384 => "P-384",
            Self::P256 => "P-256",
        }
    }
}

/// TLS 1.2 cipher suites.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[allow(missing_docs)]
pub enum CipherSuite {
    EcdheRsaAes128GcmSha256,
    EcdheRsaAes256GcmSha384,
    EcdheRsaAes256CbcSha,
    RsaAes256GcmSha384,
    RsaAes256CbcSha,
}

impl CipherSuite {
    /// IANA name.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::EcdheRsaAes128GcmSha256 => "TLS_ECDHE_RSA_WITH_AES_128_GCM_SHA256",
            Self::EcdheRsaAes256GcmSha384 => "TLS_ECDHE_RSA_WITH_AES_256_GCM_SHA384",
            Self::EcdheRsaAes256CbcSha => "TLS_ECDHE_RSA_WITH_AES_256_CBC_SHA",
            Self::RsaAes256GcmSha384 => "TLS_RSA_WITH_AES_256_GCM_SHA384",
            Self::RsaAes256CbcSha => "TLS_RSA_WITH_AES_256_CBC_SHA",
        }
    }

    /// OpenSSL name.
    #[must_use]
    pub const fn openssl_name(self) -> &'static str {
        match self {
            Self::EcdheRsaAes128GcmSha256 => "ECDHE-RSA-AES128-GCM-SHA256",
            Self::EcdheRsaAes256GcmSha384 => "ECDHE-RSA-AES256-GCM-SHA384",
            Self::EcdheRsaAes256CbcSha => "ECDHE-RSA-AES256-SHA",
            Self::RsaAes256GcmSha384 => "AES256-GCM-SHA384",
            Self::RsaAes256CbcSha => "AES256-SHA",
        }
    }
}

/// Listener TLS policy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TlsPolicy {
    /// Lowest accepted version
    pub min_version: TlsVersion,
    /// Curve preference order
    pub curves: Vec<Curve>,
    /// Choose the cipher suite by server order, not client order
    pub prefer_server_cipher_suites: bool,
    /// Allowed TLS 1.2 cipher suites, in preference order
    pub cipher_suites: Vec<CipherSuite>,
    /// ALPN protocols offered
    pub alpn_protocols: Vec<Vec<u8>>,
}

impl Default for TlsPolicy {
    fn default() -> Self {
        Self {
            min_version: TlsVersion::Tls12,
            curves: vec![Curve::P521, Curve::P384, Curve::P256],
            prefer_server_cipher_suites: true,
            cipher_suites: vec![
                CipherSuite::EcdheRsaAes128GcmSha256,
                CipherSuite::EcdheRsaAes256GcmSha384,
                CipherSuite::EcdheRsaAes256CbcSha,
                CipherSuite::RsaAes256GcmSha384,
                CipherSuite::RsaAes256CbcSha,
            ],
            alpn_protocols: vec![b"h2".to_vec(), b"http/1.1".to_vec()],
        }
    }
}

impl TlsPolicy {
    /// TLS 1.2 cipher list in OpenSSL syntax.
    #[must_use]
    pub fn cipher_list(&self) -> String {
        self.cipher_suites
            .iter()
            .map(|s| s.openssl_name())
            .collect::<Vec<_>>()
            .join(":")
    }

    /// Curve list in OpenSSL syntax.
    #[must_use]
    pub fn groups_list(&self) -> String {
        self.curves
            .iter()
            .map(|c| c.name())
            .collect::<Vec<_>>()
            .join(":")
    }

    /// ALPN protocols in wire format (length-prefixed).
    #[must_use]
    pub fn alpn_wire(&self) -> Vec<u8> {
        let mut wire = Vec::new();
        for protocol in &self.alpn_protocols {
            if let Ok(len) = u8::try_from(protocol.len()) {
                wire.push(len);
                wire.extend_from_slice(protocol);
            }
        }
        wire
    }

    /// Acceptor builder with the policy applied and no certificate yet.
    ///
    /// # Errors
    ///
    /// Returns an error if OpenSSL rejects any part of the policy, for
    /// instance a cipher list with nothing it can offer.
    pub fn acceptor_builder(&self) -> Result<SslAcceptorBuilder, TlsError> {
        let mut builder = SslAcceptor::mozilla_intermediate_v5(SslMethod::tls_server())?;
        builder.set_min_proto_version(Some(self.min_version.ssl_version()))?;
        builder.set_cipher_list(&self.cipher_list())?;
        builder.set_groups_list(&self.groups_list())?;
        if self.prefer_server_cipher_suites {
            builder.set_options(SslOptions::CIPHER_SERVER_PREFERENCE);
        } else {
            builder.clear_options(SslOptions::CIPHER_SERVER_PREFERENCE);
        }

        let alpn: &'static [u8] = Box::leak(self.alpn_wire().into_boxed_slice());
        builder.set_alpn_select_callback(move |_, client| {
            select_next_proto(alpn, client).ok_or(AlpnError::NOACK)
        });

        debug!(
            ciphers = %self.cipher_list(),
            groups = %self.groups_list(),
            "Built TLS acceptor policy"
        );
        Ok(builder)
    }

    /// Acceptor presenting `pair`.
    ///
    /// # Errors
    ///
    /// Returns an error if OpenSSL rejects the policy or the key does not
    /// match the certificate.
    pub fn acceptor(&self, pair: &ServerKeyPair) -> Result<SslAcceptor, TlsError> {
        let mut builder = self.acceptor_builder()?;
        builder.set_certificate(&pair.leaf)?;
        for cert in &pair.chain {
            builder.add_extra_chain_cert(cert.clone())?;
        }
        builder.set_private_key(&pair.key)?;
        builder
            .check_private_key()
            .map_err(|e| TlsError::PrivateKey(format!("key does not match certificate: {e}")))?;
        Ok(builder.build())
    }
}

/// Listener certificate chain and private key.
pub struct ServerKeyPair {
    leaf: X509,
    chain: Vec<X509>,
    key: PKey<Private>,
}

/// Parse a PEM certificate chain (leaf first) and private key.
///
/// # Errors
///
/// [`TlsError::Certificate`] or [`TlsError::PrivateKey`] if either PEM has
/// no usable block.
pub fn parse_key_pair(cert_pem: &str, key_pem: &str) -> Result<ServerKeyPair, TlsError> {
    let mut certs = X509::stack_from_pem(cert_pem.as_bytes())
        .map_err(|e| TlsError::Certificate(e.to_string()))?
        .into_iter();
    let leaf = certs
        .next()
        .ok_or_else(|| TlsError::Certificate("no certificate in PEM".to_string()))?;

    let key = PKey::private_key_from_pem(key_pem.as_bytes())
        .map_err(|e| TlsError::PrivateKey(e.to_string()))?;

    Ok(ServerKeyPair {
        leaf,
        chain: certs.collect(),
        key,
    })
}
