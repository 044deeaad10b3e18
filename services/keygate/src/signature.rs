//! Client signature verification.
//!
//! A client proves it owns its registered key by signing the key's own PEM
//! text: RSA PKCS#1 v1.5 over SHA-512, base64 (standard alphabet, padded).
//! The request body is not covered by the signature.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use ring::signature::{RSA_PKCS1_2048_8192_SHA512, RsaPublicKeyComponents};
use x509_parser::prelude::FromDer;
use x509_parser::public_key::PublicKey;
use x509_parser::x509::SubjectPublicKeyInfo;

use crate::error::{FailureKind, SignatureError};

/// Smallest accepted RSA modulus.
pub const MIN_MODULUS_BITS: usize = 2048;
/// Largest RSA modulus the verifier can handle.
pub const MAX_MODULUS_BITS: usize = 8192;

/// A parsed RSA public key.
#[derive(Debug, Clone)]
pub struct RsaPublicKey {
    components: RsaPublicKeyComponents<Vec<u8>>,
}

impl RsaPublicKey {
    /// Modulus size in bits.
    #[must_use]
    pub fn bits(&self) -> usize {
        bit_length(&self.components.n)
    }
}

/// Result of a signature check with the failure kind but no detail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VerificationOutcome {
    /// Whether the signature is valid
    pub valid: bool,
    /// Why it is not
    pub failure_kind: Option<FailureKind>,
}

impl VerificationOutcome {
    const VALID: Self = Self {
        valid: true,
        failure_kind: None,
    };

    const fn failed(kind: FailureKind) -> Self {
        Self {
            valid: false,
            failure_kind: Some(kind),
        }
    }
}

/// Stateless signature verifier.
#[derive(Debug, Clone, Copy, Default)]
pub struct SignatureVerifier;

impl SignatureVerifier {
    /// Creates a new verifier.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Parse the first PEM block of `pem_text` as an RSA SubjectPublicKeyInfo.
    ///
    /// # Errors
    ///
    /// [`SignatureError::KeyFormat`] if there is no PEM block, the block is
    /// not a SubjectPublicKeyInfo, the key is not RSA, or the modulus is
    /// outside 2048..=8192 bits.
    pub fn parse_public_key(&self, pem_text: &str) -> Result<RsaPublicKey, SignatureError> {
        let block = pem::parse(pem_text)
            .map_err(|e| SignatureError::key_format(format!("no PEM block: {e}")))?;

        let (rest, spki) = SubjectPublicKeyInfo::from_der(block.contents())
            .map_err(|e| SignatureError::key_format(format!("not a SubjectPublicKeyInfo: {e}")))?;
        if !rest.is_empty() {
            return Err(SignatureError::key_format("trailing data after public key"));
        }

        let rsa = match spki.parsed() {
            Ok(PublicKey::RSA(rsa)) => rsa,
            Ok(_) => return Err(SignatureError::key_format("public key is not RSA")),
            Err(e) => return Err(SignatureError::key_format(format!("unreadable public key: {e}"))),
        };

        let key = RsaPublicKey {
            components: RsaPublicKeyComponents {
                n: strip_leading_zeros(rsa.modulus).to_vec(),
                e: strip_leading_zeros(rsa.exponent).to_vec(),
            },
        };

        let bits = key.bits();
        if !(MIN_MODULUS_BITS..=MAX_MODULUS_BITS).contains(&bits) {
            return Err(SignatureError::key_format(format!(
                "RSA modulus is {bits} bits, expected {MIN_MODULUS_BITS}..={MAX_MODULUS_BITS}"
            )));
        }
        Ok(key)
    }

    /// Verify `encoded_signature` over the exact bytes of `pem_text`, using
    /// the key `pem_text` contains.
    ///
    /// # Errors
    ///
    /// [`SignatureError::KeyFormat`], [`SignatureError::Base64Decode`] or
    /// [`SignatureError::SignatureInvalid`], checked in that order.
    pub fn verify_signature(
        &self,
        encoded_signature: &str,
        pem_text: &str,
    ) -> Result<(), SignatureError> {
        let key = self.parse_public_key(pem_text)?;
        let signature = STANDARD
            .decode(encoded_signature)
            .map_err(|e| SignatureError::Base64Decode {
                reason: e.to_string(),
            })?;
        self.verify_with_key(&key, pem_text.as_bytes(), &signature)
    }

    /// Verify `signature` over `payload` (hashed with SHA-512 here).
    ///
    /// # Errors
    ///
    /// [`SignatureError::SignatureInvalid`] on any mismatch.
    pub fn verify_with_key(
        &self,
        key: &RsaPublicKey,
        payload: &[u8],
        signature: &[u8],
    ) -> Result<(), SignatureError> {
        key.components
            .verify(&RSA_PKCS1_2048_8192_SHA512, payload, signature)
            .map_err(|_| SignatureError::SignatureInvalid)
    }

    /// Like [`verify_signature`](Self::verify_signature), as a value.
    #[must_use]
    pub fn check(&self, encoded_signature: &str, pem_text: &str) -> VerificationOutcome {
        match self.verify_signature(encoded_signature, pem_text) {
            Ok(()) => VerificationOutcome::VALID,
            Err(e) => VerificationOutcome::failed(e.kind()),
        }
    }
}

fn strip_leading_zeros(bytes: &[u8]) -> &[u8] {
    let start = bytes.iter().position(|&b| b != 0).unwrap_or(bytes.len());
    &bytes[start..]
}

fn bit_length(be: &[u8]) -> usize {
    let bytes = strip_leading_zeros(be);
    bytes
        .first()
        .map_or(0, |&top| bytes.len() * 8 - top.leading_zeros() as usize)
}
