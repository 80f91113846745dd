//! RSA key types and operations.

use crate::error::{SignerError, SignerResult};
use cask_core::AppId;
use rsa::pkcs1::{DecodeRsaPrivateKey, EncodeRsaPrivateKey};
use rsa::pkcs8::{DecodePrivateKey, DecodePublicKey, EncodePublicKey, LineEnding};
use rsa::traits::PublicKeyParts;
use rsa::{RsaPrivateKey, RsaPublicKey};
use std::fmt;

/// A secret (private) RSA key for signing.
pub struct SecretKey {
    inner: RsaPrivateKey,
}

impl SecretKey {
    /// Generate a new random secret key with a modulus of `bits` bits.
    pub fn generate(bits: usize) -> SignerResult<Self> {
        let mut rng = rand_core::OsRng;
        let inner = RsaPrivateKey::new(&mut rng, bits)
            .map_err(|e| SignerError::KeyGeneration(e.to_string()))?;
        Ok(Self { inner })
    }

    /// Parse from PEM. Accepts PKCS#1 (`RSA PRIVATE KEY`) and PKCS#8
    /// (`PRIVATE KEY`) documents.
    pub fn from_pem(pem: &str) -> SignerResult<Self> {
        let inner = if pem.contains("BEGIN RSA PRIVATE KEY") {
            RsaPrivateKey::from_pkcs1_pem(pem)
                .map_err(|e| SignerError::KeyParsing(format!("invalid PKCS#1 key: {e}")))?
        } else {
            RsaPrivateKey::from_pkcs8_pem(pem)
                .map_err(|e| SignerError::KeyParsing(format!("invalid PKCS#8 key: {e}")))?
        };
        Ok(Self { inner })
    }

    /// Encode as a PKCS#1 PEM document.
    pub fn to_pem(&self) -> SignerResult<String> {
        let pem = self
            .inner
            .to_pkcs1_pem(LineEnding::LF)
            .map_err(|e| SignerError::KeyParsing(format!("failed to encode key: {e}")))?;
        Ok(String::clone(&pem))
    }

    /// Get the corresponding public key.
    pub fn public_key(&self) -> PublicKey {
        PublicKey {
            inner: self.inner.to_public_key(),
        }
    }

    /// Modulus size in bits.
    pub fn bits(&self) -> usize {
        self.inner.size() * 8
    }

    pub(crate) fn rsa_key(&self) -> &RsaPrivateKey {
        &self.inner
    }
}

impl fmt::Debug for SecretKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SecretKey([REDACTED])")
    }
}

/// A public RSA key for verification.
#[derive(Clone, PartialEq, Eq)]
pub struct PublicKey {
    inner: RsaPublicKey,
}

impl PublicKey {
    /// Parse from a DER-encoded SubjectPublicKeyInfo.
    pub fn from_der(der: &[u8]) -> SignerResult<Self> {
        let inner = RsaPublicKey::from_public_key_der(der)
            .map_err(|e| SignerError::KeyParsing(format!("invalid public key: {e}")))?;
        Ok(Self { inner })
    }

    /// Encode as a DER SubjectPublicKeyInfo, the form embedded in packages.
    pub fn to_der(&self) -> SignerResult<Vec<u8>> {
        let doc = self
            .inner
            .to_public_key_der()
            .map_err(|e| SignerError::KeyParsing(format!("failed to encode public key: {e}")))?;
        Ok(doc.as_bytes().to_vec())
    }

    /// Derive the application id of this key.
    pub fn app_id(&self) -> SignerResult<AppId> {
        Ok(AppId::from_public_key_der(&self.to_der()?))
    }

    /// Modulus size in bits.
    pub fn bits(&self) -> usize {
        self.inner.size() * 8
    }

    pub(crate) fn rsa_key(&self) -> &RsaPublicKey {
        &self.inner
    }
}

impl fmt::Debug for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.app_id() {
            Ok(id) => write!(f, "PublicKey({id})"),
            Err(_) => write!(f, "PublicKey(<unencodable>)"),
        }
    }
}

/// A key pair bound to one application.
pub struct KeyPair {
    /// The secret key.
    pub secret: SecretKey,
    /// The public key.
    pub public: PublicKey,
}

impl KeyPair {
    /// Generate a new key pair.
    pub fn generate(bits: usize) -> SignerResult<Self> {
        Ok(Self::from_secret(SecretKey::generate(bits)?))
    }

    /// Build the pair from its secret half.
    pub fn from_secret(secret: SecretKey) -> Self {
        let public = secret.public_key();
        Self { secret, public }
    }

    /// Parse from a PEM private key.
    pub fn from_pem(pem: &str) -> SignerResult<Self> {
        Ok(Self::from_secret(SecretKey::from_pem(pem)?))
    }

    /// Encode the private key as PEM.
    pub fn to_pem(&self) -> SignerResult<String> {
        self.secret.to_pem()
    }
}

impl fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyPair")
            .field("public", &self.public)
            .finish()
    }
}
