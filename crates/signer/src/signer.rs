//! Detached signatures over package contents.

use crate::error::{SignerError, SignerResult};
use crate::key::{PublicKey, SecretKey};
use cask_core::config::SignatureAlgorithm;
use rsa::pkcs1v15;
use rsa::signature::{SignatureEncoding, Signer as _, Verifier as _};
use sha1::Sha1;
use sha2::Sha256;

/// Sign `content` with PKCS#1 v1.5 using the digest named by `algorithm`.
pub fn sign_content(
    secret: &SecretKey,
    algorithm: SignatureAlgorithm,
    content: &[u8],
) -> SignerResult<Vec<u8>> {
    let key = secret.rsa_key().clone();
    let signature = match algorithm {
        SignatureAlgorithm::RsaSha1 => pkcs1v15::SigningKey::<Sha1>::new(key).try_sign(content),
        SignatureAlgorithm::RsaSha256 => {
            pkcs1v15::SigningKey::<Sha256>::new(key).try_sign(content)
        }
    }
    .map_err(|e| SignerError::Signing(e.to_string()))?;

    Ok(signature.to_vec())
}

/// Verify a detached signature over `content`.
pub fn verify_content(
    public: &PublicKey,
    algorithm: SignatureAlgorithm,
    content: &[u8],
    signature: &[u8],
) -> SignerResult<()> {
    let signature = pkcs1v15::Signature::try_from(signature)
        .map_err(|e| SignerError::InvalidSignature(e.to_string()))?;
    let key = public.rsa_key().clone();

    match algorithm {
        SignatureAlgorithm::RsaSha1 => {
            pkcs1v15::VerifyingKey::<Sha1>::new(key).verify(content, &signature)
        }
        SignatureAlgorithm::RsaSha256 => {
            pkcs1v15::VerifyingKey::<Sha256>::new(key).verify(content, &signature)
        }
    }
    .map_err(|_| SignerError::VerificationFailed)
}
