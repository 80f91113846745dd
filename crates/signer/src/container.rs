//! The signed package container.
//!
//! Layout (all integers unsigned 32-bit little-endian):
//!
//! ```text
//! "Cr24" | version = 2 | public key length | signature length
//!        | public key (DER SPKI) | signature | zip archive
//! ```

use crate::error::{SignerError, SignerResult};
use crate::key::PublicKey;
use crate::signer::verify_content;
use cask_core::AppId;
use cask_core::config::SignatureAlgorithm;

/// Magic bytes that open every container.
pub const MAGIC: &[u8; 4] = b"Cr24";

/// Container format version written by this crate.
pub const FORMAT_VERSION: u32 = 2;

/// Size of the fixed header preceding the variable-length sections.
pub const HEADER_LEN: usize = 16;

/// A signed extension package.
#[derive(Clone, PartialEq, Eq)]
pub struct SignedPackage {
    public_key: Vec<u8>,
    signature: Vec<u8>,
    content: Vec<u8>,
}

impl SignedPackage {
    /// Assemble a package from its parts.
    pub fn new(public_key: Vec<u8>, signature: Vec<u8>, content: Vec<u8>) -> Self {
        Self {
            public_key,
            signature,
            content,
        }
    }

    /// DER-encoded public key.
    pub fn public_key_der(&self) -> &[u8] {
        &self.public_key
    }

    /// Detached signature over [`Self::content`].
    pub fn signature(&self) -> &[u8] {
        &self.signature
    }

    /// The zip archive.
    pub fn content(&self) -> &[u8] {
        &self.content
    }

    /// Parse the embedded public key.
    pub fn public_key(&self) -> SignerResult<PublicKey> {
        PublicKey::from_der(&self.public_key)
    }

    /// Application id of the signing key.
    pub fn app_id(&self) -> AppId {
        AppId::from_public_key_der(&self.public_key)
    }

    /// Verify the signature against the embedded public key.
    pub fn verify(&self, algorithm: SignatureAlgorithm) -> SignerResult<()> {
        let public = self.public_key()?;
        verify_content(&public, algorithm, &self.content, &self.signature)
    }

    /// Total encoded size in bytes.
    pub fn encoded_len(&self) -> usize {
        HEADER_LEN + self.public_key.len() + self.signature.len() + self.content.len()
    }

    /// Serialize to the container byte layout.
    pub fn encode(&self) -> SignerResult<Vec<u8>> {
        let key_len = section_len(&self.public_key, "public key")?;
        let sig_len = section_len(&self.signature, "signature")?;

        let mut out = Vec::with_capacity(self.encoded_len());
        out.extend_from_slice(MAGIC);
        out.extend_from_slice(&FORMAT_VERSION.to_le_bytes());
        out.extend_from_slice(&key_len.to_le_bytes());
        out.extend_from_slice(&sig_len.to_le_bytes());
        out.extend_from_slice(&self.public_key);
        out.extend_from_slice(&self.signature);
        out.extend_from_slice(&self.content);
        Ok(out)
    }

    /// Parse the container byte layout.
    pub fn parse(bytes: &[u8]) -> SignerResult<Self> {
        if bytes.len() < HEADER_LEN {
            return Err(SignerError::InvalidPackage(format!(
                "truncated header: {} bytes",
                bytes.len()
            )));
        }
        if &bytes[..4] != MAGIC {
            return Err(SignerError::InvalidPackage("bad magic".to_string()));
        }

        let version = read_u32(bytes, 4);
        if version != FORMAT_VERSION {
            return Err(SignerError::InvalidPackage(format!(
                "unsupported format version {version}"
            )));
        }

        let key_len = read_u32(bytes, 8) as usize;
        let sig_len = read_u32(bytes, 12) as usize;

        let key_end = HEADER_LEN
            .checked_add(key_len)
            .ok_or_else(|| SignerError::InvalidPackage("public key length overflow".into()))?;
        let sig_end = key_end
            .checked_add(sig_len)
            .ok_or_else(|| SignerError::InvalidPackage("signature length overflow".into()))?;
        if sig_end > bytes.len() {
            return Err(SignerError::InvalidPackage(format!(
                "declared sections ({sig_end} bytes) exceed package size ({})",
                bytes.len()
            )));
        }

        Ok(Self {
            public_key: bytes[HEADER_LEN..key_end].to_vec(),
            signature: bytes[key_end..sig_end].to_vec(),
            content: bytes[sig_end..].to_vec(),
        })
    }
}

impl std::fmt::Debug for SignedPackage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SignedPackage")
            .field("app_id", &self.app_id())
            .field("signature_len", &self.signature.len())
            .field("content_len", &self.content.len())
            .finish()
    }
}

fn section_len(section: &[u8], what: &str) -> SignerResult<u32> {
    u32::try_from(section.len())
        .map_err(|_| SignerError::InvalidPackage(format!("{what} too large")))
}

fn read_u32(bytes: &[u8], offset: usize) -> u32 {
    let mut buf = [0u8; 4];
    buf.copy_from_slice(&bytes[offset..offset + 4]);
    u32::from_le_bytes(buf)
}
