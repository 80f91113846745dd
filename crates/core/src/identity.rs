//! Application identity derived from a public key.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

/// Length of an application id in characters.
pub const APP_ID_LEN: usize = 32;

/// A 32-character application id in the `a`..`p` alphabet.
///
/// The id is the first 16 bytes of the SHA-256 digest of the DER-encoded
/// public key, with every nibble mapped to a letter (`0` -> `a` .. `15` -> `p`),
/// high nibble first.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct AppId(String);

impl AppId {
    /// Derive the id from a DER-encoded SubjectPublicKeyInfo.
    pub fn from_public_key_der(der: &[u8]) -> Self {
        let digest = Sha256::digest(der);
        let id = digest
            .iter()
            .take(APP_ID_LEN / 2)
            .flat_map(|byte| [byte >> 4, byte & 0x0f])
            .map(|nibble| char::from(b'a' + nibble))
            .collect();
        Self(id)
    }

    /// Parse a previously rendered id, as read back from storage.
    pub fn parse(s: &str) -> crate::Result<Self> {
        if s.len() != APP_ID_LEN {
            return Err(crate::Error::InvalidAppId(format!(
                "expected {APP_ID_LEN} characters, got {}",
                s.len()
            )));
        }
        if !s.bytes().all(|b| (b'a'..=b'p').contains(&b)) {
            return Err(crate::Error::InvalidAppId(format!(
                "characters outside a-p: {s}"
            )));
        }
        Ok(Self(s.to_string()))
    }

    /// Get the id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for AppId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "AppId({})", self.0)
    }
}

impl fmt::Display for AppId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for AppId {
    type Error = crate::Error;

    fn try_from(value: String) -> crate::Result<Self> {
        Self::parse(&value)
    }
}

impl From<AppId> for String {
    fn from(value: AppId) -> Self {
        value.0
    }
}
