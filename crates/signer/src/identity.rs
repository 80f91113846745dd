//! Application identity derivation.

use crate::error::SignerResult;
use crate::key::PublicKey;
use cask_core::AppId;

/// Derive the stable application id for a public key.
///
/// The id is computed from the DER SubjectPublicKeyInfo encoding, the same
/// bytes embedded in every package signed with the key, so any client can
/// recompute it from a downloaded package.
pub fn derive_identity(public: &PublicKey) -> SignerResult<AppId> {
    let der = public.to_der()?;
    Ok(AppId::from_public_key_der(&der))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::key::KeyPair;

    #[test]
    fn test_identity_is_stable_across_reloads() {
        let keypair = KeyPair::generate(1024).unwrap();
        let reloaded = KeyPair::from_pem(&keypair.to_pem().unwrap()).unwrap();

        let id = derive_identity(&keypair.public).unwrap();
        assert_eq!(id, derive_identity(&reloaded.public).unwrap());
        assert_eq!(id.as_str().len(), cask_core::identity::APP_ID_LEN);
        assert!(id.as_str().bytes().all(|b| (b'a'..=b'p').contains(&b)));
    }

    #[test]
    fn test_distinct_keys_distinct_ids() {
        let a = KeyPair::generate(1024).unwrap();
        let b = KeyPair::generate(1024).unwrap();
        assert_ne!(
            derive_identity(&a.public).unwrap(),
            derive_identity(&b.public).unwrap()
        );
    }
}
