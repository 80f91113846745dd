//! Package signing and container assembly for cask.
//!
//! This crate provides:
//! - RSA key generation and PEM persistence encoding
//! - Application identity derivation from a public key
//! - Detached signatures over package contents
//! - The signed package container format (CRX version 2)
//! - Safe archive extraction and deterministic repacking
//! - The package builder that ties the above together

pub mod archive;
pub mod builder;
pub mod container;
pub mod error;
pub mod identity;
pub mod key;
pub mod signer;

pub use archive::ExtractLimits;
pub use builder::{BuiltPackage, PackageBuilder};
pub use container::SignedPackage;
pub use error::{SignerError, SignerResult};
pub use identity::derive_identity;
pub use key::{KeyPair, PublicKey, SecretKey};
pub use signer::{sign_content, verify_content};
