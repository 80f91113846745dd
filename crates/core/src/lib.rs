//! Core domain types for the cask extension update service.
//!
//! This crate defines the canonical data model used across all other crates:
//! - Application names and package versions
//! - Application identities derived from signing keys
//! - Extension manifests and their update-feed rewrite
//! - The update feed document and its XML rendering
//! - Service configuration

pub mod app;
pub mod config;
pub mod error;
pub mod feed;
pub mod identity;
pub mod manifest;
pub mod version;

pub use app::AppName;
pub use error::{Error, Result};
pub use feed::{FeedDocument, FeedEntry};
pub use identity::AppId;
pub use manifest::Manifest;
pub use version::PackageVersion;

/// File name of the manifest at the root of every extension archive.
pub const MANIFEST_FILE: &str = "manifest.json";

/// Manifest field that declares the update feed location.
pub const UPDATE_URL_FIELD: &str = "update_url";
