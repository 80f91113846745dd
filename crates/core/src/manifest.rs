//! Extension manifest handling.
//!
//! The manifest is kept as an ordered JSON object so that fields this service
//! does not interpret survive the rewrite untouched and in their original order.

use crate::UPDATE_URL_FIELD;
use crate::version::PackageVersion;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

/// An extension manifest.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Manifest(Map<String, Value>);

impl Manifest {
    /// Parse a manifest document.
    ///
    /// The document must be a JSON object with string `name` and `version`
    /// fields. A leading UTF-8 byte order mark is ignored.
    pub fn from_slice(bytes: &[u8]) -> crate::Result<Self> {
        let bytes = bytes.strip_prefix(UTF8_BOM).unwrap_or(bytes);
        let value: Value = serde_json::from_slice(bytes)
            .map_err(|e| crate::Error::ManifestParse(e.to_string()))?;
        let Value::Object(fields) = value else {
            return Err(crate::Error::ManifestParse(
                "manifest root must be a JSON object".to_string(),
            ));
        };

        let manifest = Self(fields);
        manifest.require_str("name")?;
        manifest.require_str("version")?;
        Ok(manifest)
    }

    fn require_str(&self, field: &'static str) -> crate::Result<&str> {
        match self.0.get(field) {
            Some(Value::String(s)) => Ok(s),
            Some(_) => Err(crate::Error::ManifestParse(format!(
                "field '{field}' must be a string"
            ))),
            None => Err(crate::Error::ManifestMissingField(field)),
        }
    }

    /// The extension name as declared by the manifest.
    pub fn name(&self) -> &str {
        self.0.get("name").and_then(Value::as_str).unwrap_or_default()
    }

    /// The raw version string as declared by the manifest.
    pub fn version(&self) -> &str {
        self.0
            .get("version")
            .and_then(Value::as_str)
            .unwrap_or_default()
    }

    /// The declared version parsed as a semantic version.
    pub fn package_version(&self) -> crate::Result<PackageVersion> {
        PackageVersion::parse(self.version())
    }

    /// The declared update feed location, if any.
    ///
    /// A present but non-string value still counts as declared.
    pub fn update_url(&self) -> Option<String> {
        self.0.get(UPDATE_URL_FIELD).map(|value| match value {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        })
    }

    /// Point the manifest at `feed_url`.
    ///
    /// Fails with [`crate::Error::ConflictingFeed`] if the manifest already
    /// declares an update feed of any kind.
    pub fn set_update_url(&mut self, feed_url: &str) -> crate::Result<()> {
        if let Some(existing) = self.update_url() {
            return Err(crate::Error::ConflictingFeed { existing });
        }
        self.0.insert(
            UPDATE_URL_FIELD.to_string(),
            Value::String(feed_url.to_string()),
        );
        Ok(())
    }

    /// Serialize back into a pretty-printed document.
    pub fn to_vec_pretty(&self) -> crate::Result<Vec<u8>> {
        serde_json::to_vec_pretty(&self.0).map_err(|e| crate::Error::ManifestParse(e.to_string()))
    }

    /// Access the underlying fields.
    pub fn fields(&self) -> &Map<String, Value> {
        &self.0
    }
}
