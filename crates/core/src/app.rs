//! Application name handling.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Maximum accepted length of an application name.
pub const MAX_APP_NAME_LEN: usize = 128;

/// A human-chosen application name.
///
/// Names are used verbatim as directory and file names in the repository, so
/// only ASCII alphanumerics plus `-`, `_` and `.` are accepted, and a name may
/// not start with `.`.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct AppName(String);

impl AppName {
    /// Parse and validate an application name.
    pub fn parse(s: &str) -> crate::Result<Self> {
        if s.is_empty() {
            return Err(crate::Error::InvalidAppName("name is empty".to_string()));
        }
        if s.len() > MAX_APP_NAME_LEN {
            return Err(crate::Error::InvalidAppName(format!(
                "name exceeds {MAX_APP_NAME_LEN} characters"
            )));
        }
        if s.starts_with('.') {
            return Err(crate::Error::InvalidAppName(format!(
                "name may not start with '.': {s}"
            )));
        }
        if let Some(c) = s
            .chars()
            .find(|c| !(c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.')))
        {
            return Err(crate::Error::InvalidAppName(format!(
                "unsupported character {c:?} in {s}"
            )));
        }
        Ok(Self(s.to_string()))
    }

    /// Get the name as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// File name of the package for this application with the given extension.
    pub fn package_file_name(&self, extension: &str) -> String {
        format!("{}.{extension}", self.0)
    }
}

impl fmt::Debug for AppName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "AppName({})", self.0)
    }
}

impl fmt::Display for AppName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for AppName {
    type Error = crate::Error;

    fn try_from(value: String) -> crate::Result<Self> {
        Self::parse(&value)
    }
}

impl From<AppName> for String {
    fn from(value: AppName) -> Self {
        value.0
    }
}

impl std::str::FromStr for AppName {
    type Err = crate::Error;

    fn from_str(s: &str) -> crate::Result<Self> {
        Self::parse(s)
    }
}
