//! Package versions and their ordering.
//!
//! Versions follow SemVer 2.0.0 as implemented by the `semver` crate:
//! - `major.minor.patch` compare numerically (`1.10.0 > 1.9.0`)
//! - a pre-release ranks below its release (`2.0.0-beta < 2.0.0`) but still
//!   above any lower release (`2.0.0-beta > 1.10.0`)
//! - pre-release identifiers compare per SemVer section 11
//! - build metadata never affects precedence, and only breaks ties so that
//!   the ordering stays total (`1.0.0 < 1.0.0+build`)

use serde::{Deserialize, Serialize};
use std::fmt;

/// A semantic version owned by exactly one application.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PackageVersion(semver::Version);

impl PackageVersion {
    /// Parse a version string. Surrounding whitespace is not accepted.
    pub fn parse(s: &str) -> crate::Result<Self> {
        semver::Version::parse(s)
            .map(Self)
            .map_err(|e| crate::Error::InvalidVersion(format!("{s}: {e}")))
    }

    /// Get the underlying semver value.
    pub fn as_semver(&self) -> &semver::Version {
        &self.0
    }

    /// Whether this is a pre-release version.
    pub fn is_prerelease(&self) -> bool {
        !self.0.pre.is_empty()
    }
}

impl fmt::Debug for PackageVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PackageVersion({})", self.0)
    }
}

impl fmt::Display for PackageVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

impl std::str::FromStr for PackageVersion {
    type Err = crate::Error;

    fn from_str(s: &str) -> crate::Result<Self> {
        Self::parse(s)
    }
}

/// Return the highest version of the iterator, if any.
pub fn latest<'a>(
    versions: impl IntoIterator<Item = &'a PackageVersion>,
) -> Option<&'a PackageVersion> {
    versions.into_iter().max()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn v(s: &str) -> PackageVersion {
        PackageVersion::parse(s).unwrap()
    }

    #[test]
    fn test_numeric_not_lexical() {
        assert!(v("1.10.0") > v("1.9.0"));
        assert!(v("10.0.0") > v("9.99.99"));
    }

    #[test]
    fn test_prerelease_of_higher_major_wins() {
        let versions = [v("1.9.0"), v("1.10.0"), v("2.0.0-beta")];
        assert_eq!(latest(&versions), Some(&v("2.0.0-beta")));
    }

    #[test]
    fn test_release_beats_its_prerelease() {
        let versions = [v("2.0.0-beta"), v("2.0.0"), v("2.0.0-rc.1")];
        assert_eq!(latest(&versions), Some(&v("2.0.0")));
    }

    #[test]
    fn test_prerelease_identifier_precedence() {
        assert!(v("1.0.0-alpha") < v("1.0.0-alpha.1"));
        assert!(v("1.0.0-alpha.1") < v("1.0.0-alpha.beta"));
        assert!(v("1.0.0-beta.2") < v("1.0.0-beta.11"));
        assert!(v("1.0.0-rc.1") < v("1.0.0"));
    }

    #[test]
    fn test_build_metadata_only_breaks_ties() {
        assert!(v("1.0.1") > v("1.0.0+zzz"));
        assert!(v("1.0.0+build") > v("1.0.0"));
    }

    #[test]
    fn test_rejects_non_semver() {
        for s in ["1.0", "v1.0.0", "", "1.0.0 ", "01.0.0", "latest"] {
            assert!(PackageVersion::parse(s).is_err(), "{s:?} should be rejected");
        }
    }

    #[test]
    fn test_display_roundtrips_directory_name() {
        for s in ["1.0.0", "2.0.0-beta.1", "1.2.3+sha.abc"] {
            assert_eq!(v(s).to_string(), s);
        }
    }

    #[test]
    fn test_latest_of_empty_is_none() {
        assert_eq!(latest(&[]), None);
    }
}
