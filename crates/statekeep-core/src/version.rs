//! Data schema versioning.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{Error, Result};

static VERSION_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\d+\.\d+\.\d+$").expect("version pattern is valid"));

/// Check that a version string is `major.minor.patch` with numeric parts.
pub fn is_valid_version(s: &str) -> bool {
    VERSION_PATTERN.is_match(s)
}

/// Semantic version of a persisted data schema.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Version {
    pub major: u64,
    pub minor: u64,
    pub patch: u64,
}

impl Version {
    /// Parse a version string (e.g., "1.0.0").
    pub fn parse(s: &str) -> Result<Self> {
        if !is_valid_version(s) {
            return Err(Error::InvalidInput(format!(
                "Invalid version format: {} (expected major.minor.patch)",
                s
            )));
        }

        let mut parts = s.split('.').map(|part| {
            part.parse::<u64>()
                .map_err(|_| Error::InvalidInput(format!("Version component out of range: {}", s)))
        });

        // The pattern guarantees exactly three components.
        let major = parts.next().unwrap_or(Ok(0))?;
        let minor = parts.next().unwrap_or(Ok(0))?;
        let patch = parts.next().unwrap_or(Ok(0))?;

        Ok(Version {
            major,
            minor,
            patch,
        })
    }

    /// Two versions are compatible enough to restore or sync between only
    /// when their major versions are equal.
    pub fn same_major(&self, other: &Version) -> bool {
        self.major == other.major
    }
}

impl FromStr for Version {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Version::parse(s)
    }
}

impl PartialOrd for Version {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Version {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.major
            .cmp(&other.major)
            .then_with(|| self.minor.cmp(&other.minor))
            .then_with(|| self.patch.cmp(&other.patch))
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

/// Reject a pair of versions whose major numbers differ.
///
/// `subject` names what carries `incoming` (e.g. "Backup", "Import") and is
/// used in the error message together with both versions.
pub fn check_major_compatibility(subject: &str, incoming: &str, current: &str) -> Result<()> {
    let incoming_v = Version::parse(incoming)?;
    let current_v = Version::parse(current)?;

    if !incoming_v.same_major(&current_v) {
        return Err(Error::Compatibility(format!(
            "{} version {} is incompatible with current version {} (major versions differ)",
            subject, incoming, current
        )));
    }
    Ok(())
}
