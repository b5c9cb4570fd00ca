//! Host environments and their storage layouts.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::Error;

/// Host environment a store belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    Chrome,
    Edge,
    Firefox,
    Safari,
}

impl Environment {
    /// All known environments.
    pub const ALL: [Environment; 4] = [
        Environment::Chrome,
        Environment::Edge,
        Environment::Firefox,
        Environment::Safari,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Environment::Chrome => "chrome",
            Environment::Edge => "edge",
            Environment::Firefox => "firefox",
            Environment::Safari => "safari",
        }
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Environment {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "chrome" => Ok(Environment::Chrome),
            "edge" => Ok(Environment::Edge),
            "firefox" => Ok(Environment::Firefox),
            "safari" => Ok(Environment::Safari),
            other => Err(Error::InvalidInput(format!("Unknown environment: {}", other))),
        }
    }
}

/// A named storage area of a partitioned store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageArea {
    Local,
    Sync,
    Managed,
}

impl StorageArea {
    pub fn as_str(&self) -> &'static str {
        match self {
            StorageArea::Local => "local",
            StorageArea::Sync => "sync",
            StorageArea::Managed => "managed",
        }
    }
}

impl fmt::Display for StorageArea {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Shape of the persisted data in an environment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StorageLayout {
    /// One flat key-value namespace.
    Flat,
    /// Top-level keys are storage areas, each holding an object.
    Partitioned { areas: Vec<StorageArea> },
}

impl StorageLayout {
    pub fn is_flat(&self) -> bool {
        matches!(self, StorageLayout::Flat)
    }

    /// Areas of a partitioned layout; empty for a flat one.
    pub fn areas(&self) -> &[StorageArea] {
        match self {
            StorageLayout::Flat => &[],
            StorageLayout::Partitioned { areas } => areas,
        }
    }

    pub fn has_area(&self, area: StorageArea) -> bool {
        self.areas().contains(&area)
    }
}
