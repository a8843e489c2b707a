// src/packages/types.rs

use serde::{Deserialize, Serialize};

/// Version reported when none can be extracted
pub const UNKNOWN_VERSION: &str = "unknown";

/// A package known to the external package manager
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageInfo {
    /// Attribute name (last segment of the attribute path, or profile element name)
    pub name: String,
    pub pname: String,
    /// Version as reported by nix; `UNKNOWN_VERSION` when it could not be determined
    pub version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub license: Option<String>,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub package_type: Option<String>,
}

impl PackageInfo {
    /// Create a package with only name and version known
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            pname: name.clone(),
            name,
            version: version.into(),
            description: None,
            license: None,
            package_type: None,
        }
    }

    pub fn has_known_version(&self) -> bool {
        self.version != UNKNOWN_VERSION
    }
}

/// Published projection of an installed package
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotPackage {
    pub name: String,
    pub version: String,
}

impl SnapshotPackage {
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
        }
    }

    /// Version to request on reinstall, `None` when it was never known
    pub fn requested_version(&self) -> Option<&str> {
        if self.version.is_empty() || self.version == UNKNOWN_VERSION {
            None
        } else {
            Some(&self.version)
        }
    }
}

impl From<&PackageInfo> for SnapshotPackage {
    fn from(info: &PackageInfo) -> Self {
        Self::new(info.name.clone(), info.version.clone())
    }
}

/// True for `1`, `2.12`, `3.0.13` ... (digits separated by single dots)
pub fn is_dotted_numeric(s: &str) -> bool {
    !s.is_empty()
        && s.split('.')
            .all(|part| !part.is_empty() && part.bytes().all(|b| b.is_ascii_digit()))
}
