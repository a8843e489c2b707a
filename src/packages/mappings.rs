// src/packages/mappings.rs

//! Update redirects
//!
//! When `update` is asked for a package listed here, the package is removed
//! and the target installed in its place. Add entries by editing the table.

/// Replacement for a deprecated package
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PackageMapping {
    pub source_package: &'static str,
    pub target_package: &'static str,
    pub description: &'static str,
}

const PACKAGE_MAPPINGS: &[PackageMapping] = &[
    PackageMapping {
        source_package: "python310",
        target_package: "python313",
        description: "Python 3.10 is outdated, upgrade to Python 3.13",
    },
    PackageMapping {
        source_package: "python311",
        target_package: "python313",
        description: "Python 3.11 is outdated, upgrade to Python 3.13",
    },
    PackageMapping {
        source_package: "python312",
        target_package: "python313",
        description: "Python 3.12 is outdated, upgrade to Python 3.13",
    },
    PackageMapping {
        source_package: "nodejs",
        target_package: "nodejs_20",
        description: "Default Node.js should be upgraded to Node.js 20",
    },
    PackageMapping {
        source_package: "nodejs_18",
        target_package: "nodejs_20",
        description: "Node.js 18 is outdated, upgrade to Node.js 20",
    },
];

/// Look up the update redirect for a package name
pub fn resolve_mapping(name: &str) -> Option<&'static PackageMapping> {
    PACKAGE_MAPPINGS.iter().find(|m| m.source_package == name)
}
