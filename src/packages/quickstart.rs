// src/packages/quickstart.rs

/// One package in a quickstart bundle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuickstartPackage {
    pub name: &'static str,
    /// `None` installs the latest available version
    pub version: Option<&'static str>,
    /// Flake to install from instead of nixpkgs
    pub flake_source: Option<&'static str>,
}

const fn latest(name: &'static str) -> QuickstartPackage {
    QuickstartPackage {
        name,
        version: None,
        flake_source: None,
    }
}

const SUI: &[QuickstartPackage] = &[
    latest("curl"),
    latest("gitFull"),
    latest("cmake"),
    latest("gcc"),
    latest("openssl.dev"),
    latest("pkg-config"),
    latest("clang.dev"),
    latest("postgresql.dev"),
    latest("buildPackages.stdenv"),
];

const NODE: &[QuickstartPackage] = &[latest("nodejs"), latest("yarn"), latest("git")];

const RUST: &[QuickstartPackage] = &[
    latest("rustc"),
    latest("cargo"),
    latest("rustfmt"),
    latest("clippy"),
];

const QUICKSTARTS: &[(&str, &str, &[QuickstartPackage])] = &[
    ("sui", "SUI blockchain development environment", SUI),
    ("node", "Node.js development environment", NODE),
    ("rust", "Rust development environment", RUST),
];

/// Packages for an environment, in install order
pub fn find_quickstart(environment: &str) -> Option<&'static [QuickstartPackage]> {
    QUICKSTARTS
        .iter()
        .find(|(name, _, _)| *name == environment)
        .map(|(_, _, packages)| *packages)
}

/// Environment names with their descriptions
pub fn quickstart_names() -> impl Iterator<Item = (&'static str, &'static str)> {
    QUICKSTARTS.iter().map(|(name, description, _)| (*name, *description))
}
