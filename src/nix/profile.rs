// src/nix/profile.rs

//! Reading installed packages from `nix profile list --json`
//!
//! Two shapes are in the wild:
//! - newer nix: `{"elements": {"hello": {"attrPath": ..., "storePaths": [...]}}}`
//! - older nix: `{"elements": [{"attrPath": ..., "storePaths": [...]}]}`
//!
//! Versions are taken from the store path
//! (`/nix/store/<hash>-hello-2.12.1`), falling back to a trailing
//! version-like suffix of the element name (`nodejs_20` -> `20`).

use crate::error::{Error, Result};
use crate::packages::{PackageInfo, UNKNOWN_VERSION};
use regex::Regex;
use serde::Deserialize;
use serde_json::Value;
use std::sync::OnceLock;
use tracing::{debug, warn};

#[derive(Debug, Deserialize)]
struct ProfileElement {
    #[serde(rename = "attrPath", default)]
    attr_path: Option<String>,
    #[serde(rename = "storePaths", default)]
    store_paths: Vec<String>,
}

fn store_path_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^(?P<pname>.+?)-(?P<version>\d+(?:\.\d+)*)(?:[^\d.].*)?$")
            .expect("store path pattern is valid")
    })
}

fn name_suffix_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"[A-Za-z][-_]?(?P<version>\d+(?:\.\d+)*)$").expect("name suffix pattern is valid")
    })
}

/// Split a store path into `(pname, version)`
///
/// `/nix/store/abc...-openssl-3.0.13-dev` -> `("openssl", "3.0.13")`
pub fn parse_store_path(store_path: &str) -> Option<(String, String)> {
    let base = store_path.rsplit('/').next()?;
    // Strip the 32-character hash prefix
    let (_, rest) = base.split_once('-')?;
    let caps = store_path_regex().captures(rest)?;
    Some((caps["pname"].to_string(), caps["version"].to_string()))
}

/// Trailing version-like suffix of a package name
pub fn version_from_name(name: &str) -> Option<String> {
    name_suffix_regex()
        .captures(name)
        .map(|caps| caps["version"].to_string())
}

/// Parse the profile listing into installed packages
pub fn parse_profile_listing(stdout: &str) -> Result<Vec<PackageInfo>> {
    if stdout.trim().is_empty() {
        return Ok(Vec::new());
    }

    let value: Value = serde_json::from_str(stdout)
        .map_err(|e| Error::Parse(format!("profile listing is not JSON: {}", e)))?;

    let elements = match value.get("elements") {
        None | Some(Value::Null) => return Ok(Vec::new()),
        Some(elements) => elements,
    };

    let named: Vec<(Option<String>, &Value)> = match elements {
        Value::Object(map) => map.iter().map(|(k, v)| (Some(k.clone()), v)).collect(),
        Value::Array(items) => items.iter().map(|v| (None, v)).collect(),
        other => {
            return Err(Error::Parse(format!(
                "profile elements must be an object or array, got {}",
                other
            )));
        }
    };

    let mut packages = Vec::with_capacity(named.len());
    for (key, raw) in named {
        let element: ProfileElement = serde_json::from_value(raw.clone())
            .map_err(|e| Error::Parse(format!("invalid profile element: {}", e)))?;

        match element_to_package(key, &element) {
            Some(pkg) => packages.push(pkg),
            None => warn!("Skipping profile element without a name: {:?}", element),
        }
    }

    debug!("Parsed {} installed packages", packages.len());
    Ok(packages)
}

fn element_to_package(key: Option<String>, element: &ProfileElement) -> Option<PackageInfo> {
    let from_store = element
        .store_paths
        .first()
        .and_then(|path| parse_store_path(path));

    let name = key
        .filter(|k| !k.trim().is_empty())
        .or_else(|| {
            element
                .attr_path
                .as_deref()
                .map(|p| p.rsplit('.').next().unwrap_or(p).to_string())
                .filter(|n| !n.is_empty())
        })
        .or_else(|| from_store.as_ref().map(|(pname, _)| pname.clone()))?;

    let (pname, version) = match from_store {
        Some((pname, version)) => (pname, version),
        None => (
            name.clone(),
            version_from_name(&name).unwrap_or_else(|| UNKNOWN_VERSION.to_string()),
        ),
    };

    let mut pkg = PackageInfo::new(name, version);
    pkg.pname = pname;
    Some(pkg)
}
