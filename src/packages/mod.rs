// src/packages/mod.rs

//! Package data types shared by the executor, the publisher and the API
//!
//! - `PackageInfo`: a package as reported by `nix search` / `nix profile list`
//! - `SnapshotPackage`: the `{name, version}` projection that gets published
//! - `mappings`: static update redirects (deprecated name -> replacement)
//! - `quickstart`: static development environment bundles

pub mod mappings;
pub mod quickstart;
mod types;

pub use mappings::{PackageMapping, resolve_mapping};
pub use quickstart::{QuickstartPackage, find_quickstart, quickstart_names};
pub use types::{PackageInfo, SnapshotPackage, UNKNOWN_VERSION, is_dotted_numeric};
