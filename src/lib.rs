// src/lib.rs

//! Beacon
//!
//! Package manager front-end built on Nix, with package-list snapshots
//! published to the Walrus blob network.
//!
//! # Architecture
//!
//! - Nix does the real work: search, profile install/remove/list
//! - Snapshots: the installed package list, uploaded as a JSON blob
//! - Wallet-scoped records: every publish is stored in SQLite per wallet
//! - Two front-ends over the same library: the CLI and the REST API

pub mod achievements;
pub mod blob;
pub mod commands;
pub mod config;
pub mod credentials;
pub mod db;
mod error;
pub mod nix;
pub mod packages;
pub mod render;
pub mod snapshot;

#[cfg(feature = "server")]
pub mod server;

pub use blob::{BlobPayload, BlobService, BlobStore};
pub use config::Config;
pub use error::{Error, Result, UpdateError, UploadFailure};
pub use nix::{CommandRunner, NixClient};
pub use packages::{PackageInfo, SnapshotPackage};
