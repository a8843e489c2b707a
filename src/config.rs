// src/config.rs

//! Runtime configuration from environment variables
//!
//! `main` loads a `.env` file first, so every variable below can also be
//! set there.
//!
//! | Variable | Default |
//! |---|---|
//! | `DATABASE_URL` | required by commands that touch the database |
//! | `HOST` / `PORT` | `0.0.0.0` / `5000` |
//! | `SUI_SIGNER_SEED` or `SUI_SIGNER_ADDRESS` | required for the Walrus backend |
//! | `WALRUS_PUBLISHER_URL`, `WALRUS_AGGREGATOR_URL`, `SUI_RPC_URL` | mainnet endpoints |
//! | `WALRUS_EPOCHS` | `3` |
//! | `BEACON_NIX_BIN` | `nix` |
//! | `BEACON_NIX_TIMEOUT_SECS` | `600` |
//! | `BEACON_BLOB_BACKEND` | `walrus` (`memory` keeps blobs in process) |

use crate::blob::signer::{address_from_seed, normalize_address};
use crate::blob::walrus::{DEFAULT_AGGREGATOR_URL, DEFAULT_PUBLISHER_URL, DEFAULT_SUI_RPC_URL};
use crate::blob::{BlobService, DEFAULT_EPOCHS, MemoryBlobStore, WalrusStore};
use crate::error::{Error, Result};
use crate::nix::{DEFAULT_TIMEOUT, NixClient, SystemRunner};
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

pub const DEFAULT_HOST: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 5000;

/// Signer used when blobs stay in process and no signer is configured
const MEMORY_SIGNER: &str = "0x0000000000000000000000000000000000000000000000000000000000000000";

/// Where blobs are stored
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlobBackend {
    Walrus,
    Memory,
}

impl BlobBackend {
    pub fn as_str(&self) -> &str {
        match self {
            BlobBackend::Walrus => "walrus",
            BlobBackend::Memory => "memory",
        }
    }
}

impl FromStr for BlobBackend {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "walrus" => Ok(BlobBackend::Walrus),
            "memory" => Ok(BlobBackend::Memory),
            other => Err(Error::Config(format!("Invalid BEACON_BLOB_BACKEND: {}", other))),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: Option<String>,
    pub host: String,
    pub port: u16,
    /// Sui address paying for uploads
    pub signer_address: Option<String>,
    pub publisher_url: String,
    pub aggregator_url: String,
    pub sui_rpc_url: String,
    pub epochs: u32,
    pub nix_binary: String,
    pub nix_timeout: Duration,
    pub blob_backend: BlobBackend,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_url: None,
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            signer_address: None,
            publisher_url: DEFAULT_PUBLISHER_URL.to_string(),
            aggregator_url: DEFAULT_AGGREGATOR_URL.to_string(),
            sui_rpc_url: DEFAULT_SUI_RPC_URL.to_string(),
            epochs: DEFAULT_EPOCHS,
            nix_binary: "nix".to_string(),
            nix_timeout: DEFAULT_TIMEOUT,
            blob_backend: BlobBackend::Walrus,
        }
    }
}

fn parse_var<T: FromStr>(name: &str, value: &str) -> Result<T>
where
    T::Err: std::fmt::Display,
{
    value
        .trim()
        .parse()
        .map_err(|e| Error::Config(format!("Invalid {} '{}': {}", name, value, e)))
}

impl Config {
    /// Read the process environment
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build a configuration from any variable source
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());
        let mut config = Config::default();

        config.database_url = get("DATABASE_URL");
        if let Some(host) = get("HOST") {
            config.host = host;
        }
        if let Some(port) = get("PORT") {
            config.port = parse_var("PORT", &port)?;
        }

        config.signer_address = match (get("SUI_SIGNER_SEED"), get("SUI_SIGNER_ADDRESS")) {
            (Some(seed), _) => Some(address_from_seed(&seed)?),
            (None, Some(address)) => Some(normalize_address(&address)?),
            (None, None) => None,
        };

        if let Some(url) = get("WALRUS_PUBLISHER_URL") {
            config.publisher_url = url;
        }
        if let Some(url) = get("WALRUS_AGGREGATOR_URL") {
            config.aggregator_url = url;
        }
        if let Some(url) = get("SUI_RPC_URL") {
            config.sui_rpc_url = url;
        }
        if let Some(epochs) = get("WALRUS_EPOCHS") {
            config.epochs = parse_var("WALRUS_EPOCHS", &epochs)?;
            if config.epochs == 0 {
                return Err(Error::Config("WALRUS_EPOCHS must be at least 1".to_string()));
            }
        }
        if let Some(binary) = get("BEACON_NIX_BIN") {
            config.nix_binary = binary;
        }
        if let Some(secs) = get("BEACON_NIX_TIMEOUT_SECS") {
            config.nix_timeout = Duration::from_secs(parse_var("BEACON_NIX_TIMEOUT_SECS", &secs)?);
        }
        if let Some(backend) = get("BEACON_BLOB_BACKEND") {
            config.blob_backend = backend.parse()?;
        }

        debug!(
            "Configuration: backend={}, host={}, port={}, database={}",
            config.blob_backend.as_str(),
            config.host,
            config.port,
            config.database_url.is_some()
        );
        Ok(config)
    }

    pub fn require_database_url(&self) -> Result<&str> {
        self.database_url
            .as_deref()
            .ok_or_else(|| Error::Config("DATABASE_URL is not set".to_string()))
    }

    pub fn nix_client(&self) -> NixClient<SystemRunner> {
        NixClient::new(SystemRunner, self.nix_binary.clone(), self.nix_timeout)
    }

    /// Blob service for the configured backend
    pub fn blob_service(&self) -> Result<BlobService> {
        let service = match self.blob_backend {
            BlobBackend::Memory => {
                let signer = self.signer_address.clone().unwrap_or_else(|| MEMORY_SIGNER.to_string());
                BlobService::new(Arc::new(MemoryBlobStore::new()), signer)
            }
            BlobBackend::Walrus => {
                let signer = self.signer_address.clone().ok_or_else(|| {
                    Error::Config("SUI_SIGNER_SEED or SUI_SIGNER_ADDRESS must be set".to_string())
                })?;
                let store = WalrusStore::new(&self.publisher_url, &self.aggregator_url, &self.sui_rpc_url)?
                    .send_object_to(signer.clone());
                BlobService::new(Arc::new(store), signer)
            }
        };
        Ok(service.with_epochs(self.epochs))
    }
}
