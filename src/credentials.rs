// src/credentials.rs

//! Local CLI identity
//!
//! `beacon login <address>` writes `~/.beacon/config.json`; commands that
//! publish on behalf of a wallet read it back. There is one identity per
//! user account and it never expires.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

const CONFIG_DIR: &str = ".beacon";
const CONFIG_FILE: &str = "config.json";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserCredentials {
    pub user_address: String,
    /// Login time in milliseconds since the Unix epoch
    pub timestamp: i64,
}

/// Credential file location
#[derive(Debug, Clone)]
pub struct CredentialStore {
    path: PathBuf,
}

impl CredentialStore {
    /// `~/.beacon/config.json`
    pub fn default_location() -> Result<Self> {
        let home = dirs::home_dir()
            .ok_or_else(|| Error::Config("cannot determine the home directory".to_string()))?;
        Ok(Self::at(home.join(CONFIG_DIR).join(CONFIG_FILE)))
    }

    pub fn at(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Save `address` as the current identity
    pub fn login(&self, address: &str) -> Result<UserCredentials> {
        let address = address.trim();
        if address.is_empty() {
            return Err(Error::Validation("User address cannot be empty".to_string()));
        }

        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }

        let credentials = UserCredentials {
            user_address: address.to_string(),
            timestamp: chrono::Utc::now().timestamp_millis(),
        };
        fs::write(&self.path, serde_json::to_string_pretty(&credentials)?)?;
        debug!("Saved credentials to {}", self.path.display());
        Ok(credentials)
    }

    /// The saved identity; missing or unreadable files count as logged out
    pub fn load(&self) -> Option<UserCredentials> {
        let raw = fs::read_to_string(&self.path).ok()?;
        match serde_json::from_str(&raw) {
            Ok(credentials) => Some(credentials),
            Err(e) => {
                warn!("Ignoring unreadable {}: {}", self.path.display(), e);
                None
            }
        }
    }

    /// The saved identity, or `Error::LoginRequired`
    pub fn require(&self) -> Result<UserCredentials> {
        self.load().ok_or(Error::LoginRequired)
    }
}
