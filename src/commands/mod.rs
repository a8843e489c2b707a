// src/commands/mod.rs

//! CLI command handlers
//!
//! Each handler composes the library components for one subcommand and
//! prints its result. Handlers return errors instead of exiting; `main`
//! decides which of them are fatal.

mod hub;
mod packages;
mod quickstart;

pub use hub::{login, pull, push};
pub use packages::{install, list, remove, search, update};
pub use quickstart::{environments, quickstart};

use crate::blob::BlobService;
use crate::config::Config;
use crate::credentials::CredentialStore;
use crate::db::Database;
use crate::error::Result;
use crate::nix::{CommandRunner, NixClient, SystemRunner};
use crate::render::Renderer;

/// Everything a command handler may need
///
/// The database and blob service are created on first use, so commands
/// that never touch them run without `DATABASE_URL` or a signer.
pub struct Context<R: CommandRunner = SystemRunner> {
    pub config: Config,
    pub nix: NixClient<R>,
    pub credentials: CredentialStore,
    pub out: Renderer,
    blobs: Option<BlobService>,
}

impl Context<SystemRunner> {
    /// Context for a real invocation
    pub fn from_config(config: Config) -> Result<Self> {
        let nix = config.nix_client();
        let credentials = CredentialStore::default_location()?;
        Ok(Self::new(config, nix, credentials, Renderer::current()))
    }
}

impl<R: CommandRunner> Context<R> {
    pub fn new(config: Config, nix: NixClient<R>, credentials: CredentialStore, out: Renderer) -> Self {
        Self {
            config,
            nix,
            credentials,
            out,
            blobs: None,
        }
    }

    /// Use `blobs` instead of the configured backend
    pub fn with_blob_service(mut self, blobs: BlobService) -> Self {
        self.blobs = Some(blobs);
        self
    }

    fn blobs(&self) -> Result<BlobService> {
        match &self.blobs {
            Some(blobs) => Ok(blobs.clone()),
            None => self.config.blob_service(),
        }
    }

    fn database(&self) -> Result<Database> {
        Database::connect(self.config.require_database_url()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::nix::CommandOutput;
    use crate::render::OutputStyle;
    use std::sync::Mutex;
    use std::time::Duration;
    use tempfile::TempDir;

    /// Accepts every install and records the requested references
    #[derive(Default)]
    struct InstallRecorder {
        installs: Mutex<Vec<String>>,
    }

    impl CommandRunner for InstallRecorder {
        fn run(&self, _program: &str, args: &[String], _timeout: Duration) -> Result<CommandOutput> {
            if args.iter().any(|a| a == "install") {
                if let Some(reference) = args.last() {
                    self.installs.lock().unwrap().push(reference.clone());
                }
            }
            Ok(CommandOutput::ok(r#"{"version": 3, "elements": {}}"#))
        }
    }

    fn context(dir: &TempDir) -> Context<InstallRecorder> {
        let nix = NixClient::new(InstallRecorder::default(), "nix", Duration::from_secs(5));
        Context::new(
            Config::default(),
            nix,
            CredentialStore::at(dir.path().join("config.json")),
            Renderer {
                style: OutputStyle::Plain,
            },
        )
    }

    #[test]
    fn test_quickstart_installs_in_order() {
        let dir = TempDir::new().unwrap();
        let ctx = context(&dir);
        quickstart(&ctx, "node").unwrap();

        let installs = ctx.nix.runner().installs.lock().unwrap().clone();
        assert_eq!(installs, vec!["nixpkgs#nodejs", "nixpkgs#yarn", "nixpkgs#git"]);
    }

    #[test]
    fn test_unknown_quickstart() {
        let dir = TempDir::new().unwrap();
        let ctx = context(&dir);
        assert!(matches!(quickstart(&ctx, "cobol"), Err(Error::NotFound(_))));
        assert!(ctx.nix.runner().installs.lock().unwrap().is_empty());
        environments(&ctx).unwrap();
    }

    #[test]
    fn test_push_needs_database_after_login() {
        let dir = TempDir::new().unwrap();
        let ctx = context(&dir);
        login(&ctx, "0xabc").unwrap();

        let err = push(&ctx, "demo").unwrap_err();
        assert!(matches!(err, Error::Config(_)));
        assert!(err.is_setup_error());
    }
}
