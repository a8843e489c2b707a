// src/nix/mod.rs

//! Command executor for the Nix package manager
//!
//! Every operation shells out to `nix` through a `CommandRunner`:
//! - `search`: `nix search nixpkgs <term> --json`, ranked by relevance
//! - `install`: `nix profile install <source>#<name>`
//! - `remove`: `nix profile remove <name>`, best-effort per package
//! - `update`: remove + install, following the update mappings
//! - `list_installed`: `nix profile list --json`

pub mod profile;
pub mod runner;
pub mod search;

use crate::error::{Error, Result, UpdateError};
use crate::packages::{PackageInfo, PackageMapping, UNKNOWN_VERSION, resolve_mapping};
pub use runner::{CommandOutput, CommandRunner, SystemRunner};
use runner::display_command;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Flake used when no source is given
pub const DEFAULT_SOURCE: &str = "nixpkgs";

/// Default time limit for a single nix invocation
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(600);

/// Result of removing one package in a batch
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemoveStatus {
    Removed,
    NotInstalled,
    Failed(String),
}

/// Per-package entry of a batch removal
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoveOutcome {
    pub name: String,
    pub status: RemoveStatus,
}

/// What an update did
#[derive(Debug, Clone)]
pub struct UpdateOutcome {
    /// Package that was removed
    pub removed: String,
    /// Package now providing the functionality
    pub installed: PackageInfo,
    /// Redirect that was followed, if any
    pub mapping: Option<&'static PackageMapping>,
    /// The mapped target was already installed, so nothing was installed
    pub install_skipped: bool,
}

/// Client for the `nix` binary
pub struct NixClient<R: CommandRunner = SystemRunner> {
    runner: R,
    binary: String,
    timeout: Duration,
}

impl NixClient<SystemRunner> {
    /// Client for the `nix` on PATH with the default timeout
    pub fn system() -> Self {
        Self::new(SystemRunner, "nix", DEFAULT_TIMEOUT)
    }
}

impl<R: CommandRunner> NixClient<R> {
    pub fn new(runner: R, binary: impl Into<String>, timeout: Duration) -> Self {
        Self {
            runner,
            binary: binary.into(),
            timeout,
        }
    }

    pub fn runner(&self) -> &R {
        &self.runner
    }

    /// Run a nix subcommand, turning a nonzero exit into `ExternalTool`
    fn nix(&self, args: &[&str]) -> Result<CommandOutput> {
        let mut full: Vec<String> = vec![
            "--extra-experimental-features".to_string(),
            "nix-command flakes".to_string(),
        ];
        full.extend(args.iter().map(|a| a.to_string()));

        let output = self.runner.run(&self.binary, &full, self.timeout)?;
        if !output.success {
            return Err(Error::ExternalTool {
                command: display_command(&self.binary, &full),
                stderr: output.stderr.trim().to_string(),
            });
        }
        Ok(output)
    }

    /// Search nixpkgs, best matches first
    pub fn search(&self, term: &str) -> Result<Vec<PackageInfo>> {
        Ok(self
            .search_scored(term)?
            .into_iter()
            .map(|c| c.package)
            .collect())
    }

    /// Search nixpkgs, keeping attribute paths and scores
    pub fn search_scored(&self, term: &str) -> Result<Vec<search::ScoredCandidate>> {
        self.search_in(DEFAULT_SOURCE, term)
    }

    /// Search an arbitrary flake, best matches first
    pub fn search_in(&self, source: &str, term: &str) -> Result<Vec<search::ScoredCandidate>> {
        let pattern = if term.trim().is_empty() { "^" } else { term.trim() };
        info!("Searching {} for '{}'", source, pattern);

        let output = self.nix(&["search", source, pattern, "--json"])?;
        let candidates = search::parse_search_output(&output.stdout)?;
        debug!("nix search returned {} candidates", candidates.len());

        let ranked = search::rank(term, candidates);
        if ranked.is_empty() {
            return Err(Error::NotFound(format!("no packages match '{}'", term)));
        }
        Ok(ranked)
    }

    /// Installed packages of the current profile
    pub fn list_installed(&self) -> Result<Vec<PackageInfo>> {
        let output = self.nix(&["profile", "list", "--json"])?;
        profile::parse_profile_listing(&output.stdout)
    }

    pub fn is_installed(&self, name: &str) -> Result<bool> {
        Ok(find_installed(&self.list_installed()?, name).is_some())
    }

    /// Install a package, optionally pinned to a version or from another flake
    pub fn install(
        &self,
        name: &str,
        version: Option<&str>,
        source: Option<&str>,
    ) -> Result<PackageInfo> {
        let requested = version
            .map(|v| v.trim().trim_start_matches('v'))
            .filter(|v| !v.is_empty());

        let source = source.unwrap_or(DEFAULT_SOURCE);
        let candidate = match requested {
            Some(v) => {
                let found = self
                    .search_in(source, name)?
                    .into_iter()
                    .map(|c| c.package)
                    .find(|p| p.name == name && p.version == v);
                match found {
                    Some(pkg) => Some(pkg),
                    None => {
                        return Err(Error::NotFound(format!(
                            "package {} version {} not found in {}",
                            name, v, source
                        )));
                    }
                }
            }
            None => None,
        };

        let reference = format!("{}#{}", source, name);
        info!("Installing {}", reference);

        self.nix(&["profile", "install", &reference])
            .map_err(|e| match e {
                Error::ExternalTool { stderr, .. } => Error::Install {
                    package: name.to_string(),
                    stderr,
                },
                other => other,
            })?;

        let installed = self.list_installed()?;
        let pkg = match find_installed(&installed, name) {
            Some(pkg) => pkg.clone(),
            None => {
                warn!("{} installed but not visible in the profile listing", name);
                candidate.unwrap_or_else(|| PackageInfo::new(name, UNKNOWN_VERSION))
            }
        };

        info!("Installed {} {}", pkg.name, pkg.version);
        Ok(pkg)
    }

    fn remove_one(&self, name: &str) -> Result<()> {
        info!("Removing {}", name);
        self.nix(&["profile", "remove", name]).map(|_| ())
    }

    /// Remove packages, continuing past failures
    ///
    /// Always returns one outcome per input name, in input order.
    pub fn remove(&self, names: &[String]) -> Vec<RemoveOutcome> {
        let installed = match self.list_installed() {
            Ok(installed) => installed,
            Err(e) => {
                let reason = e.to_string();
                return names
                    .iter()
                    .map(|name| RemoveOutcome {
                        name: name.clone(),
                        status: RemoveStatus::Failed(reason.clone()),
                    })
                    .collect();
            }
        };

        names
            .iter()
            .map(|name| {
                let status = if find_installed(&installed, name).is_none() {
                    RemoveStatus::NotInstalled
                } else {
                    match self.remove_one(name) {
                        Ok(()) => RemoveStatus::Removed,
                        Err(e) => RemoveStatus::Failed(e.to_string()),
                    }
                };
                RemoveOutcome {
                    name: name.clone(),
                    status,
                }
            })
            .collect()
    }

    /// Replace an installed package with its latest or mapped version
    pub fn update(&self, name: &str) -> Result<UpdateOutcome> {
        let installed = self.list_installed()?;
        if find_installed(&installed, name).is_none() {
            return Err(UpdateError::NotInstalled(name.to_string()).into());
        }

        let mapping = resolve_mapping(name);
        let target = mapping.map_or(name, |m| m.target_package);
        if let Some(m) = mapping {
            info!("Redirecting update of {} to {}: {}", name, m.target_package, m.description);
        }

        self.remove_one(name).map_err(|e| UpdateError::RemoveFailed {
            package: name.to_string(),
            reason: e.to_string(),
        })?;

        if mapping.is_some() {
            if let Some(existing) = find_installed(&installed, target) {
                info!("{} is already installed, skipping reinstall", target);
                return Ok(UpdateOutcome {
                    removed: name.to_string(),
                    installed: existing.clone(),
                    mapping,
                    install_skipped: true,
                });
            }
        }

        let pkg = self
            .install(target, None, None)
            .map_err(|e| UpdateError::ReinstallFailed {
                removed: name.to_string(),
                target: target.to_string(),
                reason: e.to_string(),
            })?;

        Ok(UpdateOutcome {
            removed: name.to_string(),
            installed: pkg,
            mapping,
            install_skipped: false,
        })
    }
}

/// Find an installed package by element name, then by pname
pub fn find_installed<'a>(installed: &'a [PackageInfo], name: &str) -> Option<&'a PackageInfo> {
    installed
        .iter()
        .find(|p| p.name == name)
        .or_else(|| installed.iter().find(|p| p.pname == name))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// Replays canned outputs and records every invocation
    #[derive(Default)]
    struct ScriptedRunner {
        responses: Mutex<VecDeque<CommandOutput>>,
        calls: Mutex<Vec<Vec<String>>>,
    }

    impl ScriptedRunner {
        fn with(responses: Vec<CommandOutput>) -> Self {
            Self {
                responses: Mutex::new(responses.into()),
                calls: Mutex::new(Vec::new()),
            }
        }

        /// Calls without the experimental-features prefix
        fn calls(&self) -> Vec<Vec<String>> {
            self.calls
                .lock()
                .unwrap()
                .iter()
                .map(|c| c[2..].to_vec())
                .collect()
        }
    }

    impl CommandRunner for ScriptedRunner {
        fn run(&self, _program: &str, args: &[String], _timeout: Duration) -> Result<CommandOutput> {
            self.calls.lock().unwrap().push(args.to_vec());
            Ok(self
                .responses
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| CommandOutput::failed("unexpected call")))
        }
    }

    fn client(responses: Vec<CommandOutput>) -> NixClient<ScriptedRunner> {
        NixClient::new(ScriptedRunner::with(responses), "nix", Duration::from_secs(5))
    }

    fn profile(names: &[(&str, &str)]) -> CommandOutput {
        let mut elements = serde_json::Map::new();
        for (name, version) in names {
            elements.insert(
                name.to_string(),
                serde_json::json!({
                    "attrPath": format!("legacyPackages.x86_64-linux.{}", name),
                    "storePaths": [format!("/nix/store/0c3xwrbb3frh3lr7gk6ifnvrvy1x0sh5-{}-{}", name, version)]
                }),
            );
        }
        CommandOutput::ok(serde_json::json!({"version": 3, "elements": elements}).to_string())
    }

    #[test]
    fn test_remove_reports_every_name() {
        let nix = client(vec![
            profile(&[("git", "2.44.0"), ("jq", "1.7.1")]),
            CommandOutput::ok(""),
            CommandOutput::failed("permission denied"),
        ]);
        let names: Vec<String> = ["git", "ripgrep", "jq"].iter().map(|s| s.to_string()).collect();
        let outcomes = nix.remove(&names);

        assert_eq!(outcomes.len(), 3);
        assert_eq!(outcomes[0].status, RemoveStatus::Removed);
        assert_eq!(outcomes[1].status, RemoveStatus::NotInstalled);
        assert!(matches!(&outcomes[2].status, RemoveStatus::Failed(r) if r.contains("permission denied")));
        let order: Vec<_> = outcomes.iter().map(|o| o.name.as_str()).collect();
        assert_eq!(order, vec!["git", "ripgrep", "jq"]);
    }

    #[test]
    fn test_remove_when_listing_fails() {
        let nix = client(vec![CommandOutput::failed("no profile")]);
        let names = vec!["a".to_string(), "b".to_string()];
        let outcomes = nix.remove(&names);
        assert_eq!(outcomes.len(), 2);
        assert!(outcomes.iter().all(|o| matches!(o.status, RemoveStatus::Failed(_))));
    }

    #[test]
    fn test_mapped_update_never_installs_source() {
        let nix = client(vec![
            profile(&[("python310", "3.10.14")]),
            CommandOutput::ok(""),
            CommandOutput::ok(""),
            profile(&[("python313", "3.13.0")]),
        ]);
        let outcome = nix.update("python310").unwrap();

        assert_eq!(outcome.installed.name, "python313");
        assert_eq!(outcome.mapping.unwrap().target_package, "python313");
        let calls = nix.runner().calls();
        assert!(calls.contains(&vec!["profile".into(), "remove".into(), "python310".into()]));
        assert!(calls.contains(&vec!["profile".into(), "install".into(), "nixpkgs#python313".into()]));
        assert!(!calls.iter().any(|c| c.iter().any(|a| a == "nixpkgs#python310")));
    }

    #[test]
    fn test_mapped_update_skips_installed_target() {
        let nix = client(vec![
            profile(&[("nodejs_18", "18.20.1"), ("nodejs_20", "20.11.1")]),
            CommandOutput::ok(""),
        ]);
        let outcome = nix.update("nodejs_18").unwrap();
        assert!(outcome.install_skipped);
        assert_eq!(outcome.installed.version, "20.11.1");
        assert_eq!(nix.runner().calls().len(), 2);
    }

    #[test]
    fn test_update_requires_installed_package() {
        let nix = client(vec![profile(&[("git", "2.44.0")])]);
        let err = nix.update("hello").unwrap_err();
        assert!(matches!(err, Error::Update(UpdateError::NotInstalled(_))));
    }

    #[test]
    fn test_update_reports_failed_reinstall() {
        let nix = client(vec![
            profile(&[("hello", "2.12.1")]),
            CommandOutput::ok(""),
            CommandOutput::failed("network unreachable"),
        ]);
        let err = nix.update("hello").unwrap_err();
        match err {
            Error::Update(UpdateError::ReinstallFailed { removed, target, reason }) => {
                assert_eq!(removed, "hello");
                assert_eq!(target, "hello");
                assert!(reason.contains("network unreachable"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_install_confirms_version_from_profile() {
        let nix = client(vec![CommandOutput::ok(""), profile(&[("hello", "2.12.1")])]);
        let pkg = nix.install("hello", None, None).unwrap();
        assert_eq!(pkg.version, "2.12.1");
        assert_eq!(
            nix.runner().calls()[0],
            vec!["profile".to_string(), "install".to_string(), "nixpkgs#hello".to_string()]
        );
    }

    #[test]
    fn test_install_from_flake_source() {
        let nix = client(vec![CommandOutput::ok(""), profile(&[("sui", "1.30.1")])]);
        nix.install("sui", None, Some("github:MystenLabs/sui")).unwrap();
        assert_eq!(nix.runner().calls()[0][2], "github:MystenLabs/sui#sui");
    }

    #[test]
    fn test_install_missing_version_is_not_found() {
        let search = serde_json::json!({
            "legacyPackages.x86_64-linux.hello": {"pname": "hello", "version": "2.12.1", "description": ""}
        });
        let nix = client(vec![CommandOutput::ok(search.to_string())]);
        let err = nix.install("hello", Some("v9.9"), None).unwrap_err();
        assert!(matches!(err, Error::NotFound(msg) if msg.contains("9.9")));
        assert_eq!(nix.runner().calls().len(), 1);
    }

    #[test]
    fn test_install_pinned_version_from_flake_source() {
        let search = serde_json::json!({
            "packages.x86_64-linux.sui": {"pname": "sui", "version": "1.30.1", "description": ""}
        });
        let nix = client(vec![
            CommandOutput::ok(search.to_string()),
            CommandOutput::ok(""),
            profile(&[("sui", "1.30.1")]),
        ]);
        let pkg = nix.install("sui", Some("1.30.1"), Some("github:MystenLabs/sui")).unwrap();
        assert_eq!(pkg.version, "1.30.1");

        let calls = nix.runner().calls();
        assert_eq!(calls[0][..2], ["search".to_string(), "github:MystenLabs/sui".to_string()]);
        assert_eq!(calls[1][2], "github:MystenLabs/sui#sui");
    }

    #[test]
    fn test_install_failure_carries_stderr() {
        let nix = client(vec![CommandOutput::failed("error: flake has no attribute")]);
        let err = nix.install("nope", None, None).unwrap_err();
        assert!(matches!(err, Error::Install { stderr, .. } if stderr.contains("no attribute")));
    }

    #[test]
    fn test_search_without_matches_is_not_found() {
        let nix = client(vec![CommandOutput::ok("{}")]);
        assert!(matches!(nix.search("zzz"), Err(Error::NotFound(_))));
    }

    #[test]
    fn test_list_installed_empty_profile() {
        let nix = client(vec![CommandOutput::ok(r#"{"version":3,"elements":{}}"#)]);
        assert!(nix.list_installed().unwrap().is_empty());
    }
}
