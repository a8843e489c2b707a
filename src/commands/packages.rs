// src/commands/packages.rs

use super::Context;
use crate::error::Result;
use crate::nix::{CommandRunner, RemoveStatus};
use tracing::info;

pub fn install<R: CommandRunner>(ctx: &Context<R>, name: &str, version: Option<&str>) -> Result<()> {
    let label = match version {
        Some(v) => format!("Installing {} version {}", name, v),
        None => format!("Installing {}", name),
    };
    let spinner = ctx.out.spinner(&label);

    match ctx.nix.install(name, version, None) {
        Ok(pkg) => {
            let version = pkg.has_known_version().then_some(pkg.version.as_str());
            spinner.succeed(&format!("Installed {}", ctx.out.package(&pkg.name, version)));
            Ok(())
        }
        Err(e) => {
            spinner.fail(&format!("Failed to install {}", name));
            Err(e)
        }
    }
}

/// Remove each package, reporting every outcome; never fails as a whole
pub fn remove<R: CommandRunner>(ctx: &Context<R>, names: &[String]) -> Result<()> {
    let outcomes = ctx.nix.remove(names);
    let mut removed = 0;

    for outcome in &outcomes {
        match &outcome.status {
            RemoveStatus::Removed => {
                removed += 1;
                ctx.out.success(&format!("Uninstalled {}", outcome.name));
            }
            RemoveStatus::NotInstalled => {
                ctx.out.warning(&format!("Package {} is not installed", outcome.name));
            }
            RemoveStatus::Failed(reason) => {
                ctx.out.failure(&format!("Failed to remove {}: {}", outcome.name, reason));
            }
        }
    }

    info!("Removed {} of {} packages", removed, outcomes.len());
    Ok(())
}

pub fn search<R: CommandRunner>(ctx: &Context<R>, term: Option<&str>) -> Result<()> {
    let spinner = ctx.out.spinner("Searching for packages...");

    match ctx.nix.search(term.unwrap_or_default()) {
        Ok(packages) => {
            spinner.succeed(&format!("Found {} packages", packages.len()));
            ctx.out.package_table(&packages);
            Ok(())
        }
        Err(e) => {
            spinner.fail("Search failed");
            Err(e)
        }
    }
}

pub fn update<R: CommandRunner>(ctx: &Context<R>, name: &str) -> Result<()> {
    let spinner = ctx.out.spinner(&format!("Updating {}...", name));

    let outcome = match ctx.nix.update(name) {
        Ok(outcome) => outcome,
        Err(e) => {
            spinner.fail(&format!("Failed to update {}", name));
            return Err(e);
        }
    };

    let version = outcome
        .installed
        .has_known_version()
        .then_some(outcome.installed.version.as_str());
    let installed = ctx.out.package(&outcome.installed.name, version);

    match outcome.mapping {
        Some(mapping) => {
            spinner.succeed(&format!("Replaced {} with {}", outcome.removed, installed));
            ctx.out.info(mapping.description);
            if outcome.install_skipped {
                ctx.out.info(&format!("{} was already installed", mapping.target_package));
            }
        }
        None => spinner.succeed(&format!("Updated {}", installed)),
    }
    Ok(())
}

pub fn list<R: CommandRunner>(ctx: &Context<R>) -> Result<()> {
    let packages = ctx.nix.list_installed()?;
    if packages.is_empty() {
        ctx.out.warning("No packages installed.");
        return Ok(());
    }

    ctx.out.package_table(&packages);
    ctx.out.info(&format!("Total: {} package(s)", packages.len()));
    Ok(())
}
