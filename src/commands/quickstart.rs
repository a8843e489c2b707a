// src/commands/quickstart.rs

use super::Context;
use crate::error::{Error, Result};
use crate::nix::CommandRunner;
use crate::packages::{find_quickstart, quickstart_names};
use tracing::warn;

/// Install the package bundle of a development environment
pub fn quickstart<R: CommandRunner>(ctx: &Context<R>, environment: &str) -> Result<()> {
    let Some(packages) = find_quickstart(environment) else {
        let available: Vec<&str> = quickstart_names().map(|(name, _)| name).collect();
        ctx.out
            .warning(&format!("Available quickstarts: {}", available.join(", ")));
        return Err(Error::NotFound(format!("Quickstart \"{}\" not found", environment)));
    };

    ctx.out.success(&format!(
        "Found {} packages in \"{}\" quickstart",
        packages.len(),
        environment
    ));
    let lines: Vec<String> = packages
        .iter()
        .map(|p| ctx.out.package(p.name, p.version))
        .collect();
    ctx.out.panel(Some("Packages to install"), &lines);

    let mut failed = 0;
    for pkg in packages {
        let spinner = ctx.out.spinner(&format!("Installing {}...", pkg.name));
        match ctx.nix.install(pkg.name, pkg.version, pkg.flake_source) {
            Ok(installed) => spinner.succeed(&format!("Installed {}", installed.name)),
            Err(e) => {
                warn!("Quickstart {}: {} failed: {}", environment, pkg.name, e);
                spinner.fail(&format!("Failed to install {}", pkg.name));
                failed += 1;
            }
        }
    }

    if failed == 0 {
        ctx.out.panel(
            None,
            &[format!("Successfully installed \"{}\" development environment", environment)],
        );
    } else {
        ctx.out.panel(
            None,
            &[format!(
                "\"{}\" development environment installed with {} failure(s)",
                environment, failed
            )],
        );
    }
    Ok(())
}

pub fn environments<R: CommandRunner>(ctx: &Context<R>) -> Result<()> {
    let lines: Vec<String> = quickstart_names()
        .map(|(name, description)| format!("{} - {}", ctx.out.package(name, None), description))
        .collect();
    ctx.out
        .panel(Some("Available development environments"), &lines);
    ctx.out
        .info("To set up an environment, use: beacon quickstart <environment>");
    Ok(())
}
