// src/commands/hub.rs

//! Identity and snapshot sharing: `login`, `push`, `pull`

use super::Context;
use crate::error::{Error, Result};
use crate::nix::CommandRunner;
use crate::packages::SnapshotPackage;
use crate::snapshot::{self, SOURCE_CLI};
use tracing::{debug, info};

pub fn login<R: CommandRunner>(ctx: &Context<R>, address: &str) -> Result<()> {
    let credentials = ctx.credentials.login(address)?;
    ctx.out
        .success(&format!("Logged in as {}", credentials.user_address));
    debug!("Credentials written to {}", ctx.credentials.path().display());
    Ok(())
}

fn package_lines<R: CommandRunner>(ctx: &Context<R>, packages: &[SnapshotPackage]) -> Vec<String> {
    packages
        .iter()
        .map(|p| ctx.out.package(&p.name, p.requested_version()))
        .collect()
}

/// Publish the installed package list under the logged-in identity
pub fn push<R: CommandRunner>(ctx: &Context<R>, project_name: &str) -> Result<()> {
    let user = match ctx.credentials.require() {
        Ok(user) => user,
        Err(e) => {
            ctx.out
                .failure("You need to login first. Use 'beacon login <userAddress>'");
            return Err(e);
        }
    };

    let project_name = project_name.trim();
    if project_name.is_empty() {
        return Err(Error::Validation("Project name is required".to_string()));
    }

    let db = ctx.database()?;
    let blobs = ctx.blobs()?;

    let spinner = ctx.out.spinner("Pushing package list to hub...");
    let report = match snapshot::publish(
        &ctx.nix,
        &blobs,
        &db,
        &user.user_address,
        Some(project_name),
        SOURCE_CLI,
    ) {
        Ok(report) => report,
        Err(e) => {
            spinner.fail("Push failed");
            return Err(e);
        }
    };
    spinner.succeed("Package list pushed to hub");

    for warning in &report.warnings {
        ctx.out.warning(warning);
    }

    ctx.out.panel(
        Some(&format!("Project: {}", project_name)),
        &[
            format!("Pushed {} packages to hub", report.payload.packages.len()),
            format!("Blob ID: {}", report.blob_id),
        ],
    );
    ctx.out.panel(
        Some("Packages pushed to hub"),
        &package_lines(ctx, &report.payload.packages),
    );
    Ok(())
}

/// Install every package of a shared snapshot
pub fn pull<R: CommandRunner>(ctx: &Context<R>, url: &str) -> Result<()> {
    let blobs = ctx.blobs()?;

    let spinner = ctx.out.spinner("Fetching package list...");
    let (blob_id, payload) = match snapshot::fetch_snapshot(&blobs, url) {
        Ok(fetched) => fetched,
        Err(e) => {
            spinner.fail("Failed to fetch the package list");
            return Err(e);
        }
    };

    let project = payload
        .project_name
        .clone()
        .unwrap_or_else(|| "Unknown Project".to_string());
    spinner.succeed(&format!(
        "Found {} packages from project \"{}\"",
        payload.packages.len(),
        project
    ));
    info!("Pulling blob {}", blob_id);

    ctx.out
        .panel(Some("Packages to install"), &package_lines(ctx, &payload.packages));

    let total = payload.packages.len();
    let progress = ctx.out.spinner("Installing packages...");
    let summary = snapshot::install_snapshot(&ctx.nix, &payload, |i, pkg| {
        progress.set_message(&format!("Installing {} ({}/{})...", pkg.name, i, total));
    });
    drop(progress);

    if !summary.failed.is_empty() {
        let names: Vec<&str> = summary.failed.iter().map(|(name, _)| name.as_str()).collect();
        ctx.out
            .failure(&format!("Failed to install: {}", names.join(", ")));
        for (name, reason) in &summary.failed {
            debug!("{}: {}", name, reason);
        }
    }

    let mut lines = vec![format!("✓ Successfully installed: {}", summary.installed.len())];
    if !summary.failed.is_empty() {
        lines.push(format!("✗ Failed: {}", summary.failed.len()));
    }
    ctx.out.panel(Some(&format!("Project: {}", project)), &lines);
    Ok(())
}
