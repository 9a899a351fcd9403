//! `nuload install` command implementation.
//!
//! Gathers the dependency graph of the requested packages, resolves one
//! version per id, downloads and extracts the result into the target
//! directory and reports the assemblies chosen for the host framework.

use std::time::Instant;

use nuload_cache::{select_target, InstallStatus, InstalledPackage, Installer, PackageCache, TargetSelection};
use nuload_config::Settings;
use nuload_core::error::{NuloadError, NuloadResult};
use nuload_core::PackageRequest;
use nuload_resolver::{GraphBuilder, Resolver};

use super::{build_host, build_sources, CommandContext};
use crate::InstallOptions;

/// One installed package with its selected `lib/` folder
#[derive(Debug)]
pub struct InstallReport {
    pub package: InstalledPackage,
    pub target: Option<TargetSelection>,
}

/// Execute the `nuload install` command
pub async fn execute(
    id: &str,
    version: Option<&str>,
    prerelease: bool,
    options: InstallOptions,
    ctx: &CommandContext,
) -> NuloadResult<()> {
    let request = PackageRequest::parse(id, version, prerelease)?;
    let settings = ctx.settings(options.into()).await?;

    install_packages(&[request], &settings, ctx).await?;
    Ok(())
}

/// Run the whole pipeline for `requests`
pub async fn install_packages(
    requests: &[PackageRequest],
    settings: &Settings,
    ctx: &CommandContext,
) -> NuloadResult<Vec<InstallReport>> {
    let start_time = Instant::now();

    let sources = build_sources(&settings.sources)?;
    let host = build_host(&settings.host);

    for request in requests {
        ctx.output.step(&format!("Resolving {} ({})", request.id, request.range_display()));
    }

    let builder = GraphBuilder::new(sources.clone(), host, settings.framework.clone())
        .with_concurrency(settings.concurrency);
    let universe = builder.gather(requests, &ctx.cancel).await?;

    let resolved = Resolver::new(settings.behavior).resolve(requests, &universe)?;
    ctx.output.info(&format!(
        "Resolved {} packages for {} ({} dependencies)",
        resolved.len(),
        settings.framework,
        settings.behavior
    ));

    let cache = PackageCache::new(&settings.cache_dir)?;
    let installer = Installer::new(sources, cache).with_concurrency(settings.concurrency);
    let installed = installer
        .materialize(&resolved, settings.install_dir.as_std_path(), &ctx.cancel)
        .await?;

    let mut reports = Vec::with_capacity(installed.len());
    for package in installed {
        let target = select_target(&package.path, &settings.framework)?;
        report_package(&package, target.as_ref(), ctx);
        reports.push(InstallReport { package, target });
    }

    if ctx.cancel.is_cancelled() {
        return Err(NuloadError::Cancelled);
    }

    ctx.output.success(&format!(
        "Installed {} packages into {} in {:.2}s",
        reports.len(),
        settings.install_dir,
        start_time.elapsed().as_secs_f64()
    ));

    Ok(reports)
}

fn report_package(package: &InstalledPackage, target: Option<&TargetSelection>, ctx: &CommandContext) {
    let status = match (package.status, package.from_cache) {
        (InstallStatus::AlreadyPresent, _) => "already present",
        (InstallStatus::Extracted, true) => "extracted from cache",
        (InstallStatus::Extracted, false) => "downloaded",
    };

    let assemblies = match target {
        Some(selection) => format!("{}, {} assemblies", selection.framework, selection.assemblies.len()),
        None => "no assemblies".to_string(),
    };

    ctx.output.item(&format!("{} ({}; {})", package.identity, status, assemblies));
}
